//! Key-value ledger the passport service reads from and writes to
//!
//! Ordering, replication and endorsement belong to the hosting ledger. The
//! core only needs keyed reads, keyed writes, an atomic multi-key write for
//! transformations and a best-effort notification channel.
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use sled::Batch;

use super::error::LedgerError;

pub trait Ledger {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError>;
    /// Applies every write or none of them.
    fn put_all(&self, writes: Vec<(String, Vec<u8>)>) -> Result<(), LedgerError>;
    fn emit_event(&self, name: &str, payload: &[u8]) -> Result<(), LedgerError>;
}

/// Ledger backed by a sled database. Notifications land in the `events` tree.
pub struct SledLedger {
    instance: Arc<sled::Db>,
}

impl SledLedger {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db = sled::open(path)?;
        Ok(Self::new(Arc::new(db)))
    }

    /// Notifications emitted so far, oldest first.
    pub fn emitted_events(&self) -> Result<Vec<(String, Vec<u8>)>, LedgerError> {
        let tree = self.instance.open_tree("events")?;
        let mut events = vec![];
        for entry in tree.iter() {
            let (_, value) = entry?;
            let (name, payload): (String, Vec<u8>) = minicbor::decode(&value)
                .map_err(|_| LedgerError::Corrupt("events".to_string()))?;
            events.push((name, payload));
        }
        Ok(events)
    }
}

impl Ledger for SledLedger {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.instance.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        self.instance.insert(key.as_bytes(), value)?;
        self.instance.flush()?;
        Ok(())
    }

    fn put_all(&self, writes: Vec<(String, Vec<u8>)>) -> Result<(), LedgerError> {
        let mut batch = Batch::default();
        for (key, value) in writes {
            batch.insert(key.as_bytes(), value);
        }
        self.instance.apply_batch(batch)?;
        self.instance.flush()?;
        Ok(())
    }

    fn emit_event(&self, name: &str, payload: &[u8]) -> Result<(), LedgerError> {
        let tree = self.instance.open_tree("events")?;
        let id = self.instance.generate_id()?;
        let record = minicbor::to_vec((name, payload))
            .map_err(|_| LedgerError::Corrupt("events".to_string()))?;
        tree.insert(id.to_be_bytes(), record)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<String, Vec<u8>>,
    events: Vec<(String, Vec<u8>)>,
    rejected_keys: BTreeSet<String>,
}

/// In-process ledger for tests and embedding. Writes to keys registered
/// with [`MemoryLedger::reject_writes_to`] fail, without applying anything.
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_writes_to(&self, key: &str) -> Result<(), LedgerError> {
        let mut state = self.state.lock().map_err(|_| LedgerError::Poisoned)?;
        state.rejected_keys.insert(key.to_string());
        Ok(())
    }

    pub fn emitted_events(&self) -> Result<Vec<(String, Vec<u8>)>, LedgerError> {
        let state = self.state.lock().map_err(|_| LedgerError::Poisoned)?;
        Ok(state.events.clone())
    }
}

impl Ledger for MemoryLedger {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        let state = self.state.lock().map_err(|_| LedgerError::Poisoned)?;
        Ok(state.records.get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        self.put_all(vec![(key.to_string(), value)])
    }

    fn put_all(&self, writes: Vec<(String, Vec<u8>)>) -> Result<(), LedgerError> {
        let mut state = self.state.lock().map_err(|_| LedgerError::Poisoned)?;
        if let Some((key, _)) = writes.iter().find(|(key, _)| state.rejected_keys.contains(key)) {
            return Err(LedgerError::WriteRejected(key.clone()));
        }
        state.records.extend(writes);
        Ok(())
    }

    fn emit_event(&self, name: &str, payload: &[u8]) -> Result<(), LedgerError> {
        let mut state = self.state.lock().map_err(|_| LedgerError::Poisoned)?;
        state.events.push((name.to_string(), payload.to_vec()));
        Ok(())
    }
}
