//! Digital Product Passport lifecycle for multi-party supply chains.
//!
//! A passport tracks one manufactured batch through several organisations:
//! test results are evaluated against the passport's specifications, transport
//! logs are anchored, ownership moves through a ship/acknowledge handshake and
//! several passports can be merged into one by a transformation. All
//! operations are deterministic functions of the stored record and the
//! [`types::TxContext`] supplied by the hosting ledger.

pub mod config;
pub mod error;
pub mod evaluation;
pub mod events;
pub mod ledger;
pub mod passport;
pub mod payload;
pub mod quality;
pub mod service;
pub mod status;
pub mod transfer;
pub mod transform;
pub mod types;
pub mod utils;

pub use config::ServiceConfig;
pub use error::{DppError, ErrorKind, LedgerError};
pub use ledger::{Ledger, MemoryLedger, SledLedger};
pub use passport::{Dpp, DppStatus, PassportDraft};
pub use service::PassportService;
pub use types::{TimeStamp, TxContext};
