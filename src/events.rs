//! Append-only audit trail attached to every passport
use chrono::Utc;

use super::error::DppError;
use super::evaluation::TestResult;
use super::passport::{Dpp, DppStatus};
use super::quality::AlarmSummary;
use super::transfer::InspectionOutcome;
use super::types::{TimeStamp, TxContext};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize,
)]
pub enum EventType {
    #[n(0)]
    ObjectEvent,
    #[n(1)]
    TransformationEvent,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BusinessStep {
    #[n(0)]
    Commissioning,
    #[n(1)]
    Inspecting,
    #[n(2)]
    Storing,
    #[n(3)]
    Transforming,
    #[n(4)]
    Shipping,
    #[n(5)]
    Receiving,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    #[n(0)]
    Add,
    #[n(1)]
    Observe,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    #[n(0)]
    Active,
    #[n(1)]
    Conformant,
    #[n(2)]
    ConformantWithIssues,
    #[n(3)]
    NonConformant,
    #[n(4)]
    InTransit,
    #[n(5)]
    InPossession,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, minicbor::Encode, minicbor::Decode, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSubject {
    #[n(0)]
    pub epc_list: Vec<String>,
    #[n(1)]
    pub input_epc_list: Vec<String>,
    #[n(2)]
    pub output_epc_list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[n(0)]
    pub org_id: String,
    #[n(1)]
    pub site_id: String,
}

/// Operation specific payload carried by an event.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventExtension {
    #[n(0)]
    Commissioned {
        #[n(0)]
        #[serde(rename = "productTypeId")]
        product_type_id: String,
        #[n(1)]
        batch: String,
        #[n(2)]
        #[serde(rename = "productionDate")]
        production_date: String,
    },
    #[n(1)]
    Inspection {
        #[n(0)]
        result: TestResult,
    },
    #[n(2)]
    TransportLog {
        #[n(0)]
        #[serde(rename = "payloadHash")]
        payload_hash: String,
        #[n(1)]
        #[serde(rename = "alarmSummary")]
        alarm_summary: AlarmSummary,
    },
    #[n(3)]
    Shipment {
        #[n(0)]
        recipient: String,
        #[n(1)]
        #[serde(rename = "previousStatus")]
        previous_status: DppStatus,
    },
    #[n(4)]
    Receipt {
        #[n(0)]
        inspection: Option<InspectionOutcome>,
    },
    #[n(5)]
    Transformation {
        #[n(0)]
        #[serde(rename = "inputDppIds")]
        input_dpp_ids: Vec<String>,
        #[n(1)]
        #[serde(rename = "outputDppId")]
        output_dpp_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    #[n(0)]
    pub event_id: String,
    #[n(1)]
    pub event_type: EventType,
    #[n(2)]
    pub timestamp: TimeStamp<Utc>,
    #[n(3)]
    pub business_step: BusinessStep,
    #[n(4)]
    pub action: Option<Action>,
    #[n(5)]
    pub subject: EventSubject,
    #[n(6)]
    pub disposition: Disposition,
    #[n(7)]
    pub location: Location,
    #[n(8)]
    pub extension: EventExtension,
}

/// An event waiting to be stamped with its id, time and location.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    event_type: EventType,
    business_step: BusinessStep,
    action: Option<Action>,
    disposition: Disposition,
    site_id: String,
    input_epc_list: Vec<String>,
    output_epc_list: Vec<String>,
    extension: EventExtension,
}

impl PendingEvent {
    pub fn commission(site_id: &str, extension: EventExtension) -> Self {
        Self {
            event_type: EventType::ObjectEvent,
            business_step: BusinessStep::Commissioning,
            action: Some(Action::Add),
            disposition: Disposition::Active,
            site_id: site_id.to_string(),
            input_epc_list: vec![],
            output_epc_list: vec![],
            extension,
        }
    }
    pub fn observe(
        business_step: BusinessStep,
        disposition: Disposition,
        site_id: &str,
        extension: EventExtension,
    ) -> Self {
        Self {
            event_type: EventType::ObjectEvent,
            business_step,
            action: Some(Action::Observe),
            disposition,
            site_id: site_id.to_string(),
            input_epc_list: vec![],
            output_epc_list: vec![],
            extension,
        }
    }
    pub fn transformation(
        input_epc_list: Vec<String>,
        output_epc: &str,
        site_id: &str,
        extension: EventExtension,
    ) -> Self {
        Self {
            event_type: EventType::TransformationEvent,
            business_step: BusinessStep::Transforming,
            action: None,
            disposition: Disposition::Active,
            site_id: site_id.to_string(),
            input_epc_list,
            output_epc_list: vec![output_epc.to_string()],
            extension,
        }
    }
}

/// `evt_` + 32 hex chars of SHA-256 over (tx id, tx time, dpp id, sequence).
///
/// Unique per passport because the sequence number is the log position, and
/// identical on every node replaying the same transaction.
pub fn derive_event_id(tx: &TxContext, dpp_id: &str, sequence: u64) -> Result<String, DppError> {
    let preimage = minicbor::to_vec((tx.tx_id.as_str(), &tx.timestamp, dpp_id, sequence))
        .map_err(|e| DppError::Codec(e.to_string()))?;
    let hash = sha256::digest(&preimage);

    Ok(format!("evt_{}", &hash[..32]))
}

impl Dpp {
    /// The only way entries enter the log; existing entries are never touched.
    pub(crate) fn append_event(
        &mut self,
        tx: &TxContext,
        pending: PendingEvent,
    ) -> Result<(), DppError> {
        let sequence = self.event_log.len() as u64;
        let entry = EventLogEntry {
            event_id: derive_event_id(tx, &self.dpp_id, sequence)?,
            event_type: pending.event_type,
            timestamp: tx.timestamp.clone(),
            business_step: pending.business_step,
            action: pending.action,
            subject: EventSubject {
                epc_list: vec![self.product_id.clone()],
                input_epc_list: pending.input_epc_list,
                output_epc_list: pending.output_epc_list,
            },
            disposition: pending.disposition,
            location: Location {
                org_id: tx.caller_org.clone(),
                site_id: pending.site_id,
            },
            extension: pending.extension,
        };
        self.event_log.push(entry);

        Ok(())
    }

    /// Latest shipment recorded for this passport, if any.
    pub fn last_shipment(&self) -> Option<(&str, &DppStatus)> {
        self.event_log.iter().rev().find_map(|entry| match &entry.extension {
            EventExtension::Shipment {
                recipient,
                previous_status,
            } => Some((recipient.as_str(), previous_status)),
            _ => None,
        })
    }
}
