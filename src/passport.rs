//! The passport record, its lifecycle status and the creation builder
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::error::DppError;
use super::evaluation::{TestResult, TestStandard};
use super::events::{EventExtension, EventLogEntry, PendingEvent};
use super::quality::TransportLogAnchor;
use super::types::TxContext;

/// Bumped whenever the persisted CBOR layout of [`Dpp`] changes.
pub const RECORD_SCHEMA_VERSION: u32 = 1;

/// Lifecycle status of a passport.
///
/// `Blocked`, `InTransitTo`, `AcceptedBy` and `DeletedByTransform` are frozen:
/// quality and transport submissions no longer recompute them (see
/// [`DppStatus::is_frozen`]).
#[derive(
    Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize, serde::Deserialize,
)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DppStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    WaitingForChecks {
        #[n(0)]
        open: usize,
    },
    #[n(2)]
    Released,
    #[n(3)]
    ReleasedWithDeviations,
    #[n(4)]
    Blocked,
    #[n(5)]
    InTransitTo {
        #[n(0)]
        org: String,
    },
    #[n(6)]
    AcceptedBy {
        #[n(0)]
        org: String,
    },
    #[n(7)]
    DeletedByTransform {
        #[n(0)]
        #[serde(rename = "outputId")]
        output_id: String,
    },
}

impl fmt::Display for DppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "Draft"),
            Self::WaitingForChecks { open } => write!(f, "Waiting for {open} mandatory check(s)"),
            Self::Released => write!(f, "Released"),
            Self::ReleasedWithDeviations => write!(f, "Released with deviations"),
            Self::Blocked => write!(f, "Blocked"),
            Self::InTransitTo { org } => write!(f, "In transit to {org}"),
            Self::AcceptedBy { org } => write!(f, "Accepted by {org}"),
            Self::DeletedByTransform { output_id } => {
                write!(f, "Consumed by transformation into {output_id}")
            }
        }
    }
}

/// A Digital Product Passport: the per-batch quality and provenance record.
///
/// Fields are only mutated through the lifecycle operations so the
/// open-check and append-only invariants hold for every stored record.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dpp {
    #[n(0)]
    pub(crate) schema_version: u32,
    #[n(1)]
    pub(crate) dpp_id: String,
    #[n(2)]
    pub(crate) product_id: String, // external (GS1-style) identifier
    #[n(3)]
    pub(crate) product_type_id: String,
    #[n(4)]
    pub(crate) manufacturing_site: String,
    #[n(5)]
    pub(crate) batch: String,
    #[n(6)]
    pub(crate) production_date: String,
    #[n(7)]
    pub(crate) owner_org: String,
    #[n(8)]
    pub(crate) status: DppStatus,
    #[n(9)]
    pub(crate) specifications: Vec<TestStandard>,
    #[n(10)]
    pub(crate) open_mandatory_checks: BTreeSet<String>,
    #[n(11)]
    pub(crate) quality_history: Vec<TestResult>,
    #[n(12)]
    pub(crate) transport_logs: Vec<TransportLogAnchor>,
    #[n(13)]
    pub(crate) input_dpp_ids: Vec<String>,
    #[n(14)]
    pub(crate) event_log: Vec<EventLogEntry>,
}

impl Dpp {
    /// Builds a fresh passport from a validated draft, owned by the caller.
    ///
    /// The commissioning event is appended and the status recomputed, so a
    /// passport without mandatory checks leaves here already `Released`.
    pub fn commission(draft: PassportDraft, tx: &TxContext) -> Result<Self, DppError> {
        let mut dpp = Self::from_draft(draft, tx)?;

        let extension = EventExtension::Commissioned {
            product_type_id: dpp.product_type_id.clone(),
            batch: dpp.batch.clone(),
            production_date: dpp.production_date.clone(),
        };
        let site = dpp.manufacturing_site.clone();
        dpp.append_event(tx, PendingEvent::commission(&site, extension))?;
        dpp.refresh_status();

        Ok(dpp)
    }

    /// Record construction shared by commissioning and transformation.
    pub(crate) fn from_draft(draft: PassportDraft, tx: &TxContext) -> Result<Self, DppError> {
        draft.validate()?;

        let open_mandatory_checks = draft
            .specifications
            .iter()
            .filter(|spec| spec.mandatory)
            .map(|spec| spec.name.clone())
            .collect();

        Ok(Self {
            schema_version: RECORD_SCHEMA_VERSION,
            dpp_id: draft.dpp_id.unwrap_or_default(),
            product_id: draft.product_id.unwrap_or_default(),
            product_type_id: draft.product_type_id.unwrap_or_default(),
            manufacturing_site: draft.manufacturing_site.unwrap_or_default(),
            batch: draft.batch.unwrap_or_default(),
            production_date: draft.production_date.unwrap_or_default(),
            owner_org: tx.caller_org.clone(),
            status: DppStatus::Draft,
            specifications: draft.specifications,
            open_mandatory_checks,
            quality_history: vec![],
            transport_logs: vec![],
            input_dpp_ids: vec![],
            event_log: vec![],
        })
    }

    pub fn dpp_id(&self) -> &str {
        &self.dpp_id
    }
    pub fn product_id(&self) -> &str {
        &self.product_id
    }
    pub fn product_type_id(&self) -> &str {
        &self.product_type_id
    }
    pub fn manufacturing_site(&self) -> &str {
        &self.manufacturing_site
    }
    pub fn batch(&self) -> &str {
        &self.batch
    }
    pub fn production_date(&self) -> &str {
        &self.production_date
    }
    pub fn owner_org(&self) -> &str {
        &self.owner_org
    }
    pub fn status(&self) -> &DppStatus {
        &self.status
    }
    pub fn specifications(&self) -> &[TestStandard] {
        &self.specifications
    }
    pub fn open_mandatory_checks(&self) -> &BTreeSet<String> {
        &self.open_mandatory_checks
    }
    pub fn quality_history(&self) -> &[TestResult] {
        &self.quality_history
    }
    pub fn transport_logs(&self) -> &[TransportLogAnchor] {
        &self.transport_logs
    }
    pub fn input_dpp_ids(&self) -> &[String] {
        &self.input_dpp_ids
    }
    pub fn event_log(&self) -> &[EventLogEntry] {
        &self.event_log
    }

    /// Serialises the record to CBOR and returns it with its SHA-256 digest.
    pub fn build(&self) -> Result<(String, Vec<u8>), DppError> {
        let cbor = minicbor::to_vec(self).map_err(|e| DppError::Codec(e.to_string()))?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }

    pub fn digest(&self) -> Result<String, DppError> {
        self.build().map(|(hash, _)| hash)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DppError> {
        let dpp: Dpp = minicbor::decode(bytes).map_err(|e| DppError::Codec(e.to_string()))?;
        if dpp.schema_version != RECORD_SCHEMA_VERSION {
            return Err(DppError::Codec(format!(
                "unsupported record schema version {} for {}",
                dpp.schema_version, dpp.dpp_id
            )));
        }
        Ok(dpp)
    }
}

/// Used for constructing new passports, both on create and as a transform output.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PassportDraft {
    dpp_id: Option<String>,
    product_id: Option<String>,
    product_type_id: Option<String>,
    manufacturing_site: Option<String>,
    batch: Option<String>,
    production_date: Option<String>,
    specifications: Vec<TestStandard>,
}

impl PassportDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_dpp_id(mut self, dpp_id: &str) -> Self {
        self.dpp_id = Some(dpp_id.to_string());
        self
    }
    pub fn set_product_id(mut self, product_id: &str) -> Self {
        self.product_id = Some(product_id.to_string());
        self
    }
    pub fn set_product_type_id(mut self, product_type_id: &str) -> Self {
        self.product_type_id = Some(product_type_id.to_string());
        self
    }
    pub fn set_manufacturing_site(mut self, site: &str) -> Self {
        self.manufacturing_site = Some(site.to_string());
        self
    }
    pub fn set_batch(mut self, batch: &str) -> Self {
        self.batch = Some(batch.to_string());
        self
    }
    pub fn set_production_date(mut self, date: &str) -> Self {
        self.production_date = Some(date.to_string());
        self
    }
    pub fn set_specifications(mut self, specifications: Vec<TestStandard>) -> Self {
        self.specifications = specifications;
        self
    }
    pub fn dpp_id(&self) -> Option<&str> {
        self.dpp_id.as_deref()
    }

    /// Structural checks that need no ledger access.
    pub fn validate(&self) -> Result<(), DppError> {
        match self.dpp_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {}
            _ => return Err(DppError::payload("dppId", "must not be empty")),
        }
        // GS1 key syntax is not enforced beyond emptiness
        match self.product_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {}
            _ => return Err(DppError::InvalidIdentifier),
        }

        let mut seen = BTreeMap::new();
        for (index, spec) in self.specifications.iter().enumerate() {
            if let Some(first) = seen.insert(spec.name.as_str(), index) {
                return Err(DppError::payload(
                    "specifications",
                    format!(
                        "duplicate specification name '{}' at positions {first} and {index}",
                        spec.name
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::TestStandard;
    use crate::types::TimeStamp;

    fn tx() -> TxContext {
        TxContext::new_with("tx_create", "Org1", TimeStamp::new_with(2024, 5, 1, 9, 0, 0).unwrap())
    }

    fn draft() -> PassportDraft {
        PassportDraft::new()
            .set_dpp_id("DPP-PE-001")
            .set_product_id("urn:epc:id:sgtin:4012345.011111.1001")
            .set_product_type_id("PE-Granulate")
            .set_manufacturing_site("SITE-A")
            .set_batch("B-001")
            .set_production_date("2024-05-01")
    }

    #[test]
    fn commission_collects_mandatory_checks() {
        let draft = draft().set_specifications(vec![
            TestStandard::numeric("Density", 0.94, 0.96, "g/cm3", true),
            TestStandard::textual("Colour", "natural", "", true),
            TestStandard::numeric("MFI", 0.1, 0.5, "g/10min", false),
        ]);

        let dpp = Dpp::commission(draft, &tx()).unwrap();

        assert_eq!(dpp.open_mandatory_checks().len(), 2);
        assert!(dpp.open_mandatory_checks().contains("Density"));
        assert_eq!(dpp.status(), &DppStatus::WaitingForChecks { open: 2 });
        assert_eq!(dpp.owner_org(), "Org1");
        assert_eq!(dpp.event_log().len(), 1);
    }

    #[test]
    fn commission_without_specs_is_released() {
        let dpp = Dpp::commission(draft(), &tx()).unwrap();
        assert_eq!(dpp.status(), &DppStatus::Released);
    }

    #[test]
    fn empty_product_id_is_rejected() {
        let err = Dpp::commission(draft().set_product_id("  "), &tx()).unwrap_err();
        assert!(matches!(err, DppError::InvalidIdentifier));
    }

    #[test]
    fn duplicate_spec_names_are_rejected() {
        let draft = draft().set_specifications(vec![
            TestStandard::numeric("Density", 0.94, 0.96, "g/cm3", true),
            TestStandard::numeric("Density", 0.90, 0.99, "g/cm3", false),
        ]);
        assert!(matches!(
            draft.validate(),
            Err(DppError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn record_cbor_roundtrip() {
        let dpp = Dpp::commission(draft(), &tx()).unwrap();
        let (hash, cbor) = dpp.build().unwrap();

        let decoded = Dpp::decode(&cbor).unwrap();
        assert_eq!(decoded, dpp);
        assert_eq!(decoded.digest().unwrap(), hash);
    }

    #[test]
    fn unknown_record_version_is_a_codec_error() {
        let mut dpp = Dpp::commission(draft(), &tx()).unwrap();
        dpp.schema_version = RECORD_SCHEMA_VERSION + 1;
        let (_, cbor) = dpp.build().unwrap();

        match Dpp::decode(&cbor).unwrap_err() {
            DppError::Codec(reason) => assert!(reason.contains("schema version 2")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn draft_metadata_is_kept() {
        let specs = vec![TestStandard::numeric("Density", 0.94, 0.96, "g/cm3", true)];
        let dpp = Dpp::commission(draft().set_specifications(specs.clone()), &tx()).unwrap();

        assert_eq!(dpp.batch(), "B-001");
        assert_eq!(dpp.specifications(), specs.as_slice());
        assert_eq!(dpp.product_type_id(), "PE-Granulate");
        assert_eq!(dpp.manufacturing_site(), "SITE-A");
        assert_eq!(dpp.production_date(), "2024-05-01");
    }

    #[test]
    fn status_display_is_human_readable() {
        let status = DppStatus::InTransitTo {
            org: "Org2".into(),
        };
        assert_eq!(status.to_string(), "In transit to Org2");
    }
}
