//! Service layer API for passport lifecycle operations
//!
//! Each operation loads the records it needs, mutates an in-memory copy and
//! writes the result back in one ledger call. Any error returns before the
//! write, so a failed operation leaves the ledger untouched.
use std::collections::BTreeSet;

use super::config::ServiceConfig;
use super::error::DppError;
use super::evaluation::{Outcome, TestResult};
use super::ledger::Ledger;
use super::passport::{Dpp, DppStatus, PassportDraft};
use super::payload::{self, TestResultDraft};
use super::quality::AlarmSummary;
use super::transfer::InspectionOutcome;
use super::transform::{TransformPlan, TransformRequest};
use super::types::TxContext;
use super::utils::passport_key;

/// One node of a passport's transformation ancestry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceNode {
    pub dpp_id: String,
    pub product_id: String,
    pub status: DppStatus,
    pub inputs: Vec<ProvenanceNode>,
}

pub struct PassportService<L: Ledger> {
    ledger: L,
    config: ServiceConfig,
}

impl<L: Ledger> PassportService<L> {
    pub fn new(ledger: L) -> Self {
        Self::with_config(ledger, ServiceConfig::default())
    }

    pub fn with_config(ledger: L, config: ServiceConfig) -> Self {
        Self { ledger, config }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn key(&self, dpp_id: &str) -> String {
        passport_key(&self.config.key_prefix, dpp_id)
    }

    /// Load a passport record from the ledger
    fn load(&self, dpp_id: &str) -> Result<Dpp, DppError> {
        match self.ledger.get(&self.key(dpp_id))? {
            Some(bytes) => Dpp::decode(&bytes),
            None => Err(DppError::NotFound(dpp_id.to_string())),
        }
    }

    /// Save a passport record to the ledger
    fn store(&self, dpp: &Dpp) -> Result<String, DppError> {
        let (hash, cbor) = dpp.build()?;
        self.ledger.put(&self.key(&dpp.dpp_id), cbor)?;
        Ok(hash)
    }

    fn committed(&self, operation: &str, tx: &TxContext, dpp: &Dpp, digest: &str) {
        tracing::info!(
            operation,
            dpp_id = %dpp.dpp_id,
            caller = %tx.caller_org,
            tx_id = %tx.tx_id,
            status = %dpp.status,
            digest,
            "passport committed"
        );
    }

    pub fn dpp_exists(&self, dpp_id: &str) -> Result<bool, DppError> {
        Ok(self.ledger.get(&self.key(dpp_id))?.is_some())
    }

    /// Create a new passport owned by the calling organisation
    pub fn create_dpp(&self, tx: &TxContext, draft: PassportDraft) -> Result<Dpp, DppError> {
        draft.validate()?;
        let dpp_id = draft.dpp_id().unwrap_or_default().to_string();
        if self.dpp_exists(&dpp_id)? {
            return Err(DppError::AlreadyExists(dpp_id));
        }

        let dpp = Dpp::commission(draft, tx)?;
        let digest = self.store(&dpp)?;
        self.committed("create", tx, &dpp, &digest);

        Ok(dpp)
    }

    /// Create from a draft whose specifications arrive as a JSON array
    pub fn create_dpp_json(
        &self,
        tx: &TxContext,
        draft: PassportDraft,
        specifications_json: &str,
    ) -> Result<Dpp, DppError> {
        let specifications = payload::parse_specifications(specifications_json)?;
        self.create_dpp(tx, draft.set_specifications(specifications))
    }

    /// Evaluate and append a test result
    pub fn record_test_result(
        &self,
        tx: &TxContext,
        dpp_id: &str,
        draft: TestResultDraft,
        site_id: &str,
    ) -> Result<Dpp, DppError> {
        let mut dpp = self.load(dpp_id)?;
        let result = dpp.record_test_result(tx, draft, site_id)?;

        let digest = self.store(&dpp)?;
        self.committed("record_test_result", tx, &dpp, &digest);

        if result.evaluation_outcome == Outcome::Failed {
            self.raise_quality_alarm(&dpp, &result);
        }

        Ok(dpp)
    }

    pub fn record_test_result_json(
        &self,
        tx: &TxContext,
        dpp_id: &str,
        test_json: &str,
        site_id: &str,
    ) -> Result<Dpp, DppError> {
        let draft = payload::parse_test_result(test_json)?;
        self.record_test_result(tx, dpp_id, draft, site_id)
    }

    /// Anchor an opaque transport-condition log
    pub fn anchor_transport_log(
        &self,
        tx: &TxContext,
        dpp_id: &str,
        log_json: &str,
        site_id: &str,
    ) -> Result<Dpp, DppError> {
        let log = payload::parse_transport_log(log_json)?;
        let mut dpp = self.load(dpp_id)?;
        let anchor = dpp.anchor_transport_log(tx, log, site_id)?;

        let digest = self.store(&dpp)?;
        self.committed("anchor_transport_log", tx, &dpp, &digest);

        if anchor.alarm_summary == AlarmSummary::Yes {
            tracing::warn!(
                dpp_id,
                site = site_id,
                payload_hash = %anchor.payload_hash,
                "transport log anchored with alarm"
            );
            self.notify(
                &self.config.transport_alarm_event,
                &serde_json::json!({
                    "dppId": dpp_id,
                    "siteId": site_id,
                    "payloadHash": anchor.payload_hash,
                }),
            );
        }

        Ok(dpp)
    }

    /// Ship a released passport to another organisation
    pub fn transfer(
        &self,
        tx: &TxContext,
        dpp_id: &str,
        target_org: &str,
        site_id: &str,
    ) -> Result<Dpp, DppError> {
        let mut dpp = self.load(dpp_id)?;
        dpp.ship(tx, target_org, site_id)?;

        let digest = self.store(&dpp)?;
        self.committed("transfer", tx, &dpp, &digest);

        Ok(dpp)
    }

    /// Accept a passport shipped to the caller, with an optional inspection verdict
    pub fn acknowledge_receipt(
        &self,
        tx: &TxContext,
        dpp_id: &str,
        site_id: &str,
        inspection: Option<InspectionOutcome>,
    ) -> Result<Dpp, DppError> {
        let mut dpp = self.load(dpp_id)?;
        dpp.acknowledge_receipt(tx, site_id, inspection, &self.config.incoming_inspection_name)?;

        let digest = self.store(&dpp)?;
        self.committed("acknowledge_receipt", tx, &dpp, &digest);

        if inspection == Some(InspectionOutcome::NotOk) {
            if let Some(result) = dpp.quality_history.last() {
                self.raise_quality_alarm(&dpp, result);
            }
        }

        Ok(dpp)
    }

    /// String form of [`Self::acknowledge_receipt`]; an empty outcome means none
    pub fn acknowledge_receipt_str(
        &self,
        tx: &TxContext,
        dpp_id: &str,
        site_id: &str,
        inspection: &str,
    ) -> Result<Dpp, DppError> {
        let inspection = match inspection.trim() {
            "" => None,
            raw => Some(raw.parse()?),
        };
        self.acknowledge_receipt(tx, dpp_id, site_id, inspection)
    }

    /// Consume the listed passports into one new passport
    ///
    /// Every input is validated before anything is written, then all inputs
    /// and the output are committed in one atomic ledger write.
    pub fn transform(&self, tx: &TxContext, request: TransformRequest) -> Result<Dpp, DppError> {
        request.validate(self.config.max_transform_inputs)?;

        let output_id = request.output.dpp_id().unwrap_or_default().to_string();
        if self.dpp_exists(&output_id)? {
            return Err(DppError::AlreadyExists(output_id));
        }

        let inputs = request
            .input_dpp_ids
            .iter()
            .map(|id| self.load(id))
            .collect::<Result<Vec<_>, _>>()?;

        let plan = TransformPlan::prepare(tx, request, inputs)?;
        let (output, consumed) = plan.into_records();

        let mut writes = Vec::with_capacity(consumed.len() + 1);
        for input in &consumed {
            let (_, cbor) = input.build()?;
            writes.push((self.key(&input.dpp_id), cbor));
        }
        let (digest, cbor) = output.build()?;
        writes.push((self.key(&output.dpp_id), cbor));
        self.ledger.put_all(writes)?;

        for input in &consumed {
            tracing::info!(
                dpp_id = %input.dpp_id,
                output_id = %output.dpp_id,
                "passport consumed by transformation"
            );
        }
        self.committed("transform", tx, &output, &digest);

        Ok(output)
    }

    /// Transform with the input list given as a JSON array of ids
    pub fn transform_json(
        &self,
        tx: &TxContext,
        output: PassportDraft,
        specifications_json: &str,
        input_ids_json: &str,
        site_id: &str,
        initial_test_json: Option<&str>,
    ) -> Result<Dpp, DppError> {
        let specifications = payload::parse_specifications(specifications_json)?;
        let input_ids = payload::parse_id_list("inputDppIds", input_ids_json)?;

        let mut request =
            TransformRequest::new(output.set_specifications(specifications), input_ids, site_id);
        // a blank initial test means none was supplied
        if let Some(raw) = initial_test_json.filter(|raw| !raw.trim().is_empty()) {
            request = request.set_initial_test(payload::parse_test_result(raw)?);
        }
        self.transform(tx, request)
    }

    pub fn query_dpp(&self, dpp_id: &str) -> Result<Dpp, DppError> {
        self.load(dpp_id)
    }

    pub fn query_dpp_json(&self, dpp_id: &str) -> Result<String, DppError> {
        let dpp = self.load(dpp_id)?;
        serde_json::to_string_pretty(&dpp).map_err(|e| DppError::Codec(e.to_string()))
    }

    /// Walks `inputDppIds` recursively to rebuild a passport's ancestry
    pub fn trace_provenance(&self, dpp_id: &str) -> Result<ProvenanceNode, DppError> {
        let mut visited = BTreeSet::new();
        self.trace_node(dpp_id, &mut visited)
    }

    fn trace_node(
        &self,
        dpp_id: &str,
        visited: &mut BTreeSet<String>,
    ) -> Result<ProvenanceNode, DppError> {
        let dpp = self.load(dpp_id)?;
        visited.insert(dpp_id.to_string());

        let mut inputs = vec![];
        for input_id in &dpp.input_dpp_ids {
            if visited.contains(input_id) {
                continue;
            }
            inputs.push(self.trace_node(input_id, visited)?);
        }

        Ok(ProvenanceNode {
            dpp_id: dpp.dpp_id,
            product_id: dpp.product_id,
            status: dpp.status,
            inputs,
        })
    }

    fn raise_quality_alarm(&self, dpp: &Dpp, result: &TestResult) {
        tracing::warn!(
            dpp_id = %dpp.dpp_id,
            standard = %result.standard_name,
            result = %result.result,
            comment = %result.evaluation_comment,
            "quality alarm"
        );
        self.notify(
            &self.config.quality_alarm_event,
            &serde_json::json!({
                "dppId": dpp.dpp_id,
                "productId": dpp.product_id,
                "standardName": result.standard_name,
                "result": result.result,
                "comment": result.evaluation_comment,
            }),
        );
    }

    // best effort: the record is already committed
    fn notify(&self, name: &str, payload: &serde_json::Value) {
        let bytes = payload.to_string().into_bytes();
        if let Err(err) = self.ledger.emit_event(name, &bytes) {
            tracing::warn!(event = name, error = %err, "failed to emit notification");
        }
    }
}
