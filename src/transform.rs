//! Transformation: consuming several passports into one new passport
//!
//! A transform runs in two phases. [`TransformPlan::prepare`] validates every
//! input and builds every resulting record in memory without touching the
//! ledger; the service then commits the consumed inputs and the new output
//! in a single atomic write. If preparation fails, nothing is written.
use std::collections::BTreeSet;

use super::error::DppError;
use super::events::{EventExtension, PendingEvent};
use super::passport::{Dpp, DppStatus, PassportDraft};
use super::payload::TestResultDraft;
use super::types::TxContext;

#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    pub output: PassportDraft,
    pub input_dpp_ids: Vec<String>,
    pub site_id: String,
    pub initial_test: Option<TestResultDraft>,
}

impl TransformRequest {
    pub fn new(output: PassportDraft, input_dpp_ids: Vec<String>, site_id: &str) -> Self {
        Self {
            output,
            input_dpp_ids,
            site_id: site_id.to_string(),
            initial_test: None,
        }
    }
    pub fn set_initial_test(mut self, draft: TestResultDraft) -> Self {
        self.initial_test = Some(draft);
        self
    }

    /// Shape checks on the input list that need no ledger access.
    pub fn validate(&self, max_inputs: usize) -> Result<(), DppError> {
        self.output.validate()?;

        if self.input_dpp_ids.is_empty() {
            return Err(DppError::payload("inputDppIds", "at least one input is required"));
        }
        if self.input_dpp_ids.len() > max_inputs {
            return Err(DppError::payload(
                "inputDppIds",
                format!(
                    "{} inputs exceed the limit of {max_inputs}",
                    self.input_dpp_ids.len()
                ),
            ));
        }

        let mut seen = BTreeSet::new();
        for id in &self.input_dpp_ids {
            if !seen.insert(id.as_str()) {
                return Err(DppError::payload("inputDppIds", format!("duplicate input {id}")));
            }
        }
        if let Some(output_id) = self.output.dpp_id() {
            if seen.contains(output_id) {
                return Err(DppError::AlreadyExists(output_id.to_string()));
            }
        }
        Ok(())
    }
}

/// Every record a transform will write, built but not yet committed.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformPlan {
    output: Dpp,
    consumed: Vec<Dpp>,
}

impl TransformPlan {
    /// Validates all `inputs` (in request order) and builds the output.
    pub fn prepare(
        tx: &TxContext,
        request: TransformRequest,
        inputs: Vec<Dpp>,
    ) -> Result<Self, DppError> {
        for input in &inputs {
            if input.owner_org != tx.caller_org
                || !input.status.is_transform_eligible(&tx.caller_org)
            {
                return Err(DppError::TransformationInputInvalid {
                    dpp_id: input.dpp_id.clone(),
                    status: input.status.clone(),
                    owner: input.owner_org.clone(),
                });
            }
        }

        let mut output = Dpp::from_draft(request.output, tx)?;
        output.input_dpp_ids = request.input_dpp_ids.clone();

        let input_products = inputs.iter().map(|input| input.product_id.clone()).collect();
        let output_product = output.product_id.clone();
        let pending = PendingEvent::transformation(
            input_products,
            &output_product,
            &request.site_id,
            EventExtension::Transformation {
                input_dpp_ids: request.input_dpp_ids,
                output_dpp_id: output.dpp_id.clone(),
            },
        );
        output.append_event(tx, pending)?;

        if let Some(draft) = request.initial_test {
            let (result, mandatory) = output.evaluate_draft(tx, draft, &request.site_id)?;
            output.push_test_result(result, mandatory);
        }
        output.refresh_status();

        let consumed = inputs
            .into_iter()
            .map(|mut input| {
                input.status = DppStatus::DeletedByTransform {
                    output_id: output.dpp_id.clone(),
                };
                input
            })
            .collect();

        Ok(Self { output, consumed })
    }

    pub fn output(&self) -> &Dpp {
        &self.output
    }
    pub fn consumed(&self) -> &[Dpp] {
        &self.consumed
    }
    pub fn into_records(self) -> (Dpp, Vec<Dpp>) {
        (self.output, self.consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{Outcome, TestStandard};
    use crate::types::TimeStamp;

    fn tx(org: &str) -> TxContext {
        TxContext::new_with("tx_m", org, TimeStamp::new_with(2024, 7, 1, 8, 0, 0).unwrap())
    }

    fn input(id: &str) -> Dpp {
        let draft = PassportDraft::new()
            .set_dpp_id(id)
            .set_product_id(&format!("urn:epc:id:sgtin:4012345.011111.{id}"));
        Dpp::commission(draft, &tx("Org1")).unwrap()
    }

    fn request(inputs: &[&str]) -> TransformRequest {
        let output = PassportDraft::new()
            .set_dpp_id("OUT-1")
            .set_product_id("urn:epc:id:sgtin:4012345.022222.1");
        TransformRequest::new(
            output,
            inputs.iter().map(|s| s.to_string()).collect(),
            "MIXER-1",
        )
    }

    #[test]
    fn plan_consumes_inputs_and_links_output() {
        let plan = TransformPlan::prepare(
            &tx("Org1"),
            request(&["A", "B"]),
            vec![input("A"), input("B")],
        )
        .unwrap();

        assert_eq!(plan.output().input_dpp_ids(), ["A", "B"]);
        assert_eq!(plan.output().status(), &DppStatus::Released);
        assert_eq!(plan.output().event_log().len(), 1);
        for consumed in plan.consumed() {
            assert_eq!(
                consumed.status(),
                &DppStatus::DeletedByTransform {
                    output_id: "OUT-1".into()
                }
            );
        }
    }

    #[test]
    fn foreign_input_is_rejected() {
        let err = TransformPlan::prepare(
            &tx("Org2"),
            request(&["A"]),
            vec![input("A")],
        )
        .unwrap_err();

        match err {
            DppError::TransformationInputInvalid { dpp_id, owner, .. } => {
                assert_eq!(dpp_id, "A");
                assert_eq!(owner, "Org1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn initial_test_feeds_first_status() {
        let output = PassportDraft::new()
            .set_dpp_id("OUT-1")
            .set_product_id("urn:epc:id:sgtin:4012345.022222.1")
            .set_specifications(vec![TestStandard::numeric("MFI", 1.0, 2.0, "g/10min", true)]);
        let request = TransformRequest::new(output, vec!["A".into()], "MIXER-1")
            .set_initial_test(TestResultDraft::new("Moisture", "0.02"));

        let plan = TransformPlan::prepare(&tx("Org1"), request, vec![input("A")]).unwrap();

        let history = plan.output().quality_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].evaluation_outcome, Outcome::InfoNoStandard);
        assert_eq!(
            plan.output().status(),
            &DppStatus::WaitingForChecks { open: 1 }
        );
    }

    #[test]
    fn request_shape_is_validated() {
        assert!(matches!(
            request(&[]).validate(64),
            Err(DppError::InvalidPayload { .. })
        ));
        assert!(matches!(
            request(&["A", "A"]).validate(64),
            Err(DppError::InvalidPayload { .. })
        ));
        assert!(matches!(
            request(&["A", "B", "C"]).validate(2),
            Err(DppError::InvalidPayload { .. })
        ));
        assert!(matches!(
            request(&["OUT-1"]).validate(64),
            Err(DppError::AlreadyExists(_))
        ));
        assert!(request(&["A", "B"]).validate(64).is_ok());
    }
}
