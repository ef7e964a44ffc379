//! Quality bookkeeping: test results and anchored transport logs
use std::str::FromStr;

use chrono::Utc;

use super::error::DppError;
use super::evaluation::{Evaluation, Outcome, TestResult, evaluate, find_standard};
use super::events::{BusinessStep, Disposition, EventExtension, PendingEvent};
use super::passport::{Dpp, DppStatus};
use super::payload::{TestResultDraft, TransportLogPayload};
use super::types::{TimeStamp, TxContext};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmSummary {
    #[n(0)]
    No,
    #[n(1)]
    Yes,
}

impl FromStr for AlarmSummary {
    type Err = DppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YES" => Ok(Self::Yes),
            "NO" => Ok(Self::No),
            other => Err(DppError::payload(
                "alarmSummary",
                format!("expected YES or NO, got '{other}'"),
            )),
        }
    }
}

/// A transport-condition log anchored to a passport. The payload itself is
/// opaque to the core; only its canonical text and content hash are kept.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportLogAnchor {
    #[n(0)]
    pub payload: String,
    #[n(1)]
    pub payload_hash: String,
    #[n(2)]
    pub anchored_at: TimeStamp<Utc>,
    #[n(3)]
    pub anchoring_org_id: String,
    #[n(4)]
    pub anchoring_site_id: String,
    #[n(5)]
    pub alarm_summary: AlarmSummary,
}

impl Outcome {
    pub fn disposition(&self) -> Disposition {
        match self {
            Outcome::Passed => Disposition::Conformant,
            Outcome::Failed => Disposition::NonConformant,
            Outcome::InfoNoStandard => Disposition::ConformantWithIssues,
        }
    }
}

impl Dpp {
    pub(crate) fn ensure_not_consumed(&self) -> Result<(), DppError> {
        if let DppStatus::DeletedByTransform { output_id } = &self.status {
            return Err(DppError::PassportConsumed {
                dpp_id: self.dpp_id.clone(),
                output_id: output_id.clone(),
            });
        }
        Ok(())
    }

    /// Evaluates a draft against this passport's specifications without
    /// touching the record. A caller-asserted outcome skips evaluation.
    pub(crate) fn evaluate_draft(
        &self,
        tx: &TxContext,
        draft: TestResultDraft,
        site_id: &str,
    ) -> Result<(TestResult, bool), DppError> {
        draft.validate()?;

        let standard = find_standard(&draft.standard_name, &self.specifications);
        let evaluation = match draft.evaluation_outcome {
            Some(asserted) => Evaluation {
                outcome: asserted,
                comment: "Outcome asserted by recording organisation".to_string(),
                mandatory: standard.is_some_and(|spec| spec.mandatory),
            },
            None => evaluate(&draft.standard_name, &draft.result, &self.specifications),
        };

        let unit = draft
            .unit
            .or_else(|| standard.map(|spec| spec.unit.clone()))
            .unwrap_or_default();

        let result = TestResult {
            standard_name: draft.standard_name,
            result: draft.result,
            unit,
            recording_org: draft
                .recording_org
                .unwrap_or_else(|| tx.caller_org.clone()),
            recording_site: site_id.to_string(),
            timestamp: draft.timestamp.unwrap_or_else(|| tx.timestamp.clone()),
            evaluation_outcome: evaluation.outcome,
            evaluation_comment: evaluation.comment,
        };

        Ok((result, evaluation.mandatory))
    }

    /// Appends an evaluated result and closes its mandatory check on PASSED.
    pub(crate) fn push_test_result(&mut self, result: TestResult, mandatory: bool) {
        if mandatory && result.evaluation_outcome == Outcome::Passed {
            // absent names are a no-op so retries stay harmless
            self.open_mandatory_checks.remove(&result.standard_name);
        }
        self.quality_history.push(result);
    }

    /// Evaluates and records a test result.
    ///
    /// Fails on a blocked or consumed passport. Duplicate submissions are
    /// appended again; nothing is deduplicated.
    pub fn record_test_result(
        &mut self,
        tx: &TxContext,
        draft: TestResultDraft,
        site_id: &str,
    ) -> Result<TestResult, DppError> {
        self.ensure_not_consumed()?;
        if self.status == DppStatus::Blocked {
            return Err(DppError::PassportBlocked(self.dpp_id.clone()));
        }

        let (result, mandatory) = self.evaluate_draft(tx, draft, site_id)?;
        self.push_test_result(result.clone(), mandatory);

        let pending = PendingEvent::observe(
            BusinessStep::Inspecting,
            result.evaluation_outcome.disposition(),
            site_id,
            EventExtension::Inspection {
                result: result.clone(),
            },
        );
        self.append_event(tx, pending)?;
        self.refresh_status();

        Ok(result)
    }

    /// Anchors a transport log. Never blocks; an alarm only marks a deviation.
    pub fn anchor_transport_log(
        &mut self,
        tx: &TxContext,
        log: TransportLogPayload,
        site_id: &str,
    ) -> Result<TransportLogAnchor, DppError> {
        self.ensure_not_consumed()?;

        let anchor = TransportLogAnchor {
            payload: log.canonical_json,
            payload_hash: log.payload_hash,
            anchored_at: tx.timestamp.clone(),
            anchoring_org_id: tx.caller_org.clone(),
            anchoring_site_id: site_id.to_string(),
            alarm_summary: log.alarm_summary,
        };
        self.transport_logs.push(anchor.clone());

        let disposition = match anchor.alarm_summary {
            AlarmSummary::Yes => Disposition::ConformantWithIssues,
            AlarmSummary::No => Disposition::Active,
        };
        let pending = PendingEvent::observe(
            BusinessStep::Storing,
            disposition,
            site_id,
            EventExtension::TransportLog {
                payload_hash: anchor.payload_hash.clone(),
                alarm_summary: anchor.alarm_summary,
            },
        );
        self.append_event(tx, pending)?;
        self.refresh_status();

        Ok(anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::TestStandard;
    use crate::passport::PassportDraft;
    use crate::payload::parse_transport_log;

    fn tx() -> TxContext {
        TxContext::new_with("tx_q", "Org1", TimeStamp::new_with(2024, 5, 2, 10, 0, 0).unwrap())
    }

    fn passport() -> Dpp {
        let draft = PassportDraft::new()
            .set_dpp_id("DPP-1")
            .set_product_id("urn:epc:id:sgtin:4012345.011111.1")
            .set_specifications(vec![
                TestStandard::numeric("Tensile", 10.0, 15.0, "MPa", true),
                TestStandard::textual("Visual", "OK", "", false),
            ]);
        Dpp::commission(draft, &tx()).unwrap()
    }

    #[test]
    fn defaults_are_filled_from_the_transaction() {
        let mut dpp = passport();
        let result = dpp
            .record_test_result(&tx(), TestResultDraft::new("Tensile", "12"), "LAB-1")
            .unwrap();

        assert_eq!(result.recording_org, "Org1");
        assert_eq!(result.recording_site, "LAB-1");
        assert_eq!(result.unit, "MPa");
        assert_eq!(result.timestamp, tx().timestamp);
    }

    #[test]
    fn supplied_fields_are_not_overwritten() {
        let mut dpp = passport();
        let measured_at = TimeStamp::new_with(2024, 4, 30, 16, 45, 0).unwrap();
        let draft = TestResultDraft::new("Tensile", "1450")
            .set_unit("N/cm2")
            .set_recording_org("ExternalLab")
            .set_timestamp(measured_at.clone());

        let result = dpp.record_test_result(&tx(), draft, "LAB-EXT").unwrap();

        assert_eq!(result.unit, "N/cm2");
        assert_eq!(result.recording_org, "ExternalLab");
        assert_eq!(result.timestamp, measured_at);
        assert_eq!(
            result.timestamp.to_datetime_utc().to_rfc3339(),
            "2024-04-30T16:45:00+00:00"
        );
        // units are display only; the value is still judged against [10, 15]
        assert_eq!(result.evaluation_outcome, Outcome::Failed);
    }

    #[test]
    fn passed_mandatory_result_closes_check() {
        let mut dpp = passport();
        dpp.record_test_result(&tx(), TestResultDraft::new("Tensile", "12"), "LAB-1")
            .unwrap();

        assert!(dpp.open_mandatory_checks().is_empty());
        assert_eq!(dpp.status(), &DppStatus::Released);
    }

    #[test]
    fn asserted_outcome_skips_evaluation() {
        let mut dpp = passport();
        let result = dpp
            .record_test_result(
                &tx(),
                TestResultDraft::new("Tensile", "99").set_outcome(Outcome::Passed),
                "LAB-1",
            )
            .unwrap();

        assert_eq!(result.evaluation_outcome, Outcome::Passed);
        assert!(dpp.open_mandatory_checks().is_empty());
    }

    #[test]
    fn blocked_passport_rejects_results() {
        let mut dpp = passport();
        dpp.record_test_result(&tx(), TestResultDraft::new("Tensile", "3"), "LAB-1")
            .unwrap();
        assert_eq!(dpp.status(), &DppStatus::Blocked);

        let before = dpp.clone();
        let err = dpp
            .record_test_result(&tx(), TestResultDraft::new("Tensile", "12"), "LAB-1")
            .unwrap_err();
        assert!(matches!(err, DppError::PassportBlocked(_)));
        assert_eq!(dpp, before);
    }

    #[test]
    fn alarmed_log_marks_deviation() {
        let mut dpp = passport();
        dpp.record_test_result(&tx(), TestResultDraft::new("Tensile", "12"), "LAB-1")
            .unwrap();

        let log = parse_transport_log(r#"{"maxTemp": 41.5, "alarmSummary": "YES"}"#).unwrap();
        let anchor = dpp.anchor_transport_log(&tx(), log, "TRUCK-9").unwrap();

        assert_eq!(anchor.anchoring_org_id, "Org1");
        assert_eq!(dpp.status(), &DppStatus::ReleasedWithDeviations);
        assert_eq!(
            dpp.event_log().last().unwrap().disposition,
            Disposition::ConformantWithIssues
        );
    }

    #[test]
    fn alarm_summary_parses_case_insensitively() {
        assert_eq!("yes".parse::<AlarmSummary>().unwrap(), AlarmSummary::Yes);
        assert_eq!(" NO ".parse::<AlarmSummary>().unwrap(), AlarmSummary::No);
        assert!("maybe".parse::<AlarmSummary>().is_err());
    }
}
