//! Two-phase ownership handshake: ship, then acknowledge receipt
use std::str::FromStr;

use super::error::DppError;
use super::evaluation::Outcome;
use super::events::{BusinessStep, Disposition, EventExtension, PendingEvent};
use super::passport::{Dpp, DppStatus};
use super::payload::TestResultDraft;
use super::types::TxContext;

/// Result of a receiving organisation's physical incoming inspection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, serde::Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectionOutcome {
    #[n(0)]
    Ok,
    #[n(1)]
    NotOk,
}

impl InspectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NotOk => "NOT_OK",
        }
    }
    fn outcome(&self) -> Outcome {
        match self {
            Self::Ok => Outcome::Passed,
            Self::NotOk => Outcome::Failed,
        }
    }
}

impl FromStr for InspectionOutcome {
    type Err = DppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OK" => Ok(Self::Ok),
            "NOT_OK" => Ok(Self::NotOk),
            other => Err(DppError::payload(
                "inspectionOutcome",
                format!("expected OK or NOT_OK, got '{other}'"),
            )),
        }
    }
}

impl Dpp {
    fn ensure_owner(&self, caller: &str) -> Result<(), DppError> {
        if self.owner_org != caller {
            return Err(DppError::NotOwner {
                dpp_id: self.dpp_id.clone(),
                caller: caller.to_string(),
                owner: self.owner_org.clone(),
            });
        }
        Ok(())
    }

    /// Ships a released passport to `target_org`.
    ///
    /// Ownership moves immediately; the passport stays frozen in
    /// `InTransitTo` until the recipient acknowledges it.
    pub fn ship(&mut self, tx: &TxContext, target_org: &str, site_id: &str) -> Result<(), DppError> {
        self.ensure_owner(&tx.caller_org)?;
        if target_org.trim().is_empty() {
            return Err(DppError::payload("targetOrg", "must not be empty"));
        }
        if target_org == tx.caller_org {
            return Err(DppError::SelfTransfer(self.dpp_id.clone()));
        }
        if !self.status.is_released() {
            return Err(DppError::NotTransferable {
                dpp_id: self.dpp_id.clone(),
                status: self.status.clone(),
            });
        }

        let pending = PendingEvent::observe(
            BusinessStep::Shipping,
            Disposition::InTransit,
            site_id,
            EventExtension::Shipment {
                recipient: target_org.to_string(),
                previous_status: self.status.clone(),
            },
        );
        self.append_event(tx, pending)?;

        self.owner_org = target_org.to_string();
        self.status = DppStatus::InTransitTo {
            org: target_org.to_string(),
        };

        Ok(())
    }

    /// Accepts a passport shipped to the caller, optionally recording an
    /// incoming inspection under `inspection_name`.
    ///
    /// NOT_OK overrides the acceptance and blocks the passport.
    pub fn acknowledge_receipt(
        &mut self,
        tx: &TxContext,
        site_id: &str,
        inspection: Option<InspectionOutcome>,
        inspection_name: &str,
    ) -> Result<(), DppError> {
        self.ensure_owner(&tx.caller_org)?;
        let expected = DppStatus::InTransitTo {
            org: tx.caller_org.clone(),
        };
        if self.status != expected {
            return Err(DppError::ReceiptMismatch {
                dpp_id: self.dpp_id.clone(),
                caller: tx.caller_org.clone(),
                status: self.status.clone(),
            });
        }

        let shipped_with_deviation = matches!(
            self.last_shipment(),
            Some((_, DppStatus::ReleasedWithDeviations))
        );
        let prior_issues = self.has_quality_issues() || shipped_with_deviation;

        self.status = DppStatus::AcceptedBy {
            org: tx.caller_org.clone(),
        };

        let inspection_result = match inspection {
            Some(outcome) => {
                let draft = TestResultDraft::new(inspection_name, outcome.as_str())
                    .set_outcome(outcome.outcome());
                let (result, mandatory) = self.evaluate_draft(tx, draft, site_id)?;
                self.push_test_result(result.clone(), mandatory);
                if outcome == InspectionOutcome::NotOk {
                    self.status = DppStatus::Blocked;
                }
                Some(result)
            }
            None => None,
        };

        let disposition = match inspection {
            _ if self.status == DppStatus::Blocked => Disposition::NonConformant,
            Some(InspectionOutcome::Ok) if prior_issues => Disposition::ConformantWithIssues,
            Some(_) => Disposition::Conformant,
            None => Disposition::InPossession,
        };
        let receiving = PendingEvent::observe(
            BusinessStep::Receiving,
            disposition,
            site_id,
            EventExtension::Receipt { inspection },
        );
        self.append_event(tx, receiving)?;

        if let Some(result) = inspection_result {
            let inspecting = PendingEvent::observe(
                BusinessStep::Inspecting,
                result.evaluation_outcome.disposition(),
                site_id,
                EventExtension::Inspection { result },
            );
            self.append_event(tx, inspecting)?;
        }

        Ok(())
    }
}
