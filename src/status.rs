//! Status derivation for passports
use super::evaluation::Outcome;
use super::passport::{Dpp, DppStatus};
use super::quality::AlarmSummary;

impl DppStatus {
    /// Frozen statuses are never recomputed from quality or transport data.
    pub fn is_frozen(&self) -> bool {
        matches!(
            self,
            Self::Blocked
                | Self::InTransitTo { .. }
                | Self::AcceptedBy { .. }
                | Self::DeletedByTransform { .. }
        )
    }

    pub fn is_released(&self) -> bool {
        matches!(self, Self::Released | Self::ReleasedWithDeviations)
    }

    /// Whether `caller` may consume a passport in this status as a transform input.
    pub fn is_transform_eligible(&self, caller: &str) -> bool {
        match self {
            Self::AcceptedBy { org } => org == caller,
            other => other.is_released(),
        }
    }
}

/// Derives the status a passport's quality and transport data imply.
///
/// Frozen statuses are returned untouched. Otherwise any FAILED result
/// blocks; open mandatory checks hold the passport in `WaitingForChecks`;
/// a missing standard or an alarmed transport log releases with deviations.
pub fn derive_status(dpp: &Dpp) -> DppStatus {
    if dpp.status.is_frozen() {
        return dpp.status.clone();
    }

    let mut has_deviation = false;
    for entry in &dpp.quality_history {
        match entry.evaluation_outcome {
            Outcome::Failed => return DppStatus::Blocked,
            Outcome::InfoNoStandard => has_deviation = true,
            Outcome::Passed => {}
        }
    }
    if dpp
        .transport_logs
        .iter()
        .any(|log| log.alarm_summary == AlarmSummary::Yes)
    {
        has_deviation = true;
    }

    if !dpp.open_mandatory_checks.is_empty() {
        return DppStatus::WaitingForChecks {
            open: dpp.open_mandatory_checks.len(),
        };
    }
    if has_deviation {
        DppStatus::ReleasedWithDeviations
    } else {
        DppStatus::Released
    }
}

impl Dpp {
    pub(crate) fn refresh_status(&mut self) {
        let next = derive_status(self);
        if next != self.status {
            tracing::debug!(
                dpp_id = %self.dpp_id,
                from = %self.status,
                to = %next,
                "status recomputed"
            );
            self.status = next;
        }
    }

    /// True when any quality entry is not PASSED or any transport log alarmed.
    pub fn has_quality_issues(&self) -> bool {
        self.quality_history
            .iter()
            .any(|entry| entry.evaluation_outcome != Outcome::Passed)
            || self
                .transport_logs
                .iter()
                .any(|log| log.alarm_summary == AlarmSummary::Yes)
    }
}
