use serde::Serialize;

use super::PipelineError;
use crate::assignment::AssignmentResult;
use crate::download::DownloadOutcome;
use crate::registry::AssetHandle;

/// Shown when the ringtone is registered but reached no contact
pub const ALL_ASSIGNMENTS_FAILED: &str =
    "Ringtone registered but could not be assigned to any contacts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Complete,
    Partial,
    Failed,
}

/// Everything a finished run produced
///
/// Registration succeeded whenever a report exists; `results` holds the
/// latest result per configured identifier, in configuration order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub handle: AssetHandle,
    pub outcome: DownloadOutcome,
    pub results: Vec<AssignmentResult>,
    pub rounds: u32,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn status(&self) -> AssignmentStatus {
        match (self.succeeded(), self.failed()) {
            (_, 0) => AssignmentStatus::Complete,
            (0, _) => AssignmentStatus::Failed,
            _ => AssignmentStatus::Partial,
        }
    }

    /// Operator-facing message for a run that reached no contact
    pub fn summary_error(&self) -> Option<&'static str> {
        (self.status() == AssignmentStatus::Failed).then_some(ALL_ASSIGNMENTS_FAILED)
    }

    /// Collapse to an error unless every identifier succeeded
    pub fn into_result(self) -> Result<Self, PipelineError> {
        match self.status() {
            AssignmentStatus::Complete => Ok(self),
            AssignmentStatus::Partial => Err(PipelineError::PartialAssignmentFailure {
                failed: self.failed(),
                total: self.results.len(),
            }),
            AssignmentStatus::Failed => Err(PipelineError::TotalAssignmentFailure {
                total: self.results.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: &[bool]) -> RunReport {
        RunReport {
            handle: AssetHandle::generate(),
            outcome: DownloadOutcome {
                content_type: "audio/mpeg".to_string(),
                bytes_written: 1,
            },
            results: outcomes
                .iter()
                .enumerate()
                .map(|(i, ok)| {
                    let id = format!("+1415555000{i}");
                    if *ok {
                        AssignmentResult::succeeded(&id, None)
                    } else {
                        AssignmentResult::failed(&id, None, "Contact not found")
                    }
                })
                .collect(),
            rounds: 1,
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(report(&[true, true]).status(), AssignmentStatus::Complete);
        assert_eq!(report(&[true, false]).status(), AssignmentStatus::Partial);
        assert_eq!(report(&[false, false]).status(), AssignmentStatus::Failed);
    }

    #[test]
    fn test_summary_error_only_when_all_failed() {
        assert_eq!(
            report(&[false]).summary_error(),
            Some(ALL_ASSIGNMENTS_FAILED)
        );
        assert_eq!(report(&[true, false]).summary_error(), None);
    }

    #[test]
    fn test_into_result_distinguishes_outcomes() {
        assert!(report(&[true]).into_result().is_ok());
        assert!(matches!(
            report(&[true, false, false]).into_result(),
            Err(PipelineError::PartialAssignmentFailure { failed: 2, total: 3 })
        ));
        assert!(matches!(
            report(&[false, false]).into_result(),
            Err(PipelineError::TotalAssignmentFailure { total: 2 })
        ));
    }
}
