//! Response bodies for the control surface
//!
//! [`StatusView`] is what an operator console renders: the current pipeline
//! phase, whether the provisioning values are usable, the latest
//! per-identifier results and a sanitized error string.

use serde::Serialize;

use crate::assignment::AssignmentResult;
use crate::config::Validation;
use crate::observability::MetricsSnapshot;
use crate::pipeline::Phase;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConfigStatus {
    Loading,
    Valid {
        display_name: String,
        recipient_count: usize,
    },
    Invalid {
        errors: Vec<String>,
    },
}

impl From<&Validation> for ConfigStatus {
    fn from(validation: &Validation) -> Self {
        match validation {
            Validation::Valid(config) => ConfigStatus::Valid {
                display_name: config.display_name().to_string(),
                recipient_count: config.recipient_identifiers().len(),
            },
            Validation::Invalid(errors) => ConfigStatus::Invalid {
                errors: errors.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub phase: Phase,
    pub config: ConfigStatus,
    pub results: Option<Vec<AssignmentResult>>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplyAccepted {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}
