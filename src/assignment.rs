//! Attach a registered ringtone to directory contacts
//!
//! Identifiers are processed sequentially and in order. Every identifier gets
//! exactly one [`AssignmentResult`]; no failure for one identifier stops the
//! others.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::directory::ContactDirectory;
use crate::registry::AssetHandle;

pub const CONTACT_NOT_FOUND: &str = "Contact not found";
pub const UPDATE_FAILED: &str = "Failed to update contact";

/// Outcome for one identifier in one assignment round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub identifier: String,
    pub success: bool,
    pub resolved_name: Option<String>,
    pub error: Option<String>,
}

impl AssignmentResult {
    pub fn succeeded(identifier: &str, resolved_name: Option<String>) -> Self {
        Self {
            identifier: identifier.to_string(),
            success: true,
            resolved_name,
            error: None,
        }
    }

    pub fn failed(identifier: &str, resolved_name: Option<String>, error: impl Into<String>) -> Self {
        Self {
            identifier: identifier.to_string(),
            success: false,
            resolved_name,
            error: Some(error.into()),
        }
    }
}

/// One assignment round over an ordered identifier list
#[async_trait]
pub trait Assigner: Send + Sync {
    /// One result per identifier, in input order
    async fn assign(&self, identifiers: &[String], asset: &AssetHandle) -> Vec<AssignmentResult>;
}

pub struct AssignmentEngine {
    directory: Arc<dyn ContactDirectory>,
}

impl AssignmentEngine {
    pub fn new(directory: Arc<dyn ContactDirectory>) -> Self {
        Self { directory }
    }

    async fn assign_one(&self, identifier: &str, asset: &AssetHandle) -> AssignmentResult {
        let entity = match self.directory.lookup_by_identifier(identifier).await {
            Ok(Some(entity)) => entity,
            Ok(None) => return AssignmentResult::failed(identifier, None, CONTACT_NOT_FOUND),
            Err(e) => return AssignmentResult::failed(identifier, None, e.to_string()),
        };

        match self.directory.update_reference(&entity.id, asset).await {
            Ok(true) => AssignmentResult::succeeded(identifier, entity.display_name),
            Ok(false) => AssignmentResult::failed(identifier, entity.display_name, UPDATE_FAILED),
            Err(e) => AssignmentResult::failed(identifier, entity.display_name, e.to_string()),
        }
    }
}

#[async_trait]
impl Assigner for AssignmentEngine {
    async fn assign(&self, identifiers: &[String], asset: &AssetHandle) -> Vec<AssignmentResult> {
        let mut results = Vec::with_capacity(identifiers.len());

        for identifier in identifiers {
            let result = self.assign_one(identifier, asset).await;
            if result.success {
                debug!(%identifier, "Ringtone assigned");
            } else {
                warn!(
                    %identifier,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Ringtone assignment failed"
                );
            }
            results.push(result);
        }

        results
    }
}
