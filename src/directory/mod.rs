//! Contact directory
//!
//! The assignment step only needs two capabilities from a directory: find the
//! entity that owns a phone number, and overwrite that entity's custom
//! ringtone reference. [`ContactDirectory`] captures exactly that so the
//! backend can be the local ledger or an in-process map.

mod ledger;
mod memory;

pub use ledger::LedgerDirectory;
pub use memory::MemoryDirectory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::registry::AssetHandle;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Directory index is inconsistent: {0}")]
    Inconsistent(String),

    #[error("Invalid contact: {0}")]
    InvalidContact(String),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Stored contact record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub display_name: String,
    pub phone_numbers: Vec<String>,
    #[serde(default)]
    pub custom_ringtone: Option<String>,
}

impl Contact {
    pub fn new(display_name: impl Into<String>, phone_numbers: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            display_name: display_name.into(),
            phone_numbers,
            custom_ringtone: None,
        }
    }
}

/// Match returned by a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntity {
    pub id: String,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Entity owning `identifier`, if any
    async fn lookup_by_identifier(&self, identifier: &str) -> Result<Option<DirectoryEntity>>;

    /// Point the entity's custom ringtone at `reference`
    ///
    /// Returns `false` when no entity was updated. The whole record is
    /// rewritten; concurrent external edits are not merged.
    async fn update_reference(&self, entity_id: &str, reference: &AssetHandle) -> Result<bool>;
}

/// Canonical form used for phone lookups: `+` and digits only
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        normalized.push('+');
    }
    normalized.extend(trimmed.chars().filter(char::is_ascii_digit));
    normalized
}
