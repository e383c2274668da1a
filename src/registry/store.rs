//! Staged-write asset store
//!
//! An entry is created pending, written through a sink, then committed. Only
//! committed entries are visible to readers. Bytes go to an `object_store`
//! backend (`pending/<id>` while staged, `assets/<id>` once committed) and the
//! entry index lives in the ledger's `assets` partition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use object_store::buffered::BufWriter;
use object_store::local::LocalFileSystem;
use object_store::{ObjectStore, path::Path as StoragePath};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWrite;
use tracing::{debug, info};

use super::AssetHandle;
use crate::ledger::partitions::encode_asset_key;
use crate::ledger::{Ledger, LedgerError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Asset entry not found: {0}")]
    NotFound(AssetHandle),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Writable destination for asset bytes; must be shut down before commit
pub type AssetSink = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Pending,
    Final,
}

/// Index record for one registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub handle: AssetHandle,
    pub display_name: String,
    pub mime_type: String,
    pub state: EntryState,
    pub size: u64,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub committed_at: Option<DateTime<Utc>>,
}

impl AssetRecord {
    pub fn is_visible(&self) -> bool {
        self.state == EntryState::Final
    }
}

/// Begin / commit / discard lifecycle over some backing store
#[async_trait]
pub trait StagedStore: Send + Sync {
    /// Delete every entry (pending or final) carrying `display_name`
    async fn remove_by_display_name(&self, display_name: &str) -> Result<usize>;

    /// Create a pending entry and open a sink for its bytes
    async fn begin_entry(&self, display_name: &str, mime_type: &str)
    -> Result<(AssetHandle, AssetSink)>;

    /// Make a fully written entry visible
    async fn commit_entry(&self, handle: &AssetHandle) -> Result<()>;

    async fn set_mime_type(&self, handle: &AssetHandle, mime_type: &str) -> Result<()>;

    /// Delete an entry and its bytes; unknown handles are not an error
    async fn discard_entry(&self, handle: &AssetHandle) -> Result<()>;
}

/// Ledger-indexed store writing bytes through `object_store`
#[derive(Clone)]
pub struct LedgerAssetStore {
    ledger: Ledger,
    blobs: Arc<dyn ObjectStore>,
}

impl LedgerAssetStore {
    pub fn new(ledger: Ledger, blobs: Arc<dyn ObjectStore>) -> Self {
        Self { ledger, blobs }
    }

    /// Store bytes under a local directory, creating it if needed
    pub fn open_local(ledger: Ledger, root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let blobs = LocalFileSystem::new_with_prefix(root)?;
        info!(root = %root.display(), "Asset store ready");
        Ok(Self::new(ledger, Arc::new(blobs)))
    }

    /// In-memory bytes for tests and development
    pub fn in_memory(ledger: Ledger) -> Self {
        Self::new(ledger, Arc::new(object_store::memory::InMemory::new()))
    }

    pub fn get(&self, handle: &AssetHandle) -> Result<Option<AssetRecord>> {
        Ok(self
            .ledger
            .get_json(self.ledger.assets(), encode_asset_key(&handle.key()))?)
    }

    /// Committed entry for `handle`, if any
    pub fn get_visible(&self, handle: &AssetHandle) -> Result<Option<AssetRecord>> {
        Ok(self.get(handle)?.filter(AssetRecord::is_visible))
    }

    pub fn all_entries(&self) -> Result<Vec<AssetRecord>> {
        Ok(self.ledger.scan_json(self.ledger.assets())?)
    }

    pub fn visible_entries(&self) -> Result<Vec<AssetRecord>> {
        let mut entries = self.all_entries()?;
        entries.retain(AssetRecord::is_visible);
        Ok(entries)
    }

    /// Read the bytes of a committed entry
    pub async fn read(&self, handle: &AssetHandle) -> Result<Vec<u8>> {
        let record = self
            .get_visible(handle)?
            .ok_or(StoreError::NotFound(*handle))?;
        let bytes = self
            .blobs
            .get(&StoragePath::from(record.location.as_str()))
            .await?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    fn require(&self, handle: &AssetHandle) -> Result<AssetRecord> {
        self.get(handle)?.ok_or(StoreError::NotFound(*handle))
    }

    fn save(&self, record: &AssetRecord) -> Result<()> {
        self.ledger.put_json(
            self.ledger.assets(),
            encode_asset_key(&record.handle.key()),
            record,
        )?;
        Ok(())
    }

    async fn delete_blob(&self, location: &str) -> Result<()> {
        match self.blobs.delete(&StoragePath::from(location)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn pending_location(handle: &AssetHandle) -> String {
    format!("pending/{}", handle.key())
}

fn final_location(handle: &AssetHandle) -> String {
    format!("assets/{}", handle.key())
}

#[async_trait]
impl StagedStore for LedgerAssetStore {
    async fn remove_by_display_name(&self, display_name: &str) -> Result<usize> {
        let matching: Vec<AssetRecord> = self
            .all_entries()?
            .into_iter()
            .filter(|record| record.display_name == display_name)
            .collect();

        for record in &matching {
            self.discard_entry(&record.handle).await?;
        }

        if !matching.is_empty() {
            debug!(display_name, removed = matching.len(), "Removed previous entries");
        }
        Ok(matching.len())
    }

    async fn begin_entry(
        &self,
        display_name: &str,
        mime_type: &str,
    ) -> Result<(AssetHandle, AssetSink)> {
        let handle = AssetHandle::generate();
        let location = pending_location(&handle);

        let record = AssetRecord {
            handle,
            display_name: display_name.to_string(),
            mime_type: mime_type.to_string(),
            state: EntryState::Pending,
            size: 0,
            location: location.clone(),
            created_at: Utc::now(),
            committed_at: None,
        };
        self.save(&record)?;

        let sink = BufWriter::new(Arc::clone(&self.blobs), StoragePath::from(location.as_str()));
        debug!(%handle, display_name, "Pending entry created");
        Ok((handle, Box::new(sink)))
    }

    async fn commit_entry(&self, handle: &AssetHandle) -> Result<()> {
        let mut record = self.require(handle)?;
        if record.is_visible() {
            return Ok(());
        }

        let target = final_location(handle);
        let target_path = StoragePath::from(target.as_str());
        self.blobs
            .rename(&StoragePath::from(record.location.as_str()), &target_path)
            .await?;
        let meta = self.blobs.head(&target_path).await?;

        record.location = target;
        record.size = meta.size as u64;
        record.state = EntryState::Final;
        record.committed_at = Some(Utc::now());
        self.save(&record)?;

        info!(%handle, size = record.size, "Entry committed");
        Ok(())
    }

    async fn set_mime_type(&self, handle: &AssetHandle, mime_type: &str) -> Result<()> {
        let mut record = self.require(handle)?;
        record.mime_type = mime_type.to_string();
        self.save(&record)
    }

    async fn discard_entry(&self, handle: &AssetHandle) -> Result<()> {
        let Some(record) = self.get(handle)? else {
            return Ok(());
        };

        self.delete_blob(&record.location).await?;
        self.ledger
            .remove(self.ledger.assets(), encode_asset_key(&handle.key()))?;
        debug!(%handle, "Entry discarded");
        Ok(())
    }
}
