//! Ringtone registry
//!
//! [`AssetRegistrar`] owns the lifecycle of one registry entry: a pending
//! entry is prepared (after clearing any previous entry with the same display
//! name), bytes are written through its sink, and the entry is finalized or
//! cleaned up. Finalized entries are addressed by an [`AssetHandle`].

pub mod space;
pub mod store;

pub use space::{SpaceProbe, VolumeSpaceProbe};
pub use store::{AssetRecord, AssetSink, EntryState, LedgerAssetStore, StagedStore, StoreError};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::humanize::ByteSize;

const HANDLE_SCHEME: &str = "tonebox://assets/";

/// Stable reference to a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetHandle(Uuid);

impl AssetHandle {
    /// New time-ordered handle
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }

    /// Key used by the ledger and blob paths
    pub fn key(&self) -> String {
        self.0.to_string()
    }

    /// Opaque URI stored on contacts
    pub fn uri(&self) -> String {
        self.to_string()
    }

    /// Parse a handle rendered by [`AssetHandle::uri`]
    pub fn parse_uri(uri: &str) -> Option<Self> {
        uri.strip_prefix(HANDLE_SCHEME)
            .and_then(|id| Uuid::parse_str(id).ok())
            .map(Self)
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{HANDLE_SCHEME}{}", self.0)
    }
}

/// Handle and writable sink for an entry that is not yet visible
pub struct PreparedAsset {
    pub handle: AssetHandle,
    pub sink: AssetSink,
}

impl fmt::Debug for PreparedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedAsset")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(
        "insufficient disk space: {}MB available, need at least {}MB",
        .available.as_mib(),
        .required.as_mib()
    )]
    InsufficientSpace {
        available: ByteSize,
        required: ByteSize,
    },

    #[error("failed to query free disk space: {0}")]
    SpaceCheck(#[source] std::io::Error),

    #[error("registry store failure: {0}")]
    Store(#[from] StoreError),

    #[error("failed to close ringtone entry: {0}")]
    Sink(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry-side steps of a provisioning run
pub struct AssetRegistrar {
    store: Arc<dyn StagedStore>,
    space: Arc<dyn SpaceProbe>,
    min_free_space: ByteSize,
}

impl AssetRegistrar {
    pub fn new(
        store: Arc<dyn StagedStore>,
        space: Arc<dyn SpaceProbe>,
        min_free_space: ByteSize,
    ) -> Self {
        Self {
            store,
            space,
            min_free_space,
        }
    }

    pub fn min_free_space(&self) -> ByteSize {
        self.min_free_space
    }

    /// Fail unless the asset volume has at least the configured free space
    pub fn check_available_space(&self) -> Result<()> {
        let available = ByteSize(
            self.space
                .available_bytes()
                .map_err(RegistryError::SpaceCheck)?,
        );

        if available < self.min_free_space {
            warn!(
                available_mb = available.as_mib(),
                required_mb = self.min_free_space.as_mib(),
                "Not enough free space for a new ringtone"
            );
            return Err(RegistryError::InsufficientSpace {
                available,
                required: self.min_free_space,
            });
        }

        debug!(available_mb = available.as_mib(), "Free space check passed");
        Ok(())
    }

    /// Remove entries named `display_name`, then create a pending one
    pub async fn prepare(&self, display_name: &str, mime_type: &str) -> Result<PreparedAsset> {
        let removed = self.store.remove_by_display_name(display_name).await?;
        if removed > 0 {
            info!(display_name, removed, "Replaced previous ringtone entries");
        }

        let (handle, sink) = self.store.begin_entry(display_name, mime_type).await?;
        info!(%handle, display_name, "Prepared ringtone entry");
        Ok(PreparedAsset { handle, sink })
    }

    pub async fn update_mime_type(&self, handle: &AssetHandle, mime_type: &str) -> Result<()> {
        self.store.set_mime_type(handle, mime_type).await?;
        debug!(%handle, mime_type, "Recorded content type");
        Ok(())
    }

    /// Make the entry visible; the sink must already be closed
    pub async fn finalize(&self, handle: &AssetHandle) -> Result<()> {
        self.store.commit_entry(handle).await?;
        info!(%handle, "Ringtone entry finalized");
        Ok(())
    }

    /// Best-effort removal of an entry; failures are logged, never raised
    pub async fn cleanup(&self, handle: &AssetHandle) {
        match self.store.discard_entry(handle).await {
            Ok(()) => info!(%handle, "Cleaned up ringtone entry"),
            Err(e) => warn!(%handle, error = %e, "Failed to clean up ringtone entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use std::io;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    struct FixedSpace(io::Result<u64>);

    impl SpaceProbe for FixedSpace {
        fn available_bytes(&self) -> io::Result<u64> {
            match &self.0 {
                Ok(n) => Ok(*n),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    fn create_registrar(free: u64) -> (AssetRegistrar, LedgerAssetStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let ledger = Ledger::open(temp_dir.path().join("ledger")).unwrap();
        let store = LedgerAssetStore::in_memory(ledger);
        let registrar = AssetRegistrar::new(
            Arc::new(store.clone()),
            Arc::new(FixedSpace(Ok(free))),
            ByteSize::mib(50),
        );
        (registrar, store, temp_dir)
    }

    #[test]
    fn test_handle_uri_roundtrip() {
        let handle = AssetHandle::generate();
        let uri = handle.uri();
        assert!(uri.starts_with("tonebox://assets/"));
        assert_eq!(AssetHandle::parse_uri(&uri), Some(handle));
        assert_eq!(AssetHandle::parse_uri("content://media/1"), None);
    }

    #[test]
    fn test_space_check_boundaries() {
        let (exact, _, _t1) = create_registrar(ByteSize::mib(50).as_u64());
        assert!(exact.check_available_space().is_ok());

        let (short, _, _t2) = create_registrar(ByteSize::mib(12).as_u64());
        let err = short.check_available_space().unwrap_err();
        assert_eq!(
            err.to_string(),
            "insufficient disk space: 12MB available, need at least 50MB"
        );
    }

    #[test]
    fn test_space_probe_failure() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = Ledger::open(temp_dir.path().join("ledger")).unwrap();
        let registrar = AssetRegistrar::new(
            Arc::new(LedgerAssetStore::in_memory(ledger)),
            Arc::new(FixedSpace(Err(io::Error::other("statvfs failed")))),
            ByteSize::mib(50),
        );
        assert!(matches!(
            registrar.check_available_space(),
            Err(RegistryError::SpaceCheck(_))
        ));
    }

    #[tokio::test]
    async fn test_prepare_finalize_lifecycle() {
        let (registrar, store, _temp) = create_registrar(u64::MAX);

        let mut prepared = registrar.prepare("Brand", "audio/mpeg").await.unwrap();
        prepared.sink.write_all(b"tone").await.unwrap();
        prepared.sink.shutdown().await.unwrap();
        assert!(store.get_visible(&prepared.handle).unwrap().is_none());

        registrar.finalize(&prepared.handle).await.unwrap();
        registrar
            .update_mime_type(&prepared.handle, "audio/ogg")
            .await
            .unwrap();

        let record = store.get_visible(&prepared.handle).unwrap().unwrap();
        assert_eq!(record.display_name, "Brand");
        assert_eq!(record.mime_type, "audio/ogg");
    }

    #[tokio::test]
    async fn test_prepare_replaces_same_display_name() {
        let (registrar, store, _temp) = create_registrar(u64::MAX);

        let mut first = registrar.prepare("Brand", "audio/mpeg").await.unwrap();
        first.sink.shutdown().await.unwrap();
        registrar.finalize(&first.handle).await.unwrap();

        let second = registrar.prepare("Brand", "audio/mpeg").await.unwrap();
        assert_ne!(first.handle, second.handle);
        assert!(store.get(&first.handle).unwrap().is_none());
        assert_eq!(store.all_entries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_never_fails() {
        let (registrar, store, _temp) = create_registrar(u64::MAX);
        let prepared = registrar.prepare("Brand", "audio/mpeg").await.unwrap();
        drop(prepared.sink);

        registrar.cleanup(&prepared.handle).await;
        registrar.cleanup(&prepared.handle).await;
        assert!(store.all_entries().unwrap().is_empty());
    }
}
