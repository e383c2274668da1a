//! Construction of the provisioning stack from application settings

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::assignment::AssignmentEngine;
use crate::config::{Config, FileConfigSource};
use crate::directory::LedgerDirectory;
use crate::download::{AssetDownloader, DownloadError};
use crate::ledger::{Ledger, LedgerError};
use crate::observability::Metrics;
use crate::pipeline::ProvisioningOrchestrator;
use crate::registry::{AssetRegistrar, LedgerAssetStore, StoreError, VolumeSpaceProbe};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to open ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Failed to open asset store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to build download client: {0}")]
    Transport(#[from] DownloadError),
}

/// Everything a command needs, wired over one ledger
pub struct Runtime {
    pub config: Config,
    pub config_path: PathBuf,
    pub ledger: Ledger,
    pub assets: LedgerAssetStore,
    pub directory: LedgerDirectory,
    pub orchestrator: Arc<ProvisioningOrchestrator>,
    pub metrics: Arc<Metrics>,
}

impl Runtime {
    /// Open storage under the configured paths and assemble the orchestrator
    ///
    /// Provisioning values are re-read from `config_path` on every run.
    pub fn build(config: Config, config_path: &Path) -> Result<Self, RuntimeError> {
        let ledger = Ledger::open(&config.storage.ledger_path)?;
        let assets = LedgerAssetStore::open_local(ledger.clone(), &config.storage.asset_root)?;
        let directory = LedgerDirectory::new(ledger.clone());
        let metrics = Arc::new(Metrics::new());

        let registrar = AssetRegistrar::new(
            Arc::new(assets.clone()),
            Arc::new(VolumeSpaceProbe::new(&config.storage.asset_root)),
            config.storage.min_free_space,
        );
        let orchestrator = ProvisioningOrchestrator::new(
            Arc::new(FileConfigSource::new(config_path)),
            config.validator(),
            Arc::new(AssetDownloader::from_config(&config.download)?),
            Arc::new(registrar),
            Arc::new(AssignmentEngine::new(Arc::new(directory.clone()))),
        )
        .with_metrics(Arc::clone(&metrics));

        info!(
            ledger = %config.storage.ledger_path.display(),
            assets = %config.storage.asset_root.display(),
            "Provisioning runtime ready"
        );

        Ok(Self {
            config,
            config_path: config_path.to_path_buf(),
            ledger,
            assets,
            directory,
            orchestrator: Arc::new(orchestrator),
            metrics,
        })
    }
}
