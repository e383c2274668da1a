//! End-to-end provisioning run
//!
//! [`ProvisioningOrchestrator`] reads and validates the configuration, checks
//! free space, prepares a pending registry entry, streams the download into
//! it, finalizes it and then assigns it to every configured identifier with a
//! bounded retry over the identifiers that failed. Any failure after the entry
//! was prepared and before it was finalized cleans the entry up exactly once.
//!
//! The orchestrator holds no cross-run lock; callers serialize runs (see
//! [`crate::scheduler`]).

mod report;
pub mod sanitize;

pub use report::{ALL_ASSIGNMENTS_FAILED, AssignmentStatus, RunReport};
pub use sanitize::{sanitize_error, sanitize_message};

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::assignment::{Assigner, AssignmentResult};
use crate::config::{ConfigSource, ConfigValidator, ProvisioningConfig, Validation};
use crate::download::{AssetFetcher, DownloadError, DownloadOutcome};
use crate::humanize::ByteSize;
use crate::observability::Metrics;
use crate::registry::{AssetHandle, AssetRegistrar, AssetSink, PreparedAsset, RegistryError};

/// Extra assignment rounds after the first one
pub const MAX_ASSIGNMENT_RETRIES: u32 = 3;

/// Type recorded at prepare time, corrected once the response is known
pub const GUESSED_MIME_TYPE: &str = "audio/mpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Downloading,
    Registering,
    Assigning,
    Done,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration is invalid: {}", .0.join("; "))]
    ConfigurationInvalid(Vec<String>),

    #[error(
        "insufficient disk space: {}MB available, need at least {}MB",
        .available.as_mib(),
        .required.as_mib()
    )]
    ResourceExhausted {
        available: ByteSize,
        required: ByteSize,
    },

    #[error("{0}")]
    Transport(#[from] DownloadError),

    #[error("{0}")]
    Registry(RegistryError),

    #[error("ringtone could not be assigned to {failed} of {total} contacts")]
    PartialAssignmentFailure { failed: usize, total: usize },

    #[error("{}", ALL_ASSIGNMENTS_FAILED)]
    TotalAssignmentFailure { total: usize },
}

impl From<RegistryError> for PipelineError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::InsufficientSpace {
                available,
                required,
            } => PipelineError::ResourceExhausted {
                available,
                required,
            },
            other => PipelineError::Registry(other),
        }
    }
}

impl PipelineError {
    /// Whether re-running the whole pipeline later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::ResourceExhausted { .. }
                | PipelineError::Transport(_)
                | PipelineError::Registry(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Transport(DownloadError::Cancelled))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

pub struct ProvisioningOrchestrator {
    source: Arc<dyn ConfigSource>,
    validator: ConfigValidator,
    fetcher: Arc<dyn AssetFetcher>,
    registrar: Arc<AssetRegistrar>,
    assigner: Arc<dyn Assigner>,
    phase: watch::Sender<Phase>,
    metrics: Arc<Metrics>,
}

impl ProvisioningOrchestrator {
    pub fn new(
        source: Arc<dyn ConfigSource>,
        validator: ConfigValidator,
        fetcher: Arc<dyn AssetFetcher>,
        registrar: Arc<AssetRegistrar>,
        assigner: Arc<dyn Assigner>,
    ) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            source,
            validator,
            fetcher,
            registrar,
            assigner,
            phase,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Return to `Idle` after the outcome of a run has been acknowledged
    pub fn reset_phase(&self) {
        self.set_phase(Phase::Idle);
    }

    /// Read the configuration source fresh and validate it
    pub fn read_config(&self) -> Validation {
        match self.source.read() {
            Ok(raw) => self.validator.validate_raw(&raw),
            Err(e) => Validation::Invalid(vec![format!("configuration could not be read: {e}")]),
        }
    }

    /// Execute one provisioning run
    ///
    /// `cancel` is only observed while the download is streaming. A returned
    /// report means the ringtone was registered; inspect
    /// [`RunReport::status`] for the assignment outcome.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport> {
        self.metrics.run_started();

        match self.execute(cancel).await {
            Ok(report) => {
                self.metrics
                    .assignments(report.succeeded() as u64, report.failed() as u64);
                if report.status() == AssignmentStatus::Complete {
                    self.metrics.run_succeeded();
                } else {
                    self.metrics.run_failed();
                }
                self.set_phase(Phase::Done);
                Ok(report)
            }
            Err(e) => {
                self.metrics.run_failed();
                self.set_phase(Phase::Idle);
                Err(e)
            }
        }
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<RunReport> {
        let config = match self.read_config() {
            Validation::Valid(config) => config,
            Validation::Invalid(errors) => {
                warn!(errors = errors.len(), "Configuration invalid, run skipped");
                return Err(PipelineError::ConfigurationInvalid(errors));
            }
        };

        self.set_phase(Phase::Downloading);
        self.registrar.check_available_space()?;

        let PreparedAsset { handle, sink } = self
            .registrar
            .prepare(config.display_name(), GUESSED_MIME_TYPE)
            .await?;

        let outcome = match self.download_and_register(&config, &handle, sink, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%handle, error = %e, "Ringtone provisioning failed");
                self.registrar.cleanup(&handle).await;
                return Err(e);
            }
        };

        self.set_phase(Phase::Assigning);
        let (results, rounds) = self
            .assign_with_retry(config.recipient_identifiers(), &handle)
            .await;

        let report = RunReport {
            handle,
            outcome,
            results,
            rounds,
        };
        info!(
            %handle,
            succeeded = report.succeeded(),
            failed = report.failed(),
            rounds,
            "Provisioning run finished"
        );
        Ok(report)
    }

    async fn download_and_register(
        &self,
        config: &ProvisioningConfig,
        handle: &AssetHandle,
        mut sink: AssetSink,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome> {
        let outcome = self
            .fetcher
            .fetch(config.source_url(), &mut *sink, cancel)
            .await?;
        sink.shutdown().await.map_err(RegistryError::Sink)?;
        drop(sink);

        self.set_phase(Phase::Registering);
        self.registrar.finalize(handle).await?;
        self.registrar
            .update_mime_type(handle, &outcome.content_type)
            .await?;

        self.metrics.bytes_downloaded(outcome.bytes_written);
        info!(
            %handle,
            bytes = outcome.bytes_written,
            content_type = %outcome.content_type,
            "Ringtone registered"
        );
        Ok(outcome)
    }

    /// First round over everything, then up to [`MAX_ASSIGNMENT_RETRIES`]
    /// rounds over the positions whose latest result failed
    async fn assign_with_retry(
        &self,
        identifiers: &[String],
        handle: &AssetHandle,
    ) -> (Vec<AssignmentResult>, u32) {
        let mut latest = self.assigner.assign(identifiers, handle).await;
        let mut rounds = 1;

        for retry in 1..=MAX_ASSIGNMENT_RETRIES {
            let failing: Vec<usize> = latest
                .iter()
                .enumerate()
                .filter(|(_, result)| !result.success)
                .map(|(index, _)| index)
                .collect();
            if failing.is_empty() {
                break;
            }

            let retry_identifiers: Vec<String> = failing
                .iter()
                .map(|&index| latest[index].identifier.clone())
                .collect();
            info!(retry, remaining = failing.len(), "Retrying failed assignments");

            let retried = self.assigner.assign(&retry_identifiers, handle).await;
            for (index, result) in failing.into_iter().zip(retried) {
                latest[index] = result;
            }
            rounds += 1;
        }

        (latest, rounds)
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.send_replace(phase);
    }
}
