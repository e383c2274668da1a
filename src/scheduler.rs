//! Background execution of provisioning runs
//!
//! A single worker task owns the orchestrator. Triggers follow a
//! unique-work-with-replacement policy: at most one run is queued, and a
//! trigger that arrives while a run executes cancels that run and queues a
//! fresh one. Cancellation is cooperative, so a run already past its download
//! finishes normally before the replacement starts. Two runs never overlap.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::pipeline::{PipelineError, ProvisioningOrchestrator, RunReport};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler worker panicked: {0}")]
    WorkerPanicked(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: Duration::from_secs(config.backoff_secs),
        }
    }

    /// Linear backoff after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

/// How a triggered job ended
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded {
        attempts: u32,
        report: RunReport,
    },
    Failed {
        attempts: u32,
        error: String,
        report: Option<RunReport>,
    },
    Superseded,
}

impl JobOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            JobOutcome::Succeeded { report, .. } => Some(report),
            JobOutcome::Failed { report, .. } => report.as_ref(),
            JobOutcome::Superseded => None,
        }
    }
}

/// A finished job, numbered in completion order starting at 1
#[derive(Debug, Clone, Serialize)]
pub struct CompletedJob {
    pub sequence: u64,
    pub outcome: JobOutcome,
}

/// What a trigger did to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Queued,
    /// A run was already queued and absorbed this trigger
    Coalesced,
    /// The executing run was cancelled and a replacement queued
    Replacing,
}

#[derive(Default)]
struct QueueState {
    queued: bool,
    running: Option<CancellationToken>,
    completed: u64,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    shutdown: CancellationToken,
    completed: watch::Sender<Option<CompletedJob>>,
}

impl Shared {
    fn new() -> Self {
        let (completed, _) = watch::channel(None);
        Self {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            completed,
        }
    }
}

pub struct RunScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RunScheduler {
    pub fn spawn(orchestrator: Arc<ProvisioningOrchestrator>, policy: RetryPolicy) -> Self {
        let shared = Arc::new(Shared::new());

        let worker = tokio::spawn(worker_loop(Arc::clone(&shared), orchestrator, policy));
        info!(
            max_attempts = policy.max_attempts,
            backoff_secs = policy.backoff.as_secs(),
            "Run scheduler started"
        );

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Request a run, replacing whatever is pending or executing
    pub async fn trigger(&self) -> TriggerOutcome {
        let mut state = self.shared.state.lock().await;

        let outcome = if let Some(running) = &state.running {
            if state.queued {
                TriggerOutcome::Coalesced
            } else {
                running.cancel();
                TriggerOutcome::Replacing
            }
        } else if state.queued {
            TriggerOutcome::Coalesced
        } else {
            TriggerOutcome::Queued
        };
        state.queued = true;
        drop(state);

        self.shared.wake.notify_one();
        info!(?outcome, "Provisioning run triggered");
        outcome
    }

    /// True while a run is queued or executing
    pub async fn is_busy(&self) -> bool {
        let state = self.shared.state.lock().await;
        state.queued || state.running.is_some()
    }

    pub fn last_completed(&self) -> Option<CompletedJob> {
        self.shared.completed.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CompletedJob>> {
        self.shared.completed.subscribe()
    }

    /// Stop accepting work, cancel any executing run and wait for the worker
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.shared.shutdown.cancel();
        if let Some(running) = &self.shared.state.lock().await.running {
            running.cancel();
        }

        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            worker.await?;
            info!("Run scheduler stopped");
        }
        Ok(())
    }
}

async fn worker_loop(
    shared: Arc<Shared>,
    orchestrator: Arc<ProvisioningOrchestrator>,
    policy: RetryPolicy,
) {
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = shared.wake.notified() => {}
        }

        loop {
            let token = {
                let mut state = shared.state.lock().await;
                if !state.queued || shared.shutdown.is_cancelled() {
                    break;
                }
                state.queued = false;
                let token = CancellationToken::new();
                state.running = Some(token.clone());
                token
            };

            let outcome = run_job(&orchestrator, &policy, &token).await;

            let mut state = shared.state.lock().await;
            state.running = None;
            state.completed += 1;
            // An idle queue always has its outcome published
            shared.completed.send_replace(Some(CompletedJob {
                sequence: state.completed,
                outcome,
            }));
            drop(state);
        }
    }
}

async fn run_job(
    orchestrator: &ProvisioningOrchestrator,
    policy: &RetryPolicy,
    token: &CancellationToken,
) -> JobOutcome {
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match orchestrator.run(token).await {
            Ok(report) => return finished(attempt, report),
            Err(e) if e.is_cancelled() || token.is_cancelled() => {
                info!(attempt, "Run superseded by a newer trigger");
                return JobOutcome::Superseded;
            }
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= policy.max_attempts {
            error!(attempt, error = %error, "Provisioning job failed");
            return failed(attempt, &error, None);
        }

        let delay = policy.delay_after(attempt);
        warn!(attempt, delay_secs = delay.as_secs(), error = %error, "Provisioning run failed, retrying");
        tokio::select! {
            _ = token.cancelled() => return JobOutcome::Superseded,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn finished(attempts: u32, report: RunReport) -> JobOutcome {
    match report.clone().into_result() {
        Ok(report) => {
            info!(attempts, "Provisioning job succeeded");
            JobOutcome::Succeeded { attempts, report }
        }
        Err(e) => {
            // Assignment failures are reported, not retried
            warn!(attempts, error = %e, "Provisioning job finished with assignment failures");
            failed(attempts, &e, Some(report))
        }
    }
}

fn failed(attempts: u32, error: &PipelineError, report: Option<RunReport>) -> JobOutcome {
    JobOutcome::Failed {
        attempts,
        error: crate::pipeline::sanitize_error(error),
        report,
    }
}
