use std::sync::Arc;
use tokio::sync::RwLock;

use super::models::{ConfigStatus, StatusView};
use crate::assignment::AssignmentResult;
use crate::observability::Metrics;
use crate::pipeline::{AssignmentStatus, ProvisioningOrchestrator};
use crate::scheduler::{CompletedJob, JobOutcome, RunScheduler};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ProvisioningOrchestrator>,
    pub scheduler: Arc<RunScheduler>,
    pub metrics: Arc<Metrics>,
    pub view: Arc<RwLock<ViewState>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<ProvisioningOrchestrator>, scheduler: Arc<RunScheduler>) -> Self {
        Self {
            metrics: Arc::clone(orchestrator.metrics()),
            orchestrator,
            scheduler,
            view: Arc::new(RwLock::new(ViewState::default())),
        }
    }

    /// Current view with any newly finished job folded in
    pub async fn status(&self) -> StatusView {
        let mut view = self.view.write().await;
        view.absorb(self.scheduler.last_completed());
        view.render(&self.orchestrator)
    }
}

/// Operator-facing state that outlives individual runs
#[derive(Debug, Clone)]
pub struct ViewState {
    pub config: ConfigStatus,
    pub results: Option<Vec<AssignmentResult>>,
    pub error: Option<String>,
    seen_sequence: u64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            config: ConfigStatus::Loading,
            results: None,
            error: None,
            seen_sequence: 0,
        }
    }
}

impl ViewState {
    /// Apply a job outcome not seen before; older or repeated ones are ignored
    pub fn absorb(&mut self, job: Option<CompletedJob>) {
        let Some(job) = job else {
            return;
        };
        if job.sequence <= self.seen_sequence {
            return;
        }
        self.seen_sequence = job.sequence;

        match job.outcome {
            JobOutcome::Succeeded { report, .. } => {
                self.results = Some(report.results);
                self.error = None;
            }
            JobOutcome::Failed { error, report, .. } => {
                // Partial assignment is shown through the results alone
                self.error = match &report {
                    Some(report) if report.status() == AssignmentStatus::Partial => None,
                    _ => Some(error),
                };
                self.results = report.map(|report| report.results);
            }
            JobOutcome::Superseded => {}
        }
    }

    pub fn render(&self, orchestrator: &ProvisioningOrchestrator) -> StatusView {
        StatusView {
            phase: orchestrator.phase(),
            config: self.config.clone(),
            results: self.results.clone(),
            error: self.error.clone(),
        }
    }
}
