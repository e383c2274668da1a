use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use super::{
    error::ApiError,
    models::{ApplyAccepted, ConfigStatus, HealthResponse, StatusView},
    state::AppState,
};
use crate::config::Validation;

/// Message shown when an apply is refused for invalid configuration
pub const CONFIG_INVALID_MESSAGE: &str = "Configuration is invalid";

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        metrics: state.metrics.snapshot(),
    })
}

/// Current phase, configuration status and latest results (GET /status)
pub async fn status(State(state): State<AppState>) -> Json<StatusView> {
    Json(state.status().await)
}

/// Re-read the provisioning values (POST /config/refresh)
///
/// Clears the previous results and error, like reopening the console.
pub async fn refresh_config(State(state): State<AppState>) -> Json<StatusView> {
    let validation = state.orchestrator.read_config();

    let mut view = state.view.write().await;
    view.absorb(state.scheduler.last_completed());
    view.config = ConfigStatus::from(&validation);
    view.results = None;
    view.error = None;
    Json(view.render(&state.orchestrator))
}

/// Start a provisioning run (POST /apply)
///
/// The configuration is checked up front so an invalid setup is reported
/// synchronously; the run itself executes on the scheduler.
pub async fn apply(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    if state.scheduler.is_busy().await {
        return Err(ApiError::RunInProgress);
    }

    let validation = state.orchestrator.read_config();
    {
        let mut view = state.view.write().await;
        view.absorb(state.scheduler.last_completed());
        view.config = ConfigStatus::from(&validation);

        if let Validation::Invalid(errors) = validation {
            view.error = Some(CONFIG_INVALID_MESSAGE.to_string());
            return Err(ApiError::ConfigurationInvalid(errors));
        }
        view.results = None;
        view.error = None;
    }

    state.scheduler.trigger().await;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApplyAccepted { status: "accepted" }),
    ))
}

/// Back to idle with results and error cleared (POST /reset)
pub async fn reset(State(state): State<AppState>) -> Result<Json<StatusView>, ApiError> {
    if state.scheduler.is_busy().await {
        return Err(ApiError::RunInProgress);
    }

    let mut view = state.view.write().await;
    view.absorb(state.scheduler.last_completed());
    view.results = None;
    view.error = None;
    state.orchestrator.reset_phase();
    Ok(Json(view.render(&state.orchestrator)))
}

/// Clear the error banner (POST /error/dismiss)
pub async fn dismiss_error(State(state): State<AppState>) -> Json<StatusView> {
    let mut view = state.view.write().await;
    view.absorb(state.scheduler.last_completed());
    view.error = None;
    Json(view.render(&state.orchestrator))
}
