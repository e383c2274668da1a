use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("configuration is invalid: {}", .0.join("; "))]
    ConfigurationInvalid(Vec<String>),
    #[error("a provisioning run is already in progress")]
    RunInProgress,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ConfigurationInvalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RunInProgress => StatusCode::CONFLICT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ConfigurationInvalid(_) => "CONFIGURATION_INVALID",
            ApiError::RunInProgress => "RUN_IN_PROGRESS",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: crate::pipeline::sanitize_message(&self.to_string()),
        };

        (status, Json(body)).into_response()
    }
}
