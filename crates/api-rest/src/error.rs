//! Mapping from core errors to HTTP responses.

use api_shared::ErrorRes;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use closeout_core::FormsError;

/// An error as returned by a handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorRes,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &ErrorRes {
        &self.body
    }
}

/// Status code for a core error: bad input is the caller's fault, rejected store credentials
/// are an upstream failure, anything else is ours.
pub fn status_for(error: &FormsError) -> StatusCode {
    match error {
        FormsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        FormsError::Auth { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<FormsError> for ApiError {
    fn from(error: FormsError) -> Self {
        let status = status_for(&error);
        let message = match &error {
            FormsError::InvalidInput(message) => message.clone(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(error = ?error, "request failed");
        } else {
            tracing::warn!(%message, "request rejected");
        }
        Self {
            status,
            body: ErrorRes {
                error: message,
                stage: error.stage().map(|stage| stage.to_string()),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let (status, error) = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            tracing::warn!(error = %rejection, "request body over limit");
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Request body too large: {}", rejection.body_text()),
            )
        } else {
            tracing::warn!(error = %rejection, "malformed request body");
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {}", rejection.body_text()),
            )
        };
        Self {
            status,
            body: ErrorRes { error, stage: None },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
