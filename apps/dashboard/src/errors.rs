use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::backend_client::BackendError;
use crate::inspection::options::ToggleRejected;
use crate::inspection::InspectionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rejected: {0}")]
    Rejected(#[from] ToggleRejected),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "UPLOAD_TOO_LARGE", msg.clone())
            }
            AppError::Rejected(rejection) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "OPTIONS_REJECTED",
                rejection.to_string(),
            ),
            AppError::Backend(err) => return backend_error_response(err),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// Maps the backend failure taxonomy onto HTTP. The body carries the flat
/// `{message, stage?}` shape under `error`.
fn backend_error_response(err: &BackendError) -> Response {
    let flat = InspectionError::from(err);
    let (status, code) = match err {
        BackendError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "AUTH_REQUIRED"),
        BackendError::SessionExpired => (StatusCode::UNAUTHORIZED, "SESSION_EXPIRED"),
        BackendError::Login(_) => (StatusCode::UNAUTHORIZED, "LOGIN_FAILED"),
        BackendError::Processing { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "PROCESSING_FAILED"),
        BackendError::Http(_) | BackendError::Api { .. } | BackendError::Parse(_) => {
            tracing::error!("Backend error: {err}");
            (StatusCode::BAD_GATEWAY, "BACKEND_ERROR")
        }
    };

    let mut error = json!({
        "code": code,
        "message": flat.message,
    });
    if let Some(stage) = flat.stage {
        error["stage"] = json!(stage);
    }
    if matches!(err, BackendError::SessionExpired) {
        error["redirect"] = json!("/");
    }

    (status, Json(json!({ "error": error }))).into_response()
}
