//! Sign-in, sign-out and session status for the dashboard operator.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::models::teacher::Teacher;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub teacher: Option<Teacher>,
}

/// GET /api/v1/session
pub async fn handle_get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let authenticated = state.session.is_authenticated(Utc::now());
    Json(SessionResponse {
        authenticated,
        teacher: authenticated.then(|| state.session.teacher()).flatten(),
    })
}

/// POST /api/v1/session/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }
    let teacher = state
        .backend
        .login(request.email.trim(), &request.password)
        .await?;
    Ok(Json(SessionResponse {
        authenticated: true,
        teacher: Some(teacher),
    }))
}

/// POST /api/v1/session/logout
pub async fn handle_logout(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.session.clear()?;
    info!("Signed out");
    Ok(StatusCode::NO_CONTENT)
}
