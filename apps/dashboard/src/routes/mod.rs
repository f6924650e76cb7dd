pub mod health;
pub mod session;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::inspection::handlers as inspection;
use crate::prompts::handlers as prompts;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/health", get(health::health_handler))
        // Session
        .route("/api/v1/session", get(session::handle_get_session))
        .route("/api/v1/session/login", post(session::handle_login))
        .route("/api/v1/session/logout", post(session::handle_logout))
        // System prompts
        .route("/api/v1/prompts", get(prompts::handle_list_prompts))
        .route(
            "/api/v1/prompts/:id",
            get(prompts::handle_get_prompt).put(prompts::handle_update_prompt),
        )
        // Curriculum extraction inspector
        .route(
            "/api/v1/curriculum/options",
            get(inspection::handle_get_options),
        )
        .route(
            "/api/v1/curriculum/options/toggle",
            post(inspection::handle_toggle_option),
        )
        .route(
            "/api/v1/curriculum/inspect",
            post(inspection::handle_inspect).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}
