//! Axum route handlers for the system prompt editor.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::models::prompt::{SystemPrompt, SystemPromptId};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PromptSummary {
    #[serde(flatten)]
    pub prompt: SystemPrompt,
    /// Catalogue name, or `None` for ids this dashboard does not know.
    pub display_name: Option<&'static str>,
}

impl From<SystemPrompt> for PromptSummary {
    fn from(prompt: SystemPrompt) -> Self {
        Self {
            display_name: SystemPromptId::from_id(prompt.id).map(SystemPromptId::display_name),
            prompt,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePromptRequest {
    pub content: String,
}

/// Unknown ids are rejected before any backend call.
fn known_prompt(id: u32) -> Result<SystemPromptId, AppError> {
    SystemPromptId::from_id(id).ok_or_else(|| AppError::NotFound("Invalid prompt ID".to_string()))
}

/// GET /api/v1/prompts
pub async fn handle_list_prompts(
    State(state): State<AppState>,
) -> Result<Json<Vec<PromptSummary>>, AppError> {
    let prompts = state.backend.list_prompts().await?;
    Ok(Json(prompts.into_iter().map(PromptSummary::from).collect()))
}

/// GET /api/v1/prompts/:id
pub async fn handle_get_prompt(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<PromptSummary>, AppError> {
    known_prompt(id)?;
    let prompt = state.backend.get_prompt(id).await?;
    Ok(Json(prompt.into()))
}

/// PUT /api/v1/prompts/:id
///
/// Saves the content exactly as sent; whitespace is significant.
pub async fn handle_update_prompt(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<UpdatePromptRequest>,
) -> Result<Json<PromptSummary>, AppError> {
    let known = known_prompt(id)?;
    let prompt = state.backend.update_prompt(id, &request.content).await?;
    info!(
        "Saved prompt {} ({} chars, {} lines)",
        known.display_name(),
        request.content.chars().count(),
        request.content.split('\n').count()
    );
    Ok(Json(prompt.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    use super::*;
    use crate::backend_client::{BackendError, BackendInspection, InspectionBackend};
    use crate::inspection::options::InspectionStep;
    use crate::inspection::upload::DocumentUpload;
    use crate::routes::build_router;
    use crate::state::test_state;

    struct NeverCalled;

    #[async_trait::async_trait]
    impl InspectionBackend for NeverCalled {
        async fn inspect(
            &self,
            _upload: &DocumentUpload,
            _stop_after: InspectionStep,
        ) -> Result<BackendInspection, BackendError> {
            unreachable!("prompt routes never inspect")
        }
    }

    #[test]
    fn test_summary_carries_catalogue_name() {
        let summary = PromptSummary::from(SystemPrompt {
            id: 1003,
            name: "timetable_lookup".to_string(),
            content: String::new(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        });
        assert_eq!(summary.display_name, Some("Timetable Lookup"));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["id"], 1003);
        assert_eq!(json["display_name"], "Timetable Lookup");
    }

    #[tokio::test]
    async fn test_unknown_prompt_id_is_rejected_locally() {
        // The test backend points at a closed port; reaching it would be a 502.
        let app = build_router(test_state(Arc::new(NeverCalled)));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/prompts/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_known_prompt_accepts_catalogue_ids() {
        assert!(known_prompt(1006).is_ok());
        assert!(matches!(known_prompt(7), Err(AppError::NotFound(_))));
    }
}
