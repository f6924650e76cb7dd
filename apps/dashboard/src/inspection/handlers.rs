//! Axum route handlers for the curriculum extraction inspector.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::inspection::assemble::{assemble, InspectionView};
use crate::inspection::options::{InspectionOptions, InspectionStep, OptionsPolicy};
use crate::inspection::upload::{DocumentUpload, ACCEPTED_EXTENSIONS, YEAR_GROUPS};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StepInfo {
    pub step: InspectionStep,
    pub label: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CurriculumOptionsResponse {
    pub year_groups: Vec<&'static str>,
    pub accepted_extensions: String,
    pub steps: Vec<StepInfo>,
    pub policy: OptionsPolicy,
    pub defaults: InspectionOptions,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub options: InspectionOptions,
    pub step: InspectionStep,
    pub checked: bool,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub options: InspectionOptions,
    pub enabled_steps: Vec<InspectionStep>,
    pub stopped_after: InspectionStep,
    pub can_run: bool,
}

#[derive(Debug, Serialize)]
pub struct InspectRunResponse {
    pub run_id: Uuid,
    pub stopped_after: InspectionStep,
    pub enabled_steps: Vec<InspectionStep>,
    pub result: InspectionView,
}

/// Fields collected from the multipart inspect form.
#[derive(Debug, Default)]
struct InspectForm {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Option<Bytes>,
    year_group: Option<String>,
    options: InspectionOptions,
}

impl InspectForm {
    async fn read(multipart: &mut Multipart, limit_mb: usize) -> Result<Self, AppError> {
        let mut form = InspectForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, limit_mb, "Invalid multipart body"))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    form.file_name = field.file_name().map(str::to_string);
                    form.content_type = field.content_type().map(str::to_string);
                    form.bytes = Some(field.bytes().await.map_err(|e| {
                        multipart_error(e, limit_mb, "Failed to read uploaded file")
                    })?);
                }
                "year_group" => form.year_group = Some(read_text(field).await?),
                "show_classification" => {
                    form.options.show_classification = parse_checkbox(&read_text(field).await?)
                }
                "show_year_filtering" => {
                    form.options.show_year_filtering = parse_checkbox(&read_text(field).await?)
                }
                "show_extraction" => {
                    form.options.show_extraction = parse_checkbox(&read_text(field).await?)
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

/// The body limit surfaces as a multipart error mid-stream.
fn multipart_error(err: MultipartError, limit_mb: usize, context: &str) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!(
            "File is too large. Uploads are limited to {limit_mb} MB."
        ))
    } else {
        AppError::Validation(format!("{context}: {err}"))
    }
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid form field: {e}")))
}

fn parse_checkbox(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "1" | "yes"
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/curriculum/options
pub async fn handle_get_options(State(state): State<AppState>) -> Json<CurriculumOptionsResponse> {
    Json(CurriculumOptionsResponse {
        year_groups: YEAR_GROUPS.to_vec(),
        accepted_extensions: ACCEPTED_EXTENSIONS.join(","),
        steps: InspectionStep::ALL
            .into_iter()
            .map(|step| StepInfo {
                step,
                label: step.label(),
                description: step.description(),
            })
            .collect(),
        policy: state.config.options_policy,
        defaults: InspectionOptions::all(),
    })
}

/// POST /api/v1/curriculum/options/toggle
///
/// Applies one checkbox flip under the configured policy.
pub async fn handle_toggle_option(
    State(state): State<AppState>,
    Json(request): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let options = state
        .config
        .options_policy
        .toggle(request.options, request.step, request.checked)?;

    Ok(Json(ToggleResponse {
        enabled_steps: options.enabled_steps(),
        stopped_after: options.stopped_after(),
        can_run: !options.is_empty(),
        options,
    }))
}

/// POST /api/v1/curriculum/inspect
///
/// Uploads a curriculum document, runs the backend pipeline up to the last
/// requested step, and returns only the steps the operator asked to see.
pub async fn handle_inspect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<InspectRunResponse>, AppError> {
    let form = InspectForm::read(&mut multipart, state.config.max_upload_mb).await?;

    let (Some(file_name), Some(bytes), Some(year_group)) =
        (form.file_name, form.bytes, form.year_group.filter(|y| !y.trim().is_empty()))
    else {
        return Err(AppError::Validation(
            "Please select a file and year group".to_string(),
        ));
    };
    let options = form.options;
    options
        .require_any()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let upload = DocumentUpload::new(file_name, form.content_type, bytes, &year_group)?;

    let run_id = Uuid::new_v4();
    let stopped_after = options.stopped_after();
    let enabled_steps = options.enabled_steps();
    info!(
        %run_id,
        file = %upload.file_name,
        size_kb = upload.size_kb(),
        year_group = upload.year_group,
        stop_after = %stopped_after,
        "Running curriculum inspection"
    );

    let raw = state
        .inspector
        .inspect(&upload, stopped_after)
        .await
        .map_err(|e| {
            warn!(%run_id, "Inspection failed: {e}");
            AppError::Backend(e)
        })?;

    let returned = raw.llm_calls.len();
    let response = assemble(raw.llm_calls, raw.data, &options);
    info!(
        %run_id,
        returned,
        shown = response.llm_calls.len(),
        "Inspection completed"
    );

    Ok(Json(InspectRunResponse {
        run_id,
        stopped_after,
        enabled_steps,
        result: InspectionView::from(&response),
    }))
}
