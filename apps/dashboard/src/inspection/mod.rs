// Curriculum extraction inspector: step gating, upload validation, and
// assembly of the backend's per-step LLM calls for display.
// All backend traffic goes through backend_client.

pub mod assemble;
pub mod handlers;
pub mod options;
pub mod upload;

use serde::Serialize;

use crate::backend_client::BackendError;
use crate::inspection::options::InspectionStep;

/// Flat error shape shown to the operator when a run fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<InspectionStep>,
}

impl From<&BackendError> for InspectionError {
    fn from(err: &BackendError) -> Self {
        let stage = match err {
            BackendError::Processing { stage, .. } => *stage,
            _ => None,
        };
        Self {
            message: err.to_string(),
            stage,
        }
    }
}
