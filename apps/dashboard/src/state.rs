use std::sync::Arc;

use crate::backend_client::{BackendClient, BackendError, InspectionBackend};
use crate::config::Config;
use crate::session::Session;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Sign-in and prompt CRUD.
    pub backend: BackendClient,
    /// Curriculum inspection. Usually the same `BackendClient`, swapped out in tests.
    pub inspector: Arc<dyn InspectionBackend>,
    pub session: Session,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, session: Session) -> Result<Self, BackendError> {
        let backend = BackendClient::new(
            config.api_base_url.clone(),
            session.clone(),
            config.api_logging_enabled,
            config.disable_llm_ocr,
        )?;
        Ok(Self {
            inspector: Arc::new(backend.clone()),
            backend,
            session,
            config,
        })
    }
}

/// State wired to an unreachable backend, an in-memory session and the
/// default (independent) options policy.
#[cfg(test)]
pub(crate) fn test_state(inspector: Arc<dyn InspectionBackend>) -> AppState {
    use crate::inspection::options::OptionsPolicy;

    let config = Config {
        api_base_url: "http://127.0.0.1:9".to_string(),
        port: 0,
        rust_log: "debug".to_string(),
        api_logging_enabled: false,
        session_file: None,
        options_policy: OptionsPolicy::Independent,
        disable_llm_ocr: true,
        max_upload_mb: 50,
    };
    let session = Session::in_memory();
    let backend = BackendClient::new(config.api_base_url.clone(), session.clone(), false, true)
        .expect("client builds");
    AppState {
        backend,
        inspector,
        session,
        config,
    }
}
