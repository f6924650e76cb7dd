//! Backend client — the single point of entry for all calls to the backend API.
//!
//! No other module talks to the backend directly. Sign-in, prompt CRUD and
//! curriculum inspection all go through `BackendClient`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::inspection::assemble::RawLlmCall;
use crate::inspection::options::InspectionStep;
use crate::inspection::upload::DocumentUpload;
use crate::models::prompt::SystemPrompt;
use crate::models::teacher::Teacher;
use crate::session::{LoginResponse, Session};

const SIGNIN_PATH: &str = "/auth/signin-admin";
const PROMPTS_PATH: &str = "/admin/prompts";
const INSPECT_PATH: &str = "/admin/curriculum/inspect";
const GENERIC_PROCESSING_FAILURE: &str = "Failed to process document. Please try again.";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Not authenticated. Please sign in.")]
    NotAuthenticated,

    #[error("Session expired. Please sign in again.")]
    SessionExpired,

    #[error("Login failed: {0}")]
    Login(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{message}")]
    Processing {
        message: String,
        stage: Option<InspectionStep>,
    },
}

/// Raw payload of a finished inspection, before any filtering.
#[derive(Debug, Clone, Default)]
pub struct BackendInspection {
    pub llm_calls: Vec<RawLlmCall>,
    pub data: Option<Map<String, Value>>,
}

/// The seam the inspect handler depends on. Carried in `AppState` as
/// `Arc<dyn InspectionBackend>`.
#[async_trait]
pub trait InspectionBackend: Send + Sync {
    async fn inspect(
        &self,
        upload: &DocumentUpload,
        stop_after: InspectionStep,
    ) -> Result<BackendInspection, BackendError>;
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdatePromptRequest<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl ErrorBody {
    /// `message` wins over `error`; empty strings count as absent.
    fn best_message(self) -> Option<String> {
        fn usable(value: Option<Value>) -> Option<String> {
            match value? {
                Value::Null => None,
                Value::String(s) if s.is_empty() => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            }
        }
        usable(self.message).or_else(|| usable(self.error))
    }
}

/// Everything but `success` is read loosely; see `decode_calls`.
#[derive(Debug, Deserialize)]
struct InspectResponseBody {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    llm_calls: Option<Value>,
    #[serde(default)]
    stage: Option<Value>,
    #[serde(flatten)]
    failure: ErrorBody,
}

/// Keeps every record that looks like a call and drops the rest, so one bad
/// record cannot sink a whole run.
fn decode_calls(llm_calls: Option<Value>) -> Vec<RawLlmCall> {
    let Some(Value::Array(records)) = llm_calls else {
        return Vec::new();
    };
    let calls: Vec<RawLlmCall> = records.iter().filter_map(RawLlmCall::from_value).collect();
    if calls.len() < records.len() {
        warn!(
            skipped = records.len() - calls.len(),
            "Skipped malformed llm_calls records"
        );
    }
    calls
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    session: Session,
    /// Log every request/response at `info`.
    verbose: bool,
    disable_llm_ocr: bool,
}

impl BackendClient {
    pub fn new(
        base_url: impl Into<String>,
        session: Session,
        verbose: bool,
        disable_llm_ocr: bool,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            verbose,
            disable_llm_ocr,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn log_request(&self, method: &Method, url: &str) {
        if self.verbose {
            info!("API request: {method} {url}");
        } else {
            debug!("API request: {method} {url}");
        }
    }

    fn log_response(&self, method: &Method, url: &str, status: StatusCode) {
        if self.verbose {
            info!("API response: {method} {url} -> {status}");
        } else {
            debug!("API response: {method} {url} -> {status}");
        }
    }

    /// Builds a request, attaching the bearer token when a valid one exists.
    fn request(&self, method: Method, path: &str) -> (RequestBuilder, String) {
        let url = self.url(path);
        self.log_request(&method, &url);
        let mut builder = self.client.request(method, &url);
        if let Some(token) = self.session.access_token(Utc::now()) {
            builder = builder.bearer_auth(token);
        }
        (builder, url)
    }

    /// The backend no longer accepts our token: forget it.
    fn expire_session(&self) -> BackendError {
        warn!("Backend rejected token; clearing session");
        if let Err(e) = self.session.clear() {
            warn!("Failed to clear session: {e}");
        }
        BackendError::SessionExpired
    }

    /// Sends a request and decodes a 2xx JSON body. A 401 expires the
    /// session; any other non-2xx becomes `Api { status, body }`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        builder: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        self.log_response(&method, url, status);
        if status == StatusCode::UNAUTHORIZED {
            return Err(self.expire_session());
        }
        let body = ensure_success(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Signs in as an admin and stores the resulting session. A 4xx is a
    /// rejected sign-in; anything else non-2xx is an upstream failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<Teacher, BackendError> {
        let url = self.url(SIGNIN_PATH);
        self.log_request(&Method::POST, &url);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        let status = response.status();
        self.log_response(&Method::POST, &url, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::best_message)
                .unwrap_or_else(|| format!("Login failed ({})", status.as_u16()));
            if status.is_client_error() {
                warn!("Admin sign-in rejected: {message}");
                return Err(BackendError::Login(message));
            }
            warn!("Admin sign-in failed upstream: {message}");
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let login: LoginResponse = serde_json::from_str(&response.text().await?)?;
        let state = self
            .session
            .establish(login, Utc::now())
            .map_err(|e| BackendError::Login(format!("Could not store session: {e}")))?;
        let teacher = state.teacher.ok_or(BackendError::NotAuthenticated)?;
        info!("Signed in as {} <{}>", teacher.display_name(), teacher.email);
        Ok(teacher)
    }

    pub async fn list_prompts(&self) -> Result<Vec<SystemPrompt>, BackendError> {
        let (builder, url) = self.request(Method::GET, PROMPTS_PATH);
        self.send_json(Method::GET, &url, builder).await
    }

    pub async fn get_prompt(&self, id: u32) -> Result<SystemPrompt, BackendError> {
        let (builder, url) = self.request(Method::GET, &format!("{PROMPTS_PATH}/{id}"));
        self.send_json(Method::GET, &url, builder).await
    }

    /// Replaces a prompt's content byte for byte.
    pub async fn update_prompt(&self, id: u32, content: &str) -> Result<SystemPrompt, BackendError> {
        let (builder, url) = self.request(Method::PUT, &format!("{PROMPTS_PATH}/{id}"));
        let builder = builder.json(&UpdatePromptRequest { content });
        self.send_json(Method::PUT, &url, builder).await
    }
}

#[async_trait]
impl InspectionBackend for BackendClient {
    /// Uploads a document and runs the pipeline through `stop_after`.
    /// Requires a valid token; without one no request is made.
    async fn inspect(
        &self,
        upload: &DocumentUpload,
        stop_after: InspectionStep,
    ) -> Result<BackendInspection, BackendError> {
        let token = self
            .session
            .access_token(Utc::now())
            .ok_or(BackendError::NotAuthenticated)?;

        let mut file = Part::bytes(upload.bytes.to_vec()).file_name(upload.file_name.clone());
        if let Some(content_type) = &upload.content_type {
            file = file.mime_str(content_type)?;
        }
        let form = Form::new()
            .part("file", file)
            .text("disable_llm_ocr", self.disable_llm_ocr.to_string())
            .text("year_group", upload.year_group.to_string())
            .text("stop_after", stop_after.as_str());

        let url = self.url(INSPECT_PATH);
        self.log_request(&Method::POST, &url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        self.log_response(&Method::POST, &url, status);

        if status == StatusCode::UNAUTHORIZED {
            return Err(self.expire_session());
        }

        let body = ensure_success(response).await?;
        let parsed: InspectResponseBody = serde_json::from_str(&body)?;

        if !parsed.success {
            return Err(BackendError::Processing {
                message: parsed
                    .failure
                    .best_message()
                    .unwrap_or_else(|| GENERIC_PROCESSING_FAILURE.to_string()),
                stage: parsed
                    .stage
                    .as_ref()
                    .and_then(Value::as_str)
                    .and_then(InspectionStep::from_wire),
            });
        }

        Ok(BackendInspection {
            llm_calls: decode_calls(parsed.llm_calls),
            data: match parsed.data {
                Some(Value::Object(map)) => Some(map),
                _ => None,
            },
        })
    }
}

/// Returns the body of a 2xx response, or `Api { status, body }` otherwise.
async fn ensure_success(response: Response) -> Result<String, BackendError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        Ok(body)
    } else {
        Err(BackendError::Api {
            status: status.as_u16(),
            message: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspection::options::InspectionOptions;
    use crate::models::teacher::sample_teacher;
    use bytes::Bytes;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> BackendClient {
        BackendClient::new(server.uri(), Session::in_memory(), false, true).unwrap()
    }

    fn login_body() -> Value {
        json!({
            "teacher": serde_json::to_value(sample_teacher()).unwrap(),
            "accessToken": "tok-123",
            "refreshToken": "ref-456",
            "expiresIn": 3600,
            "tokenType": "bearer",
            "onboarding_checkpoint": "complete"
        })
    }

    async fn signed_in(server: &MockServer) -> (BackendClient, Session) {
        Mock::given(method("POST"))
            .and(path(SIGNIN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_body()))
            .mount(server)
            .await;
        let session = Session::in_memory();
        let client = BackendClient::new(server.uri(), session.clone(), false, true).unwrap();
        client.login("ops@example.com", "secret").await.unwrap();
        (client, session)
    }

    async fn inspect_returning(body: Value) -> Result<BackendInspection, BackendError> {
        let server = MockServer::start().await;
        let (client, _) = signed_in(&server).await;
        Mock::given(method("POST"))
            .and(path(INSPECT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        client.inspect(&upload(), InspectionStep::LoExtraction).await
    }

    fn upload() -> DocumentUpload {
        DocumentUpload::new(
            "autumn.pdf".to_string(),
            Some("application/pdf".to_string()),
            Bytes::from_static(b"%PDF-1.7"),
            "Year 3",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_stores_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNIN_PATH))
            .and(body_json(json!({"email": "ops@example.com", "password": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_body()))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::in_memory();
        let client = BackendClient::new(server.uri(), session.clone(), false, true).unwrap();
        let teacher = client.login("ops@example.com", "secret").await.unwrap();

        assert_eq!(teacher.email, "ops@example.com");
        assert!(session.is_authenticated(Utc::now()));
        assert_eq!(session.access_token(Utc::now()).as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn test_login_failure_prefers_message_then_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNIN_PATH))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"message": "Invalid credentials", "error": "x"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).login("a", "b").await.unwrap_err();
        assert!(matches!(err, BackendError::Login(ref m) if m == "Invalid credentials"));
    }

    #[tokio::test]
    async fn test_login_upstream_failure_is_not_a_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNIN_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).login("a", "b").await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Api { status: 503, ref message } if message == "Login failed (503)"
        ));
    }

    #[tokio::test]
    async fn test_login_rejection_without_body_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SIGNIN_PATH))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client(&server).login("a", "b").await.unwrap_err();
        assert!(matches!(err, BackendError::Login(ref m) if m == "Login failed (403)"));
    }

    #[tokio::test]
    async fn test_get_prompt_decodes_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/prompts/1004"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1004,
                "name": "curriculum_extraction",
                "content": "Extract objectives.",
                "updated_at": "2025-02-01T09:30:00Z"
            })))
            .mount(&server)
            .await;

        let prompt = client(&server).get_prompt(1004).await.unwrap();
        assert_eq!(prompt.id, 1004);
        assert_eq!(prompt.content, "Extract objectives.");
    }

    #[tokio::test]
    async fn test_update_prompt_sends_content_verbatim() {
        let server = MockServer::start().await;
        let content = "  Line one\n\tLine two\n";
        Mock::given(method("PUT"))
            .and(path("/admin/prompts/1001"))
            .and(body_json(json!({ "content": content })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1001,
                "name": "timetable_extraction",
                "content": content,
                "updated_at": "2025-02-01T09:30:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let prompt = client(&server).update_prompt(1001, content).await.unwrap();
        assert_eq!(prompt.content, content);
    }

    #[tokio::test]
    async fn test_non_success_status_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROMPTS_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server).list_prompts().await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: boom");
    }

    #[tokio::test]
    async fn test_prompt_call_unauthorized_clears_session() {
        let server = MockServer::start().await;
        let (client, session) = signed_in(&server).await;
        Mock::given(method("PUT"))
            .and(path("/admin/prompts/1002"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = client.update_prompt(1002, "new").await.unwrap_err();
        assert!(matches!(err, BackendError::SessionExpired));
        assert!(session.access_token(Utc::now()).is_none());
        assert!(session.teacher().is_none());
    }

    #[tokio::test]
    async fn test_inspect_without_token_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(INSPECT_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server)
            .inspect(&upload(), InspectionStep::Classification)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_inspect_sends_form_fields_and_returns_calls() {
        let server = MockServer::start().await;
        let (client, _) = signed_in(&server).await;
        let stop_after = InspectionOptions {
            show_classification: true,
            show_year_filtering: true,
            show_extraction: false,
        }
        .stopped_after();

        Mock::given(method("POST"))
            .and(path(INSPECT_PATH))
            .and(header("authorization", "Bearer tok-123"))
            .and(body_string_contains("name=\"stop_after\"\r\n\r\nyear_filtering"))
            .and(body_string_contains("name=\"year_group\"\r\n\r\n3"))
            .and(body_string_contains("name=\"disable_llm_ocr\"\r\n\r\ntrue"))
            .and(body_string_contains("filename=\"autumn.pdf\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "autumn_1": { "los": [], "term_metadata": {} } },
                "llm_calls": [
                    { "step": "classification", "model": "gpt-4o", "input": "text", "output": "{}" },
                    { "step": "year_filtering", "model": "gpt-4o", "input": null, "output": "kept" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client.inspect(&upload(), stop_after).await.unwrap();
        assert_eq!(result.llm_calls.len(), 2);
        assert_eq!(result.llm_calls[1].step, "year_filtering");
        assert!(result.llm_calls[1].input.is_none());
        assert!(result.data.unwrap().contains_key("autumn_1"));
    }

    #[tokio::test]
    async fn test_inspect_unauthorized_clears_session() {
        let server = MockServer::start().await;
        let (client, session) = signed_in(&server).await;
        Mock::given(method("POST"))
            .and(path(INSPECT_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client
            .inspect(&upload(), InspectionStep::LoExtraction)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::SessionExpired));
        assert!(session.access_token(Utc::now()).is_none());
        assert!(session.teacher().is_none());
    }

    #[tokio::test]
    async fn test_inspect_processing_failure_uses_message_then_error_then_default() {
        let cases = [
            (json!({"success": false, "message": "Bad scan", "error": "x"}), "Bad scan"),
            (json!({"success": false, "error": "Unsupported layout"}), "Unsupported layout"),
            (json!({"success": false}), GENERIC_PROCESSING_FAILURE),
        ];

        for (body, expected) in cases {
            match inspect_returning(body).await.unwrap_err() {
                BackendError::Processing { message, stage } => {
                    assert_eq!(message, expected);
                    assert!(stage.is_none());
                }
                other => panic!("expected processing error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_inspect_processing_failure_reports_known_stage() {
        let err = inspect_returning(json!({
            "success": false,
            "message": "No content for Year 3",
            "stage": "year_filtering"
        }))
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            BackendError::Processing { stage: Some(InspectionStep::YearFiltering), .. }
        ));
    }

    #[tokio::test]
    async fn test_inspect_processing_failure_tolerates_odd_stage_and_message() {
        let err = inspect_returning(json!({
            "success": false,
            "message": null,
            "error": { "reason": "timeout" },
            "stage": 2
        }))
        .await
        .unwrap_err();
        match err {
            BackendError::Processing { message, stage } => {
                assert_eq!(message, "{\"reason\":\"timeout\"}");
                assert!(stage.is_none());
            }
            other => panic!("expected processing error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inspect_skips_malformed_call_records() {
        let result = inspect_returning(json!({
            "success": true,
            "llm_calls": [
                { "step": "classification", "model": "gpt-4o", "input": "text", "output": "{}" },
                { "step": "debug_trace", "model": null, "input": null, "output": null },
                { "model": "gpt-4o", "output": "no step" },
                "garbage",
                { "step": "lo_extraction", "model": "gpt-4o", "output": { "learning_objectives": [] } }
            ]
        }))
        .await
        .unwrap();

        let steps: Vec<_> = result.llm_calls.iter().map(|c| c.step.as_str()).collect();
        assert_eq!(steps, vec!["classification", "debug_trace", "lo_extraction"]);
        assert_eq!(result.llm_calls[2].output, "{\"learning_objectives\":[]}");

        // Unknown steps still disappear at assembly.
        let assembled = crate::inspection::assemble::assemble(
            result.llm_calls,
            result.data,
            &InspectionOptions::all(),
        );
        let steps: Vec<_> = assembled.llm_calls.iter().map(|c| c.step).collect();
        assert_eq!(
            steps,
            vec![InspectionStep::Classification, InspectionStep::LoExtraction]
        );
    }

    #[tokio::test]
    async fn test_inspect_drops_non_object_data() {
        for data in [json!([1, 2]), json!("processed"), Value::Null] {
            let result = inspect_returning(json!({
                "success": true,
                "data": data,
                "llm_calls": "not a list"
            }))
            .await
            .unwrap();
            assert!(result.data.is_none());
            assert!(result.llm_calls.is_empty());
        }
    }
}
