use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::inspection::options::OptionsPolicy;

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api/v1";
const DEFAULT_SESSION_FILE: &str = ".dashboard-session.json";
const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// Application configuration loaded from environment variables.
/// Every value has a default; startup fails only on values that do not parse.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend API, without a trailing slash.
    pub api_base_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Log every backend request/response at `info` instead of `debug`.
    pub api_logging_enabled: bool,
    /// `None` keeps the session in memory only (`SESSION_FILE=` set empty).
    pub session_file: Option<PathBuf>,
    pub options_policy: OptionsPolicy,
    /// Sent with every inspection so the backend skips its LLM OCR fallback.
    pub disable_llm_ocr: bool,
    /// Request body limit for the inspect upload, in megabytes.
    pub max_upload_mb: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_base_url: std::env::var("API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            api_logging_enabled: env_flag("API_LOGGING_ENABLED", false)?,
            session_file: session_file(std::env::var("SESSION_FILE").ok()),
            options_policy: std::env::var("INSPECTION_OPTIONS_POLICY")
                .unwrap_or_else(|_| "independent".to_string())
                .parse::<OptionsPolicy>()
                .context("INSPECTION_OPTIONS_POLICY must be 'independent' or 'prefix'")?,
            disable_llm_ocr: env_flag("DISABLE_LLM_OCR", true)?,
            max_upload_mb: std::env::var("MAX_UPLOAD_MB")
                .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_MB.to_string())
                .parse::<usize>()
                .context("MAX_UPLOAD_MB must be a whole number of megabytes")?,
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn session_file(raw: Option<String>) -> Option<PathBuf> {
    match raw {
        Some(raw) if raw.trim().is_empty() => None,
        Some(raw) => Some(PathBuf::from(raw)),
        None => Some(PathBuf::from(DEFAULT_SESSION_FILE)),
    }
}

fn env_flag(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(raw) => parse_flag(&raw)
            .with_context(|| format!("Environment variable '{key}' must be true or false")),
        Err(_) => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_accepts_common_spellings() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("no"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
    }

    #[test]
    fn test_parse_flag_rejects_garbage() {
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_empty_session_file_selects_memory_store() {
        assert_eq!(session_file(Some("  ".to_string())), None);
        assert_eq!(
            session_file(None),
            Some(PathBuf::from(".dashboard-session.json"))
        );
        assert_eq!(
            session_file(Some("/tmp/s.json".to_string())),
            Some(PathBuf::from("/tmp/s.json"))
        );
    }
}
