//! Session context — the operator's backend credentials.
//!
//! Storage sits behind the `SessionStore` trait and is injected through
//! `AppState`; nothing else reads or writes session data directly.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::teacher::Teacher;

/// Tokens are treated as expired this long before their real expiry when
/// deciding whether the operator is signed in.
const EXPIRY_BUFFER_SECS: i64 = 60;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub teacher: Option<Teacher>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Successful body of `POST /auth/signin-admin`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub teacher: Teacher,
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    #[allow(dead_code)]
    pub token_type: String,
    #[serde(rename = "onboarding_checkpoint", default)]
    #[allow(dead_code)]
    pub onboarding_checkpoint: Option<String>,
}

/// Persistence for `AuthState`. Reads never fail: unreadable state is empty.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> AuthState;
    fn save(&self, state: &AuthState) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// JSON file on disk, written atomically.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> AuthState {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return AuthState::default(),
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring unreadable session file {}: {e}", self.path.display());
            AuthState::default()
        })
    }

    fn save(&self, state: &AuthState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create session directory {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&serde_json::to_vec(state)?)?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write session file {}", self.path.display()))?;
        debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove session file {}", self.path.display())),
        }
    }
}

/// In-process store. Nothing survives a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    state: Mutex<AuthState>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> AuthState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    fn save(&self, state: &AuthState) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("session lock poisoned"))?;
        *guard = state.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.save(&AuthState::default())
    }
}

/// Handle to the session store, cheap to clone into handlers and clients.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::default()))
    }

    pub fn teacher(&self) -> Option<Teacher> {
        self.store.load().teacher
    }

    /// True when a token exists and stays valid for at least another minute.
    pub fn is_authenticated(&self, now: DateTime<Utc>) -> bool {
        let state = self.store.load();
        match (state.access_token, state.expires_at) {
            (Some(_), Some(expires_at)) => now < expires_at - Duration::seconds(EXPIRY_BUFFER_SECS),
            _ => false,
        }
    }

    /// The access token, unless it is missing or already expired.
    pub fn access_token(&self, now: DateTime<Utc>) -> Option<String> {
        let state = self.store.load();
        match (state.access_token, state.expires_at) {
            (Some(token), Some(expires_at)) if now < expires_at => Some(token),
            _ => None,
        }
    }

    /// Stores a fresh login. Expiry is computed from `expires_in` seconds.
    pub fn establish(&self, login: LoginResponse, now: DateTime<Utc>) -> Result<AuthState> {
        let state = AuthState {
            teacher: Some(login.teacher),
            access_token: Some(login.access_token),
            refresh_token: Some(login.refresh_token),
            expires_at: Some(now + Duration::seconds(login.expires_in)),
        };
        self.store.save(&state)?;
        Ok(state)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }
}
