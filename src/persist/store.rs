//! Session and recording persistence.
//!
//! [`SessionStore`] is the seam between the dialogue core and wherever the
//! session row and the recording end up.  Three backends ship:
//!
//! * [`HttpSessionStore`]: the interview backend's REST API.
//! * [`FileSessionStore`]: recordings written to a local directory.
//! * [`DisabledStore`]: nothing is persisted.
//!
//! Every failure here is non-fatal to the interview: creation failure falls
//! back to a local identifier ([`establish_session`]) and upload failure
//! becomes a notice on the report.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::config::{PersistenceBackend, PersistenceConfig};
use crate::interview::SessionConfig;
use crate::recorder::Recording;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Identifier of a persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionId {
    /// Assigned by the backend.
    Remote(i64),
    /// Generated locally when the backend could not be reached.
    Local(String),
}

impl SessionId {
    /// A fresh `local-<uuid>` identifier.
    pub fn local() -> Self {
        SessionId::Local(format!("local-{}", uuid::Uuid::new_v4()))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, SessionId::Local(_))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionId::Remote(id) => write!(f, "{id}"),
            SessionId::Local(id) => f.write_str(id),
        }
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SessionId::Remote(id) => serializer.serialize_i64(*id),
            SessionId::Local(id) => serializer.serialize_str(id),
        }
    }
}

// ---------------------------------------------------------------------------
// PersistError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("persistence request timed out")]
    Timeout,

    #[error("backend returned status {0}")]
    Status(u16),

    #[error("unexpected backend response: {0}")]
    Response(String),

    #[error("backend only accepts video recordings, got {0}")]
    UnsupportedMedia(String),

    #[error("no backend configured")]
    Disabled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for PersistError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PersistError::Timeout
        } else if let Some(status) = e.status() {
            PersistError::Status(status.as_u16())
        } else {
            PersistError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStore trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Register a new session and return its identifier.
    async fn create_session(&self, config: &SessionConfig) -> Result<SessionId, PersistError>;

    /// Persist the finished recording for `session`.
    async fn upload_recording(
        &self,
        session: &SessionId,
        recording: Recording,
    ) -> Result<(), PersistError>;
}

/// Create the session, falling back to a local identifier on any failure.
pub async fn establish_session(store: &dyn SessionStore, config: &SessionConfig) -> SessionId {
    match store.create_session(config).await {
        Ok(id) => {
            log::info!("persist: session {id} created");
            id
        }
        Err(PersistError::Disabled) => SessionId::local(),
        Err(e) => {
            let id = SessionId::local();
            log::warn!("persist: session creation failed ({e}); continuing as {id}");
            id
        }
    }
}

/// Build the store selected in config.
pub fn store_from_config(
    config: &PersistenceConfig,
    recordings_dir: PathBuf,
) -> Box<dyn SessionStore> {
    match config.backend {
        PersistenceBackend::Http => Box::new(HttpSessionStore::from_config(config)),
        PersistenceBackend::Local => Box::new(FileSessionStore::new(recordings_dir)),
        PersistenceBackend::Disabled => Box::new(DisabledStore),
    }
}

// ---------------------------------------------------------------------------
// HttpSessionStore
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct CreatedSession {
    session_id: i64,
}

/// Talks to `POST /api/sessions/` and `POST /api/upload-video/`.
pub struct HttpSessionStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionStore {
    pub fn from_config(config: &PersistenceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn create_session(&self, config: &SessionConfig) -> Result<SessionId, PersistError> {
        let url = format!("{}/api/sessions/", self.base_url);
        let form = [
            ("role", config.role.slug()),
            ("experience", config.experience_level.slug()),
        ];
        let created: CreatedSession = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| PersistError::Response(e.to_string()))?;
        Ok(SessionId::Remote(created.session_id))
    }

    async fn upload_recording(
        &self,
        session: &SessionId,
        recording: Recording,
    ) -> Result<(), PersistError> {
        let SessionId::Remote(id) = session else {
            log::info!("persist: session {session} is local-only; skipping upload");
            return Ok(());
        };
        if !recording.mime_type.starts_with("video/") {
            return Err(PersistError::UnsupportedMedia(recording.mime_type));
        }

        let url = format!("{}/api/upload-video/", self.base_url);
        let size = recording.bytes.len();
        let filename = format!("interview-{id}.{}", recording.extension());
        let part = reqwest::multipart::Part::bytes(recording.bytes)
            .file_name(filename)
            .mime_str(&recording.mime_type)
            .map_err(|e| PersistError::UnsupportedMedia(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("session_id", id.to_string())
            .part("file", part);

        self.client
            .post(&url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        log::info!("persist: uploaded {size} bytes for session {id}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileSessionStore
// ---------------------------------------------------------------------------

/// Writes each recording to `<dir>/<session-id>.<ext>`.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path_for(&self, session: &SessionId, recording: &Recording) -> PathBuf {
        self.dir
            .join(format!("session-{session}.{}", recording.extension()))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    /// Sessions are never registered anywhere; the id is always local.
    async fn create_session(&self, _config: &SessionConfig) -> Result<SessionId, PersistError> {
        Ok(SessionId::local())
    }

    async fn upload_recording(
        &self,
        session: &SessionId,
        recording: Recording,
    ) -> Result<(), PersistError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(session, &recording);
        tokio::fs::write(&path, &recording.bytes).await?;
        log::info!(
            "persist: wrote {} bytes to {}",
            recording.bytes.len(),
            path.display()
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DisabledStore
// ---------------------------------------------------------------------------

pub struct DisabledStore;

#[async_trait]
impl SessionStore for DisabledStore {
    async fn create_session(&self, _config: &SessionConfig) -> Result<SessionId, PersistError> {
        Err(PersistError::Disabled)
    }

    async fn upload_recording(
        &self,
        _session: &SessionId,
        _recording: Recording,
    ) -> Result<(), PersistError> {
        log::debug!("persist: disabled; recording discarded");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
