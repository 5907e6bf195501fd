//! HTTP client for the portal's session directory API.
//!
//! # Security
//!
//! - Requests carry the agent's bearer token (held as `SecretString`)
//! - Instructor-only calls are refused before any request is sent
//! - Error bodies are truncated before logging and never reach the page

use super::SessionDirectory;
use crate::errors::{ClassroomAction, ClassroomError};
use crate::models::{NewSession, RoleContext, Session, SessionRecord};
use crate::observability::metrics;
use common::secret::{ExposeSecret, SecretString};
use common::types::{RoomId, SessionId};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Connect timeout for directory requests in seconds.
const DIRECTORY_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Maximum number of characters of an error body kept for logging.
const MAX_LOGGED_BODY_CHARS: usize = 256;

#[derive(Debug, Deserialize)]
struct SessionListResponse {
    sessions: Vec<SessionRecord>,
}

#[derive(Debug, Deserialize)]
struct JoinResponse {
    room_id: RoomId,
}

/// HTTP implementation of [`SessionDirectory`].
#[derive(Clone)]
pub struct HttpSessionDirectory {
    client: Client,
    base_url: String,
    api_token: SecretString,
}

impl HttpSessionDirectory {
    /// Create a new directory client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Directory API root without trailing slash (e.g. "https://portal.example.edu/api")
    /// * `api_token` - Bearer token for the agent
    /// * `timeout` - Total request timeout
    ///
    /// # Errors
    ///
    /// Returns `ClassroomError::Internal` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, ClassroomError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(DIRECTORY_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "classroom.directory", error = %e, "Failed to build HTTP client");
                ClassroomError::Internal("failed to build directory client".to_string())
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(self.api_token.expose_secret())
    }

    /// Send a request and decode a successful JSON body, recording metrics
    /// for the call.
    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        action: Option<ClassroomAction>,
        builder: RequestBuilder,
    ) -> Result<T, ClassroomError> {
        let started = Instant::now();
        let result = self.send_json_inner(action, builder).await;
        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::record_directory_request(operation, outcome, started.elapsed());
        result
    }

    async fn send_json_inner<T: DeserializeOwned>(
        &self,
        action: Option<ClassroomAction>,
        builder: RequestBuilder,
    ) -> Result<T, ClassroomError> {
        let response = self.authorized(builder).send().await.map_err(|e| {
            warn!(target: "classroom.directory", error = %e, "Directory request failed");
            ClassroomError::Network("session directory is unreachable".to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                error!(target: "classroom.directory", error = %e, "Failed to parse directory response");
                ClassroomError::InvalidResponse("malformed directory response".to_string())
            });
        }

        let body = truncate_body(&response.text().await.unwrap_or_default());
        Err(map_error_status(status, action, &body))
    }
}

/// Map a non-success directory status to a classroom error.
fn map_error_status(
    status: StatusCode,
    action: Option<ClassroomAction>,
    body: &str,
) -> ClassroomError {
    if status.is_server_error() {
        warn!(target: "classroom.directory", status = %status, body = %body, "Directory returned server error");
        return ClassroomError::Network("session directory is unavailable".to_string());
    }

    match (status, action) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            warn!(target: "classroom.directory", status = %status, "Directory refused request");
            ClassroomError::PermissionDenied("request denied by session directory".to_string())
        }
        (StatusCode::NOT_FOUND, _) => {
            ClassroomError::SessionNotFound("session does not exist".to_string())
        }
        (StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY, Some(action)) => {
            debug!(target: "classroom.directory", status = %status, body = %body, "Directory rejected timing");
            ClassroomError::TimingViolation {
                action,
                reason: "rejected by session directory".to_string(),
            }
        }
        _ => {
            warn!(target: "classroom.directory", status = %status, body = %body, "Unexpected directory response");
            ClassroomError::InvalidResponse(format!("unexpected status {}", status.as_u16()))
        }
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_LOGGED_BODY_CHARS).collect()
}

fn decode_record(record: SessionRecord) -> Result<Session, ClassroomError> {
    Session::try_from(record).map_err(|e| {
        warn!(target: "classroom.directory", status = %e.0, "Directory returned unknown session status");
        metrics::record_rejected_record();
        ClassroomError::InvalidResponse(e.to_string())
    })
}

fn require_instructor(ctx: &RoleContext, operation: &str) -> Result<(), ClassroomError> {
    if ctx.is_instructor() {
        Ok(())
    } else {
        debug!(target: "classroom.directory", operation, principal_id = %ctx.principal_id, "Refusing instructor-only call");
        Err(ClassroomError::PermissionDenied(format!(
            "only instructors may {operation} sessions"
        )))
    }
}

#[async_trait::async_trait]
impl SessionDirectory for HttpSessionDirectory {
    #[instrument(skip_all, fields(role = %ctx.role))]
    async fn list_sessions(&self, ctx: &RoleContext) -> Result<Vec<Session>, ClassroomError> {
        let url = format!("{}/v1/sessions", self.base_url);
        let builder = self
            .client
            .get(&url)
            .query(&[("role", ctx.role.as_str())]);

        let response: SessionListResponse = self.send_json("list", None, builder).await?;

        // Unknown records are dropped individually so one bad row does not
        // blank the whole list.
        Ok(response
            .sessions
            .into_iter()
            .filter_map(|record| decode_record(record).ok())
            .collect())
    }

    #[instrument(skip_all, fields(course_id = %new_session.course_id))]
    async fn create_session(
        &self,
        ctx: &RoleContext,
        new_session: &NewSession,
    ) -> Result<Session, ClassroomError> {
        require_instructor(ctx, "create")?;

        let url = format!("{}/v1/sessions", self.base_url);
        let builder = self.client.post(&url).json(new_session);
        let record: SessionRecord = self.send_json("create", None, builder).await?;
        decode_record(record)
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn start_session(
        &self,
        ctx: &RoleContext,
        session_id: SessionId,
    ) -> Result<Session, ClassroomError> {
        require_instructor(ctx, "start")?;

        let url = format!("{}/v1/sessions/{session_id}/start", self.base_url);
        let builder = self.client.post(&url);
        let record: SessionRecord = self
            .send_json("start", Some(ClassroomAction::Start), builder)
            .await?;
        decode_record(record)
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn join_session(
        &self,
        _ctx: &RoleContext,
        session_id: SessionId,
    ) -> Result<RoomId, ClassroomError> {
        let url = format!("{}/v1/sessions/{session_id}/join", self.base_url);
        let builder = self.client.post(&url);
        let response: JoinResponse = self
            .send_json("join", Some(ClassroomAction::Join), builder)
            .await?;
        Ok(response.room_id)
    }
}
