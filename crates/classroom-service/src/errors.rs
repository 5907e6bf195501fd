//! Classroom error types.
//!
//! Every failure in the classroom core is recoverable and scoped to the
//! component that raised it. Errors carry a stable `code()` for the page
//! and a `client_message()` that never exposes internal details such as
//! directory URLs or raw response bodies.
//!
//! Double disposal, events that arrive after disposal and releasing a
//! device preview that holds nothing are state conflicts; they are
//! silent no-ops and are never represented here.

use std::fmt;
use thiserror::Error;

/// Classroom error type.
///
/// Maps to page-facing codes:
/// - `MediaAccess`: `MEDIA_ACCESS` (user fixes OS settings and retries)
/// - `Validation`: `VALIDATION` (blocks join)
/// - `Network`: `NETWORK` (poller retries, stale data kept)
/// - `Connection`: `CONNECTION` (reload or navigate away, never auto-retried)
/// - `TimingViolation`: `NOT_IN_WINDOW` (join/start outside eligibility window)
/// - `PermissionDenied`, `SessionNotFound`, `InvalidResponse`, `Config`, `Internal`
#[derive(Debug, Error)]
pub enum ClassroomError {
    /// Camera or microphone could not be acquired.
    #[error("Media access error: {0}")]
    MediaAccess(#[from] MediaAccessError),

    /// Join input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Session directory request failed in transit or with a server error.
    #[error("Network error: {0}")]
    Network(String),

    /// Conferencing engine failed to load, create the room or stay connected.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Join or start attempted outside the eligibility window.
    #[error("Cannot {action} session: {reason}")]
    TimingViolation {
        /// What the caller tried to do.
        action: ClassroomAction,
        /// Human-readable eligibility state (e.g. the bucket name).
        reason: String,
    },

    /// The directory refused the request for this principal.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The directory has no such session.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The directory answered with a record the core cannot represent.
    #[error("Invalid directory response: {0}")]
    InvalidResponse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (actor mailbox closed, task vanished).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Device acquisition failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaAccessError {
    /// The user or the OS denied camera/microphone permission.
    #[error("Camera or microphone permission denied")]
    PermissionDenied,

    /// No camera or microphone is present.
    #[error("No camera or microphone found")]
    DeviceNotFound,

    /// Another process holds the device.
    #[error("Camera or microphone is in use by another application")]
    DeviceBusy,

    /// Any other backend failure.
    #[error("Media device error: {0}")]
    Other(String),
}

/// Join input validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Display name was empty or whitespace-only.
    #[error("Display name must not be empty")]
    EmptyDisplayName,
}

/// Actions guarded by the eligibility window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassroomAction {
    /// Join as a participant.
    Join,
    /// Start as the instructor.
    Start,
}

impl fmt::Display for ClassroomAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassroomAction::Join => f.write_str("join"),
            ClassroomAction::Start => f.write_str("start"),
        }
    }
}

impl ClassroomError {
    /// Returns the stable page-facing code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ClassroomError::MediaAccess(_) => "MEDIA_ACCESS",
            ClassroomError::Validation(_) => "VALIDATION",
            ClassroomError::Network(_) => "NETWORK",
            ClassroomError::Connection(_) => "CONNECTION",
            ClassroomError::TimingViolation { .. } => "NOT_IN_WINDOW",
            ClassroomError::PermissionDenied(_) => "FORBIDDEN",
            ClassroomError::SessionNotFound(_) => "NOT_FOUND",
            ClassroomError::InvalidResponse(_)
            | ClassroomError::Config(_)
            | ClassroomError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the page should offer an inline retry for this error.
    ///
    /// Connection errors are recovered by a full reload or by navigating
    /// back, never retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClassroomError::MediaAccess(_)
                | ClassroomError::Validation(_)
                | ClassroomError::Network(_)
        )
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            ClassroomError::MediaAccess(e) => e.to_string(),
            ClassroomError::Validation(e) => e.to_string(),
            ClassroomError::Network(_) => {
                "Could not reach the classroom service. Retrying shortly.".to_string()
            }
            ClassroomError::Connection(_) => {
                "Could not connect to the live classroom. Reload or go back.".to_string()
            }
            ClassroomError::TimingViolation { action, .. } => {
                format!("This session cannot be {action}ed right now")
            }
            ClassroomError::PermissionDenied(_) => {
                "You do not have access to this session".to_string()
            }
            ClassroomError::SessionNotFound(_) => "Session not found".to_string(),
            ClassroomError::InvalidResponse(_)
            | ClassroomError::Config(_)
            | ClassroomError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        assert_eq!(
            ClassroomError::from(MediaAccessError::PermissionDenied).code(),
            "MEDIA_ACCESS"
        );
        assert_eq!(
            ClassroomError::from(ValidationError::EmptyDisplayName).code(),
            "VALIDATION"
        );
        assert_eq!(ClassroomError::Network("timeout".into()).code(), "NETWORK");
        assert_eq!(
            ClassroomError::Connection("script load".into()).code(),
            "CONNECTION"
        );
        assert_eq!(
            ClassroomError::TimingViolation {
                action: ClassroomAction::Join,
                reason: "upcoming".into()
            }
            .code(),
            "NOT_IN_WINDOW"
        );
        assert_eq!(ClassroomError::Internal("gone".into()).code(), "INTERNAL_ERROR");
        assert_eq!(
            ClassroomError::InvalidResponse("status".into()).code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_connection_errors_are_not_retryable() {
        assert!(!ClassroomError::Connection("engine error".into()).is_retryable());
        assert!(ClassroomError::Network("503".into()).is_retryable());
        assert!(ClassroomError::from(MediaAccessError::DeviceNotFound).is_retryable());
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let err = ClassroomError::Network(
            "GET https://portal.internal:8443/v1/sessions failed".to_string(),
        );
        assert!(!err.client_message().contains("portal.internal"));

        let err = ClassroomError::InvalidResponse("unknown status 'archived'".to_string());
        assert_eq!(err.client_message(), "An internal error occurred");
    }

    #[test]
    fn test_timing_violation_display() {
        let err = ClassroomError::TimingViolation {
            action: ClassroomAction::Start,
            reason: "upcoming".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot start session: upcoming");
        assert_eq!(
            err.client_message(),
            "This session cannot be started right now"
        );
    }
}
