//! Session directory data model.
//!
//! `SessionRecord` is the wire shape returned by the directory; it is
//! converted into the strongly-typed [`Session`] at the boundary so that
//! unknown status strings are rejected instead of flowing into the
//! eligibility logic.

use chrono::{DateTime, Duration, Utc};
use common::types::{CourseId, PrincipalId, RoomId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle status of a classroom session.
///
/// Transitions are monotonic: `Scheduled -> Ongoing -> Completed`, or
/// `Scheduled | Ongoing -> Cancelled`. `Completed` and `Cancelled` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    /// Whether `self -> next` is a valid transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Scheduled, SessionStatus::Ongoing)
                | (SessionStatus::Ongoing, SessionStatus::Completed)
                | (
                    SessionStatus::Scheduled | SessionStatus::Ongoing,
                    SessionStatus::Cancelled
                )
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status value at the directory boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown session status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for SessionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(SessionStatus::Scheduled),
            "ongoing" => Ok(SessionStatus::Ongoing),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Portal role of the principal viewing sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Instructor,
    Student,
}

impl Role {
    /// Wire representation, also used as the directory scope.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instructor" | "faculty" => Ok(Role::Instructor),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Explicit principal context passed to every directory call and component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleContext {
    pub principal_id: PrincipalId,
    pub role: Role,
    /// Name suggested for the pre-join display-name field.
    pub display_name: String,
    pub email: Option<String>,
}

impl RoleContext {
    #[must_use]
    pub fn new(principal_id: PrincipalId, role: Role, display_name: impl Into<String>) -> Self {
        Self {
            principal_id,
            role,
            display_name: display_name.into(),
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn is_instructor(&self) -> bool {
        self.role == Role::Instructor
    }
}

/// Course reference embedded in a session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRef {
    pub id: CourseId,
    pub code: String,
    pub name: String,
}

/// Instructor reference embedded in a session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorRef {
    pub id: PrincipalId,
    pub name: String,
}

/// A scheduled real-time class instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub course: CourseRef,
    pub instructor: InstructorRef,
    pub title: String,
    pub description: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: SessionStatus,
    /// Assigned once at creation; never changes.
    pub room_id: RoomId,
    pub participant_count: u32,
}

impl Session {
    /// End of the scheduled window (`scheduled_at + duration`).
    ///
    /// Saturates at `DateTime::MAX_UTC` for sessions scheduled at the end of
    /// the representable range; such a window never closes.
    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at
            .checked_add_signed(Duration::minutes(i64::from(self.duration_minutes)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Session record as returned by the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub course: CourseRef,
    pub instructor: InstructorRef,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: String,
    pub room_id: RoomId,
    #[serde(default)]
    pub participant_count: u32,
}

impl TryFrom<SessionRecord> for Session {
    type Error = UnknownStatus;

    fn try_from(record: SessionRecord) -> Result<Self, Self::Error> {
        let status = record.status.parse::<SessionStatus>()?;
        Ok(Session {
            id: record.id,
            course: record.course,
            instructor: record.instructor,
            title: record.title,
            description: record.description,
            scheduled_at: record.scheduled_at,
            duration_minutes: record.duration_minutes,
            status,
            room_id: record.room_id,
            participant_count: record.participant_count,
        })
    }
}

/// Instructor request to schedule a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSession {
    pub course_id: CourseId,
    pub title: String,
    pub description: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
}
