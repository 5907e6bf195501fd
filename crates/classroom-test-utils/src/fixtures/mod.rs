//! Pre-configured test data for classroom tests.
//!
//! Times are relative to [`base_time`] so tests can pair a fixture with a
//! `FixedClock` set to the same instant.

use chrono::{DateTime, Duration, TimeZone, Utc};
use classroom_service::models::{
    CourseRef, InstructorRef, Role, RoleContext, Session, SessionStatus,
};
use common::types::{CourseId, PrincipalId, RoomId, SessionId};
use serde_json::{json, Value};

/// Fixed "now" used by fixtures: Monday 2026-03-02 09:00 UTC.
#[must_use]
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

/// Instructor context with a random principal.
#[must_use]
pub fn instructor_ctx() -> RoleContext {
    RoleContext::new(PrincipalId::new(), Role::Instructor, "Prof. Ada Lovelace")
        .with_email("ada@example.edu")
}

/// Student context with a random principal.
#[must_use]
pub fn student_ctx() -> RoleContext {
    RoleContext::new(PrincipalId::new(), Role::Student, "Grace Hopper")
}

/// Test session builder.
#[derive(Debug, Clone)]
pub struct TestSession {
    id: SessionId,
    title: String,
    scheduled_at: DateTime<Utc>,
    duration_minutes: u32,
    status: SessionStatus,
    room_id: Option<RoomId>,
    participant_count: u32,
}

impl TestSession {
    /// Scheduled session starting `minutes` after [`base_time`] (negative for past).
    #[must_use]
    pub fn scheduled_in(minutes: i64) -> Self {
        Self {
            id: SessionId::new(),
            title: "Algorithms Lecture".to_string(),
            scheduled_at: base_time() + Duration::minutes(minutes),
            duration_minutes: 60,
            status: SessionStatus::Scheduled,
            room_id: None,
            participant_count: 0,
        }
    }

    /// Ongoing session that started 10 minutes before [`base_time`].
    #[must_use]
    pub fn ongoing() -> Self {
        Self::scheduled_in(-10).with_status(SessionStatus::Ongoing)
    }

    #[must_use]
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room_id = Some(RoomId(room.into()));
        self
    }

    #[must_use]
    pub fn with_participants(mut self, count: u32) -> Self {
        self.participant_count = count;
        self
    }

    #[must_use]
    pub fn build(self) -> Session {
        let room_id = self
            .room_id
            .unwrap_or_else(|| RoomId(format!("classroom-{}", self.id)));
        Session {
            id: self.id,
            course: CourseRef {
                id: CourseId::new(),
                code: "CS201".to_string(),
                name: "Data Structures and Algorithms".to_string(),
            },
            instructor: InstructorRef {
                id: PrincipalId::new(),
                name: "Prof. Ada Lovelace".to_string(),
            },
            title: self.title,
            description: "Weekly lecture".to_string(),
            scheduled_at: self.scheduled_at,
            duration_minutes: self.duration_minutes,
            status: self.status,
            room_id,
            participant_count: self.participant_count,
        }
    }
}

/// Directory wire record for `session`.
#[must_use]
pub fn session_json(session: &Session) -> Value {
    session_json_with_status(session, session.status.as_str())
}

/// Directory wire record for `session` with a raw status string.
#[must_use]
pub fn session_json_with_status(session: &Session, status: &str) -> Value {
    json!({
        "id": session.id,
        "course": {
            "id": session.course.id,
            "code": session.course.code,
            "name": session.course.name,
        },
        "instructor": {
            "id": session.instructor.id,
            "name": session.instructor.name,
        },
        "title": session.title,
        "description": session.description,
        "scheduled_at": session.scheduled_at.to_rfc3339(),
        "duration_minutes": session.duration_minutes,
        "status": status,
        "room_id": session.room_id,
        "participant_count": session.participant_count,
    })
}
