//! In-memory session directory.
//!
//! Tracks how many list calls are in flight at once so tests can assert
//! the poller never overlaps fetches. Failures are scripted per call.

use classroom_service::directory::SessionDirectory;
use classroom_service::errors::ClassroomError;
use classroom_service::models::{NewSession, RoleContext, Session, SessionStatus};
use common::types::{RoomId, SessionId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Mock session directory.
#[derive(Debug, Default)]
pub struct MockSessionDirectory {
    sessions: Mutex<Vec<Session>>,
    list_delay: Duration,
    list_failures: Mutex<VecDeque<ClassroomError>>,
    start_failure: Mutex<Option<ClassroomError>>,
    join_failure: Mutex<Option<ClassroomError>>,
    list_calls: AtomicUsize,
    start_calls: AtomicUsize,
    join_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Decrements the in-flight counter even when the call is cancelled.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockSessionDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions returned by `list_sessions`.
    #[must_use]
    pub fn with_sessions(self, sessions: Vec<Session>) -> Self {
        *self.sessions.lock().unwrap() = sessions;
        self
    }

    /// Delay every `list_sessions` call (virtual time under `start_paused`).
    #[must_use]
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    /// Replace the stored sessions.
    pub fn set_sessions(&self, sessions: Vec<Session>) {
        *self.sessions.lock().unwrap() = sessions;
    }

    /// Fail the next `list_sessions` call with `err`.
    pub fn fail_next_list(&self, err: ClassroomError) {
        self.list_failures.lock().unwrap().push_back(err);
    }

    /// Fail the next `start_session` call with `err`.
    pub fn fail_next_start(&self, err: ClassroomError) {
        *self.start_failure.lock().unwrap() = Some(err);
    }

    /// Fail the next `join_session` call with `err`.
    pub fn fail_next_join(&self, err: ClassroomError) {
        *self.join_failure.lock().unwrap() = Some(err);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn join_calls(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `list_sessions` calls ever running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of calls of any kind made so far.
    pub fn total_calls(&self) -> usize {
        self.list_calls() + self.start_calls() + self.join_calls()
    }

    fn find(&self, session_id: SessionId) -> Result<Session, ClassroomError> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or_else(|| ClassroomError::SessionNotFound("session does not exist".to_string()))
    }
}

#[async_trait::async_trait]
impl SessionDirectory for MockSessionDirectory {
    async fn list_sessions(&self, _ctx: &RoleContext) -> Result<Vec<Session>, ClassroomError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }

        if let Some(err) = self.list_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn create_session(
        &self,
        ctx: &RoleContext,
        new_session: &NewSession,
    ) -> Result<Session, ClassroomError> {
        if !ctx.is_instructor() {
            return Err(ClassroomError::PermissionDenied(
                "only instructors may create sessions".to_string(),
            ));
        }

        let mut session = crate::fixtures::TestSession::scheduled_in(0)
            .with_title(new_session.title.clone())
            .with_duration(new_session.duration_minutes)
            .build();
        session.course.id = new_session.course_id;
        session.description = new_session.description.clone();
        session.scheduled_at = new_session.scheduled_at;

        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn start_session(
        &self,
        _ctx: &RoleContext,
        session_id: SessionId,
    ) -> Result<Session, ClassroomError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.start_failure.lock().unwrap().take() {
            return Err(err);
        }

        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| ClassroomError::SessionNotFound("session does not exist".to_string()))?;
        if session.status.can_transition_to(SessionStatus::Ongoing) {
            session.status = SessionStatus::Ongoing;
        }
        Ok(session.clone())
    }

    async fn join_session(
        &self,
        _ctx: &RoleContext,
        session_id: SessionId,
    ) -> Result<RoomId, ClassroomError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.join_failure.lock().unwrap().take() {
            return Err(err);
        }
        Ok(self.find(session_id)?.room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{instructor_ctx, TestSession};

    #[tokio::test]
    async fn test_scripted_list_failure_is_consumed_once() {
        let directory =
            MockSessionDirectory::new().with_sessions(vec![TestSession::scheduled_in(5).build()]);
        directory.fail_next_list(ClassroomError::Network("down".to_string()));

        let ctx = instructor_ctx();
        assert!(directory.list_sessions(&ctx).await.is_err());
        assert_eq!(directory.list_sessions(&ctx).await.unwrap().len(), 1);
        assert_eq!(directory.list_calls(), 2);
        assert_eq!(directory.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_start_moves_session_to_ongoing() {
        let session = TestSession::scheduled_in(5).build();
        let id = session.id;
        let directory = MockSessionDirectory::new().with_sessions(vec![session]);

        let started = directory.start_session(&instructor_ctx(), id).await.unwrap();
        assert_eq!(started.status, SessionStatus::Ongoing);
    }
}
