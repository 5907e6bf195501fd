//! Session directory collaborator.
//!
//! The directory owns session records and their status transitions. The
//! classroom core only reads sessions and asks the directory to start or
//! join them; it never mutates a record locally.

mod http;

pub use http::HttpSessionDirectory;

use crate::errors::ClassroomError;
use crate::models::{NewSession, RoleContext, Session};
use common::types::{RoomId, SessionId};

/// Session directory operations (enables mocking).
///
/// Every call is scoped by the caller's [`RoleContext`]. Implementations
/// must reject records whose status is not one of the four known values
/// rather than passing them through.
#[async_trait::async_trait]
pub trait SessionDirectory: Send + Sync {
    /// Sessions visible to the principal, in any order.
    async fn list_sessions(&self, ctx: &RoleContext) -> Result<Vec<Session>, ClassroomError>;

    /// Schedule a new session. Instructor-only.
    async fn create_session(
        &self,
        ctx: &RoleContext,
        new_session: &NewSession,
    ) -> Result<Session, ClassroomError>;

    /// Move a scheduled session to ongoing. Instructor-only.
    async fn start_session(
        &self,
        ctx: &RoleContext,
        session_id: SessionId,
    ) -> Result<Session, ClassroomError>;

    /// Register the principal as a participant and return the room to
    /// connect to. Idempotent.
    async fn join_session(
        &self,
        ctx: &RoleContext,
        session_id: SessionId,
    ) -> Result<RoomId, ClassroomError>;
}
