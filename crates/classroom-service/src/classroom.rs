//! Classroom view: the join flow from an eligible session to a live bridge.
//!
//! # Flow
//!
//! 1. Eligibility is checked locally; outside the window nothing is sent
//! 2. An instructor entering a scheduled session starts it
//! 3. The directory registers the join and returns the room
//! 4. The preview releases its devices and yields the join intent
//! 5. A meeting bridge is spawned for the room
//!
//! The bridge is disposed by `leave()`. Dropping the view cancels the
//! bridge's token, so teardown still runs if the page goes away without
//! leaving.

use crate::bridge::{
    BridgeExit, BridgeSettings, BridgeSnapshot, BridgeTarget, ConferenceEngineLoader,
    EngineCommand, MeetingBridge, MeetingBridgeHandle,
};
use crate::devices::{DevicePreviewManager, JoinIntent, MediaDevices};
use crate::directory::SessionDirectory;
use crate::eligibility::{Clock, EligibilityPolicy};
use crate::errors::{ClassroomAction, ClassroomError};
use crate::models::{RoleContext, Session, SessionStatus};
use common::types::{RoomId, SessionId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Settings used when entering a classroom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassroomSettings {
    pub policy: EligibilityPolicy,
    pub bridge: BridgeSettings,
}

/// An entered classroom with its running bridge.
pub struct ClassroomView {
    session_id: SessionId,
    room_id: RoomId,
    bridge: MeetingBridgeHandle,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl ClassroomView {
    /// Enter `session` as `ctx`.
    ///
    /// The display name shown in the meeting is `ctx.display_name`.
    ///
    /// # Errors
    ///
    /// - `ClassroomError::TimingViolation` outside the join/start window (no request is sent)
    /// - `ClassroomError::Validation` for a blank display name (no request is sent)
    /// - Any directory error from starting or joining; the preview keeps its devices
    #[instrument(skip_all, fields(session_id = %session.id, role = %ctx.role))]
    pub async fn enter<D: MediaDevices>(
        directory: &dyn SessionDirectory,
        ctx: &RoleContext,
        session: &Session,
        preview: &mut DevicePreviewManager<D>,
        loader: Arc<dyn ConferenceEngineLoader>,
        settings: &ClassroomSettings,
        clock: &dyn Clock,
    ) -> Result<Self, ClassroomError> {
        let eligibility = settings.policy.evaluate(session, clock.now());
        let must_start = ctx.is_instructor() && session.status == SessionStatus::Scheduled;
        let (action, allowed) = if must_start {
            (ClassroomAction::Start, eligibility.can_start)
        } else {
            (ClassroomAction::Join, eligibility.can_join)
        };

        if !allowed {
            info!(
                target: "classroom.view",
                action = %action,
                bucket = eligibility.bucket.as_str(),
                "Refusing to enter session outside its window"
            );
            return Err(ClassroomError::TimingViolation {
                action,
                reason: eligibility.bucket.as_str().to_string(),
            });
        }

        // Checked before any request so a blank name cannot start a class.
        JoinIntent::new(&ctx.display_name, preview.video_enabled(), preview.audio_enabled())?;

        if must_start {
            let started = directory.start_session(ctx, session.id).await?;
            if started.status != SessionStatus::Ongoing {
                warn!(
                    target: "classroom.view",
                    status = %started.status,
                    "Directory did not move session to ongoing"
                );
                return Err(ClassroomError::InvalidResponse(format!(
                    "session is {} after start",
                    started.status
                )));
            }
            info!(target: "classroom.view", "Session started");
        }

        let room_id = directory.join_session(ctx, session.id).await?;
        if room_id != session.room_id {
            warn!(
                target: "classroom.view",
                expected = %session.room_id,
                actual = %room_id,
                "Directory returned a different room than the session record"
            );
        }

        let intent = preview
            .validate_and_join(&ctx.display_name)?
            .with_email(ctx.email.clone());

        let cancel_token = CancellationToken::new();
        let (bridge, task) = MeetingBridge::spawn(
            loader,
            BridgeTarget {
                session_id: session.id,
                room_id: room_id.clone(),
                intent,
            },
            settings.bridge.clone(),
            cancel_token.clone(),
        );

        info!(target: "classroom.view", room_id = %room_id, "Entered classroom");

        Ok(Self {
            session_id: session.id,
            room_id,
            bridge,
            cancel_token,
            task,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    #[must_use]
    pub fn bridge(&self) -> &MeetingBridgeHandle {
        &self.bridge
    }

    #[must_use]
    pub fn snapshot(&self) -> BridgeSnapshot {
        self.bridge.snapshot()
    }

    /// Ask the engine to hang up; the bridge terminates on the engine's
    /// "conference left" event.
    ///
    /// # Errors
    ///
    /// Returns `ClassroomError::Connection` if no engine is running.
    pub async fn hang_up(&self) -> Result<(), ClassroomError> {
        self.bridge.execute_command(EngineCommand::HangUp).await
    }

    /// Wait until the meeting ends, fails or is disposed.
    pub async fn wait_for_exit(&self) -> BridgeExit {
        self.bridge.wait_for_exit().await
    }

    /// Dispose the bridge and wait for teardown. Idempotent.
    pub async fn leave(&self) {
        self.bridge.dispose().await;
        info!(target: "classroom.view", session_id = %self.session_id, "Left classroom");
    }

    /// Whether the bridge task has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ClassroomView {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
