//! `MeetingBridge` - actor owning one conferencing engine instance.
//!
//! Each bridge:
//! - Loads the engine library and creates the room (both time-bounded)
//! - Relays engine events into a local state machine and presence roster
//! - Forwards hang-up and mute commands while an engine exists
//! - Disposes the engine exactly once
//!
//! # States
//!
//! ```text
//! Uninitialized -> LoadingEngine -> CreatingRoom -> Active -> Terminated
//!                       |               |
//!                       +----> Error <--+
//! ```
//!
//! Engine errors also move an active bridge to `Error`. Connection errors
//! are never retried; the page offers reload or navigate-back.
//!
//! # Teardown
//!
//! Teardown runs when the bridge is disposed, when its cancellation token
//! fires, or when every handle has been dropped. It drops the event
//! receiver (revoking the subscription), disposes the engine and finalizes
//! open presences. Once `disposed` is published no event mutates state.

use super::engine::{
    ConferenceEngine, ConferenceEngineLoader, EngineCommand, EngineConfig, EngineError,
    EngineEvent, EngineOptions,
};
use super::presence::{Presence, PresenceRoster};
use crate::devices::JoinIntent;
use crate::errors::ClassroomError;
use crate::observability::metrics;
use chrono::Utc;
use common::types::{RoomId, SessionId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Channel buffer size for the bridge mailbox.
const BRIDGE_CHANNEL_BUFFER: usize = 32;

/// Bridge timing and engine host settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub engine_domain: String,
    /// Upper bound on fetching the engine library.
    pub engine_load_timeout: Duration,
    /// Upper bound on room creation plus the wait for "conference joined".
    pub room_join_timeout: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            engine_domain: crate::config::DEFAULT_ENGINE_DOMAIN.to_string(),
            engine_load_timeout: Duration::from_secs(
                crate::config::DEFAULT_ENGINE_LOAD_TIMEOUT_SECONDS,
            ),
            room_join_timeout: Duration::from_secs(crate::config::DEFAULT_ROOM_JOIN_TIMEOUT_SECONDS),
        }
    }
}

/// Bridge lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgePhase {
    Uninitialized,
    LoadingEngine,
    CreatingRoom,
    Active,
    Terminated,
    Error,
}

impl BridgePhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            BridgePhase::Uninitialized => "uninitialized",
            BridgePhase::LoadingEngine => "loading_engine",
            BridgePhase::CreatingRoom => "creating_room",
            BridgePhase::Active => "active",
            BridgePhase::Terminated => "terminated",
            BridgePhase::Error => "error",
        }
    }

    /// `Terminated` and `Error` accept no further events.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, BridgePhase::Terminated | BridgePhase::Error)
    }
}

/// Recovery actions offered next to a bridge error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Reload,
    NavigateBack,
}

/// Error shown by the meeting page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeFailure {
    pub message: String,
    pub recovery: Vec<RecoveryAction>,
}

impl BridgeFailure {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recovery: vec![RecoveryAction::Reload, RecoveryAction::NavigateBack],
        }
    }
}

/// State published to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSnapshot {
    pub phase: BridgePhase,
    /// Local participant plus active remote presences.
    pub participant_count: u32,
    pub error: Option<BridgeFailure>,
    /// Set once teardown has completed.
    pub disposed: bool,
}

impl Default for BridgeSnapshot {
    fn default() -> Self {
        Self {
            phase: BridgePhase::Uninitialized,
            participant_count: 1,
            error: None,
            disposed: false,
        }
    }
}

/// How a bridge ended, from the page's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeExit {
    /// The conference ended normally; leave the meeting page.
    NavigateAway,
    /// The bridge failed; show the error with its recovery actions.
    Failed,
    /// The bridge was disposed before reaching a terminal state.
    Disposed,
}

/// Mailbox messages.
enum BridgeMessage {
    ExecuteCommand {
        command: EngineCommand,
        respond_to: oneshot::Sender<Result<(), ClassroomError>>,
    },
    GetRoster {
        respond_to: oneshot::Sender<Vec<Presence>>,
    },
}

/// Handle to a `MeetingBridge`.
#[derive(Clone)]
pub struct MeetingBridgeHandle {
    sender: mpsc::Sender<BridgeMessage>,
    cancel_token: CancellationToken,
    state_rx: watch::Receiver<BridgeSnapshot>,
    disposing: Arc<AtomicBool>,
    session_id: SessionId,
}

impl MeetingBridgeHandle {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> BridgeSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BridgeSnapshot> {
        self.state_rx.clone()
    }

    /// Forward a command to the engine.
    ///
    /// # Errors
    ///
    /// - `ClassroomError::Connection` if no engine exists or it refused the command
    /// - `ClassroomError::Internal` if the bridge has shut down
    pub async fn execute_command(&self, command: EngineCommand) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(BridgeMessage::ExecuteCommand {
                command,
                respond_to: tx,
            })
            .await
            .map_err(|e| ClassroomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| ClassroomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Presences recorded so far, including finalized ones.
    ///
    /// # Errors
    ///
    /// Returns `ClassroomError::Internal` if the bridge has shut down.
    pub async fn roster(&self) -> Result<Vec<Presence>, ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(BridgeMessage::GetRoster { respond_to: tx })
            .await
            .map_err(|e| ClassroomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| ClassroomError::Internal(format!("response receive failed: {e}")))
    }

    /// Tear the bridge down and wait for teardown to finish. Idempotent.
    pub async fn dispose(&self) {
        if self.disposing.swap(true, Ordering::SeqCst) {
            debug!(target: "classroom.bridge", session_id = %self.session_id, "Bridge already disposing");
        }
        self.cancel_token.cancel();

        let mut state_rx = self.state_rx.clone();
        // A closed channel means the actor is gone, which also means torn down.
        let _ = state_rx.wait_for(|s| s.disposed).await;
    }

    /// Wait until the bridge terminates, fails or is disposed.
    pub async fn wait_for_exit(&self) -> BridgeExit {
        let mut state_rx = self.state_rx.clone();
        let snapshot = match state_rx
            .wait_for(|s| s.disposed || s.phase.is_terminal())
            .await
        {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => return BridgeExit::Disposed,
        };

        match snapshot.phase {
            BridgePhase::Terminated => BridgeExit::NavigateAway,
            BridgePhase::Error => BridgeExit::Failed,
            _ => BridgeExit::Disposed,
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state_rx.borrow().disposed
    }
}

/// What the bridge connects to.
#[derive(Debug, Clone)]
pub struct BridgeTarget {
    pub session_id: SessionId,
    pub room_id: RoomId,
    pub intent: JoinIntent,
}

/// The `MeetingBridge` actor.
pub struct MeetingBridge {
    target: BridgeTarget,
    settings: BridgeSettings,
    loader: Arc<dyn ConferenceEngineLoader>,
    receiver: mpsc::Receiver<BridgeMessage>,
    cancel_token: CancellationToken,
    state_tx: watch::Sender<BridgeSnapshot>,
    engine: Option<Box<dyn ConferenceEngine>>,
    events: Option<mpsc::Receiver<EngineEvent>>,
    roster: PresenceRoster,
    /// Deadline for "conference joined" while in `CreatingRoom`.
    join_deadline: Option<Instant>,
    started_at: Instant,
}

/// Outcome of loading and creating.
enum Startup {
    Created,
    Cancelled,
    Failed(BridgeFailure),
}

impl MeetingBridge {
    /// Spawn a bridge actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        loader: Arc<dyn ConferenceEngineLoader>,
        target: BridgeTarget,
        settings: BridgeSettings,
        cancel_token: CancellationToken,
    ) -> (MeetingBridgeHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(BRIDGE_CHANNEL_BUFFER);
        let (state_tx, state_rx) = watch::channel(BridgeSnapshot::default());
        let session_id = target.session_id;

        let actor = Self {
            roster: PresenceRoster::new(session_id),
            target,
            settings,
            loader,
            receiver,
            cancel_token: cancel_token.clone(),
            state_tx,
            engine: None,
            events: None,
            join_deadline: None,
            started_at: Instant::now(),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = MeetingBridgeHandle {
            sender,
            cancel_token,
            state_rx,
            disposing: Arc::new(AtomicBool::new(false)),
            session_id,
        };

        (handle, task_handle)
    }

    #[instrument(
        skip_all,
        name = "classroom.actor.bridge",
        fields(session_id = %self.target.session_id, room_id = %self.target.room_id)
    )]
    async fn run(mut self) {
        debug!(target: "classroom.bridge", "MeetingBridge started");

        match self.start().await {
            Startup::Created => self.event_loop().await,
            Startup::Cancelled => {}
            Startup::Failed(failure) => {
                self.fail(failure);
                self.event_loop().await;
            }
        }

        self.teardown();
        debug!(target: "classroom.bridge", "MeetingBridge stopped");
    }

    /// Load the library and create the room, racing cancellation.
    async fn start(&mut self) -> Startup {
        self.set_phase(BridgePhase::LoadingEngine);

        let loaded = tokio::select! {
            biased;
            () = self.cancel_token.cancelled() => return Startup::Cancelled,
            result = tokio::time::timeout(self.settings.engine_load_timeout, self.loader.load()) => result,
        };

        let library = match loaded {
            Ok(Ok(library)) => library,
            Ok(Err(e)) => {
                warn!(target: "classroom.bridge", error = %e, "Engine library failed to load");
                return Startup::Failed(BridgeFailure::new("The meeting could not be loaded"));
            }
            Err(_) => {
                warn!(
                    target: "classroom.bridge",
                    timeout_secs = self.settings.engine_load_timeout.as_secs(),
                    "Engine library load timed out"
                );
                return Startup::Failed(BridgeFailure::new("The meeting took too long to load"));
            }
        };

        self.set_phase(BridgePhase::CreatingRoom);
        let deadline = Instant::now() + self.settings.room_join_timeout;
        self.join_deadline = Some(deadline);

        let options = self.engine_options();
        let created = tokio::select! {
            biased;
            () = self.cancel_token.cancelled() => return Startup::Cancelled,
            result = tokio::time::timeout_at(deadline, library.create(options)) => result,
        };

        match created {
            Ok(Ok(mut engine)) => {
                self.events = Some(engine.subscribe());
                self.engine = Some(engine);
                metrics::bridge_engine_created();
                Startup::Created
            }
            Ok(Err(e)) => {
                warn!(target: "classroom.bridge", error = %e, "Engine could not create the room");
                Startup::Failed(BridgeFailure::new("Could not connect to the meeting room"))
            }
            Err(_) => {
                warn!(target: "classroom.bridge", "Room creation timed out");
                Startup::Failed(BridgeFailure::new("Connecting to the meeting timed out"))
            }
        }
    }

    fn engine_options(&self) -> EngineOptions {
        let intent = &self.target.intent;
        EngineOptions {
            room_name: self.target.room_id.as_str().to_string(),
            display_name: intent.display_name().to_string(),
            email: intent.email.clone(),
            config: EngineConfig {
                domain: self.settings.engine_domain.clone(),
                start_audio_muted: !intent.audio_enabled,
                start_video_muted: !intent.video_enabled,
            },
        }
    }

    /// Relay events and serve the mailbox until cancelled or orphaned.
    async fn event_loop(&mut self) {
        loop {
            let join_deadline = self.join_deadline;

            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    debug!(target: "classroom.bridge", "MeetingBridge received cancellation signal");
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!(target: "classroom.bridge", "All bridge handles dropped, tearing down");
                            break;
                        }
                    }
                }

                event = next_event(&mut self.events) => {
                    match event {
                        Some(event) => self.relay(event),
                        None => {
                            debug!(target: "classroom.bridge", "Engine event stream closed");
                            self.events = None;
                        }
                    }
                }

                () = sleep_until_deadline(join_deadline) => {
                    warn!(target: "classroom.bridge", "Timed out waiting to join the conference");
                    self.fail(BridgeFailure::new("Connecting to the meeting timed out"));
                }
            }
        }
    }

    fn handle_message(&mut self, message: BridgeMessage) {
        match message {
            BridgeMessage::ExecuteCommand {
                command,
                respond_to,
            } => {
                let result = match &self.engine {
                    Some(engine) => engine.execute_command(command).map_err(|e| {
                        warn!(target: "classroom.bridge", command = command.as_str(), error = %e, "Engine command failed");
                        ClassroomError::Connection(e.to_string())
                    }),
                    None => Err(ClassroomError::Connection(
                        "meeting engine is not running".to_string(),
                    )),
                };
                let _ = respond_to.send(result);
            }
            BridgeMessage::GetRoster { respond_to } => {
                let _ = respond_to.send(self.roster.entries().to_vec());
            }
        }
    }

    fn relay(&mut self, event: EngineEvent) {
        let kind = event.kind();
        let phase = self.state_tx.borrow().phase;

        if phase.is_terminal() {
            debug!(target: "classroom.bridge", event = kind, phase = phase.as_str(), "Dropping event after terminal state");
            metrics::record_engine_event(kind, "dropped");
            return;
        }
        metrics::record_engine_event(kind, "relayed");

        match event {
            EngineEvent::ConferenceJoined => {
                if phase == BridgePhase::CreatingRoom {
                    self.join_deadline = None;
                    metrics::record_bridge_connect_duration(self.started_at.elapsed());
                    self.set_phase(BridgePhase::Active);
                    info!(target: "classroom.bridge", "Joined conference");
                }
            }
            EngineEvent::ParticipantJoined { id, display_name } => {
                debug!(target: "classroom.bridge", participant_id = %id, "Participant joined");
                self.roster.join(id, display_name, Utc::now());
                self.publish_count();
            }
            EngineEvent::ParticipantLeft { id } => {
                debug!(target: "classroom.bridge", participant_id = %id, "Participant left");
                self.roster.leave(&id, Utc::now());
                self.publish_count();
            }
            EngineEvent::ConferenceLeft | EngineEvent::ReadyToClose => {
                self.join_deadline = None;
                info!(target: "classroom.bridge", event = kind, "Conference ended");
                self.set_phase(BridgePhase::Terminated);
            }
            EngineEvent::Error { message } => {
                warn!(target: "classroom.bridge", error = %message, "Engine reported an error");
                self.fail(BridgeFailure::new("The meeting connection failed"));
            }
        }
    }

    fn set_phase(&self, phase: BridgePhase) {
        metrics::record_bridge_transition(phase.as_str());
        self.state_tx.send_modify(|s| s.phase = phase);
    }

    fn fail(&mut self, failure: BridgeFailure) {
        self.join_deadline = None;
        metrics::record_bridge_transition(BridgePhase::Error.as_str());
        self.state_tx.send_modify(|s| {
            s.phase = BridgePhase::Error;
            s.error = Some(failure);
        });
    }

    fn publish_count(&self) {
        let count = self.roster.participant_count();
        self.state_tx.send_modify(|s| s.participant_count = count);
    }

    /// Revoke the subscription, dispose the engine, finalize presences.
    fn teardown(&mut self) {
        self.events = None;
        self.join_deadline = None;

        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
            metrics::bridge_engine_disposed();
            info!(target: "classroom.bridge", "Engine disposed");
        }

        let closed = self.roster.finalize_all(Utc::now());
        if closed > 0 {
            debug!(target: "classroom.bridge", closed, "Finalized open presences");
        }

        let count = self.roster.participant_count();
        self.state_tx.send_modify(|s| {
            s.participant_count = count;
            s.disposed = true;
        });
    }
}

/// Next engine event, or pending forever once the subscription is gone.
async fn next_event(events: &mut Option<mpsc::Receiver<EngineEvent>>) -> Option<EngineEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Map a load or create failure surfaced outside the actor.
impl From<EngineError> for ClassroomError {
    fn from(err: EngineError) -> Self {
        ClassroomError::Connection(err.to_string())
    }
}
