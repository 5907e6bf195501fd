//! Conferencing engine seam.
//!
//! The engine itself is third-party; these traits describe the narrow
//! surface the bridge drives. A loader fetches the engine library, the
//! library constructs one engine per room, and the engine emits lifecycle
//! events through a channel handed out by `subscribe()`. Dropping that
//! receiver revokes the subscription.

use common::types::ParticipantId;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, OnceCell};
use tracing::debug;

/// Engine failures reported through the seam.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine library failed to load: {0}")]
    Load(String),

    #[error("engine could not create the room: {0}")]
    Create(String),

    #[error("engine rejected command: {0}")]
    Command(String),
}

/// Engine construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub room_name: String,
    pub display_name: String,
    pub email: Option<String>,
    pub config: EngineConfig,
}

/// Engine-level configuration derived from the join intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Host serving the conferencing engine.
    pub domain: String,
    pub start_audio_muted: bool,
    pub start_video_muted: bool,
}

/// Lifecycle events emitted by an engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The local participant is in the conference.
    ConferenceJoined,
    ParticipantJoined {
        id: ParticipantId,
        display_name: String,
    },
    ParticipantLeft {
        id: ParticipantId,
    },
    /// The local participant left (hang-up or kicked).
    ConferenceLeft,
    /// The engine finished its own teardown and may be closed.
    ReadyToClose,
    Error {
        message: String,
    },
}

impl EngineEvent {
    /// Event name used in logs and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            EngineEvent::ConferenceJoined => "conference_joined",
            EngineEvent::ParticipantJoined { .. } => "participant_joined",
            EngineEvent::ParticipantLeft { .. } => "participant_left",
            EngineEvent::ConferenceLeft => "conference_left",
            EngineEvent::ReadyToClose => "ready_to_close",
            EngineEvent::Error { .. } => "error",
        }
    }
}

/// Commands forwarded to a running engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    HangUp,
    ToggleAudio,
    ToggleVideo,
}

impl EngineCommand {
    /// Engine command name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EngineCommand::HangUp => "hangup",
            EngineCommand::ToggleAudio => "toggleAudio",
            EngineCommand::ToggleVideo => "toggleVideo",
        }
    }
}

/// One running engine instance bound to a room.
pub trait ConferenceEngine: Send {
    /// Start receiving lifecycle events. Called once per instance.
    fn subscribe(&mut self) -> mpsc::Receiver<EngineEvent>;

    /// Forward a command to the engine.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Command` if the engine refuses the command.
    fn execute_command(&self, command: EngineCommand) -> Result<(), EngineError>;

    /// Tear the instance down and release its devices.
    fn dispose(&mut self);
}

/// Loaded engine library; constructs engine instances.
#[async_trait::async_trait]
pub trait ConferenceEngineLibrary: Send + Sync {
    async fn create(
        &self,
        options: EngineOptions,
    ) -> Result<Box<dyn ConferenceEngine>, EngineError>;
}

/// Fetches the engine library.
///
/// Implementations must be idempotent: repeated calls after a success
/// return the same library without fetching it again.
#[async_trait::async_trait]
pub trait ConferenceEngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn ConferenceEngineLibrary>, EngineError>;
}

/// Wraps a loader so the library is fetched at most once per process.
///
/// Failed loads are not cached; the next call tries again.
pub struct SharedEngineLoader<L> {
    inner: L,
    library: OnceCell<Arc<dyn ConferenceEngineLibrary>>,
}

impl<L: ConferenceEngineLoader> SharedEngineLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            library: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.library.initialized()
    }
}

#[async_trait::async_trait]
impl<L: ConferenceEngineLoader> ConferenceEngineLoader for SharedEngineLoader<L> {
    async fn load(&self) -> Result<Arc<dyn ConferenceEngineLibrary>, EngineError> {
        let library = self
            .library
            .get_or_try_init(|| async {
                debug!(target: "classroom.bridge", "Fetching conferencing engine library");
                self.inner.load().await
            })
            .await?;
        Ok(Arc::clone(library))
    }
}
