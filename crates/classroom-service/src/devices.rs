//! Pre-join device preview.
//!
//! [`DevicePreviewManager`] owns at most one camera+microphone stream at a
//! time. Before the meeting bridge is allowed to open the same devices the
//! preview must release its stream; [`DevicePreviewManager::validate_and_join`]
//! performs that release before it hands out a [`JoinIntent`], so an intent
//! never coexists with a live preview stream.

use crate::errors::{MediaAccessError, ValidationError};
use crate::observability::metrics;
use tracing::{debug, info, warn};

/// Requested media constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

/// A live camera/microphone stream.
///
/// Implementations must stop every track in `stop()` and tolerate repeated
/// calls.
pub trait MediaStream: Send {
    fn set_audio_enabled(&mut self, enabled: bool);
    fn set_video_enabled(&mut self, enabled: bool);
    fn stop(&mut self);
}

/// Platform media backend (camera/microphone access).
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open a stream satisfying `constraints`.
    async fn open_stream(
        &self,
        constraints: MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaAccessError>;
}

/// Validated hand-off from the preview to the meeting bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinIntent {
    display_name: String,
    pub video_enabled: bool,
    pub audio_enabled: bool,
    /// Passed to the conferencing engine for avatar lookup.
    pub email: Option<String>,
}

impl JoinIntent {
    /// Build an intent, trimming the display name.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyDisplayName` if the trimmed name is empty.
    pub fn new(
        display_name: &str,
        video_enabled: bool,
        audio_enabled: bool,
    ) -> Result<Self, ValidationError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ValidationError::EmptyDisplayName);
        }
        Ok(Self {
            display_name: display_name.to_string(),
            video_enabled,
            audio_enabled,
            email: None,
        })
    }

    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    /// Trimmed, non-empty display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

fn acquire_outcome(err: &MediaAccessError) -> &'static str {
    match err {
        MediaAccessError::PermissionDenied => "permission_denied",
        MediaAccessError::DeviceNotFound => "not_found",
        MediaAccessError::DeviceBusy => "busy",
        MediaAccessError::Other(_) => "other",
    }
}

/// Exclusive owner of the preview stream.
pub struct DevicePreviewManager<D: MediaDevices> {
    devices: D,
    stream: Option<Box<dyn MediaStream>>,
    video_enabled: bool,
    audio_enabled: bool,
    error: Option<MediaAccessError>,
}

impl<D: MediaDevices> DevicePreviewManager<D> {
    /// Create a manager holding no stream, with both tracks requested on.
    pub fn new(devices: D) -> Self {
        Self {
            devices,
            stream: None,
            video_enabled: true,
            audio_enabled: true,
            error: None,
        }
    }

    /// Open camera and microphone for the preview.
    ///
    /// A no-op returning `Ok` while a stream is already held.
    ///
    /// # Errors
    ///
    /// Returns the backend's `MediaAccessError`; it is also kept in the
    /// error slot and no stream is retained.
    pub async fn acquire(&mut self) -> Result<(), MediaAccessError> {
        if self.stream.is_some() {
            debug!(target: "classroom.devices", "Preview stream already held");
            return Ok(());
        }

        match self.devices.open_stream(MediaConstraints::default()).await {
            Ok(mut stream) => {
                stream.set_video_enabled(self.video_enabled);
                stream.set_audio_enabled(self.audio_enabled);
                self.stream = Some(stream);
                self.error = None;
                metrics::record_media_acquire("success");
                info!(target: "classroom.devices", "Preview devices acquired");
                Ok(())
            }
            Err(e) => {
                metrics::record_media_acquire(acquire_outcome(&e));
                warn!(target: "classroom.devices", error = %e, "Failed to acquire preview devices");
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Enable or disable the video track in place.
    pub fn toggle_video(&mut self, on: bool) {
        self.video_enabled = on;
        if let Some(stream) = self.stream.as_mut() {
            stream.set_video_enabled(on);
        }
    }

    /// Enable or disable the audio track in place.
    pub fn toggle_audio(&mut self, on: bool) {
        self.audio_enabled = on;
        if let Some(stream) = self.stream.as_mut() {
            stream.set_audio_enabled(on);
        }
    }

    /// Stop every track of the held stream. Idempotent.
    pub fn release(&mut self) {
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop();
                info!(target: "classroom.devices", "Preview devices released");
            }
            None => {
                debug!(target: "classroom.devices", "Release with no stream held");
            }
        }
    }

    /// Validate the display name, release the preview and return the
    /// intent for the meeting bridge.
    ///
    /// The stream is kept when validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyDisplayName` for a blank name.
    pub fn validate_and_join(&mut self, display_name: &str) -> Result<JoinIntent, ValidationError> {
        let intent = JoinIntent::new(display_name, self.video_enabled, self.audio_enabled)?;
        self.release();
        Ok(intent)
    }

    /// Whether a stream is currently held.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.stream.is_some()
    }

    /// Last acquisition failure, cleared by a successful acquire.
    #[must_use]
    pub fn error(&self) -> Option<&MediaAccessError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    #[must_use]
    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }
}

impl<D: MediaDevices> Drop for DevicePreviewManager<D> {
    fn drop(&mut self) {
        self.release();
    }
}
