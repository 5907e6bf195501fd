//! Mock camera/microphone backend.
//!
//! Every stream shares a [`MediaProbe`] that counts live streams, so tests
//! can assert exclusive ownership of the devices.

use async_trait::async_trait;
use classroom_service::devices::{MediaConstraints, MediaDevices, MediaStream};
use classroom_service::errors::MediaAccessError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared counters for the mock backend.
#[derive(Debug, Default)]
pub struct MediaProbe {
    opens: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    stops: AtomicUsize,
    audio_toggles: Mutex<Vec<bool>>,
    video_toggles: Mutex<Vec<bool>>,
}

impl MediaProbe {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet stopped.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of streams ever live at once.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn audio_toggles(&self) -> Vec<bool> {
        self.audio_toggles.lock().unwrap().clone()
    }

    pub fn video_toggles(&self) -> Vec<bool> {
        self.video_toggles.lock().unwrap().clone()
    }
}

/// Mock media backend.
#[derive(Debug, Clone)]
pub struct MockMediaDevices {
    probe: Arc<MediaProbe>,
    failure: Arc<Mutex<Option<MediaAccessError>>>,
}

impl MockMediaDevices {
    /// Backend that grants every request.
    #[must_use]
    pub fn granting() -> (Self, Arc<MediaProbe>) {
        let probe = Arc::new(MediaProbe::default());
        let devices = Self {
            probe: Arc::clone(&probe),
            failure: Arc::new(Mutex::new(None)),
        };
        (devices, probe)
    }

    /// Backend that fails every request with `err` until [`Self::grant`].
    #[must_use]
    pub fn failing(err: MediaAccessError) -> (Self, Arc<MediaProbe>) {
        let (devices, probe) = Self::granting();
        *devices.failure.lock().unwrap() = Some(err);
        (devices, probe)
    }

    /// Start granting requests (the user fixed OS permissions).
    pub fn grant(&self) {
        *self.failure.lock().unwrap() = None;
    }
}

#[async_trait]
impl MediaDevices for MockMediaDevices {
    async fn open_stream(
        &self,
        _constraints: MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaAccessError> {
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }

        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        let live = self.probe.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(MockStream {
            probe: Arc::clone(&self.probe),
            stopped: AtomicBool::new(false),
        }))
    }
}

struct MockStream {
    probe: Arc<MediaProbe>,
    stopped: AtomicBool,
}

impl MediaStream for MockStream {
    fn set_audio_enabled(&mut self, enabled: bool) {
        self.probe.audio_toggles.lock().unwrap().push(enabled);
    }

    fn set_video_enabled(&mut self, enabled: bool) {
        self.probe.video_toggles.lock().unwrap().push(enabled);
    }

    fn stop(&mut self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.probe.live.fetch_sub(1, Ordering::SeqCst);
            self.probe.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}
