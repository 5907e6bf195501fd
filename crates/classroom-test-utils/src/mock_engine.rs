//! Mock conferencing engine.
//!
//! [`MockEngineLoader::builder`] returns a builder; `build()` yields the loader
//! and an [`EngineProbe`] through which tests inject engine events and
//! observe load, create, command and dispose calls.

use async_trait::async_trait;
use classroom_service::bridge::{
    ConferenceEngine, ConferenceEngineLibrary, ConferenceEngineLoader, EngineCommand,
    EngineError, EngineEvent, EngineOptions,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Event channel capacity per engine instance.
const EVENT_BUFFER: usize = 64;

/// Observation and injection point for mock engines.
#[derive(Debug, Default)]
pub struct EngineProbe {
    load_calls: AtomicUsize,
    create_calls: AtomicUsize,
    dispose_calls: AtomicUsize,
    commands: Mutex<Vec<EngineCommand>>,
    last_options: Mutex<Option<EngineOptions>>,
    event_tx: Mutex<Option<mpsc::Sender<EngineEvent>>>,
}

impl EngineProbe {
    /// Emit an event from the engine.
    ///
    /// Returns `false` when nobody is subscribed any more (the bridge
    /// revoked its subscription) or no engine exists yet.
    pub fn emit(&self, event: EngineEvent) -> bool {
        match self.event_tx.lock().unwrap().as_ref() {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Whether an engine instance currently has a live subscriber.
    pub fn has_subscriber(&self) -> bool {
        self.event_tx
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn dispose_calls(&self) -> usize {
        self.dispose_calls.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<EngineCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Options passed to the most recent `create`.
    pub fn last_options(&self) -> Option<EngineOptions> {
        self.last_options.lock().unwrap().clone()
    }
}

/// Behaviour shared by the loader, library and engines.
#[derive(Debug, Clone, Default)]
struct Script {
    load_delay: Duration,
    load_failure: Option<String>,
    create_delay: Duration,
    create_failure: Option<String>,
    auto_join: bool,
}

/// Builder for [`MockEngineLoader`].
#[derive(Debug, Default)]
pub struct MockEngineLoaderBuilder {
    script: Script,
}

impl MockEngineLoaderBuilder {
    /// Emit `ConferenceJoined` as soon as the bridge subscribes.
    #[must_use]
    pub fn auto_join(mut self) -> Self {
        self.script.auto_join = true;
        self
    }

    #[must_use]
    pub fn load_delay(mut self, delay: Duration) -> Self {
        self.script.load_delay = delay;
        self
    }

    #[must_use]
    pub fn failing_load(mut self, message: impl Into<String>) -> Self {
        self.script.load_failure = Some(message.into());
        self
    }

    #[must_use]
    pub fn create_delay(mut self, delay: Duration) -> Self {
        self.script.create_delay = delay;
        self
    }

    #[must_use]
    pub fn failing_create(mut self, message: impl Into<String>) -> Self {
        self.script.create_failure = Some(message.into());
        self
    }

    #[must_use]
    pub fn build(self) -> (Arc<MockEngineLoader>, Arc<EngineProbe>) {
        let probe = Arc::new(EngineProbe::default());
        let loader = Arc::new(MockEngineLoader {
            script: self.script,
            probe: Arc::clone(&probe),
        });
        (loader, probe)
    }
}

/// Mock engine loader.
#[derive(Debug)]
pub struct MockEngineLoader {
    script: Script,
    probe: Arc<EngineProbe>,
}

impl MockEngineLoader {
    /// Create a new `MockEngineLoader` builder.
    #[must_use]
    pub fn builder() -> MockEngineLoaderBuilder {
        MockEngineLoaderBuilder::default()
    }
}

#[async_trait]
impl ConferenceEngineLoader for MockEngineLoader {
    async fn load(&self) -> Result<Arc<dyn ConferenceEngineLibrary>, EngineError> {
        self.probe.load_calls.fetch_add(1, Ordering::SeqCst);
        if !self.script.load_delay.is_zero() {
            tokio::time::sleep(self.script.load_delay).await;
        }
        if let Some(message) = &self.script.load_failure {
            return Err(EngineError::Load(message.clone()));
        }
        Ok(Arc::new(MockLibrary {
            script: self.script.clone(),
            probe: Arc::clone(&self.probe),
        }))
    }
}

struct MockLibrary {
    script: Script,
    probe: Arc<EngineProbe>,
}

#[async_trait]
impl ConferenceEngineLibrary for MockLibrary {
    async fn create(
        &self,
        options: EngineOptions,
    ) -> Result<Box<dyn ConferenceEngine>, EngineError> {
        self.probe.create_calls.fetch_add(1, Ordering::SeqCst);
        *self.probe.last_options.lock().unwrap() = Some(options);

        if !self.script.create_delay.is_zero() {
            tokio::time::sleep(self.script.create_delay).await;
        }
        if let Some(message) = &self.script.create_failure {
            return Err(EngineError::Create(message.clone()));
        }
        Ok(Box::new(MockEngine {
            auto_join: self.script.auto_join,
            probe: Arc::clone(&self.probe),
            event_tx: None,
        }))
    }
}

struct MockEngine {
    auto_join: bool,
    probe: Arc<EngineProbe>,
    event_tx: Option<mpsc::Sender<EngineEvent>>,
}

impl ConferenceEngine for MockEngine {
    fn subscribe(&mut self) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        if self.auto_join {
            tx.try_send(EngineEvent::ConferenceJoined).unwrap();
        }
        *self.probe.event_tx.lock().unwrap() = Some(tx.clone());
        self.event_tx = Some(tx);
        rx
    }

    fn execute_command(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.probe.commands.lock().unwrap().push(command);
        // A real engine answers a hang-up with "conference left".
        if command == EngineCommand::HangUp {
            if let Some(tx) = &self.event_tx {
                let _ = tx.try_send(EngineEvent::ConferenceLeft);
            }
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.probe.dispose_calls.fetch_add(1, Ordering::SeqCst);
        self.event_tx = None;
    }
}
