//! Live meeting bridge.
//!
//! The bridge wraps a third-party conferencing engine behind a typed
//! observer and exposes only local, testable state.
//!
//! ```text
//! ClassroomView
//! └── MeetingBridgeHandle ──mpsc──> MeetingBridge (one task per meeting)
//!                                   ├── ConferenceEngine (owned, disposed once)
//!                                   └── PresenceRoster
//! ```

pub mod engine;
pub mod meeting_bridge;
pub mod presence;

pub use engine::{
    ConferenceEngine, ConferenceEngineLibrary, ConferenceEngineLoader, EngineCommand,
    EngineConfig, EngineError, EngineEvent, EngineOptions, SharedEngineLoader,
};
pub use meeting_bridge::{
    BridgeExit, BridgeFailure, BridgePhase, BridgeSettings, BridgeSnapshot, BridgeTarget,
    MeetingBridge, MeetingBridgeHandle, RecoveryAction,
};
pub use presence::{Presence, PresenceRoster};
