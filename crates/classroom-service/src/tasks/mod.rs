//! Background tasks for the classroom core.
//!
//! # Tasks
//!
//! - `discovery_poller` - Keeps the live/upcoming/past session lists fresh

pub mod discovery_poller;

pub use discovery_poller::{
    partition_sessions, DiscoveryView, EvaluatedSession, PollFailure, PollerSettings,
    SessionDiscoveryPoller,
};
