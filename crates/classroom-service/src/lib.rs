//! Classroom Service Library
//!
//! Core of the campus portal's virtual classroom: decides when a scheduled
//! class may be started or joined, keeps the session lists fresh, hands
//! camera and microphone from the pre-join preview to the live meeting, and
//! translates the conferencing engine's event stream into local state.
//!
//! # Architecture
//!
//! ```text
//! SessionDiscoveryPoller (one task per principal)
//! └── SessionDirectory (HTTP collaborator)
//!
//! ClassroomView (one per entered session)
//! ├── JoinEligibilityEvaluator (pure)
//! ├── DevicePreviewManager (releases devices before the bridge starts)
//! └── MeetingBridge (actor owning the engine instance)
//! ```
//!
//! # Modules
//!
//! - [`eligibility`] - Join/start windows and display buckets
//! - [`directory`] - Session directory trait and HTTP client
//! - [`tasks`] - Session discovery poller
//! - [`devices`] - Pre-join camera/microphone preview
//! - [`bridge`] - Conferencing engine bridge and presence roster
//! - [`classroom`] - Join flow orchestration
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types with page-facing codes
//! - [`observability`] - Metrics and health endpoints

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod classroom;
pub mod config;
pub mod devices;
pub mod directory;
pub mod eligibility;
pub mod errors;
pub mod models;
pub mod observability;
pub mod tasks;
