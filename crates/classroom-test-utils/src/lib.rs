//! # Classroom Test Utilities
//!
//! Mocks and fixtures for testing the classroom service without a real
//! session directory, camera or conferencing engine.
//!
//! ## Modules
//!
//! - `mock_directory` - Scriptable in-memory session directory
//! - `mock_engine` - Conferencing engine loader with an event injector
//! - `mock_media` - Camera/microphone backend that counts live streams
//! - `clock` - Settable clock for eligibility tests
//! - `fixtures` - Session and role context builders
//!
//! ## Usage
//!
//! ```rust,ignore
//! use classroom_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let session = TestSession::scheduled_in(5).build();
//!     let directory = Arc::new(MockSessionDirectory::new().with_sessions(vec![session]));
//!     let (loader, probe) = MockEngineLoader::builder().auto_join().build();
//!
//!     // Run your test...
//!     assert!(probe.emit(EngineEvent::ConferenceLeft));
//! }
//! ```

pub mod clock;
pub mod fixtures;
pub mod mock_directory;
pub mod mock_engine;
pub mod mock_media;

pub use clock::*;
pub use fixtures::*;
pub use mock_directory::*;
pub use mock_engine::*;
pub use mock_media::*;
