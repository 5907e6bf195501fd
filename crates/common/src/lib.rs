//! Common utilities and types shared across the campus portal classroom crates.

#![warn(clippy::pedantic)]

/// Module for identifier newtypes
pub mod types;

/// Module for common configuration
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;
