//! Domain models for changelog releases.
//!
//! This module contains the validated version identifier, the settings of a
//! single release run, and the persisted configuration.

mod config;
pub use config::Config;

/// Version identifiers and release settings.
pub mod release;
pub use release::{InvalidVersionError, Release, Version};
