//! Release tagging for XML database-migration changelogs
//!
//! A master changelog includes other changelogs. Releasing a version freezes
//! every included changelog that has pending migration entries under a
//! version-qualified filename, and records the release in the master.

pub mod domain;
pub use domain::{Config, InvalidVersionError, Release, Version};

/// Changelog documents and the streaming rewrite engine.
pub mod changelog;
pub use changelog::{Error, Plan, Project};
