//! Changelog documents and the streaming rewrite engine.
//!
//! A [`Project`] owns a set of master changelogs. Reading a master discovers
//! the changelogs it includes; once the whole tree has been read, committing
//! the project rewrites the masters and freezes the included changelogs.

mod document;
mod error;
mod include;
mod master;
/// Path resolution helpers.
pub mod paths;
/// Indenting stream filter for XML events.
pub mod pretty;
mod project;

pub use error::{Error, IoOperation, Location};
pub use project::{Plan, Project, Rotation};

/// The XML namespace of the changelog vocabulary.
pub const NAMESPACE: &str = "http://www.liquibase.org/xml/ns/dbchangelog";
