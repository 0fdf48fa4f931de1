use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use crate::Version;

/// Errors that can occur while releasing a changelog tree.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The version being released is already tagged in a master changelog.
    #[error("version {version} already exists in file {}", path.display())]
    AlreadyTagged {
        /// The version that was requested.
        version: Version,
        /// The master changelog that already carries the tag.
        path: PathBuf,
    },

    /// A changelog is not structured the way the release process expects.
    #[error("malformed changelog {}{}: {reason}", path.display(), DisplayLocation(location.as_ref()))]
    Malformed {
        /// The offending changelog.
        path: PathBuf,
        /// Where in the file the problem was found, when known.
        location: Option<Location>,
        /// What is wrong.
        reason: String,
    },

    /// An included changelog would be frozen but its filename has no
    /// `latest` token to substitute the version into.
    #[error(
        "cannot freeze {}: the filename does not contain `{}`",
        path.display(),
        super::paths::VERSION_TOKEN
    )]
    MissingVersionToken {
        /// The included changelog.
        path: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("failed to {}", operation.describe(path))]
    Io {
        /// The file the operation was applied to.
        path: PathBuf,
        /// The operation that was attempted.
        operation: IoOperation,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: &Path, operation: IoOperation, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            operation,
            source,
        }
    }

    pub(crate) fn malformed(
        path: &Path,
        location: Option<Location>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            location,
            reason: reason.into(),
        }
    }
}

/// The filesystem operation behind an [`Error::Io`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoOperation {
    /// Reading a changelog.
    Read,
    /// Overwriting a changelog.
    Write,
    /// Creating a new changelog that must not exist yet.
    Create,
    /// Creating the parent directories of a frozen changelog.
    CreateDirectory,
    /// Moving a changelog to its version-qualified path.
    Move {
        /// The destination of the move.
        to: PathBuf,
    },
}

impl IoOperation {
    fn describe(&self, path: &Path) -> String {
        let path = path.display();
        match self {
            Self::Read => format!("read {path}"),
            Self::Write => format!("write {path}"),
            Self::Create => format!("create {path}"),
            Self::CreateDirectory => format!("create directory {path}"),
            Self::Move { to } => format!("move {path} to {}", to.display()),
        }
    }
}

/// A one-based line and column within a changelog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// The line number, starting at 1.
    pub line: usize,
    /// The column number in characters, starting at 1.
    pub column: usize,
}

impl Location {
    /// Computes the location of a byte offset within `source`.
    ///
    /// Offsets past the end of the source are clamped to the end.
    #[must_use]
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let mut offset = offset.min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

struct DisplayLocation<'a>(Option<&'a Location>);

impl fmt::Display for DisplayLocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(location) => write!(f, " at {location}"),
            None => Ok(()),
        }
    }
}
