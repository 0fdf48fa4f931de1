use std::{
    fmt,
    ops::Deref,
    path::{Path, PathBuf},
    str::FromStr,
};

use non_empty_string::NonEmptyString;
use serde::Serialize;

/// A release version identifier, such as `1.2.3`.
///
/// Surrounding whitespace is trimmed. The remaining string must not be empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(NonEmptyString);

impl Version {
    /// Creates a new `Version` from a string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidVersionError` if the string is empty or only contains
    /// whitespace.
    pub fn new(s: &str) -> Result<Self, InvalidVersionError> {
        NonEmptyString::new(s.trim().to_string())
            .map(Self)
            .map_err(|_| InvalidVersionError(s.to_string()))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for Version {
    type Err = InvalidVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Version {
    type Error = InvalidVersionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Deref for Version {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Error returned when a version string is blank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid version '{0}': must contain at least one non-whitespace character")]
pub struct InvalidVersionError(String);

/// The settings of a single release run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    version: Version,
    context: Option<String>,
    classpath_root: PathBuf,
}

impl Release {
    /// Creates the settings for releasing `version`.
    ///
    /// Inclusion references that are not relative to their changelog resolve
    /// against `classpath_root`.
    #[must_use]
    pub fn new(version: Version, classpath_root: impl Into<PathBuf>) -> Self {
        Self {
            version,
            context: None,
            classpath_root: classpath_root.into(),
        }
    }

    /// Sets the context written on the generated tag entry.
    ///
    /// A blank context means no context attribute is written at all.
    #[must_use]
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    /// The version being released.
    #[must_use]
    pub const fn version(&self) -> &Version {
        &self.version
    }

    /// The context for the generated tag entry, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// The base directory for classpath-relative inclusion references.
    #[must_use]
    pub fn classpath_root(&self) -> &Path {
        &self.classpath_root
    }
}
