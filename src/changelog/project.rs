use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{error::Error, include::IncludeRegistry, master::MasterChangelog, paths::normalize};
use crate::{Release, Version};

/// A set of master changelogs released together.
///
/// Changelogs included from more than one master are read and frozen once.
/// Nothing is written to disk until [`Project::commit`] is called.
#[derive(Debug)]
pub struct Project {
    release: Release,
    masters: Vec<MasterChangelog>,
    registry: IncludeRegistry,
}

/// What a release will do, computed without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// The version being released.
    pub version: Version,
    /// The context of the generated tag entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// The master changelogs that receive a tag entry.
    pub masters: Vec<PathBuf>,
    /// The included changelogs that are frozen.
    pub rotations: Vec<Rotation>,
    /// Included changelogs with migration entries that are left in place
    /// because they are configured to be skipped.
    pub skipped: Vec<PathBuf>,
    /// Included changelogs without migration entries.
    pub unchanged: Vec<PathBuf>,
}

/// An included changelog that is moved to a version-qualified path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rotation {
    /// The current path, which receives an empty placeholder.
    pub from: PathBuf,
    /// The version-qualified path the changelog is moved to.
    pub to: PathBuf,
    /// The number of migration entries being frozen.
    pub entries: usize,
    /// The master changelog that first included this changelog.
    pub discovered_from: PathBuf,
    /// Every master changelog that receives a reference to the frozen path.
    pub referenced_by: Vec<PathBuf>,
}

impl Project {
    /// Creates an empty project for the given release.
    #[must_use]
    pub fn new(release: Release) -> Self {
        Self {
            release,
            masters: Vec::new(),
            registry: IncludeRegistry::default(),
        }
    }

    /// The settings of this release.
    #[must_use]
    pub const fn release(&self) -> &Release {
        &self.release
    }

    /// Adds a master changelog.
    ///
    /// Adding the same file twice has no effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn add_master(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = normalize(path.as_ref());
        if self.masters.iter().any(|master| master.path() == path) {
            tracing::debug!("{} is already a master changelog", path.display());
            return Ok(());
        }
        self.masters.push(MasterChangelog::open(path)?);
        Ok(())
    }

    /// Excludes an included changelog from being frozen.
    pub fn skip_tagging(&mut self, path: impl AsRef<Path>) {
        self.registry.skip_tagging(path.as_ref());
    }

    /// Reads the whole changelog tree and describes the release.
    ///
    /// Reading happens once; calling this again only rebuilds the plan.
    ///
    /// # Errors
    ///
    /// Returns an error if a changelog cannot be read or is malformed, if a
    /// master changelog already carries the tag for this version, or if a
    /// changelog that must be frozen has no version token in its filename.
    pub fn plan(&mut self) -> Result<Plan, Error> {
        self.read()?;

        let version = self.release.version();
        let mut rotations = Vec::new();
        let mut skipped = Vec::new();
        let mut unchanged = Vec::new();

        for (id, include) in self.registry.iter() {
            let path = include.path().to_path_buf();
            if include.entries() == 0 {
                unchanged.push(path);
            } else if self.registry.is_skipped(&path) {
                skipped.push(path);
            } else {
                rotations.push(Rotation {
                    to: include.versioned_path(version)?,
                    from: path,
                    entries: include.entries(),
                    discovered_from: include.discovered_from().to_path_buf(),
                    referenced_by: self
                        .masters
                        .iter()
                        .filter(|master| master.references().iter().any(|r| r.include == id))
                        .map(|master| master.path().to_path_buf())
                        .collect(),
                });
            }
        }

        Ok(Plan {
            version: version.clone(),
            context: self.release.context().map(ToString::to_string),
            masters: self
                .masters
                .iter()
                .map(|master| master.path().to_path_buf())
                .collect(),
            rotations,
            skipped,
            unchanged,
        })
    }

    /// Writes the release to disk.
    ///
    /// Master changelogs are overwritten first, then each included changelog
    /// with migration entries is moved to its version-qualified path and
    /// replaced by an empty placeholder.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails (see [`Project::plan`]) or if a file
    /// cannot be written, moved or created. A frozen path that already exists
    /// is never overwritten.
    pub fn commit(&mut self) -> Result<(), Error> {
        self.read()?;
        for master in &mut self.masters {
            master.commit()?;
        }
        self.registry.commit_all(self.release.version())
    }

    fn read(&mut self) -> Result<(), Error> {
        for master in &mut self.masters {
            master.read(&self.release, &mut self.registry)?;
        }
        self.registry.read_all()
    }
}
