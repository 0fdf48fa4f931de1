use std::{
    collections::{HashMap, HashSet},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use quick_xml::events::Event;

use super::{
    document::{ChangelogFile, Marker},
    error::{Error, IoOperation},
    paths::{normalize, versioned_filename},
};
use crate::Version;

/// Identifies an included changelog within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IncludeId(usize);

/// A changelog referenced by an `include` element of a master changelog.
///
/// Reading it strips every migration entry, leaving the placeholder that
/// replaces the file once its entries have been frozen.
#[derive(Debug)]
pub struct IncludedChangelog {
    file: ChangelogFile,
    discovered_from: PathBuf,
    entries: usize,
}

impl IncludedChangelog {
    fn new(file: ChangelogFile, discovered_from: PathBuf) -> Self {
        Self {
            file,
            discovered_from,
            entries: 0,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// The master changelog that first referenced this one.
    pub fn discovered_from(&self) -> &Path {
        &self.discovered_from
    }

    /// The number of migration entries, counted when the file is read.
    pub const fn entries(&self) -> usize {
        self.entries
    }

    /// Reads the changelog, counting and removing its migration entries.
    ///
    /// Does nothing if the changelog has already been read.
    pub fn read(&mut self) -> Result<(), Error> {
        let entries = &mut self.entries;
        self.file.read_with(|scanner, out| {
            while let Some(token) = scanner.next()? {
                match (token.marker, token.event) {
                    (Some(Marker::Entry), Event::Start(_)) => {
                        *entries += 1;
                        scanner.skip_element(token.offset, "changeSet")?;
                    }
                    (Some(Marker::Entry), Event::Empty(_)) => *entries += 1,
                    (_, event) => out.emit(event)?,
                }
            }
            Ok(())
        })
    }

    /// Whether the changelog contains at least one migration entry.
    pub fn contains_migration_entries(&mut self) -> Result<bool, Error> {
        self.read()?;
        Ok(self.entries > 0)
    }

    /// Whether this changelog will be frozen under a version-qualified name.
    pub fn will_be_tagged(&mut self, skip: &HashSet<PathBuf>) -> Result<bool, Error> {
        Ok(self.contains_migration_entries()? && !skip.contains(self.path()))
    }

    /// The path this changelog is moved to when `version` is released.
    pub fn versioned_path(&self, version: &Version) -> Result<PathBuf, Error> {
        let versioned = versioned_filename(self.path(), version);
        if versioned == self.path() {
            return Err(Error::MissingVersionToken {
                path: self.path().to_path_buf(),
            });
        }
        Ok(versioned)
    }

    /// Moves the changelog to its versioned path and writes the stripped
    /// placeholder in its place.
    ///
    /// Changelogs that will not be tagged, or that have already been
    /// committed, are left alone.
    fn commit(&mut self, version: &Version, skip: &HashSet<PathBuf>) -> Result<(), Error> {
        if !self.will_be_tagged(skip)? {
            return Ok(());
        }
        let Some(placeholder) = self.file.take_rewritten() else {
            return Ok(());
        };

        let path = self.path().to_path_buf();
        let frozen = self.versioned_path(version)?;

        if let Some(parent) = frozen.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io(parent, IoOperation::CreateDirectory, e))?;
        }

        let moving = || IoOperation::Move { to: frozen.clone() };
        let exists = frozen
            .try_exists()
            .map_err(|e| Error::io(&path, moving(), e))?;
        if exists {
            return Err(Error::io(
                &path,
                moving(),
                io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
            ));
        }
        fs::rename(&path, &frozen).map_err(|e| Error::io(&path, moving(), e))?;

        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .and_then(|mut file| file.write_all(&placeholder))
            .map_err(|e| Error::io(&path, IoOperation::Create, e))?;

        tracing::info!(
            "Froze {} entries of {} as {}",
            self.entries,
            path.display(),
            frozen.display()
        );
        Ok(())
    }
}

/// Every included changelog of a project, shared between master changelogs.
///
/// Changelogs are keyed by their normalized path, so a file included from
/// several masters is read and frozen only once.
#[derive(Debug, Default)]
pub struct IncludeRegistry {
    documents: Vec<IncludedChangelog>,
    index: HashMap<PathBuf, IncludeId>,
    skip_tagging: HashSet<PathBuf>,
}

impl IncludeRegistry {
    /// Marks a changelog as never to be frozen.
    pub fn skip_tagging(&mut self, path: &Path) {
        self.skip_tagging.insert(normalize(path));
    }

    pub fn is_skipped(&self, path: &Path) -> bool {
        self.skip_tagging.contains(path)
    }

    /// Returns the changelog at `path`, opening it if it is not known yet.
    pub fn register(&mut self, path: &Path, discovered_from: &Path) -> Result<IncludeId, Error> {
        let path = normalize(path);
        if let Some(&id) = self.index.get(&path) {
            return Ok(id);
        }

        let file = ChangelogFile::open(path.clone())?;
        let id = IncludeId(self.documents.len());
        tracing::debug!(
            "Discovered {} from {}",
            path.display(),
            discovered_from.display()
        );
        self.documents
            .push(IncludedChangelog::new(file, discovered_from.to_path_buf()));
        self.index.insert(path, id);
        Ok(id)
    }

    pub fn get(&self, id: IncludeId) -> &IncludedChangelog {
        &self.documents[id.0]
    }

    pub fn will_be_tagged(&mut self, id: IncludeId) -> Result<bool, Error> {
        self.documents[id.0].will_be_tagged(&self.skip_tagging)
    }

    /// All known changelogs, in the order they were discovered.
    pub fn iter(&self) -> impl Iterator<Item = (IncludeId, &IncludedChangelog)> {
        self.documents
            .iter()
            .enumerate()
            .map(|(index, document)| (IncludeId(index), document))
    }

    /// Reads every changelog that has not been read yet.
    pub fn read_all(&mut self) -> Result<(), Error> {
        self.documents
            .iter_mut()
            .try_for_each(IncludedChangelog::read)
    }

    /// Freezes every changelog that will be tagged.
    pub fn commit_all(&mut self, version: &Version) -> Result<(), Error> {
        for document in &mut self.documents {
            document.commit(version, &self.skip_tagging)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<databaseChangeLog xmlns="http://www.liquibase.org/xml/ns/dbchangelog">"#;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("{ROOT}\n{body}\n</databaseChangeLog>\n")).unwrap();
        path
    }

    fn version(v: &str) -> Version {
        Version::new(v).unwrap()
    }

    #[test]
    fn counts_and_strips_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(
            tmp.path(),
            "a_latest.xml",
            "\t<changeSet id=\"1\" author=\"me\">\n\t\t<createTable tableName=\"t\"/>\n\t</changeSet>\n\t<changeSet id=\"2\" author=\"me\"/>\n\t<property name=\"p\" value=\"v\"/>",
        );
        let mut registry = IncludeRegistry::default();
        let id = registry.register(&path, tmp.path()).unwrap();

        registry.read_all().unwrap();

        assert_eq!(registry.get(id).entries(), 2);
        assert!(registry.will_be_tagged(id).unwrap());
    }

    #[test]
    fn empty_changelog_is_not_tagged() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "a_latest.xml", "");
        let mut registry = IncludeRegistry::default();
        let id = registry.register(&path, tmp.path()).unwrap();

        assert!(!registry.will_be_tagged(id).unwrap());
    }

    #[test]
    fn skipped_changelog_is_not_tagged() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(
            tmp.path(),
            "a_latest.xml",
            "<changeSet id=\"1\" author=\"me\"/>",
        );
        let mut registry = IncludeRegistry::default();
        registry.skip_tagging(&tmp.path().join("./a_latest.xml"));
        let id = registry.register(&path, tmp.path()).unwrap();

        assert!(!registry.will_be_tagged(id).unwrap());
        assert!(registry.is_skipped(&path));
    }

    #[test]
    fn same_path_is_registered_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "sub/a_latest.xml", "");
        let mut registry = IncludeRegistry::default();

        let first = registry.register(&path, Path::new("master_a.xml")).unwrap();
        let second = registry
            .register(
                &tmp.path().join("sub/../sub/a_latest.xml"),
                Path::new("master_b.xml"),
            )
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.iter().count(), 1);
        assert_eq!(
            registry.get(first).discovered_from(),
            Path::new("master_a.xml")
        );
    }

    #[test]
    fn registering_a_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = IncludeRegistry::default();
        assert!(
            registry
                .register(&tmp.path().join("missing_latest.xml"), tmp.path())
                .is_err()
        );
    }

    #[test]
    fn versioned_path_requires_token() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "component.xml", "");
        let mut registry = IncludeRegistry::default();
        let id = registry.register(&path, tmp.path()).unwrap();

        let error = registry.get(id).versioned_path(&version("1.0")).unwrap_err();
        assert!(matches!(error, Error::MissingVersionToken { .. }));
    }

    #[test]
    fn commit_moves_file_and_writes_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(
            tmp.path(),
            "latest/include_latest.xml",
            "\t<changeSet id=\"1\" author=\"me\">\n\t\t<sql>SELECT 1;</sql>\n\t</changeSet>",
        );
        let original = fs::read_to_string(&path).unwrap();
        let mut registry = IncludeRegistry::default();
        registry.register(&path, tmp.path()).unwrap();
        registry.read_all().unwrap();

        registry.commit_all(&version("1.2.3")).unwrap();

        let frozen = tmp.path().join("1.2.3/include_1.2.3.xml");
        assert_eq!(fs::read_to_string(frozen).unwrap(), original);
        let placeholder = fs::read_to_string(&path).unwrap();
        assert!(!placeholder.contains("changeSet"));
        assert!(placeholder.contains("</databaseChangeLog>"));
    }

    #[test]
    fn commit_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "a_latest.xml", "<changeSet id=\"1\" author=\"me\"/>");
        fs::write(tmp.path().join("a_1.0.xml"), "existing").unwrap();
        let mut registry = IncludeRegistry::default();
        registry.register(&path, tmp.path()).unwrap();
        registry.read_all().unwrap();

        let error = registry.commit_all(&version("1.0")).unwrap_err();

        assert!(matches!(
            error,
            Error::Io {
                operation: IoOperation::Move { .. },
                ..
            }
        ));
        assert_eq!(
            fs::read_to_string(tmp.path().join("a_1.0.xml")).unwrap(),
            "existing"
        );
    }

    #[test]
    fn commit_happens_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write(tmp.path(), "a_latest.xml", "<changeSet id=\"1\" author=\"me\"/>");
        let mut registry = IncludeRegistry::default();
        registry.register(&path, tmp.path()).unwrap();
        registry.read_all().unwrap();

        registry.commit_all(&version("1.0")).unwrap();
        registry.commit_all(&version("1.0")).unwrap();

        assert!(tmp.path().join("a_1.0.xml").exists());
    }
}
