//! Master changelogs and the insertion of release tags.
//!
//! A master changelog is a list of `include` references interleaved with
//! tag entries marking earlier releases. Only the references that follow the
//! last tag entry belong to the release being prepared. The rewrite buffers
//! everything from the first such reference, so that the new release block
//! can be inserted in front of them once the end of the document shows that
//! no later tag exists.

use std::{
    fs,
    path::{Path, PathBuf},
};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use super::{
    document::{ChangelogFile, Marker, Rewriter, Scanner, element_name, ensure_readable},
    error::{Error, IoOperation},
    include::{IncludeId, IncludeRegistry},
    paths::{relative_to, resolve_reference, to_portable_separator},
};
use crate::Release;

/// The author of generated tag entries.
pub const AUTHOR: &str = "liquibase-db-release";

/// A master changelog's reference to an included changelog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub include: IncludeId,
    /// Attributes of the `include` element other than the file reference,
    /// copied onto the generated reference to the frozen changelog.
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct MasterChangelog {
    file: ChangelogFile,
    references: Vec<Reference>,
}

impl MasterChangelog {
    pub fn open(path: PathBuf) -> Result<Self, Error> {
        Ok(Self {
            file: ChangelogFile::open(path)?,
            references: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// The changelogs included after the last tag entry, in document order.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Reads the master changelog, inserting the block for `release` and
    /// registering the changelogs it includes.
    ///
    /// Does nothing if the changelog has already been read.
    pub fn read(&mut self, release: &Release, registry: &mut IncludeRegistry) -> Result<(), Error> {
        let references = &mut self.references;
        self.file.read_with(|scanner, out| {
            *references = MasterScan::new(release).run(scanner, out, registry)?;
            Ok(())
        })
    }

    /// Overwrites the master changelog with its rewritten content.
    pub fn commit(&mut self) -> Result<(), Error> {
        let Some(content) = self.file.take_rewritten() else {
            return Ok(());
        };
        let path = self.path();
        fs::write(path, content).map_err(|e| Error::io(path, IoOperation::Write, e))?;
        tracing::info!("Updated {}", path.display());
        Ok(())
    }
}

/// An `include` seen during the scan, registered once the document has been
/// read to the end.
#[derive(Debug)]
struct PendingReference {
    path: PathBuf,
    attributes: Vec<(String, String)>,
}

/// Writes events straight through, or holds them back to be written later.
struct Staging<'o, 'a> {
    out: &'o mut Rewriter,
    held: Vec<Event<'a>>,
    holding: bool,
}

impl<'o, 'a> Staging<'o, 'a> {
    const fn new(out: &'o mut Rewriter) -> Self {
        Self {
            out,
            held: Vec::new(),
            holding: false,
        }
    }

    fn push(&mut self, event: Event<'a>) -> Result<(), Error> {
        if self.holding {
            self.held.push(event);
            Ok(())
        } else {
            self.out.emit(event)
        }
    }

    /// Starts holding back events. Has no effect if already holding.
    const fn hold(&mut self) {
        self.holding = true;
    }

    /// Writes an event ahead of anything held back.
    fn emit_now(&mut self, event: Event<'_>) -> Result<(), Error> {
        self.out.emit(event)
    }

    /// Writes everything held back and stops holding.
    fn release(&mut self) -> Result<(), Error> {
        for event in self.held.drain(..) {
            self.out.emit(event)?;
        }
        self.holding = false;
        Ok(())
    }
}

struct MasterScan<'r> {
    release: &'r Release,
    /// The namespace prefix of the root element, reused for generated elements.
    prefix: Option<String>,
    pending: Vec<PendingReference>,
}

impl<'r> MasterScan<'r> {
    const fn new(release: &'r Release) -> Self {
        Self {
            release,
            prefix: None,
            pending: Vec::new(),
        }
    }

    fn run<'a>(
        mut self,
        scanner: &mut Scanner<'a>,
        out: &mut Rewriter,
        registry: &mut IncludeRegistry,
    ) -> Result<Vec<Reference>, Error> {
        let mut staging = Staging::new(out);

        while let Some(token) = scanner.next()? {
            match (token.marker, &token.event) {
                (Some(Marker::Root), Event::Start(root)) => {
                    self.prefix = prefix_of(root);
                    staging.push(token.event)?;
                }
                (Some(Marker::Root), Event::Empty(root)) => {
                    self.prefix = prefix_of(root);
                    staging.push(Event::Start(root.clone()))?;
                    staging.hold();
                    staging.push(Event::End(BytesEnd::new(element_name(root))))?;
                }
                (Some(Marker::Root), Event::End(_)) => {
                    staging.hold();
                    staging.push(token.event)?;
                }
                (Some(Marker::Include), Event::Start(include) | Event::Empty(include)) => {
                    let reference = self.reference(scanner, include, token.offset)?;
                    self.pending.push(reference);
                    staging.hold();
                    staging.push(token.event)?;
                }
                (Some(Marker::Entry), Event::Start(_)) => {
                    staging.push(token.event)?;
                    let tag = read_entry(scanner, &mut staging, token.offset)?;
                    self.close_entry(tag, scanner.path(), &mut staging)?;
                }
                (Some(Marker::Entry), Event::Empty(_)) => staging.push(token.event)?,
                (_, Event::Start(element) | Event::Empty(element)) => {
                    return Err(scanner.malformed_at(
                        token.offset,
                        format!("unexpected element <{}>", element_name(element)),
                    ));
                }
                _ => staging.push(token.event)?,
            }
        }

        let master = scanner.path();
        let references = self
            .pending
            .drain(..)
            .map(|pending| {
                Ok(Reference {
                    include: registry.register(&pending.path, master)?,
                    attributes: pending.attributes,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        self.insert_release(master, &references, registry, &mut staging)?;
        staging.release()?;
        Ok(references)
    }

    /// Parses an `include` element and checks that the referenced file exists.
    fn reference(
        &self,
        scanner: &Scanner<'_>,
        include: &BytesStart<'_>,
        offset: usize,
    ) -> Result<PendingReference, Error> {
        let mut file = None;
        let mut relative_to_changelog = false;
        let mut attributes = Vec::new();

        for attribute in include.attributes() {
            let attribute = attribute.map_err(|e| scanner.malformed_at(offset, e.to_string()))?;
            let value = attribute
                .unescape_value()
                .map_err(|e| scanner.malformed_at(offset, e.to_string()))?
                .into_owned();
            match attribute.key.as_ref() {
                b"file" => file = Some(value),
                b"relativeToChangelogFile" => {
                    relative_to_changelog = value.trim().eq_ignore_ascii_case("true");
                }
                key if key == b"xmlns" || key.starts_with(b"xmlns:") => {}
                key => attributes.push((String::from_utf8_lossy(key).into_owned(), value)),
            }
        }

        let file = file.ok_or_else(|| {
            scanner.malformed_at(offset, "<include> element without a file attribute")
        })?;
        let path = resolve_reference(
            scanner.path(),
            &file,
            relative_to_changelog,
            self.release.classpath_root(),
        );
        ensure_readable(&path)?;
        Ok(PendingReference { path, attributes })
    }

    /// Handles the tag found in a migration entry, if any.
    ///
    /// A tag for an earlier release means the references seen so far belong
    /// to that release.
    fn close_entry(
        &mut self,
        tag: Option<String>,
        master: &Path,
        staging: &mut Staging<'_, '_>,
    ) -> Result<(), Error> {
        let Some(tag) = tag else {
            return Ok(());
        };
        let version = self.release.version();
        if tag == version.as_str() {
            return Err(Error::AlreadyTagged {
                version: version.clone(),
                path: master.to_path_buf(),
            });
        }
        tracing::debug!("Found release {tag} in {}", master.display());
        self.pending.clear();
        staging.release()
    }

    /// Writes the release block: a comment, a reference to each frozen
    /// changelog, and the tag entry.
    fn insert_release(
        &self,
        master: &Path,
        references: &[Reference],
        registry: &mut IncludeRegistry,
        staging: &mut Staging<'_, '_>,
    ) -> Result<(), Error> {
        let version = self.release.version();
        let master_dir = master.parent().unwrap_or_else(|| Path::new(""));

        staging.emit_now(text("\n\n"))?;
        staging.emit_now(Event::Comment(BytesText::from_escaped(format!(
            " Version {version} "
        ))))?;
        staging.emit_now(text("\n"))?;

        for reference in references {
            if !registry.will_be_tagged(reference.include)? {
                continue;
            }
            let frozen = registry.get(reference.include).versioned_path(version)?;
            let file = to_portable_separator(&relative_to(master_dir, &frozen));

            let mut include = BytesStart::new(self.qualified("include"));
            include.push_attribute(("file", file.as_str()));
            include.push_attribute(("relativeToChangelogFile", "true"));
            for (key, value) in &reference.attributes {
                include.push_attribute((key.as_str(), value.as_str()));
            }
            staging.emit_now(Event::Empty(include))?;
            staging.emit_now(text("\n"))?;
        }

        let entry_name = self.qualified("changeSet");
        let mut entry = BytesStart::new(entry_name.as_str());
        entry.push_attribute(("id", format!("Tag {version}").as_str()));
        entry.push_attribute(("author", AUTHOR));
        if let Some(context) = self.release.context() {
            entry.push_attribute(("context", context));
        }
        staging.emit_now(Event::Start(entry))?;
        staging.emit_now(text("\n"))?;

        let mut tag = BytesStart::new(self.qualified("tagDatabase"));
        tag.push_attribute(("tag", version.as_str()));
        staging.emit_now(Event::Empty(tag))?;
        staging.emit_now(text("\n"))?;

        staging.emit_now(Event::End(BytesEnd::new(entry_name.as_str())))?;
        staging.emit_now(text("\n\n"))
    }

    fn qualified(&self, local_name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{local_name}"),
            None => local_name.to_string(),
        }
    }
}

fn prefix_of(root: &BytesStart<'_>) -> Option<String> {
    root.name()
        .prefix()
        .map(|prefix| String::from_utf8_lossy(prefix.as_ref()).into_owned())
}

/// Copies the body of a migration entry, returning the last tag it sets.
fn read_entry<'a>(
    scanner: &mut Scanner<'a>,
    staging: &mut Staging<'_, 'a>,
    offset: usize,
) -> Result<Option<String>, Error> {
    let mut depth = 1usize;
    let mut tag = None;

    while let Some(token) = scanner.next()? {
        if let (Some(Marker::Tag), Event::Start(element) | Event::Empty(element)) =
            (token.marker, &token.event)
        {
            tag = Some(tag_value(scanner, element, token.offset)?);
        }
        match &token.event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            _ => {}
        }
        staging.push(token.event)?;
        if depth == 0 {
            return Ok(tag);
        }
    }
    Err(scanner.unterminated(offset, "changeSet"))
}

fn tag_value(scanner: &Scanner<'_>, element: &BytesStart<'_>, offset: usize) -> Result<String, Error> {
    let attribute = element
        .try_get_attribute("tag")
        .map_err(|e| scanner.malformed_at(offset, e.to_string()))?
        .ok_or_else(|| scanner.malformed_at(offset, "<tagDatabase> element without a tag attribute"))?;
    let value = attribute
        .unescape_value()
        .map_err(|e| scanner.malformed_at(offset, e.to_string()))?;
    Ok(value.into_owned())
}

fn text(content: &str) -> Event<'_> {
    Event::Text(BytesText::from_escaped(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Version;

    #[test]
    fn staging_writes_through_until_held() {
        let path = Path::new("master.xml");
        let mut out = Rewriter::new(path);
        let mut staging = Staging::new(&mut out);

        staging.push(text("a")).unwrap();
        staging.hold();
        staging.push(text("c")).unwrap();
        staging.emit_now(text("b")).unwrap();
        staging.release().unwrap();
        staging.push(text("d")).unwrap();
        drop(staging);

        assert_eq!(String::from_utf8(out.finish()).unwrap(), "abcd");
    }

    #[test]
    fn qualified_names_reuse_root_prefix() {
        let release = Release::new(Version::new("1.0").unwrap(), "root");
        let mut scan = MasterScan::new(&release);
        assert_eq!(scan.qualified("include"), "include");

        scan.prefix = Some("lb".to_string());
        assert_eq!(scan.qualified("include"), "lb:include");
    }

    #[test]
    fn text_events_are_not_escaped_twice() {
        assert_eq!(text("\n"), Event::Text(BytesText::from_escaped("\n")));
    }
}
