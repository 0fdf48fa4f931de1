//! Reading a changelog from disk and re-serializing it.
//!
//! A [`ChangelogFile`] is read at most once. Reading streams the source
//! through a [`Scanner`], which classifies changelog elements, and the caller
//! decides which events reach the [`Rewriter`]. The rewritten bytes are kept
//! in memory until they are committed.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use quick_xml::{
    NsReader, Reader, Writer,
    events::{BytesDecl, BytesStart, Event},
    name::{Namespace, ResolveResult},
};

use super::{
    NAMESPACE,
    error::{Error, IoOperation, Location},
    pretty::{EventSink, PrettyPrinter},
};

/// The indent unit of rewritten changelogs.
const INDENT: &str = "\t";

/// Changelog elements that the release process cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// `databaseChangeLog`
    Root,
    /// `changeSet`
    Entry,
    /// `include`
    Include,
    /// `tagDatabase`
    Tag,
    /// Any other element in the changelog namespace.
    Other,
}

impl Marker {
    fn from_local_name(name: &[u8]) -> Self {
        match name {
            b"databaseChangeLog" => Self::Root,
            b"changeSet" => Self::Entry,
            b"include" => Self::Include,
            b"tagDatabase" => Self::Tag,
            _ => Self::Other,
        }
    }
}

/// An event read from a changelog.
#[derive(Debug)]
pub struct Token<'a> {
    pub event: Event<'a>,
    /// Set for element events in the changelog namespace.
    pub marker: Option<Marker>,
    /// Byte offset of the event in the source.
    pub offset: usize,
}

/// Pulls classified events out of a changelog source.
pub struct Scanner<'a> {
    path: &'a Path,
    source: &'a str,
    reader: NsReader<&'a [u8]>,
    pending: Option<Token<'a>>,
}

impl<'a> Scanner<'a> {
    pub fn new(path: &'a Path, source: &'a str) -> Self {
        Self {
            path,
            source,
            reader: NsReader::from_str(source),
            pending: None,
        }
    }

    /// The changelog being scanned.
    pub const fn path(&self) -> &'a Path {
        self.path
    }

    /// Returns the next event, or `None` at the end of the document.
    pub fn next(&mut self) -> Result<Option<Token<'a>>, Error> {
        if let Some(token) = self.pending.take() {
            return Ok(Some(token));
        }

        let offset = to_offset(self.reader.buffer_position());
        let result = self
            .reader
            .read_resolved_event()
            .map(|(namespace, event)| (classify(&namespace, &event), event));

        match result {
            Ok((_, Event::Eof)) => Ok(None),
            Ok((marker, event)) => Ok(Some(Token {
                event,
                marker,
                offset,
            })),
            Err(error) => {
                let at = to_offset(self.reader.error_position());
                Err(self.malformed_at(at, error.to_string()))
            }
        }
    }

    /// Consumes events up to and including the end of the element whose
    /// start tag was just read.
    pub fn skip_element(&mut self, offset: usize, name: &str) -> Result<(), Error> {
        let mut depth = 1usize;
        while let Some(token) = self.next()? {
            match token.event {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(self.unterminated(offset, name))
    }

    /// The error for an element that is still open at the end of the document.
    pub fn unterminated(&self, offset: usize, name: &str) -> Error {
        self.malformed_at(offset, format!("no end tag found for <{name}>"))
    }

    /// An error pointing at a byte offset in this changelog.
    pub fn malformed_at(&self, offset: usize, reason: impl Into<String>) -> Error {
        Error::malformed(
            self.path,
            Some(Location::from_offset(self.source, offset)),
            reason,
        )
    }

    /// Reads the XML declaration and writes it out, synthesizing one if the
    /// source has none.
    ///
    /// Whitespace between the declaration and the root element is dropped;
    /// the printer supplies its own line break.
    fn start_document(&mut self, out: &mut Rewriter) -> Result<(), Error> {
        match self.next()? {
            Some(Token {
                event: Event::Decl(decl),
                ..
            }) => out.emit(Event::Decl(decl))?,
            other => {
                out.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
                self.pending = other;
                return Ok(());
            }
        }

        match self.next()? {
            Some(Token {
                event: Event::Text(ref text),
                ..
            }) if text.iter().all(u8::is_ascii_whitespace) => {}
            other => self.pending = other,
        }
        Ok(())
    }
}

fn to_offset<T: TryInto<usize>>(position: T) -> usize {
    position.try_into().unwrap_or(usize::MAX)
}

fn classify(namespace: &ResolveResult<'_>, event: &Event<'_>) -> Option<Marker> {
    let local_name = match event {
        Event::Start(element) | Event::Empty(element) => element.local_name(),
        Event::End(element) => element.local_name(),
        _ => return None,
    };
    match namespace {
        ResolveResult::Bound(Namespace(uri)) if *uri == NAMESPACE.as_bytes() => {
            Some(Marker::from_local_name(local_name.as_ref()))
        }
        _ => None,
    }
}

/// The qualified name of an element, for error messages.
pub fn element_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

/// Serializes the events of a changelog through the pretty printer.
pub struct Rewriter {
    printer: PrettyPrinter<Writer<Vec<u8>>>,
    path: PathBuf,
}

impl Rewriter {
    pub fn new(path: &Path) -> Self {
        Self {
            printer: PrettyPrinter::new(Writer::new(Vec::new()), INDENT),
            path: path.to_path_buf(),
        }
    }

    pub fn emit(&mut self, event: Event<'_>) -> Result<(), Error> {
        self.printer
            .emit(event)
            .map_err(|e| Error::io(&self.path, IoOperation::Write, io::Error::other(e)))
    }

    pub fn finish(self) -> Vec<u8> {
        self.printer.into_inner().into_inner()
    }
}

#[derive(Debug)]
enum State {
    Unread,
    Rewritten(Vec<u8>),
    Committed,
}

/// A changelog on disk together with its rewritten content.
#[derive(Debug)]
pub struct ChangelogFile {
    path: PathBuf,
    state: State,
}

impl ChangelogFile {
    /// Opens the changelog at `path`, checking that it can be read.
    pub fn open(path: PathBuf) -> Result<Self, Error> {
        ensure_readable(&path)?;
        Ok(Self {
            path,
            state: State::Unread,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn is_read(&self) -> bool {
        !matches!(self.state, State::Unread)
    }

    /// Reads and rewrites the changelog, unless that has already happened.
    ///
    /// The declaration is handled here; `rewrite` receives every remaining
    /// event and forwards what it wants to keep.
    pub fn read_with<F>(&mut self, rewrite: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Scanner<'_>, &mut Rewriter) -> Result<(), Error>,
    {
        if self.is_read() {
            return Ok(());
        }

        let bytes =
            fs::read(&self.path).map_err(|e| Error::io(&self.path, IoOperation::Read, e))?;
        let source = String::from_utf8(bytes).map_err(|e| self.undecodable(e.as_bytes()))?;
        let source = source.strip_prefix('\u{feff}').unwrap_or(&source);

        let mut scanner = Scanner::new(&self.path, source);
        let mut rewriter = Rewriter::new(&self.path);
        scanner.start_document(&mut rewriter)?;
        rewrite(&mut scanner, &mut rewriter)?;

        tracing::debug!("Read {}", self.path.display());
        self.state = State::Rewritten(rewriter.finish());
        Ok(())
    }

    /// The error for content that is not UTF-8, naming the declared encoding
    /// if there is one.
    fn undecodable(&self, bytes: &[u8]) -> Error {
        let valid = match std::str::from_utf8(bytes) {
            Ok(source) => source,
            Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
        };
        let location = Location::from_offset(valid, valid.len());
        let reason = match declared_encoding(bytes) {
            Some(encoding) if !encoding.eq_ignore_ascii_case("UTF-8") => {
                format!("declared encoding {encoding} is not supported, only UTF-8 is")
            }
            _ => "content is not valid UTF-8".to_string(),
        };
        Error::malformed(&self.path, Some(location), reason)
    }

    /// Takes the rewritten content for committing.
    ///
    /// Returns `None` if the file has not been read or was already committed.
    pub fn take_rewritten(&mut self) -> Option<Vec<u8>> {
        match std::mem::replace(&mut self.state, State::Committed) {
            State::Rewritten(content) => Some(content),
            other => {
                self.state = other;
                None
            }
        }
    }
}

/// The `encoding` of the XML declaration at the start of `bytes`.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let prolog = String::from_utf8_lossy(bytes);
    let prolog = prolog.strip_prefix('\u{feff}').unwrap_or(&prolog);
    match Reader::from_str(prolog).read_event().ok()? {
        Event::Decl(decl) => decl
            .encoding()?
            .ok()
            .map(|encoding| String::from_utf8_lossy(&encoding).into_owned()),
        _ => None,
    }
}

/// Checks that `path` is a regular file that can be opened for reading.
pub fn ensure_readable(path: &Path) -> Result<(), Error> {
    let metadata = fs::metadata(path).map_err(|e| Error::io(path, IoOperation::Read, e))?;
    if !metadata.is_file() {
        return Err(Error::io(
            path,
            IoOperation::Read,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    fs::File::open(path)
        .map(drop)
        .map_err(|e| Error::io(path, IoOperation::Read, e))
}
