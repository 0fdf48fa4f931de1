//! An indenting filter for streams of XML events
//!
//! [`PrettyPrinter`] wraps another [`EventSink`]. It re-derives indentation
//! from the nesting depth and collapses runs of blank lines, so that feeding
//! its own output through it again produces the same output.

use std::io::Write;

use quick_xml::{
    Writer,
    events::{BytesText, Event},
};

/// Something that consumes XML events.
pub trait EventSink {
    /// Writes a single event.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    fn emit(&mut self, event: Event<'_>) -> Result<(), quick_xml::Error>;
}

impl<W: Write> EventSink for Writer<W> {
    fn emit(&mut self, event: Event<'_>) -> Result<(), quick_xml::Error> {
        self.write_event(event).map_err(Into::into)
    }
}

/// Collects owned events, mostly useful for inspecting a stream.
impl EventSink for Vec<Event<'static>> {
    fn emit(&mut self, event: Event<'_>) -> Result<(), quick_xml::Error> {
        self.push(event.into_owned());
        Ok(())
    }
}

/// Indents elements by nesting depth and keeps at most one blank line.
///
/// - Whitespace that follows a newline is dropped and replaced by `depth`
///   copies of the indent unit in front of the next event or text.
///   Other text after a newline is kept and re-indented, where a strict
///   filter would drop it.
/// - Three or more consecutive newlines collapse to two.
/// - An XML declaration is always followed by a newline.
#[derive(Debug)]
pub struct PrettyPrinter<S> {
    inner: S,
    indent: String,
    depth: isize,
    saw_newline: bool,
    saw_blank_line: bool,
}

impl<S: EventSink> PrettyPrinter<S> {
    /// Wraps `inner`, indenting with one `indent` per nesting level.
    pub fn new(inner: S, indent: impl Into<String>) -> Self {
        Self {
            inner,
            indent: indent.into(),
            depth: 0,
            saw_newline: false,
            saw_blank_line: false,
        }
    }

    /// The indent unit.
    #[must_use]
    pub fn indent(&self) -> &str {
        &self.indent
    }

    /// Returns the wrapped sink.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn emit_text(&mut self, text: &str) -> Result<(), quick_xml::Error> {
        let mut pending = String::new();
        for c in text.chars() {
            if c == '\n' {
                self.flush_text(&mut pending)?;
                if !self.saw_newline {
                    self.newline()?;
                    self.saw_newline = true;
                    self.saw_blank_line = false;
                } else if !self.saw_blank_line {
                    self.newline()?;
                    self.saw_blank_line = true;
                }
            } else if self.saw_newline {
                if c.is_whitespace() {
                    continue;
                }
                self.write_indent()?;
                self.saw_newline = false;
                pending.push(c);
            } else {
                pending.push(c);
            }
        }
        self.flush_text(&mut pending)
    }

    fn flush_text(&mut self, pending: &mut String) -> Result<(), quick_xml::Error> {
        if pending.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(pending);
        self.inner.emit(Event::Text(BytesText::from_escaped(text)))
    }

    fn newline(&mut self) -> Result<(), quick_xml::Error> {
        self.inner.emit(Event::Text(BytesText::from_escaped("\n")))
    }

    fn write_indent(&mut self) -> Result<(), quick_xml::Error> {
        let depth = usize::try_from(self.depth).unwrap_or(0);
        if depth == 0 || self.indent.is_empty() {
            return Ok(());
        }
        let indentation = self.indent.repeat(depth);
        self.inner
            .emit(Event::Text(BytesText::from_escaped(indentation)))
    }
}

impl<S: EventSink> EventSink for PrettyPrinter<S> {
    fn emit(&mut self, event: Event<'_>) -> Result<(), quick_xml::Error> {
        if let Event::Text(text) = &event {
            let text = String::from_utf8_lossy(text);
            return self.emit_text(&text);
        }

        if matches!(event, Event::End(_)) {
            self.depth -= 1;
        }
        let opens = matches!(event, Event::Start(_));
        let declares = matches!(event, Event::Decl(_));

        if self.saw_newline {
            self.write_indent()?;
        }
        self.inner.emit(event)?;
        self.saw_newline = false;

        if opens {
            self.depth += 1;
        }
        if declares {
            self.emit_text("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use quick_xml::{Reader, events::BytesStart};

    use super::*;

    fn pretty(input: &str) -> String {
        let mut reader = Reader::from_str(input);
        let mut printer = PrettyPrinter::new(Writer::new(Vec::new()), "\t");
        loop {
            match reader.read_event().unwrap() {
                Event::Eof => break,
                event => printer.emit(event).unwrap(),
            }
        }
        String::from_utf8(printer.into_inner().into_inner()).unwrap()
    }

    #[test]
    fn indents_by_depth() {
        let output = pretty("<a>\n<b>\n<c/>\n</b>\n</a>");
        assert_eq!(output, "<a>\n\t<b>\n\t\t<c/>\n\t</b>\n</a>");
    }

    #[test]
    fn replaces_existing_indentation() {
        let output = pretty("<a>\n        <b/>\n  </a>");
        assert_eq!(output, "<a>\n\t<b/>\n</a>");
    }

    #[test]
    fn collapses_blank_lines() {
        let output = pretty("<a>\n\n\n\n<b/>\n\n</a>");
        assert_eq!(output, "<a>\n\n\t<b/>\n\n</a>");
    }

    #[test]
    fn newline_after_declaration() {
        let output = pretty("<?xml version=\"1.0\"?><a/>");
        assert_eq!(output, "<?xml version=\"1.0\"?>\n<a/>");
    }

    #[test]
    fn inline_text_is_kept() {
        let output = pretty("<a>\n<sql>DROP TABLE x;</sql>\n</a>");
        assert_eq!(output, "<a>\n\t<sql>DROP TABLE x;</sql>\n</a>");
    }

    #[test]
    fn text_after_newline_is_reindented() {
        let output = pretty("<a>\n<sql>\n      DROP TABLE x;\n</sql>\n</a>");
        assert_eq!(output, "<a>\n\t<sql>\n\t\tDROP TABLE x;\n\t</sql>\n</a>");
    }

    #[test]
    fn formatting_is_a_fixed_point() {
        let input = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\n\n<root attr=\"1\">\n  <!-- note -->\n\n\n\n    <child>\n  <leaf  a=\"b\"/>\n    <sql>\n SELECT 1;\n   </sql>\n</child>\n\n</root>\n";
        let once = pretty(input);
        let twice = pretty(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn generated_events_are_indented() {
        let mut printer = PrettyPrinter::new(Vec::new(), "  ");
        printer.emit(Event::Start(BytesStart::new("a"))).unwrap();
        printer
            .emit(Event::Text(BytesText::from_escaped("\n")))
            .unwrap();
        printer.emit(Event::Empty(BytesStart::new("b"))).unwrap();

        let events = printer.into_inner();
        assert_eq!(
            events,
            vec![
                Event::Start(BytesStart::new("a")),
                Event::Text(BytesText::from_escaped("\n")),
                Event::Text(BytesText::from_escaped("  ")),
                Event::Empty(BytesStart::new("b")),
            ]
        );
    }

    #[test]
    fn indent_unit_is_configurable() {
        let printer = PrettyPrinter::new(Vec::new(), "    ");
        assert_eq!(printer.indent(), "    ");
    }
}
