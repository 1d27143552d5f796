//! Element tree front end.
//!
//! Schema documents are read with the quick-xml event reader and lowered
//! into a small owned tree of [`XmlElement`] nodes. Everything downstream
//! works on this tree and never touches the tokenizer directly.

use crate::error::ParseError;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Single element of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Element name.
    pub name: String,
    /// Attributes in document order.
    pub attrs: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
    /// Trimmed text content.
    pub text: String,
    /// Line number of the opening tag (1-based).
    pub line: usize,
}

impl XmlElement {
    /// Creates an element with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the attribute is present.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Iterates over child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Returns the first child element with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Formats the position of this element for diagnostics.
    #[must_use]
    pub fn location(&self, doc: &str) -> String {
        format!("{}:{}", doc, self.line)
    }
}

/// Parses a complete document into its root element.
///
/// # Errors
/// Returns `ParseError` if the document is malformed or has no root element.
pub fn parse_document(xml: &str) -> Result<XmlElement, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut lines = LineCounter::new(xml);

    loop {
        let pos = usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX);
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let elem = start_element(e, lines.line_at(pos))?;
                stack.push(elem);
            }
            Ok(Event::Empty(ref e)) => {
                let elem = start_element(e, lines.line_at(pos))?;
                attach(&mut stack, &mut root, elem)?;
            }
            Ok(Event::End(_)) => {
                let mut elem = stack
                    .pop()
                    .ok_or_else(|| ParseError::structure("unbalanced closing tag"))?;
                elem.text = elem.text.trim().to_string();
                attach(&mut stack, &mut root, elem)?;
            }
            Ok(Event::Text(ref t)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(std::str::from_utf8(t.as_ref())?);
                }
            }
            Ok(Event::CData(ref t)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(std::str::from_utf8(&t[..])?);
                }
            }
            Ok(Event::GeneralRef(ref r)) => {
                let name = std::str::from_utf8(&r[..])?;
                let ch = resolve_entity(name).ok_or_else(|| {
                    ParseError::structure(format!("unknown entity reference '&{};'", name))
                })?;
                if let Some(top) = stack.last_mut() {
                    top.text.push(ch);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::structure("unexpected end of document"));
    }

    root.ok_or_else(|| ParseError::structure("no root element found"))
}

fn start_element(e: &BytesStart<'_>, line: usize) -> Result<XmlElement, ParseError> {
    let name = std::str::from_utf8(e.name().as_ref())?.to_string();
    let mut elem = XmlElement::new(name);
    elem.line = line;

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let raw = std::str::from_utf8(&attr.value)?;
        let value = quick_xml::escape::unescape(raw)?;
        elem.attrs.push((key.to_string(), value.into_owned()));
    }

    Ok(elem)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    elem: XmlElement,
) -> Result<(), ParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(elem);
        return Ok(());
    }

    if root.is_some() {
        return Err(ParseError::structure(format!(
            "multiple root elements, unexpected '{}'",
            elem.name
        )));
    }

    *root = Some(elem);
    Ok(())
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// Incremental byte offset to line number conversion.
struct LineCounter<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, pos: usize) -> usize {
        let end = pos.min(self.bytes.len());
        if end > self.pos {
            self.line += self.bytes[self.pos..end]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.pos = end;
        }

        // The offset may point at whitespace preceding the tag.
        let mut line = self.line;
        let mut idx = self.pos;
        while idx < self.bytes.len() && self.bytes[idx].is_ascii_whitespace() {
            if self.bytes[idx] == b'\n' {
                line += 1;
            }
            idx += 1;
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<schema name="Demo" version="2">
    <!-- comment -->
    <fields>
        <int name="F1" type="uint8" description="a &amp; b"/>
    </fields>
    <message name="M" id="1">
        <optional name="o" cond="$F1 &lt; 5">
            <construct>$F1 &gt; 1</construct>
        </optional>
    </message>
</schema>"#;

    #[test]
    fn test_parse_tree() {
        let root = parse_document(DOC).expect("valid document");
        assert_eq!(root.name, "schema");
        assert_eq!(root.attr("name"), Some("Demo"));
        assert_eq!(root.line, 2);
        assert_eq!(root.children.len(), 2);

        let fields = root.child("fields").expect("fields");
        let int = fields.child("int").expect("int");
        assert_eq!(int.attr("description"), Some("a & b"));
        assert_eq!(int.line, 5);
    }

    #[test]
    fn test_entities_in_text_and_attrs() {
        let root = parse_document(DOC).expect("valid document");
        let msg = root.child("message").expect("message");
        let opt = msg.child("optional").expect("optional");
        assert_eq!(opt.attr("cond"), Some("$F1 < 5"));
        let construct = opt.child("construct").expect("construct");
        assert_eq!(construct.text, "$F1 > 1");
    }

    #[test]
    fn test_malformed_document() {
        assert!(parse_document("<schema><fields></schema>").is_err());
        assert!(parse_document("   ").is_err());
    }
}
