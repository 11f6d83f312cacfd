//! Reading and writing the configuration document as XML.
//!
//! Parsing keeps element order, attribute order and non-whitespace text.
//! Whitespace-only text between elements is dropped.

use generational_arena::Index;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::domain::arena::{Document, Element};
use crate::domain::error::{DomainError, DomainResult};

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

fn malformed(e: impl std::fmt::Display) -> DomainError {
    DomainError::MalformedDocument(e.to_string())
}

fn tag_and_attributes(start: &BytesStart<'_>) -> DomainResult<(String, Vec<(String, String)>)> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(malformed)?
        .to_string();
    let mut attributes: Vec<(String, String)> = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(malformed)?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(malformed)?
            .to_string();
        let value = attribute.unescape_value().map_err(malformed)?.into_owned();
        if attributes.iter().any(|(k, _)| *k == key) {
            return Err(malformed(format!("duplicate attribute {key} on <{tag}>")));
        }
        attributes.push((key, value));
    }
    Ok((tag, attributes))
}

impl Document {
    /// Parse a configuration document.
    pub fn parse(xml: &str) -> DomainResult<Self> {
        let mut reader = Reader::from_str(xml);

        let mut document: Option<Document> = None;
        let mut stack: Vec<Index> = Vec::new();

        loop {
            let event = reader.read_event().map_err(malformed)?;
            match event {
                Event::Start(ref start) | Event::Empty(ref start) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let (tag, attributes) = tag_and_attributes(start)?;
                    let idx = match document {
                        Some(ref mut doc) => {
                            let Some(&parent) = stack.last() else {
                                return Err(malformed("more than one root element"));
                            };
                            let idx = doc.append_child(parent, &tag)?;
                            for (key, value) in &attributes {
                                doc.set_attribute(idx, key, value)?;
                            }
                            idx
                        }
                        None => {
                            let mut doc = Document::new(tag);
                            let root = doc.root();
                            for (key, value) in &attributes {
                                doc.set_attribute(root, key, value)?;
                            }
                            document = Some(doc);
                            root
                        }
                    };
                    if !is_empty {
                        stack.push(idx);
                    }
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(malformed)?;
                    // Indentation between elements carries no value.
                    if text.trim().is_empty() {
                        continue;
                    }
                    if let (Some(doc), Some(&current)) = (document.as_mut(), stack.last()) {
                        doc.push_text(current, &text)?;
                    }
                }
                Event::CData(data) => {
                    let data = data.into_inner();
                    let text = std::str::from_utf8(&data).map_err(malformed)?;
                    if let (Some(doc), Some(&current)) = (document.as_mut(), stack.last()) {
                        doc.push_text(current, text)?;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(malformed("unexpected end of document"));
        }
        document.ok_or_else(|| malformed("document has no root element"))
    }

    /// Compact XML with declaration, as sent to the server.
    pub fn to_xml(&self) -> String {
        let mut out = String::from(XML_DECLARATION);
        self.write_compact(self.root(), &mut out);
        out
    }

    /// Compact XML for one subtree (no declaration).
    pub fn subtree_to_xml(&self, idx: Index) -> String {
        let mut out = String::new();
        self.write_compact(idx, &mut out);
        out
    }

    /// Indented XML for one subtree with attributes sorted by name.
    ///
    /// Two documents that differ only in attribute order or formatting
    /// render identically.
    pub fn canonical_xml(&self, idx: Index) -> String {
        let mut out = String::new();
        self.write_canonical(idx, 0, &mut out);
        out
    }

    fn write_compact(&self, idx: Index, out: &mut String) {
        let Some(element) = self.get(idx) else {
            return;
        };
        write_start(element, element.attributes().iter(), out);
        out.push('>');
        if let Some(text) = element.text() {
            out.push_str(&escape(text));
        }
        for &child in element.children() {
            self.write_compact(child, out);
        }
        out.push_str("</");
        out.push_str(element.tag());
        out.push('>');
    }

    fn write_canonical(&self, idx: Index, depth: usize, out: &mut String) {
        let Some(element) = self.get(idx) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let mut attributes: Vec<&(String, String)> = element.attributes().iter().collect();
        attributes.sort();

        out.push_str(&indent);
        write_start(element, attributes.into_iter(), out);
        let text = element.text().map(str::trim).filter(|t| !t.is_empty());
        match (text, element.children().is_empty()) {
            (None, true) => out.push_str("/>\n"),
            (Some(text), true) => {
                out.push('>');
                out.push_str(&escape(text));
                write_end(element, out);
            }
            (text, false) => {
                out.push_str(">\n");
                if let Some(text) = text {
                    out.push_str(&"  ".repeat(depth + 1));
                    out.push_str(&escape(text));
                    out.push('\n');
                }
                for &child in element.children() {
                    self.write_canonical(child, depth + 1, out);
                }
                out.push_str(&indent);
                write_end(element, out);
            }
        }
    }
}

fn write_start<'a>(
    element: &Element,
    attributes: impl Iterator<Item = &'a (String, String)>,
    out: &mut String,
) {
    out.push('<');
    out.push_str(element.tag());
    for (key, value) in attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
}

fn write_end(element: &Element, out: &mut String) {
    out.push_str("</");
    out.push_str(element.tag());
    out.push_str(">\n");
}
