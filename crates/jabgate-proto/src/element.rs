//! Owned element tree for decoded stanzas.
//!
//! Stanzas are small and are inspected a handful of times each, so the codec
//! hands out a fully owned tree rather than a borrowing event stream.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ProtocolError, Result};

/// A parsed XML element with its attributes, child elements and text.
///
/// Names keep their namespace prefix (`stream:features`, `nos:x`); lookups
/// by child name compare local names only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    /// Parse a single complete element.
    ///
    /// Leading declarations, comments and whitespace are skipped; anything
    /// after the outermost end tag is ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut reader = Reader::from_str(raw);
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = false;

        let mut stack: Vec<Element> = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| ProtocolError::Malformed("unmatched end tag".into()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(std::str::from_utf8(&data)?);
                    }
                }
                Event::Eof => return Err(ProtocolError::Truncated),
                _ => {}
            }
        }
    }

    /// Build a childless element from a start tag.
    pub(crate) fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = std::str::from_utf8(start.name().as_ref())?.to_owned();
        Ok(Self {
            name,
            attrs: collect_attrs(start)?,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// Create an element by hand. Mostly useful in tests.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder: add an attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    /// Builder: append a child element.
    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Builder: set the text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Qualified name, including any prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Attribute value by exact (qualified) key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All attributes in document order.
    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    /// First child whose local name matches.
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local_name() == local_name)
    }

    /// Every child whose local name matches, in document order.
    pub fn children_named<'a>(
        &'a self,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |c| c.local_name() == local_name)
    }

    /// All child elements.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Text of the first matching child.
    pub fn child_text(&self, local_name: &str) -> Option<&str> {
        self.child(local_name).map(Element::text)
    }

    /// Concatenated character data directly inside this element.
    pub fn text(&self) -> &str {
        &self.text
    }
}

pub(crate) fn collect_attrs(start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}
