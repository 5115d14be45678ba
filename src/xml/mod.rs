//! Owned XML element tree shared by the in-memory and streaming paths.
pub mod events;
pub mod tree;
pub mod write;

use crate::error::Error;
use crate::ir::QName;

pub use events::{EventReader, XmlEvent};
pub use tree::{parse_document, parse_document_within, read_document};

/// Element nesting accepted unless configured otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 256;

pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: QName,
    pub value: String,
}

impl XmlAttribute {
    /// Namespace declarations and `xsi:*` carry no document data.
    pub fn is_meta(&self) -> bool {
        matches!(self.name.namespace.as_deref(), Some(XMLNS_NS | XSI_NS))
            || (self.name.namespace.is_none() && self.name.name == "xmlns")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlContent {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: QName,
    pub attributes: Vec<XmlAttribute>,
    /// Text runs and child elements in document order.
    pub content: Vec<XmlContent>,
}

impl XmlElement {
    pub fn new(name: QName, attributes: Vec<XmlAttribute>) -> Self {
        Self { name, attributes, content: Vec::new() }
    }

    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.content.iter().filter_map(|c| match c {
            XmlContent::Element(e) => Some(e),
            XmlContent::Text(_) => None,
        })
    }

    pub fn child_count(&self) -> usize {
        self.children().count()
    }

    /// All text runs joined, outer whitespace trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for c in &self.content {
            if let XmlContent::Text(t) = c {
                out.push_str(t);
            }
        }
        out.trim().to_string()
    }

    /// Whitespace-only runs are dropped; adjacent runs merge.
    pub fn push_text(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        match self.content.last_mut() {
            Some(XmlContent::Text(t)) => t.push_str(text),
            _ => self.content.push(XmlContent::Text(text.to_string())),
        }
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.content.push(XmlContent::Element(child));
    }

    /// Levels of element nesting, counting `self` as one.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((element, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(element.children().map(|child| (child, level + 1)));
        }
        deepest
    }
}

pub(crate) fn too_deep(max_depth: usize) -> Error {
    Error::XmlParse(format!("element nesting exceeds {max_depth} levels"))
}
