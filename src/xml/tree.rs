use std::path::Path;

use roxmltree::{Document, Node, ParsingOptions};

use crate::error::{Error, Result};
use crate::ir::QName;
use super::{too_deep, XmlAttribute, XmlElement, DEFAULT_MAX_DEPTH};

/// Parse a whole document and return its root element.
pub fn parse_document(text: &str) -> Result<XmlElement> {
    parse_document_within(text, DEFAULT_MAX_DEPTH)
}

/// Like [`parse_document`], failing on elements nested deeper than
/// `max_depth`.
pub fn parse_document_within(text: &str, max_depth: usize) -> Result<XmlElement> {
    let options = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };
    let doc = Document::parse_with_options(text, options).map_err(|e| Error::XmlParse(e.to_string()))?;
    convert(doc.root_element(), 1, max_depth)
}

pub fn read_document(path: &Path, max_depth: usize) -> Result<XmlElement> {
    let text = std::fs::read_to_string(path)?;
    parse_document_within(&text, max_depth).map_err(|e| match e {
        Error::XmlParse(msg) => Error::XmlParse(format!("{}: {msg}", path.display())),
        other => other,
    })
}

fn convert(node: Node<'_, '_>, level: usize, max_depth: usize) -> Result<XmlElement> {
    if level > max_depth {
        return Err(too_deep(max_depth));
    }
    let tag = node.tag_name();
    let attributes = node
        .attributes()
        .map(|a| XmlAttribute { name: QName::new(a.name(), a.namespace()), value: a.value().to_string() })
        .collect();
    let mut element = XmlElement::new(QName::new(tag.name(), tag.namespace()), attributes);
    for child in node.children() {
        if child.is_element() {
            element.push_child(convert(child, level + 1, max_depth)?);
        } else if child.is_text() {
            element.push_text(child.text().unwrap_or_default());
        }
    }
    Ok(element)
}
