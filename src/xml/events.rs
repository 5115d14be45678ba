//! Push-style event source over `quick-xml`'s namespace-aware reader.
//!
//! Text, CDATA and entity references between two tags are coalesced into one
//! `Characters` event; whitespace-only runs are not reported.

use std::collections::VecDeque;
use std::io::BufRead;

use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::ir::QName;
use super::XmlAttribute;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    StartElement { name: QName, attributes: Vec<XmlAttribute> },
    Characters(String),
    EndElement,
}

pub struct EventReader<R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    pending_text: String,
    queue: VecDeque<XmlEvent>,
    done: bool,
}

impl<'a> EventReader<&'a [u8]> {
    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl<R: BufRead> EventReader<R> {
    pub fn new(input: R) -> Self {
        let mut reader = NsReader::from_reader(input);
        // whitespace is dropped after coalescing, not before, so text around
        // entity references survives
        reader.config_mut().trim_text(false);
        reader.config_mut().expand_empty_elements = true;
        Self { reader, buf: Vec::new(), pending_text: String::new(), queue: VecDeque::new(), done: false }
    }

    fn flush_text(&mut self) {
        if self.pending_text.trim().is_empty() {
            self.pending_text.clear();
        } else {
            self.queue.push_back(XmlEvent::Characters(std::mem::take(&mut self.pending_text)));
        }
    }

    /// Read until at least one event is queued or input ends.
    fn fill(&mut self) -> Result<()> {
        while self.queue.is_empty() && !self.done {
            self.buf.clear();
            let (resolve, event) = self
                .reader
                .read_resolved_event_into(&mut self.buf)
                .map_err(|e| Error::XmlParse(e.to_string()))?;
            let namespace = resolve_namespace(resolve);

            match event {
                Event::Start(start) => {
                    let start = start.into_owned();
                    self.flush_text();
                    let event = self.start_event(namespace, &start)?;
                    self.queue.push_back(event);
                }
                Event::Empty(start) => {
                    let start = start.into_owned();
                    self.flush_text();
                    let event = self.start_event(namespace, &start)?;
                    self.queue.push_back(event);
                    self.queue.push_back(XmlEvent::EndElement);
                }
                Event::End(_) => {
                    self.flush_text();
                    self.queue.push_back(XmlEvent::EndElement);
                }
                Event::Text(text) => {
                    let pos = self.reader.buffer_position();
                    let text = text.decode().map_err(|e| parse_error(pos, e))?;
                    self.pending_text.push_str(&text);
                }
                Event::CData(cdata) => {
                    let pos = self.reader.buffer_position();
                    let text = cdata.decode().map_err(|e| parse_error(pos, e))?;
                    self.pending_text.push_str(&text);
                }
                Event::GeneralRef(reference) => {
                    let pos = self.reader.buffer_position();
                    let raw = reference.decode().map_err(|e| parse_error(pos, e))?.into_owned();
                    let resolved =
                        resolve_entity(&raw).ok_or_else(|| parse_error(pos, format!("unknown entity `&{raw};`")))?;
                    self.pending_text.push_str(&resolved);
                }
                Event::Eof => {
                    self.flush_text();
                    self.done = true;
                }
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }
        Ok(())
    }

    fn start_event(&self, namespace: Option<String>, start: &BytesStart<'_>) -> Result<XmlEvent> {
        let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let name = QName { name: local, namespace };
        let pos = self.reader.buffer_position();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| parse_error(pos, e))?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let (resolve, local) = self.reader.resolve_attribute(attr.key);
            let attr_name = QName {
                name: String::from_utf8_lossy(local.as_ref()).into_owned(),
                namespace: resolve_namespace(resolve),
            };
            let value = attr.unescape_value().map_err(|e| parse_error(pos, e))?.into_owned();
            attributes.push(XmlAttribute { name: attr_name, value });
        }
        trace!(element = %name, attributes = attributes.len(), "start");
        Ok(XmlEvent::StartElement { name, attributes })
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<XmlEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(e) = self.fill() {
            self.done = true;
            self.queue.clear();
            return Some(Err(e));
        }
        self.queue.pop_front().map(Ok)
    }
}

fn parse_error(position: impl std::fmt::Display, message: impl std::fmt::Display) -> Error {
    Error::XmlParse(format!("at byte {position}: {message}"))
}

fn resolve_namespace(resolve: ResolveResult<'_>) -> Option<String> {
    match resolve {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            warn!("unknown namespace prefix `{}`", String::from_utf8_lossy(&prefix));
            None
        }
    }
}

/// Predefined entities and character references.
fn resolve_entity(raw: &str) -> Option<String> {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return Some(resolved.to_string());
    }
    let rest = raw.strip_prefix('#')?;
    let code = match rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => rest.parse::<u32>().ok()?,
    };
    char::from_u32(code).map(String::from)
}
