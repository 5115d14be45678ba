//! Transcode an XML element tree against a schema graph node.
//!
//! Matching uses only the provenance the builder attached to each field:
//! child elements go to `Element` fields, then into repeated group items,
//! then to the element wildcard; attributes go to `Attribute` fields, then
//! to the attribute wildcard. Anything left over is an error, and no partial
//! value is returned.
pub mod datetime;
pub mod literal;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::ir::{Compositor, NodeId, Origin, QName, Record, RecordSource, SchemaGraph, SchemaNode};
use crate::value::{RecordValue, Value};
use crate::xml::write::inner_xml;
use crate::xml::{too_deep, XmlAttribute, XmlElement, DEFAULT_MAX_DEPTH};

pub use datetime::DefaultZone;

#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    pub default_zone: DefaultZone,
    /// Deepest element nesting accepted; deeper input is an `XmlParse` error.
    pub max_depth: usize,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self { default_zone: DefaultZone::default(), max_depth: DEFAULT_MAX_DEPTH }
    }
}

/// Stateless per call; one instance can transcode any number of documents.
#[derive(Debug, Clone)]
pub struct Transcoder<'g> {
    graph: &'g SchemaGraph,
    config: TranscoderConfig,
}

impl<'g> Transcoder<'g> {
    pub fn new(graph: &'g SchemaGraph, config: TranscoderConfig) -> Self {
        Self { graph, config }
    }

    pub fn graph(&self) -> &'g SchemaGraph {
        self.graph
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Transcode a document's root element against the graph root.
    pub fn transcode_document(&self, root: &XmlElement) -> Result<Value> {
        let node = self
            .graph
            .root()
            .ok_or_else(|| Error::SchemaConstruction("schema graph has no root".to_string()))?;
        debug!(root = %root.name, "transcoding document");
        self.transcode_root(node, root)
    }

    /// Like [`Transcoder::transcode`], except that a synthesized document
    /// record is filled by selecting the field of the root element.
    pub fn transcode_root(&self, node: NodeId, root: &XmlElement) -> Result<Value> {
        self.check_depth(root)?;
        let record = match self.graph.record(node) {
            Some(record) if record.source == RecordSource::Document => record,
            _ => return self.value(node, root),
        };
        let (index, field_ty) = self.document_field(record, &root.name)?;
        let mut slots = RecordValue::new(record.fields.len());
        slots.set(index, self.value(field_ty, root)?);
        Ok(Value::Record(slots))
    }

    /// Index and type of the document-record field declared for `root`.
    pub fn document_field(&self, record: &Record, root: &QName) -> Result<(usize, NodeId)> {
        let index = record
            .element_field(&root.name, root.namespace.as_deref())
            .ok_or_else(|| Error::FieldResolution(format!("no root element `{root}` in the schema")))?;
        Ok((index, record.fields[index].ty))
    }

    pub fn transcode(&self, node: NodeId, element: &XmlElement) -> Result<Value> {
        self.check_depth(element)?;
        self.value(node, element)
    }

    /// Transcode a child of an element matched against `record` on its own,
    /// resolving it the way [`Transcoder::transcode`] routes children. Returns
    /// the node the value was transcoded against: the element field's type,
    /// the field's type inside a repeated group item, or the wildcard map's
    /// value type (the child's inner XML).
    pub fn transcode_child(&self, record: &Record, child: &XmlElement) -> Result<(NodeId, Value)> {
        self.check_depth(child)?;
        let name = &child.name;
        if let Some(index) = record.element_field(&name.name, name.namespace.as_deref()) {
            let node = self.graph.element_type(record.fields[index].ty);
            return Ok((node, self.value(node, child)?));
        }
        if let Some((_, item)) = self.group_for(record, name) {
            return self.transcode_child(item, child);
        }
        if let Some(index) = record.element_wildcard {
            if let SchemaNode::Map(values) = self.graph.node(record.fields[index].ty) {
                return Ok((*values, Value::String(inner_xml(child))));
            }
        }
        Err(unmatched_element(record, name))
    }

    /// Route `attributes` as they would be for an element matched against
    /// `record`, failing on the first one without a field or with a bad value.
    pub fn check_attributes(&self, record: &Record, attributes: &[XmlAttribute]) -> Result<()> {
        let mut slots = self.empty_record(record);
        self.route_attributes(record, &mut slots, attributes)
    }

    fn check_depth(&self, element: &XmlElement) -> Result<()> {
        if element.depth() > self.config.max_depth {
            return Err(too_deep(self.config.max_depth));
        }
        Ok(())
    }

    fn value(&self, node: NodeId, element: &XmlElement) -> Result<Value> {
        match self.graph.node(node) {
            SchemaNode::Primitive { kind, logical } => {
                literal::parse_primitive(*kind, *logical, &element.text(), &self.config.default_zone)
            }
            SchemaNode::Record(record) => self.record(record, element),
            SchemaNode::Array(item) => element
                .children()
                .map(|child| self.value(*item, child))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            SchemaNode::Optional(inner) => self.value(*inner, element),
            SchemaNode::Map(_) => Ok(Value::Map(
                element.children().map(|child| (child.name.name.clone(), inner_xml(child))).collect(),
            )),
        }
    }

    fn record(&self, record: &Record, element: &XmlElement) -> Result<Value> {
        trace!(element = %element.name, record = ?record.name, "record");
        let mut slots = self.empty_record(record);
        for child in element.children() {
            self.route_child(record, &mut slots, child)?;
        }
        self.route_attributes(record, &mut slots, &element.attributes)?;
        if let Some(index) = record.text {
            let value = self.value(record.fields[index].ty, element)?;
            slots.set(index, value);
        }
        Ok(Value::Record(slots))
    }

    /// Arrays start empty and wildcard maps start present but empty.
    fn empty_record(&self, record: &Record) -> RecordValue {
        let mut slots = RecordValue::new(record.fields.len());
        for (index, field) in record.fields.iter().enumerate() {
            match self.graph.node(field.ty) {
                SchemaNode::Array(_) => slots.set(index, Value::Array(Vec::new())),
                SchemaNode::Map(_) => slots.set(index, Value::Map(IndexMap::new())),
                _ => {}
            }
        }
        slots
    }

    fn route_child(&self, record: &Record, slots: &mut RecordValue, child: &XmlElement) -> Result<()> {
        let name = &child.name;
        if let Some(index) = record.element_field(&name.name, name.namespace.as_deref()) {
            return self.assign(record, slots, index, child);
        }
        if let Some((index, item)) = self.group_for(record, name) {
            return self.route_into_group(slots, index, item, child);
        }
        if let Some(index) = record.element_wildcard {
            if let Some(Value::Map(map)) = slots.get_mut(index) {
                map.insert(name.name.clone(), inner_xml(child));
            }
            return Ok(());
        }
        Err(unmatched_element(record, name))
    }

    fn assign(&self, record: &Record, slots: &mut RecordValue, index: usize, child: &XmlElement) -> Result<()> {
        let field = &record.fields[index];
        if let SchemaNode::Array(item) = self.graph.node(field.ty) {
            let value = self.value(*item, child)?;
            if let Some(Value::Array(items)) = slots.get_mut(index) {
                items.push(value);
            }
            return Ok(());
        }
        if slots.is_set(index) {
            return Err(Error::FieldResolution(format!(
                "element `{}` occurs more than once in record `{}`",
                child.name,
                record_name(record)
            )));
        }
        let value = self.value(field.ty, child)?;
        slots.set(index, value);
        Ok(())
    }

    /// The repeated group field of `record` whose item record declares
    /// `name`, directly or through a nested repeated group.
    fn group_for(&self, record: &Record, name: &QName) -> Option<(usize, &'g Record)> {
        record.fields.iter().enumerate().find_map(|(index, field)| {
            if field.origin != Origin::Group {
                return None;
            }
            let item = self.graph.record(self.graph.element_type(field.ty))?;
            self.accepts(item, name).then_some((index, item))
        })
    }

    fn accepts(&self, record: &Record, name: &QName) -> bool {
        record.element_field(&name.name, name.namespace.as_deref()).is_some() || self.group_for(record, name).is_some()
    }

    fn route_into_group(&self, slots: &mut RecordValue, index: usize, item: &Record, child: &XmlElement) -> Result<()> {
        let Some(Value::Array(items)) = slots.get_mut(index) else {
            return Ok(());
        };
        let start_new = match items.last() {
            Some(Value::Record(last)) => self.item_is_full(item, last, &child.name),
            _ => true,
        };
        if start_new {
            items.push(Value::Record(self.empty_record(item)));
        }
        match items.last_mut() {
            Some(Value::Record(last)) => self.route_child(item, last, child),
            _ => Ok(()),
        }
    }

    /// Whether `child` must open a new item instead of extending `last`.
    ///
    /// A choice item holds exactly one arm. A sequence or all item is
    /// extended until the matched field is already taken.
    fn item_is_full(&self, item: &Record, last: &RecordValue, name: &QName) -> bool {
        let is_choice = item.source == RecordSource::Group(Compositor::Choice);
        let target = match item.element_field(&name.name, name.namespace.as_deref()) {
            Some(index) => index,
            None => match self.group_for(item, name) {
                Some((index, _)) => index,
                None => return true,
            },
        };
        let field = &item.fields[target];
        let repeats = matches!(self.graph.node(field.ty), SchemaNode::Array(_));
        if !repeats && last.is_set(target) {
            return true;
        }
        is_choice
            && item.fields.iter().enumerate().any(|(index, f)| {
                index != target && matches!(f.origin, Origin::Element(_) | Origin::Group) && is_populated(last.get(index))
            })
    }

    fn route_attributes(&self, record: &Record, slots: &mut RecordValue, attributes: &[XmlAttribute]) -> Result<()> {
        for attribute in attributes.iter().filter(|a| !a.is_meta()) {
            self.route_attribute(record, slots, attribute)?;
        }
        Ok(())
    }

    fn route_attribute(&self, record: &Record, slots: &mut RecordValue, attribute: &XmlAttribute) -> Result<()> {
        let name = &attribute.name;
        if let Some(index) = record.attribute_field(&name.name, name.namespace.as_deref()) {
            let value = self.literal(record.fields[index].ty, &attribute.value)?;
            slots.set(index, value);
            return Ok(());
        }
        if let Some(index) = record.attribute_wildcard {
            if let Some(Value::Map(map)) = slots.get_mut(index) {
                map.insert(name.name.clone(), attribute.value.clone());
            }
            return Ok(());
        }
        Err(Error::FieldResolution(format!(
            "attribute `{name}` matches no field of record `{}`",
            record_name(record)
        )))
    }

    fn literal(&self, node: NodeId, text: &str) -> Result<Value> {
        match self.graph.node(self.graph.element_type(node)) {
            SchemaNode::Primitive { kind, logical } => {
                literal::parse_primitive(*kind, *logical, text, &self.config.default_zone)
            }
            _ => Err(Error::FieldResolution(format!("attribute value `{text}` needs a primitive field"))),
        }
    }
}

fn is_populated(slot: Option<&Value>) -> bool {
    match slot {
        None => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Map(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

fn unmatched_element(record: &Record, name: &QName) -> Error {
    Error::FieldResolution(format!("element `{name}` matches no field of record `{}`", record_name(record)))
}

fn record_name(record: &Record) -> String {
    record.name.as_ref().map(ToString::to_string).unwrap_or_else(|| "<anonymous>".to_string())
}
