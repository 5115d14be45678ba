// Schema graph IR. Nodes live in an arena and refer to each other by `NodeId`,
// so recursive XSD types become cycles through the same record slot.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    pub name: String,
    pub namespace: Option<String>,
}

impl QName {
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self { name: name.into(), namespace: namespace.map(str::to_string) }
    }
    pub fn local(name: impl Into<String>) -> Self {
        Self { name: name.into(), namespace: None }
    }
    pub fn matches(&self, name: &str, namespace: Option<&str>) -> bool {
        self.name == name && self.namespace.as_deref() == namespace
    }
}

/// Clark-ish notation used in provenance strings: `name{namespace}`.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}{{{}}}", self.name, ns),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 7] = [
        Self::Boolean, Self::Int, Self::Long, Self::Float, Self::Double, Self::Bytes, Self::String,
    ];

    /// Avro type name, also the reserved keyword the field namer avoids.
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bytes => "bytes",
            Self::String => "string",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// Extra meaning carried by a primitive that changes how its text is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Logical {
    /// `long` holding epoch milliseconds parsed from `xs:dateTime`.
    TimestampMillis,
    /// `bytes` from `xs:hexBinary`.
    Hex,
    /// `bytes` from `xs:base64Binary`.
    Base64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compositor {
    Sequence,
    Choice,
    All,
}

impl Compositor {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Choice => "choice",
            Self::All => "all",
        }
    }
}

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    Type,
    /// Synthesized wrapper over several root elements.
    Document,
    /// Item record of a repeated model group.
    Group(Compositor),
}

/// Provenance of a field; drives matching during transcoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Element(QName),
    Attribute(QName),
    ElementWildcard,
    AttributeWildcard,
    Group,
    Text,
}

impl Origin {
    pub fn is_attribute(&self) -> bool {
        matches!(self, Origin::Attribute(_) | Origin::AttributeWildcard)
    }

    pub fn qname(&self) -> Option<&QName> {
        match self {
            Origin::Element(q) | Origin::Attribute(q) => Some(q),
            _ => None,
        }
    }

    /// `"element name{ns}"`, `"attribute name"`, or a reserved marker.
    pub fn provenance(&self) -> String {
        match self {
            Origin::Element(q) => format!("element {q}"),
            Origin::Attribute(q) => format!("attribute {q}"),
            Origin::ElementWildcard => "element-wildcard".to_string(),
            Origin::AttributeWildcard => "attribute-wildcard".to_string(),
            Origin::Group => "group".to_string(),
            Origin::Text => "text".to_string(),
        }
    }

    pub fn from_provenance(s: &str) -> Option<Self> {
        match s {
            "element-wildcard" => return Some(Origin::ElementWildcard),
            "attribute-wildcard" => return Some(Origin::AttributeWildcard),
            "group" => return Some(Origin::Group),
            "text" => return Some(Origin::Text),
            _ => {}
        }
        let (kind, rest) = s.split_once(' ')?;
        let qname = match rest.split_once('{') {
            Some((name, ns)) => QName::new(name, Some(ns.strip_suffix('}')?)),
            None => QName::local(rest),
        };
        match kind {
            "element" => Some(Origin::Element(qname)),
            "attribute" => Some(Origin::Attribute(qname)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub origin: Origin,
    pub ty: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: Option<QName>,
    pub source: RecordSource,
    pub fields: Vec<Field>,      // declaration order
    pub element_wildcard: Option<usize>,
    pub attribute_wildcard: Option<usize>,
    pub text: Option<usize>,
}

impl Record {
    pub fn new(name: Option<QName>, source: RecordSource) -> Self {
        Self {
            name,
            source,
            fields: Vec::new(),
            element_wildcard: None,
            attribute_wildcard: None,
            text: None,
        }
    }

    /// Index the wildcard and text fields. Call after `fields` is final.
    pub fn index_special_fields(&mut self) {
        self.element_wildcard = self.fields.iter().position(|f| f.origin == Origin::ElementWildcard);
        self.attribute_wildcard = self.fields.iter().position(|f| f.origin == Origin::AttributeWildcard);
        self.text = self.fields.iter().position(|f| f.origin == Origin::Text);
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn element_field(&self, name: &str, namespace: Option<&str>) -> Option<usize> {
        self.fields.iter().position(|f| matches!(&f.origin, Origin::Element(q) if q.matches(name, namespace)))
    }

    pub fn attribute_field(&self, name: &str, namespace: Option<&str>) -> Option<usize> {
        self.fields.iter().position(|f| matches!(&f.origin, Origin::Attribute(q) if q.matches(name, namespace)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Primitive { kind: PrimitiveKind, logical: Option<Logical> },
    Record(Record),
    Array(NodeId),
    Optional(NodeId),
    Map(NodeId),
}

impl SchemaNode {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        SchemaNode::Primitive { kind, logical: None }
    }
}

/// Arena holding every node of one derived schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaGraph {
    nodes: Vec<SchemaNode>,
    root: Option<NodeId>,
}

impl SchemaGraph {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, node: SchemaNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn root(&self) -> Option<NodeId> { self.root }
    pub fn set_root(&mut self, id: NodeId) { self.root = Some(id); }

    pub fn record(&self, id: NodeId) -> Option<&Record> {
        match self.node(id) {
            SchemaNode::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn record_mut(&mut self, id: NodeId) -> Option<&mut Record> {
        match self.node_mut(id) {
            SchemaNode::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Peel `Optional` and `Array` wrappers down to the element type.
    pub fn element_type(&self, mut id: NodeId) -> NodeId {
        loop {
            match self.node(id) {
                SchemaNode::Optional(inner) | SchemaNode::Array(inner) => id = *inner,
                _ => return id,
            }
        }
    }

    /// Field lookup by name on a record node.
    pub fn field(&self, record: NodeId, name: &str) -> crate::Result<&Field> {
        let rec = self.record(record).ok_or_else(|| {
            crate::Error::FieldResolution(format!("node {} is not a record", record.0))
        })?;
        rec.field_index(name)
            .map(|i| &rec.fields[i])
            .ok_or_else(|| crate::Error::FieldResolution(format!(
                "record {} has no field `{name}`",
                rec.name.as_ref().map(|q| q.name.as_str()).unwrap_or("<anonymous>"),
            )))
    }
}
