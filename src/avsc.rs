//! Avro-style JSON form of the schema graph.
//!
//! Each record is written in full at its first occurrence and by name after
//! that, which is also how cycles are written. Fields carry their XML
//! provenance under `"source"` so the graph can be read back for transcoding.
use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::ir::{
    Compositor, Field, Logical, NodeId, Origin, PrimitiveKind, QName, Record, RecordSource, SchemaGraph, SchemaNode,
};
use crate::lower::naming::Namer;
use crate::path_de::{from_slice_with_path, from_str_with_path};

const TIMESTAMP_MILLIS: &str = "timestamp-millis";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeJson {
    /// Primitive name or a reference to a record written earlier.
    Name(String),
    /// `["null", T]`.
    Union(Vec<TypeJson>),
    Complex(ComplexJson),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ComplexJson {
    Record {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        fields: Vec<FieldJson>,
    },
    Array {
        items: Box<TypeJson>,
    },
    Map {
        values: Box<TypeJson>,
    },
    Long {
        #[serde(rename = "logicalType", default, skip_serializing_if = "Option::is_none")]
        logical_type: Option<String>,
    },
    Bytes {
        #[serde(rename = "xmlEncoding", default, skip_serializing_if = "Option::is_none")]
        xml_encoding: Option<String>,
    },
    Boolean {},
    Int {},
    Float {},
    Double {},
    String {},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldJson {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeJson,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

// ————————————————————————————————————————————————————————————————————————————
// WRITE
// ————————————————————————————————————————————————————————————————————————————

pub fn to_schema_json(graph: &SchemaGraph) -> Result<TypeJson> {
    let root = graph
        .root()
        .ok_or_else(|| Error::SchemaConstruction("schema graph has no root".to_string()))?;
    let mut writer = Writer { graph, names: record_names(graph), written: HashSet::new() };
    Ok(writer.ty(root))
}

pub fn to_string_pretty(graph: &SchemaGraph) -> Result<String> {
    let schema = to_schema_json(graph)?;
    serde_json::to_string_pretty(&schema).map_err(|e| Error::SchemaFormat(e.to_string()))
}

/// Graph-wide unique, sanitized record names, assigned in arena order.
fn record_names(graph: &SchemaGraph) -> HashMap<NodeId, String> {
    let mut namer = Namer::new();
    (0..graph.len())
        .map(NodeId)
        .filter_map(|id| {
            let record = graph.record(id)?;
            let raw = record.name.as_ref().map_or("record", |q| q.name.as_str());
            Some((id, namer.claim(raw)))
        })
        .collect()
}

struct Writer<'g> {
    graph: &'g SchemaGraph,
    names: HashMap<NodeId, String>,
    written: HashSet<NodeId>,
}

impl Writer<'_> {
    fn ty(&mut self, id: NodeId) -> TypeJson {
        let graph = self.graph;
        match graph.node(id) {
            SchemaNode::Primitive { kind, logical } => primitive_json(*kind, *logical),
            SchemaNode::Record(record) => {
                let name = self.names.get(&id).cloned().unwrap_or_default();
                if !self.written.insert(id) {
                    return TypeJson::Name(name);
                }
                let fields = record.fields.iter().map(|f| self.field(f)).collect();
                TypeJson::Complex(ComplexJson::Record {
                    name,
                    namespace: record.name.as_ref().and_then(|q| q.namespace.clone()),
                    source: record_source_name(record.source).map(str::to_string),
                    fields,
                })
            }
            SchemaNode::Array(item) => TypeJson::Complex(ComplexJson::Array { items: Box::new(self.ty(*item)) }),
            SchemaNode::Optional(inner) => TypeJson::Union(vec![TypeJson::Name("null".to_string()), self.ty(*inner)]),
            SchemaNode::Map(values) => TypeJson::Complex(ComplexJson::Map { values: Box::new(self.ty(*values)) }),
        }
    }

    fn field(&mut self, field: &Field) -> FieldJson {
        let optional = matches!(self.graph.node(field.ty), SchemaNode::Optional(_));
        FieldJson {
            name: field.name.clone(),
            ty: self.ty(field.ty),
            source: field.origin.provenance(),
            default: optional.then_some(serde_json::Value::Null),
        }
    }
}

fn primitive_json(kind: PrimitiveKind, logical: Option<Logical>) -> TypeJson {
    match logical {
        None => TypeJson::Name(kind.name().to_string()),
        Some(Logical::TimestampMillis) => {
            TypeJson::Complex(ComplexJson::Long { logical_type: Some(TIMESTAMP_MILLIS.to_string()) })
        }
        Some(Logical::Hex) => TypeJson::Complex(ComplexJson::Bytes { xml_encoding: Some("hex".to_string()) }),
        Some(Logical::Base64) => TypeJson::Complex(ComplexJson::Bytes { xml_encoding: Some("base64".to_string()) }),
    }
}

fn record_source_name(source: RecordSource) -> Option<&'static str> {
    match source {
        RecordSource::Type => None,
        RecordSource::Document => Some("document"),
        RecordSource::Group(compositor) => Some(compositor.name()),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// READ
// ————————————————————————————————————————————————————————————————————————————

pub fn from_str(text: &str) -> Result<SchemaGraph> {
    from_schema_json(&from_str_with_path::<TypeJson>(text)?)
}

pub fn read_file(path: &Path) -> Result<SchemaGraph> {
    let bytes = std::fs::read(path)?;
    let schema = from_slice_with_path::<TypeJson>(&bytes).map_err(|e| match e {
        Error::SchemaFormat(message) => Error::SchemaFormat(format!("{}: {message}", path.display())),
        other => other,
    })?;
    from_schema_json(&schema)
}

pub fn from_schema_json(schema: &TypeJson) -> Result<SchemaGraph> {
    let mut reader = Reader { graph: SchemaGraph::new(), records: HashMap::new(), primitives: HashMap::new() };
    let root = reader.ty(schema)?;
    let mut graph = reader.graph;
    graph.set_root(root);
    debug!(nodes = graph.len(), "schema graph read");
    Ok(graph)
}

struct Reader {
    graph: SchemaGraph,
    records: HashMap<String, NodeId>,
    primitives: HashMap<(PrimitiveKind, Option<Logical>), NodeId>,
}

impl Reader {
    fn ty(&mut self, ty: &TypeJson) -> Result<NodeId> {
        match ty {
            TypeJson::Name(name) => match PrimitiveKind::from_name(name) {
                Some(kind) => Ok(self.primitive(kind, None)),
                None => self
                    .records
                    .get(name)
                    .copied()
                    .ok_or_else(|| Error::SchemaFormat(format!("unknown type name `{name}`"))),
            },
            TypeJson::Union(arms) => match arms.as_slice() {
                [TypeJson::Name(null), inner] if null == "null" => {
                    let inner = self.ty(inner)?;
                    Ok(self.graph.add(SchemaNode::Optional(inner)))
                }
                _ => Err(Error::SchemaFormat("unions must be [\"null\", T]".to_string())),
            },
            TypeJson::Complex(complex) => self.complex(complex),
        }
    }

    fn complex(&mut self, complex: &ComplexJson) -> Result<NodeId> {
        let id = match complex {
            ComplexJson::Record { name, namespace, source, fields } => {
                self.record(name, namespace.as_deref(), source.as_deref(), fields)?
            }
            ComplexJson::Array { items } => {
                let items = self.ty(items)?;
                self.graph.add(SchemaNode::Array(items))
            }
            ComplexJson::Map { values } => {
                let values = self.ty(values)?;
                self.graph.add(SchemaNode::Map(values))
            }
            ComplexJson::Long { logical_type } => match logical_type.as_deref() {
                None => self.primitive(PrimitiveKind::Long, None),
                Some(TIMESTAMP_MILLIS) => self.primitive(PrimitiveKind::Long, Some(Logical::TimestampMillis)),
                Some(other) => return Err(Error::SchemaFormat(format!("unsupported logicalType `{other}`"))),
            },
            ComplexJson::Bytes { xml_encoding } => match xml_encoding.as_deref() {
                None | Some("base64") => self.primitive(PrimitiveKind::Bytes, Some(Logical::Base64)),
                Some("hex") => self.primitive(PrimitiveKind::Bytes, Some(Logical::Hex)),
                Some(other) => return Err(Error::SchemaFormat(format!("unsupported xmlEncoding `{other}`"))),
            },
            ComplexJson::Boolean {} => self.primitive(PrimitiveKind::Boolean, None),
            ComplexJson::Int {} => self.primitive(PrimitiveKind::Int, None),
            ComplexJson::Float {} => self.primitive(PrimitiveKind::Float, None),
            ComplexJson::Double {} => self.primitive(PrimitiveKind::Double, None),
            ComplexJson::String {} => self.primitive(PrimitiveKind::String, None),
        };
        Ok(id)
    }

    fn record(&mut self, name: &str, namespace: Option<&str>, source: Option<&str>, fields: &[FieldJson]) -> Result<NodeId> {
        if self.records.contains_key(name) {
            return Err(Error::SchemaFormat(format!("record `{name}` is defined twice")));
        }
        let source = match source {
            None => RecordSource::Type,
            Some("document") => RecordSource::Document,
            Some("sequence") => RecordSource::Group(Compositor::Sequence),
            Some("choice") => RecordSource::Group(Compositor::Choice),
            Some("all") => RecordSource::Group(Compositor::All),
            Some(other) => return Err(Error::SchemaFormat(format!("record `{name}` has unknown source `{other}`"))),
        };
        // registered before the fields so references inside them resolve
        let node = self.graph.add(SchemaNode::Record(Record::new(Some(QName::new(name, namespace)), source)));
        self.records.insert(name.to_string(), node);

        let mut decoded = Vec::with_capacity(fields.len());
        for field in fields {
            let origin = Origin::from_provenance(&field.source).ok_or_else(|| {
                Error::SchemaFormat(format!("field `{}` of `{name}` has unknown source `{}`", field.name, field.source))
            })?;
            let ty = self.ty(&field.ty)?;
            decoded.push(Field { name: field.name.clone(), origin, ty });
        }
        if let Some(record) = self.graph.record_mut(node) {
            record.fields = decoded;
            record.index_special_fields();
        }
        Ok(node)
    }

    fn primitive(&mut self, kind: PrimitiveKind, logical: Option<Logical>) -> NodeId {
        *self
            .primitives
            .entry((kind, logical))
            .or_insert_with(|| self.graph.add(SchemaNode::Primitive { kind, logical }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::{build, BuildOptions};
    use crate::xsd::load_str;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn graph(body: &str) -> SchemaGraph {
        let xsd = format!(r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">{body}</xs:schema>"#);
        build(&load_str(&xsd).unwrap(), &BuildOptions::default()).unwrap()
    }

    const TREE: &str = r#"
        <xs:element name="root" type="Node"/>
        <xs:complexType name="Node">
          <xs:sequence>
            <xs:element name="at" type="xs:dateTime"/>
            <xs:element name="child" type="Node" minOccurs="0" maxOccurs="unbounded"/>
            <xs:any minOccurs="0"/>
          </xs:sequence>
          <xs:attribute name="raw" type="xs:hexBinary"/>
        </xs:complexType>"#;

    #[test]
    fn writes_records_once_and_references_after() {
        let g = graph(TREE);
        let json = serde_json::to_value(to_schema_json(&g).unwrap()).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "record",
                "name": "Node",
                "fields": [
                    {"name": "at", "type": {"type": "long", "logicalType": "timestamp-millis"}, "source": "element at"},
                    {"name": "child", "type": {"type": "array", "items": "Node"}, "source": "element child"},
                    {"name": "others", "type": {"type": "map", "values": "string"}, "source": "element-wildcard"},
                    {"name": "raw", "type": ["null", {"type": "bytes", "xmlEncoding": "hex"}],
                     "source": "attribute raw", "default": null}
                ]
            })
        );
    }

    #[test]
    fn round_trip_preserves_shape_and_cycles() {
        let g = graph(TREE);
        let text = to_string_pretty(&g).unwrap();
        let back = from_str(&text).unwrap();
        assert_eq!(to_string_pretty(&back).unwrap(), text);

        let root = back.root().unwrap();
        let child = back.field(root, "child").unwrap();
        assert_eq!(back.element_type(child.ty), root);
        let record = back.record(root).unwrap();
        assert_eq!(record.element_wildcard, Some(2));
        assert_eq!(record.fields[3].origin, Origin::Attribute(QName::local("raw")));
    }

    #[test]
    fn group_and_document_sources_are_written() {
        let g = graph(
            r#"<xs:element name="a"><xs:complexType>
                 <xs:choice maxOccurs="unbounded">
                   <xs:element name="x" type="xs:int"/>
                   <xs:element name="y" type="xs:int"/>
                 </xs:choice>
               </xs:complexType></xs:element>
               <xs:element name="b" type="xs:string"/>"#,
        );
        let json = serde_json::to_value(to_schema_json(&g).unwrap()).unwrap();
        assert_eq!(json["source"], json!("document"));
        let group = &json["fields"][0]["type"][1]["fields"][0]["type"]["items"];
        assert_eq!(group["source"], json!("choice"));
        assert_eq!(group["name"], json!("group0"));
        let back = from_str(&serde_json::to_string(&json).unwrap()).unwrap();
        assert_eq!(back.record(back.root().unwrap()).unwrap().source, RecordSource::Document);
    }

    #[test]
    fn duplicate_record_names_are_made_unique() {
        let mut g = SchemaGraph::new();
        let s = g.add(SchemaNode::primitive(PrimitiveKind::String));
        let inner = g.add(SchemaNode::Record(Record::new(Some(QName::new("t", Some("urn:b"))), RecordSource::Type)));
        let mut outer = Record::new(Some(QName::new("t", Some("urn:a"))), RecordSource::Type);
        outer.fields = vec![
            Field { name: "s".into(), origin: Origin::Element(QName::local("s")), ty: s },
            Field { name: "inner".into(), origin: Origin::Element(QName::local("inner")), ty: inner },
        ];
        let outer = g.add(SchemaNode::Record(outer));
        g.set_root(outer);
        let json = serde_json::to_value(to_schema_json(&g).unwrap()).unwrap();
        assert_eq!(json["name"], json!("t0"));
        assert_eq!(json["namespace"], json!("urn:a"));
        assert_eq!(json["fields"][1]["type"]["name"], json!("t"));
    }

    #[test]
    fn malformed_schema_reports_path() {
        let err = from_str(r#"{"type": "record", "name": "r", "fields": [{"name": "a", "type": "int"}]}"#).unwrap_err();
        assert!(matches!(err, Error::SchemaFormat(_)), "{err}");
        let err = from_str(r#"{"type": "array", "items": "Missing"}"#).unwrap_err();
        assert!(err.to_string().contains("Missing"));
    }
}
