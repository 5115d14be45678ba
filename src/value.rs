//! Transcoded values, congruent with the schema node they were built against.
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde_json::{Map, Number, Value as JsonValue};

use crate::ir::{NodeId, Record, SchemaGraph, SchemaNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    Bytes(Vec<u8>),
    String(String),
    Record(RecordValue),
    Array(Vec<Value>),
    Map(IndexMap<String, String>),
}

/// One slot per record field, by field index. `None` is an absent value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordValue {
    pub fields: Vec<Option<Value>>,
}

impl RecordValue {
    pub fn new(len: usize) -> Self {
        Self { fields: vec![None; len] }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.fields.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.fields.get_mut(index).and_then(Option::as_mut)
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    pub fn set(&mut self, index: usize, value: Value) {
        self.fields[index] = Some(value);
    }

    /// Look a slot up by the name the record schema gives it.
    pub fn by_name<'v>(&'v self, record: &Record, name: &str) -> Option<&'v Value> {
        record.field_index(name).and_then(|i| self.get(i))
    }
}

impl Value {
    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
    pub fn as_map(&self) -> Option<&IndexMap<String, String>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Render as JSON against the node this value was transcoded for.
    ///
    /// Records become objects in field order with absent slots as `null`,
    /// bytes become ISO-8859-1 strings and non-finite floats become `null`.
    pub fn to_json(&self, graph: &SchemaGraph, node: NodeId) -> JsonValue {
        let node = peel_optional(graph, node);
        match self {
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Int(x) => JsonValue::from(*x),
            Value::Long(x) => JsonValue::from(*x),
            Value::Float(x) => float_json(f64::from(x.0)),
            Value::Double(x) => float_json(x.0),
            Value::Bytes(bytes) => JsonValue::String(bytes.iter().map(|&b| char::from(b)).collect()),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Array(items) => {
                let item_node = match graph.node(node) {
                    SchemaNode::Array(inner) => *inner,
                    _ => node,
                };
                JsonValue::Array(items.iter().map(|v| v.to_json(graph, item_node)).collect())
            }
            Value::Map(entries) => JsonValue::Object(
                entries.iter().map(|(k, v)| (k.clone(), JsonValue::String(v.clone()))).collect(),
            ),
            Value::Record(slots) => {
                let Some(record) = graph.record(node) else {
                    return JsonValue::Null;
                };
                let mut object = Map::new();
                for (field, slot) in record.fields.iter().zip(&slots.fields) {
                    let json = match slot {
                        Some(value) => value.to_json(graph, field.ty),
                        None => JsonValue::Null,
                    };
                    object.insert(field.name.clone(), json);
                }
                JsonValue::Object(object)
            }
        }
    }
}

fn peel_optional(graph: &SchemaGraph, mut node: NodeId) -> NodeId {
    while let SchemaNode::Optional(inner) = graph.node(node) {
        node = *inner;
    }
    node
}

fn float_json(x: f64) -> JsonValue {
    Number::from_f64(x).map(JsonValue::Number).unwrap_or(JsonValue::Null)
}
