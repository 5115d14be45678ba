//! Derive a record schema from an XML Schema and transcode XML documents
//! into values that conform to it.
//!
//! Pipeline: `xsd::load` → `lower::build` → (`datum::Transcoder` |
//! `stream::StreamingTranscoder`) → `Value::to_json`.
pub mod avsc;
pub mod cli;
pub mod datum;
pub mod error;
pub mod ir;
pub mod lower;
pub mod path_de;
pub mod stream;
pub mod value;
pub mod xml;
pub mod xsd;

pub use datum::{DefaultZone, Transcoder, TranscoderConfig};
pub use error::{Error, Result};
pub use ir::{Field, NodeId, Origin, QName, Record, SchemaGraph, SchemaNode};
pub use lower::{build, BuildOptions};
pub use stream::{EmitDepth, StreamingTranscoder};
pub use value::Value;
