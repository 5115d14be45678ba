use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ordered_float::OrderedFloat;

use super::datetime::{parse_timestamp_millis, DefaultZone};
use crate::error::{Error, Result};
use crate::ir::{Logical, PrimitiveKind};
use crate::value::Value;

/// Parse text as a primitive of the given kind. Strings are taken as given;
/// every other kind is parsed from the trimmed text.
pub fn parse_primitive(kind: PrimitiveKind, logical: Option<Logical>, text: &str, zone: &DefaultZone) -> Result<Value> {
    let raw = text;
    let text = text.trim();
    let value = match (kind, logical) {
        (PrimitiveKind::Boolean, _) => Value::Boolean(text == "true" || text == "1"),
        (PrimitiveKind::Int, _) => Value::Int(text.parse().map_err(|e| Error::value_parse("int", text, e))?),
        (PrimitiveKind::Long, Some(Logical::TimestampMillis)) => Value::Long(parse_timestamp_millis(text, zone)?),
        (PrimitiveKind::Long, _) => Value::Long(text.parse().map_err(|e| Error::value_parse("long", text, e))?),
        // std accepts `INF`, `-INF` and `NaN` case-insensitively
        (PrimitiveKind::Float, _) => {
            Value::Float(OrderedFloat(text.parse().map_err(|e| Error::value_parse("float", text, e))?))
        }
        (PrimitiveKind::Double, _) => {
            Value::Double(OrderedFloat(text.parse().map_err(|e| Error::value_parse("double", text, e))?))
        }
        (PrimitiveKind::Bytes, Some(Logical::Hex)) => Value::Bytes(decode_hex(text)?),
        (PrimitiveKind::Bytes, _) => {
            let compact: String = text.split_whitespace().collect();
            Value::Bytes(STANDARD.decode(compact).map_err(|e| Error::value_parse("bytes", text, e))?)
        }
        (PrimitiveKind::String, _) => Value::String(raw.to_string()),
    };
    Ok(value)
}

fn decode_hex(text: &str) -> Result<Vec<u8>> {
    if !text.is_ascii() || text.len() % 2 != 0 {
        return Err(Error::value_parse("bytes", text, "hexBinary needs an even number of hex digits"));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).map_err(|e| Error::value_parse("bytes", text, e)))
        .collect()
}
