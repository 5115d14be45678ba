use crate::ir::{Logical, PrimitiveKind};
use crate::xsd::SimpleType;

/// Builtin datatype → target primitive. Anything that could lose precision in
/// a fixed-width number (arbitrary precision integers and decimals, unsigned
/// 64-bit) stays a string.
pub fn map_simple(ty: SimpleType) -> (PrimitiveKind, Option<Logical>) {
    use SimpleType as S;
    match ty {
        S::Boolean => (PrimitiveKind::Boolean, None),
        S::Byte | S::Short | S::Int | S::UnsignedByte | S::UnsignedShort => (PrimitiveKind::Int, None),
        S::Long | S::UnsignedInt => (PrimitiveKind::Long, None),
        S::Float => (PrimitiveKind::Float, None),
        S::Double => (PrimitiveKind::Double, None),
        S::DateTime => (PrimitiveKind::Long, Some(Logical::TimestampMillis)),
        S::HexBinary => (PrimitiveKind::Bytes, Some(Logical::Hex)),
        S::Base64Binary => (PrimitiveKind::Bytes, Some(Logical::Base64)),
        S::UnsignedLong | S::Integer | S::Decimal | S::String | S::Other => (PrimitiveKind::String, None),
    }
}
