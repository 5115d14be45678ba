//! Abstract XSD component model consumed by the schema builder.
//!
//! Complex types sit in an arena (`XsdModel::types`) so element declarations
//! can point at a type that is still being filled in, which is how recursive
//! content models are expressed.

use crate::ir::{Compositor, QName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComplexTypeId(pub usize);

/// The builtin datatypes the loader can tell apart. Everything else folds
/// into `Other` and is treated as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    UnsignedByte,
    UnsignedShort,
    UnsignedInt,
    UnsignedLong,
    Integer,
    Decimal,
    Float,
    Double,
    DateTime,
    HexBinary,
    Base64Binary,
    String,
    Other,
}

impl SimpleType {
    /// Builtin name in the XML Schema namespace.
    pub fn from_builtin(local: &str) -> Option<Self> {
        let ty = match local {
            "boolean" => Self::Boolean,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "int" => Self::Int,
            "long" => Self::Long,
            "unsignedByte" => Self::UnsignedByte,
            "unsignedShort" => Self::UnsignedShort,
            "unsignedInt" => Self::UnsignedInt,
            "unsignedLong" => Self::UnsignedLong,
            "integer" | "nonNegativeInteger" | "positiveInteger" | "nonPositiveInteger"
            | "negativeInteger" => Self::Integer,
            "decimal" => Self::Decimal,
            "float" => Self::Float,
            "double" => Self::Double,
            "dateTime" => Self::DateTime,
            "hexBinary" => Self::HexBinary,
            "base64Binary" => Self::Base64Binary,
            "string" | "normalizedString" | "token" | "anySimpleType" => Self::String,
            "language" | "Name" | "NCName" | "NMTOKEN" | "NMTOKENS" | "ID" | "IDREF" | "IDREFS"
            | "ENTITY" | "ENTITIES" | "QName" | "NOTATION" | "anyURI" | "date" | "time"
            | "duration" | "gYear" | "gYearMonth" | "gMonth" | "gMonthDay" | "gDay" => Self::Other,
            _ => return None,
        };
        Some(ty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Simple(SimpleType),
    Complex(ComplexTypeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementDecl {
    pub name: QName,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl MaxOccurs {
    pub fn is_repeated(self) -> bool {
        !matches!(self, MaxOccurs::Bounded(0 | 1))
    }

    /// `maxOccurs="0"`: the particle may not appear at all.
    pub fn is_prohibited(self) -> bool {
        self == MaxOccurs::Bounded(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub term: Term,
}

impl Particle {
    pub fn once(term: Term) -> Self {
        Self { min_occurs: 1, max_occurs: MaxOccurs::Bounded(1), term }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Element(ElementDecl),
    Group(ModelGroup),
    Wildcard,
    /// A construct the loader kept but the builder cannot map, by tag name.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelGroup {
    pub compositor: Compositor,
    pub particles: Vec<Particle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUse {
    pub name: QName,
    pub required: bool,
    pub ty: SimpleType,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComplexType {
    pub name: Option<QName>,
    pub attributes: Vec<AttributeUse>,
    pub attribute_wildcard: bool,
    pub content: Option<Particle>,
    pub simple_content: Option<SimpleType>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XsdModel {
    pub roots: Vec<ElementDecl>,
    pub types: Vec<ComplexType>,
}

impl XsdModel {
    pub fn complex(&self, id: ComplexTypeId) -> &ComplexType {
        &self.types[id.0]
    }

    pub fn add_complex(&mut self, ty: ComplexType) -> ComplexTypeId {
        self.types.push(ty);
        ComplexTypeId(self.types.len() - 1)
    }
}
