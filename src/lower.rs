//! Lower the XSD model into the canonical schema graph.
//!
//! Named complex types are memoized by QName *before* their fields are
//! built, so recursion through a name lands on the same record node.
//! Anonymous types get a fresh record per occurrence; only re-entry while
//! that same anonymous type is still being built reuses its node.
//!
//! Shape rules, per particle:
//! - element with `maxOccurs > 1`        → `Array(T)`
//! - else `minOccurs == 0` or choice arm → `Optional(T)`
//! - group with `maxOccurs == 1`         → inlined into the enclosing record
//! - group with `maxOccurs > 1`          → `Array(Record(group fields))`
//! - wildcard                            → `Map(string)` (one per record)
pub mod naming;
pub mod primitive;

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::ir::{
    Compositor, Field, Logical, NodeId, Origin, PrimitiveKind, QName, Record, RecordSource, SchemaGraph,
    SchemaNode,
};
use crate::xsd::{ComplexTypeId, ModelGroup, Particle, SimpleType, Term, TypeRef, XsdModel};
use naming::Namer;

pub const ELEMENT_WILDCARD_FIELD: &str = "others";
pub const ATTRIBUTE_WILDCARD_FIELD: &str = "others";
pub const GROUP_FIELD: &str = "group";
pub const TEXT_FIELD: &str = "text";
pub const DOCUMENT_RECORD: &str = "document";

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Root element to derive from, by local name or `name{namespace}`.
    /// When unset and the schema declares several roots, a document record
    /// wrapping all of them is synthesized.
    pub root: Option<String>,
}

pub fn build(model: &XsdModel, options: &BuildOptions) -> Result<SchemaGraph> {
    if model.roots.is_empty() {
        return Err(Error::SchemaConstruction("schema declares no root element".to_string()));
    }
    let mut builder = Builder::new(model);

    let root = if let Some(wanted) = options.root.as_deref() {
        let decl = model
            .roots
            .iter()
            .find(|r| r.name.name == wanted || r.name.to_string() == wanted)
            .ok_or_else(|| Error::FieldResolution(format!("no root element named `{wanted}`")))?;
        builder.type_of(decl.ty)?
    } else if let [only] = model.roots.as_slice() {
        builder.type_of(only.ty)?
    } else {
        builder.document_record()?
    };

    let mut graph = builder.graph;
    graph.set_root(root);
    debug!(nodes = graph.len(), "schema graph built");
    Ok(graph)
}

// ------------------------------- Builder ---------------------------------- //

struct Builder<'m> {
    model: &'m XsdModel,
    graph: SchemaGraph,
    named: HashMap<QName, NodeId>,
    anonymous_open: HashMap<ComplexTypeId, NodeId>,
    primitives: HashMap<(PrimitiveKind, Option<Logical>), NodeId>,
    next_type: usize,
    next_group: usize,
}

/// Fields of one record in declaration order, named as they are pushed.
#[derive(Default)]
struct FieldList {
    namer: Namer,
    fields: Vec<Field>,
}

impl FieldList {
    fn push(&mut self, raw_name: &str, origin: Origin, ty: NodeId) {
        let is_wildcard = matches!(origin, Origin::ElementWildcard | Origin::AttributeWildcard);
        if is_wildcard && self.fields.iter().any(|f| f.origin == origin) {
            return; // one wildcard of each kind per record
        }
        let name = self.namer.claim(raw_name);
        self.fields.push(Field { name, origin, ty });
    }
}

impl<'m> Builder<'m> {
    fn new(model: &'m XsdModel) -> Self {
        Self {
            model,
            graph: SchemaGraph::new(),
            named: HashMap::new(),
            anonymous_open: HashMap::new(),
            primitives: HashMap::new(),
            next_type: 0,
            next_group: 0,
        }
    }

    fn document_record(&mut self) -> Result<NodeId> {
        let model = self.model;
        let mut fields = FieldList::default();
        for decl in &model.roots {
            let ty = self.type_of(decl.ty)?;
            let ty = self.optional(ty);
            fields.push(&decl.name.name, Origin::Element(decl.name.clone()), ty);
        }
        let mut record = Record::new(Some(QName::local(DOCUMENT_RECORD)), RecordSource::Document);
        record.fields = fields.fields;
        record.index_special_fields();
        Ok(self.graph.add(SchemaNode::Record(record)))
    }

    fn type_of(&mut self, ty: TypeRef) -> Result<NodeId> {
        match ty {
            TypeRef::Simple(simple) => Ok(self.simple(simple)),
            TypeRef::Complex(id) => self.complex(id),
        }
    }

    fn simple(&mut self, ty: SimpleType) -> NodeId {
        let (kind, logical) = primitive::map_simple(ty);
        self.primitive(kind, logical)
    }

    fn primitive(&mut self, kind: PrimitiveKind, logical: Option<Logical>) -> NodeId {
        if let Some(id) = self.primitives.get(&(kind, logical)) {
            return *id;
        }
        let id = self.graph.add(SchemaNode::Primitive { kind, logical });
        self.primitives.insert((kind, logical), id);
        id
    }

    fn optional(&mut self, inner: NodeId) -> NodeId {
        match self.graph.node(inner) {
            SchemaNode::Optional(_) | SchemaNode::Array(_) => inner,
            _ => self.graph.add(SchemaNode::Optional(inner)),
        }
    }

    fn complex(&mut self, id: ComplexTypeId) -> Result<NodeId> {
        let model = self.model;
        let ct = model.complex(id);
        let open = match &ct.name {
            Some(qname) => self.named.get(qname),
            None => self.anonymous_open.get(&id),
        };
        if let Some(node) = open {
            trace!(?id, "reusing record for recursive type");
            return Ok(*node);
        }

        let name = match &ct.name {
            Some(qname) => qname.clone(),
            None => {
                let generated = QName::local(format!("type{}", self.next_type));
                self.next_type += 1;
                generated
            }
        };
        // register the placeholder before descending so cycles close on it
        let node = self.graph.add(SchemaNode::Record(Record::new(Some(name), RecordSource::Type)));
        match &ct.name {
            Some(qname) => {
                self.named.insert(qname.clone(), node);
            }
            None => {
                self.anonymous_open.insert(id, node);
            }
        }

        let mut fields = FieldList::default();
        if let Some(simple) = ct.simple_content {
            let ty = self.simple(simple);
            fields.push(TEXT_FIELD, Origin::Text, ty);
        }
        if let Some(content) = &ct.content {
            self.flatten(content, false, &mut fields)?;
        }
        for attribute in &ct.attributes {
            let ty = self.simple(attribute.ty);
            let ty = if attribute.required { ty } else { self.optional(ty) };
            fields.push(&attribute.name.name, Origin::Attribute(attribute.name.clone()), ty);
        }
        if ct.attribute_wildcard {
            let map = self.string_map();
            fields.push(ATTRIBUTE_WILDCARD_FIELD, Origin::AttributeWildcard, map);
        }

        if ct.name.is_none() {
            self.anonymous_open.remove(&id);
        }
        self.finish_record(node, fields);
        Ok(node)
    }

    fn finish_record(&mut self, node: NodeId, fields: FieldList) {
        if let Some(record) = self.graph.record_mut(node) {
            record.fields = fields.fields;
            record.index_special_fields();
            trace!(record = ?record.name, fields = record.fields.len(), "record populated");
        }
    }

    fn string_map(&mut self) -> NodeId {
        let string = self.primitive(PrimitiveKind::String, None);
        self.graph.add(SchemaNode::Map(string))
    }

    fn flatten(&mut self, particle: &Particle, force_optional: bool, fields: &mut FieldList) -> Result<()> {
        if particle.max_occurs.is_prohibited() {
            trace!("skipping particle with maxOccurs=0");
            return Ok(());
        }
        let repeated = particle.max_occurs.is_repeated();
        match &particle.term {
            Term::Element(decl) => {
                let ty = self.type_of(decl.ty)?;
                let ty = if repeated {
                    self.graph.add(SchemaNode::Array(ty))
                } else if particle.min_occurs == 0 || force_optional {
                    self.optional(ty)
                } else {
                    ty
                };
                fields.push(&decl.name.name, Origin::Element(decl.name.clone()), ty);
            }
            Term::Group(group) if repeated => {
                let item = self.group_record(group)?;
                let array = self.graph.add(SchemaNode::Array(item));
                fields.push(GROUP_FIELD, Origin::Group, array);
            }
            Term::Group(group) => {
                let force = force_optional || particle.min_occurs == 0 || group.compositor == Compositor::Choice;
                for child in &group.particles {
                    self.flatten(child, force, fields)?;
                }
            }
            Term::Wildcard => {
                let map = self.string_map();
                fields.push(ELEMENT_WILDCARD_FIELD, Origin::ElementWildcard, map);
            }
            Term::Unsupported(kind) => {
                return Err(Error::SchemaConstruction(format!("unsupported particle term `{kind}`")));
            }
        }
        Ok(())
    }

    /// Item record for a repeated group: the group's own flattened fields.
    fn group_record(&mut self, group: &ModelGroup) -> Result<NodeId> {
        let name = QName::local(format!("group{}", self.next_group));
        self.next_group += 1;
        let node = self
            .graph
            .add(SchemaNode::Record(Record::new(Some(name), RecordSource::Group(group.compositor))));

        let mut fields = FieldList::default();
        let force = group.compositor == Compositor::Choice;
        for child in &group.particles {
            self.flatten(child, force, &mut fields)?;
        }
        self.finish_record(node, fields);
        Ok(node)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::load_str;
    use pretty_assertions::assert_eq;

    fn schema(body: &str) -> SchemaGraph {
        let xsd = format!(r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">{body}</xs:schema>"#);
        build(&load_str(&xsd).unwrap(), &BuildOptions::default()).unwrap()
    }

    fn root_record(g: &SchemaGraph) -> &Record {
        g.record(g.root().unwrap()).expect("root is a record")
    }

    fn field_names(r: &Record) -> Vec<&str> {
        r.fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn self_reference_reuses_record_node() {
        let g = schema(
            r#"<xs:element name="root" type="Node"/>
               <xs:complexType name="Node"><xs:sequence>
                 <xs:element name="value" type="xs:string"/>
                 <xs:element name="next" type="Node" minOccurs="0"/>
               </xs:sequence></xs:complexType>"#,
        );
        let root = g.root().unwrap();
        let next = g.field(root, "next").unwrap();
        assert!(matches!(g.node(next.ty), SchemaNode::Optional(_)));
        assert_eq!(g.element_type(next.ty), root);
    }

    #[test]
    fn indirect_cycle_reuses_record_node() {
        let g = schema(
            r#"<xs:element name="a" type="A"/>
               <xs:complexType name="A"><xs:sequence>
                 <xs:element name="b" type="B"/>
               </xs:sequence></xs:complexType>
               <xs:complexType name="B"><xs:sequence>
                 <xs:element name="a" type="A" maxOccurs="unbounded"/>
               </xs:sequence></xs:complexType>"#,
        );
        let a = g.root().unwrap();
        let b = g.field(a, "b").unwrap().ty;
        let back = g.field(b, "a").unwrap().ty;
        assert!(matches!(g.node(back), SchemaNode::Array(_)));
        assert_eq!(g.element_type(back), a);
    }

    #[test]
    fn recursive_anonymous_element_type_closes() {
        let g = schema(
            r#"<xs:element name="tree"><xs:complexType><xs:sequence>
                 <xs:element ref="tree" minOccurs="0" maxOccurs="unbounded"/>
               </xs:sequence></xs:complexType></xs:element>"#,
        );
        let root = g.root().unwrap();
        let children = g.field(root, "tree").unwrap();
        assert_eq!(g.element_type(children.ty), root);
    }

    #[test]
    fn optional_and_required_shapes() {
        let g = schema(
            r#"<xs:element name="r"><xs:complexType>
                 <xs:sequence>
                   <xs:element name="req" type="xs:int"/>
                   <xs:element name="opt" type="xs:int" minOccurs="0"/>
                   <xs:element name="many" type="xs:int" minOccurs="0" maxOccurs="3"/>
                 </xs:sequence>
                 <xs:attribute name="a" type="xs:string" use="required"/>
                 <xs:attribute name="b" type="xs:string"/>
               </xs:complexType></xs:element>"#,
        );
        let root = g.root().unwrap();
        let shape = |name: &str| g.node(g.field(root, name).unwrap().ty).clone();
        assert!(matches!(shape("req"), SchemaNode::Primitive { kind: PrimitiveKind::Int, .. }));
        assert!(matches!(shape("opt"), SchemaNode::Optional(_)));
        assert!(matches!(shape("many"), SchemaNode::Array(_)));
        assert!(matches!(shape("a"), SchemaNode::Primitive { kind: PrimitiveKind::String, .. }));
        assert!(matches!(shape("b"), SchemaNode::Optional(_)));
        assert!(g.field(root, "a").unwrap().origin.is_attribute());
    }

    #[test]
    fn choice_arms_are_optional() {
        let g = schema(
            r#"<xs:element name="r"><xs:complexType><xs:choice>
                 <xs:element name="x" type="xs:string"/>
                 <xs:element name="y" type="xs:int"/>
               </xs:choice></xs:complexType></xs:element>"#,
        );
        let root = g.root().unwrap();
        for name in ["x", "y"] {
            assert!(matches!(g.node(g.field(root, name).unwrap().ty), SchemaNode::Optional(_)));
        }
    }

    #[test]
    fn repeated_choice_becomes_array_of_group_records() {
        let g = schema(
            r#"<xs:element name="root"><xs:complexType><xs:sequence>
                 <xs:element name="s" type="xs:string"/>
                 <xs:element name="i" type="xs:int"/>
                 <xs:choice maxOccurs="2">
                   <xs:element name="x" type="xs:string"/>
                   <xs:element name="y" type="xs:int"/>
                 </xs:choice>
               </xs:sequence></xs:complexType></xs:element>"#,
        );
        let root = root_record(&g);
        assert_eq!(field_names(root), ["s", "i", "group"]);
        let group = &root.fields[2];
        assert_eq!(group.origin, Origin::Group);
        let SchemaNode::Array(item) = g.node(group.ty) else { panic!("array") };
        let item = g.record(*item).unwrap();
        assert_eq!(item.source, RecordSource::Group(Compositor::Choice));
        assert_eq!(field_names(item), ["x", "y"]);
        assert!(item.fields.iter().all(|f| matches!(g.node(f.ty), SchemaNode::Optional(_))));
    }

    #[test]
    fn attribute_and_element_sharing_a_name_are_disambiguated() {
        let g = schema(
            r#"<xs:element name="root"><xs:complexType>
                 <xs:sequence><xs:element name="field" type="xs:string"/></xs:sequence>
                 <xs:attribute name="field" type="xs:string"/>
               </xs:complexType></xs:element>"#,
        );
        let root = root_record(&g);
        assert_eq!(field_names(root), ["field", "field0"]);
        assert!(matches!(root.fields[0].origin, Origin::Element(_)));
        assert!(matches!(root.fields[1].origin, Origin::Attribute(_)));
    }

    #[test]
    fn wildcards_are_indexed_once_per_kind() {
        let g = schema(
            r###"<xs:element name="root"><xs:complexType>
                 <xs:sequence>
                   <xs:element name="field" type="xs:string"/>
                   <xs:any minOccurs="0" maxOccurs="unbounded"/>
                   <xs:any namespace="##other" minOccurs="0"/>
                 </xs:sequence>
                 <xs:anyAttribute/>
               </xs:complexType></xs:element>"###,
        );
        let root = root_record(&g);
        assert_eq!(field_names(root), ["field", "others", "others0"]);
        assert_eq!(root.element_wildcard, Some(1));
        assert_eq!(root.attribute_wildcard, Some(2));
        assert!(matches!(g.node(root.fields[1].ty), SchemaNode::Map(_)));
    }

    #[test]
    fn prohibited_particles_add_no_field() {
        let g = schema(
            r#"<xs:element name="root"><xs:complexType><xs:sequence>
                 <xs:element name="kept" type="xs:string"/>
                 <xs:element name="gone" type="xs:string" maxOccurs="0" minOccurs="0"/>
                 <xs:choice maxOccurs="0" minOccurs="0">
                   <xs:element name="also_gone" type="xs:int"/>
                 </xs:choice>
               </xs:sequence></xs:complexType></xs:element>"#,
        );
        assert_eq!(field_names(root_record(&g)), ["kept"]);
    }

    #[test]
    fn multiple_roots_synthesize_document_record() {
        let g = schema(
            r#"<xs:element name="i" type="xs:int"/>
               <xs:element name="r"><xs:complexType><xs:sequence>
                 <xs:element name="s" type="xs:string"/>
               </xs:sequence></xs:complexType></xs:element>"#,
        );
        let root = root_record(&g);
        assert_eq!(root.source, RecordSource::Document);
        assert_eq!(field_names(root), ["i", "r"]);
        assert!(root.fields.iter().all(|f| matches!(g.node(f.ty), SchemaNode::Optional(_))));
    }

    #[test]
    fn named_root_skips_document_synthesis() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:element name="i" type="xs:int"/><xs:element name="s" type="xs:string"/>
        </xs:schema>"#;
        let model = load_str(xsd).unwrap();
        let g = build(&model, &BuildOptions { root: Some("s".into()) }).unwrap();
        assert!(matches!(g.node(g.root().unwrap()), SchemaNode::Primitive { kind: PrimitiveKind::String, .. }));

        let err = build(&model, &BuildOptions { root: Some("nope".into()) }).unwrap_err();
        assert!(matches!(err, Error::FieldResolution(_)));
    }

    #[test]
    fn reserved_names_get_suffix() {
        let g = schema(
            r#"<xs:element name="root"><xs:complexType><xs:sequence>
                 <xs:element name="string" type="xs:string"/>
                 <xs:element name="my-value.x" type="xs:string"/>
               </xs:sequence></xs:complexType></xs:element>"#,
        );
        assert_eq!(field_names(root_record(&g)), ["string0", "my_value_x"]);
    }

    #[test]
    fn no_roots_is_construction_error() {
        let model = XsdModel::default();
        let err = build(&model, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, Error::SchemaConstruction(_)));
    }

    #[test]
    fn unsupported_term_is_construction_error() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:element name="e"><xs:complexType><xs:sequence><xs:openContent/></xs:sequence></xs:complexType></xs:element>
        </xs:schema>"#;
        let err = build(&load_str(xsd).unwrap(), &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, Error::SchemaConstruction(ref m) if m.contains("openContent")));
    }

    #[test]
    fn simple_content_adds_text_field() {
        let g = schema(
            r#"<xs:element name="price"><xs:complexType><xs:simpleContent>
                 <xs:extension base="xs:double"><xs:attribute name="currency" type="xs:string"/></xs:extension>
               </xs:simpleContent></xs:complexType></xs:element>"#,
        );
        let root = root_record(&g);
        assert_eq!(field_names(root), ["text", "currency"]);
        assert_eq!(root.text, Some(0));
    }

    #[test]
    fn anonymous_types_get_generated_names() {
        let g = schema(
            r#"<xs:element name="root"><xs:complexType><xs:sequence>
                 <xs:element name="a"><xs:complexType><xs:sequence>
                   <xs:element name="v" type="xs:string"/>
                 </xs:sequence></xs:complexType></xs:element>
               </xs:sequence></xs:complexType></xs:element>"#,
        );
        let root = root_record(&g);
        assert_eq!(root.name, Some(QName::local("type0")));
        let a = g.record(root.fields[0].ty).unwrap();
        assert_eq!(a.name, Some(QName::local("type1")));
    }
}
