//! Reads `.xsd` files into the [`XsdModel`] with `roxmltree`.
//!
//! Covers the subset the builder consumes: global and local elements, named
//! and anonymous complex types, simple types (followed to their builtin
//! base), model groups and group references, attributes and attribute
//! groups, wildcards, `complexContent`/`simpleContent` derivation (flattened),
//! and `include`/`import` resolved from disk. Loading stops at the first
//! problem found.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use roxmltree::{Document, Node};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::ir::{Compositor, QName};
use super::model::*;

pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";

// ------------------------------- Sources ---------------------------------- //

struct Source {
    path: PathBuf,
    text: String,
    /// Namespace inherited by a chameleon include (no own targetNamespace).
    inherited_ns: Option<String>,
}

/// Load the schema at `path`. Relative `schemaLocation`s resolve against
/// `base_dir` when given, else against the including file's directory.
pub fn load(path: &Path, base_dir: Option<&Path>) -> Result<XsdModel> {
    let sources = collect_sources(path, base_dir)?;
    load_sources(&sources)
}

/// Load a single in-memory schema document; includes are not followed.
pub fn load_str(text: &str) -> Result<XsdModel> {
    let source = Source { path: PathBuf::from("<memory>"), text: text.to_string(), inherited_ns: None };
    load_sources(std::slice::from_ref(&source))
}

fn collect_sources(path: &Path, base_dir: Option<&Path>) -> Result<Vec<Source>> {
    let mut out = Vec::<Source>::new();
    let mut seen = HashSet::<PathBuf>::new();
    let mut queue = VecDeque::from([(path.to_path_buf(), None::<String>)]);

    while let Some((path, inherited_ns)) = queue.pop_front() {
        let key = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !seen.insert(key) {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|e| Error::XsdLoad {
            path: path.clone(),
            message: e.to_string(),
        })?;
        {
            let doc = parse_doc(&path, &text)?;
            let root = doc.root_element();
            let own_ns = root.attribute("targetNamespace").map(str::to_string);
            let effective_ns = own_ns.clone().or_else(|| inherited_ns.clone());
            for child in xs_children(root) {
                let kind = child.tag_name().name();
                if !matches!(kind, "include" | "import" | "redefine") {
                    continue;
                }
                let Some(location) = child.attribute("schemaLocation") else { continue };
                if location.contains("://") {
                    warn!("skipping remote schema location {location}");
                    continue;
                }
                let dir = base_dir
                    .map(Path::to_path_buf)
                    .or_else(|| path.parent().map(Path::to_path_buf))
                    .unwrap_or_default();
                let next = dir.join(location);
                trace!("{} {} -> {}", kind, location, next.display());
                let next_ns = if kind == "import" { None } else { effective_ns.clone() };
                queue.push_back((next, next_ns));
            }
        }
        debug!("loaded schema document {}", path.display());
        out.push(Source { path, text, inherited_ns });
    }
    Ok(out)
}

fn parse_doc<'t>(path: &Path, text: &'t str) -> Result<Document<'t>> {
    Document::parse(text).map_err(|e| Error::XsdLoad { path: path.to_path_buf(), message: e.to_string() })
}

fn load_sources(sources: &[Source]) -> Result<XsdModel> {
    let docs = sources
        .iter()
        .map(|s| parse_doc(&s.path, &s.text))
        .collect::<Result<Vec<_>>>()?;
    let mut loader = Loader::new(sources, &docs)?;
    loader.load_roots()?;
    Ok(loader.model)
}

// ------------------------------- Loader ----------------------------------- //

struct DocInfo<'s> {
    path: &'s Path,
    target_ns: Option<String>,
    chameleon: bool,
    element_qualified: bool,
    attribute_qualified: bool,
}

#[derive(Clone, Copy)]
struct Global<'d, 't> {
    doc: usize,
    node: Node<'d, 't>,
}

struct Loader<'d, 't, 's> {
    docs: Vec<DocInfo<'s>>,
    elements: IndexMap<QName, Global<'d, 't>>,
    complex_types: HashMap<QName, Global<'d, 't>>,
    simple_types: HashMap<QName, Global<'d, 't>>,
    groups: HashMap<QName, Global<'d, 't>>,
    attribute_groups: HashMap<QName, Global<'d, 't>>,
    attributes: HashMap<QName, Global<'d, 't>>,
    named: HashMap<QName, ComplexTypeId>,
    /// Anonymous types of global elements, so `ref` cycles close.
    element_types: HashMap<QName, ComplexTypeId>,
    building: HashSet<ComplexTypeId>,
    model: XsdModel,
}

impl<'d, 't, 's> Loader<'d, 't, 's> {
    fn new(sources: &'s [Source], docs: &'d [Document<'t>]) -> Result<Self> {
        let mut loader = Loader {
            docs: Vec::new(),
            elements: IndexMap::new(),
            complex_types: HashMap::new(),
            simple_types: HashMap::new(),
            groups: HashMap::new(),
            attribute_groups: HashMap::new(),
            attributes: HashMap::new(),
            named: HashMap::new(),
            element_types: HashMap::new(),
            building: HashSet::new(),
            model: XsdModel::default(),
        };

        for (i, (source, doc)) in sources.iter().zip(docs).enumerate() {
            let root = doc.root_element();
            if !is_xs(root, "schema") {
                return Err(Error::XsdLoad {
                    path: source.path.clone(),
                    message: format!("root element is `{}`, expected xs:schema", root.tag_name().name()),
                });
            }
            let own_ns = root.attribute("targetNamespace").map(str::to_string);
            loader.docs.push(DocInfo {
                path: &source.path,
                chameleon: own_ns.is_none() && source.inherited_ns.is_some(),
                target_ns: own_ns.or_else(|| source.inherited_ns.clone()),
                element_qualified: root.attribute("elementFormDefault") == Some("qualified"),
                attribute_qualified: root.attribute("attributeFormDefault") == Some("qualified"),
            });

            for child in xs_children(root) {
                let Some(name) = child.attribute("name") else { continue };
                let qname = QName::new(name, loader.docs[i].target_ns.as_deref());
                let global = Global { doc: i, node: child };
                let table = match child.tag_name().name() {
                    "element" => {
                        loader.elements.entry(qname).or_insert(global);
                        continue;
                    }
                    "complexType" => &mut loader.complex_types,
                    "simpleType" => &mut loader.simple_types,
                    "group" => &mut loader.groups,
                    "attributeGroup" => &mut loader.attribute_groups,
                    "attribute" => &mut loader.attributes,
                    _ => continue,
                };
                table.entry(qname).or_insert(global);
            }
        }
        Ok(loader)
    }

    fn err(&self, doc: usize, message: impl Into<String>) -> Error {
        Error::XsdLoad { path: self.docs[doc].path.to_path_buf(), message: message.into() }
    }

    fn load_roots(&mut self) -> Result<()> {
        let globals: Vec<Global<'d, 't>> = self.elements.values().copied().collect();
        for global in globals {
            let decl = self.element_decl(global.doc, global.node, true)?;
            self.model.roots.push(decl);
        }
        debug!(
            roots = self.model.roots.len(),
            complex_types = self.model.types.len(),
            "xsd model loaded"
        );
        Ok(())
    }

    // ---- names ----

    /// Resolve a `prefix:local` reference written on `node`.
    fn resolve_ref(&self, doc: usize, node: Node<'d, 't>, value: &str) -> Result<QName> {
        match value.split_once(':') {
            Some((prefix, local)) => {
                let ns = node
                    .lookup_namespace_uri(Some(prefix))
                    .ok_or_else(|| self.err(doc, format!("undeclared namespace prefix `{prefix}` in `{value}`")))?;
                Ok(QName::new(local, Some(ns)))
            }
            None => {
                let ns = node.lookup_namespace_uri(None).map(str::to_string).or_else(|| {
                    let info = &self.docs[doc];
                    if info.chameleon { info.target_ns.clone() } else { None }
                });
                Ok(QName { name: value.to_string(), namespace: ns })
            }
        }
    }

    fn local_namespace(&self, doc: usize, node: Node<'d, 't>, default_qualified: bool) -> Option<String> {
        let qualified = match node.attribute("form") {
            Some(form) => form == "qualified",
            None => default_qualified,
        };
        if qualified { self.docs[doc].target_ns.clone() } else { None }
    }

    fn lookup<'m>(
        &self,
        table: &'m HashMap<QName, Global<'d, 't>>,
        doc: usize,
        what: &str,
        qname: &QName,
    ) -> Result<Global<'d, 't>> {
        table.get(qname).copied().ok_or_else(|| self.err(doc, format!("unknown {what} `{qname}`")))
    }

    // ---- elements ----

    fn element_decl(&mut self, doc: usize, node: Node<'d, 't>, top_level: bool) -> Result<ElementDecl> {
        if let Some(reference) = node.attribute("ref") {
            let qname = self.resolve_ref(doc, node, reference)?;
            let global = self
                .elements
                .get(&qname)
                .copied()
                .ok_or_else(|| self.err(doc, format!("unknown element `{qname}`")))?;
            return self.element_decl(global.doc, global.node, true);
        }

        let name = node
            .attribute("name")
            .ok_or_else(|| self.err(doc, "element without name or ref"))?;
        let namespace = if top_level {
            self.docs[doc].target_ns.clone()
        } else {
            self.local_namespace(doc, node, self.docs[doc].element_qualified)
        };
        let qname = QName { name: name.to_string(), namespace };

        let ty = if let Some(type_name) = node.attribute("type") {
            let type_qname = self.resolve_ref(doc, node, type_name)?;
            self.type_ref(doc, &type_qname)?
        } else if let Some(ct) = xs_child(node, "complexType") {
            if top_level {
                if let Some(id) = self.element_types.get(&qname) {
                    TypeRef::Complex(*id)
                } else {
                    let id = self.model.add_complex(ComplexType::default());
                    self.element_types.insert(qname.clone(), id);
                    self.fill_complex(id, doc, ct, None)?;
                    TypeRef::Complex(id)
                }
            } else {
                let id = self.model.add_complex(ComplexType::default());
                self.fill_complex(id, doc, ct, None)?;
                TypeRef::Complex(id)
            }
        } else if let Some(st) = xs_child(node, "simpleType") {
            TypeRef::Simple(self.simple_type_body(doc, st)?)
        } else {
            // untyped element: xs:anyType, kept as text
            TypeRef::Simple(SimpleType::String)
        };
        Ok(ElementDecl { name: qname, ty })
    }

    // ---- types ----

    fn type_ref(&mut self, doc: usize, qname: &QName) -> Result<TypeRef> {
        if qname.namespace.as_deref() == Some(XS_NS) {
            if qname.name == "anyType" {
                return Ok(TypeRef::Simple(SimpleType::String));
            }
            return Ok(TypeRef::Simple(SimpleType::from_builtin(&qname.name).unwrap_or(SimpleType::Other)));
        }
        if self.complex_types.contains_key(qname) {
            return Ok(TypeRef::Complex(self.named_complex(doc, qname)?));
        }
        if self.simple_types.contains_key(qname) {
            return Ok(TypeRef::Simple(self.simple_ref(doc, qname)?));
        }
        Err(self.err(doc, format!("unknown type `{qname}`")))
    }

    fn named_complex(&mut self, doc: usize, qname: &QName) -> Result<ComplexTypeId> {
        if let Some(id) = self.named.get(qname) {
            return Ok(*id);
        }
        let global = self.lookup(&self.complex_types, doc, "complex type", qname)?;
        let id = self.model.add_complex(ComplexType { name: Some(qname.clone()), ..ComplexType::default() });
        self.named.insert(qname.clone(), id);
        self.fill_complex(id, global.doc, global.node, Some(qname.clone()))?;
        Ok(id)
    }

    fn fill_complex(&mut self, id: ComplexTypeId, doc: usize, node: Node<'d, 't>, name: Option<QName>) -> Result<()> {
        self.building.insert(id);
        let mut ct = ComplexType { name, ..ComplexType::default() };

        for child in xs_children(node) {
            match child.tag_name().name() {
                "complexContent" => self.complex_content(doc, child, &mut ct)?,
                "simpleContent" => self.simple_content(doc, child, &mut ct)?,
                _ => self.absorb(doc, child, &mut ct)?,
            }
        }

        trace!(?id, name = ?ct.name, attributes = ct.attributes.len(), "complex type filled");
        self.model.types[id.0] = ct;
        self.building.remove(&id);
        Ok(())
    }

    /// Content model and attribute declarations shared by complex types and
    /// derivations.
    fn absorb(&mut self, doc: usize, child: Node<'d, 't>, ct: &mut ComplexType) -> Result<()> {
        match child.tag_name().name() {
            "sequence" | "choice" | "all" | "group" => {
                let particle = self.particle(doc, child)?;
                ct.content = Some(match ct.content.take() {
                    None => particle,
                    Some(base) => Particle::once(Term::Group(ModelGroup {
                        compositor: Compositor::Sequence,
                        particles: vec![base, particle],
                    })),
                });
            }
            "attribute" => {
                if let Some(attribute) = self.attribute_use(doc, child)? {
                    push_attribute(&mut ct.attributes, attribute);
                }
            }
            "attributeGroup" => self.attribute_group(doc, child, ct)?,
            "anyAttribute" => ct.attribute_wildcard = true,
            other => trace!("ignoring <{other}> in complex type"),
        }
        Ok(())
    }

    fn derivation_base(&mut self, doc: usize, node: Node<'d, 't>) -> Result<Option<TypeRef>> {
        let Some(base) = node.attribute("base") else { return Ok(None) };
        let qname = self.resolve_ref(doc, node, base)?;
        if qname.namespace.as_deref() == Some(XS_NS) && qname.name == "anyType" {
            return Ok(None);
        }
        let base = self.type_ref(doc, &qname)?;
        if let TypeRef::Complex(id) = base {
            if self.building.contains(&id) {
                return Err(self.err(doc, format!("type `{qname}` is derived from itself")));
            }
        }
        Ok(Some(base))
    }

    fn complex_content(&mut self, doc: usize, node: Node<'d, 't>, ct: &mut ComplexType) -> Result<()> {
        for derivation in xs_children(node) {
            let kind = derivation.tag_name().name();
            let base = self.derivation_base(doc, derivation)?;
            if kind == "extension" {
                if let Some(TypeRef::Complex(base)) = base {
                    let base = self.model.complex(base).clone();
                    ct.attributes.extend(base.attributes);
                    ct.attribute_wildcard |= base.attribute_wildcard;
                    ct.content = base.content;
                    ct.simple_content = base.simple_content;
                }
            } else if kind != "restriction" {
                continue;
            }
            for child in xs_children(derivation) {
                self.absorb(doc, child, ct)?;
            }
        }
        Ok(())
    }

    fn simple_content(&mut self, doc: usize, node: Node<'d, 't>, ct: &mut ComplexType) -> Result<()> {
        for derivation in xs_children(node) {
            match self.derivation_base(doc, derivation)? {
                Some(TypeRef::Simple(simple)) => ct.simple_content = Some(simple),
                Some(TypeRef::Complex(base)) => {
                    let base = self.model.complex(base).clone();
                    ct.attributes.extend(base.attributes);
                    ct.attribute_wildcard |= base.attribute_wildcard;
                    ct.simple_content = base.simple_content.or(Some(SimpleType::String));
                }
                None => ct.simple_content = Some(SimpleType::String),
            }
            for child in xs_children(derivation) {
                match child.tag_name().name() {
                    "attribute" | "attributeGroup" | "anyAttribute" => self.absorb(doc, child, ct)?,
                    _ => {} // facets
                }
            }
        }
        Ok(())
    }

    fn simple_ref(&mut self, doc: usize, qname: &QName) -> Result<SimpleType> {
        if qname.namespace.as_deref() == Some(XS_NS) {
            return Ok(SimpleType::from_builtin(&qname.name).unwrap_or(SimpleType::Other));
        }
        let global = self.lookup(&self.simple_types, doc, "simple type", qname)?;
        self.simple_type_body(global.doc, global.node)
    }

    fn simple_type_body(&mut self, doc: usize, node: Node<'d, 't>) -> Result<SimpleType> {
        for child in xs_children(node) {
            match child.tag_name().name() {
                "restriction" => {
                    if let Some(base) = child.attribute("base") {
                        let qname = self.resolve_ref(doc, child, base)?;
                        return self.simple_ref(doc, &qname);
                    }
                    if let Some(inner) = xs_child(child, "simpleType") {
                        return self.simple_type_body(doc, inner);
                    }
                }
                "list" | "union" => return Ok(SimpleType::String),
                _ => {}
            }
        }
        Ok(SimpleType::String)
    }

    // ---- particles ----

    fn particle(&mut self, doc: usize, node: Node<'d, 't>) -> Result<Particle> {
        let min_occurs = match node.attribute("minOccurs") {
            Some(v) => v.parse::<u32>().map_err(|_| self.err(doc, format!("bad minOccurs `{v}`")))?,
            None => 1,
        };
        let max_occurs = match node.attribute("maxOccurs") {
            Some("unbounded") => MaxOccurs::Unbounded,
            Some(v) => MaxOccurs::Bounded(
                v.parse::<u32>().map_err(|_| self.err(doc, format!("bad maxOccurs `{v}`")))?,
            ),
            None => MaxOccurs::Bounded(1),
        };

        let term = match node.tag_name().name() {
            "element" => Term::Element(self.element_decl(doc, node, false)?),
            "sequence" | "choice" | "all" => Term::Group(self.model_group(doc, node)?),
            "group" => {
                let reference = node
                    .attribute("ref")
                    .ok_or_else(|| self.err(doc, "local group without ref"))?;
                let qname = self.resolve_ref(doc, node, reference)?;
                let global = self.lookup(&self.groups, doc, "group", &qname)?;
                let body = xs_children(global.node)
                    .find(|c| matches!(c.tag_name().name(), "sequence" | "choice" | "all"))
                    .ok_or_else(|| self.err(global.doc, format!("group `{qname}` has no model group")))?;
                Term::Group(self.model_group(global.doc, body)?)
            }
            "any" => Term::Wildcard,
            other => Term::Unsupported(other.to_string()),
        };
        Ok(Particle { min_occurs, max_occurs, term })
    }

    fn model_group(&mut self, doc: usize, node: Node<'d, 't>) -> Result<ModelGroup> {
        let compositor = match node.tag_name().name() {
            "choice" => Compositor::Choice,
            "all" => Compositor::All,
            _ => Compositor::Sequence,
        };
        let mut particles = Vec::new();
        for child in xs_children(node) {
            particles.push(self.particle(doc, child)?);
        }
        Ok(ModelGroup { compositor, particles })
    }

    // ---- attributes ----

    fn attribute_use(&mut self, doc: usize, node: Node<'d, 't>) -> Result<Option<AttributeUse>> {
        let use_ = node.attribute("use").unwrap_or("optional");
        if use_ == "prohibited" {
            return Ok(None);
        }
        let required = use_ == "required";

        let (decl_doc, decl, name) = if let Some(reference) = node.attribute("ref") {
            let qname = self.resolve_ref(doc, node, reference)?;
            let global = self.lookup(&self.attributes, doc, "attribute", &qname)?;
            (global.doc, global.node, qname)
        } else {
            let local = node
                .attribute("name")
                .ok_or_else(|| self.err(doc, "attribute without name or ref"))?;
            let namespace = self.local_namespace(doc, node, self.docs[doc].attribute_qualified);
            (doc, node, QName { name: local.to_string(), namespace })
        };

        let ty = if let Some(type_name) = decl.attribute("type") {
            let qname = self.resolve_ref(decl_doc, decl, type_name)?;
            match self.type_ref(decl_doc, &qname)? {
                TypeRef::Simple(simple) => simple,
                TypeRef::Complex(_) => {
                    return Err(self.err(decl_doc, format!("attribute `{name}` has complex type `{qname}`")));
                }
            }
        } else if let Some(st) = xs_child(decl, "simpleType") {
            self.simple_type_body(decl_doc, st)?
        } else {
            SimpleType::String
        };
        Ok(Some(AttributeUse { name, required, ty }))
    }

    fn attribute_group(&mut self, doc: usize, node: Node<'d, 't>, ct: &mut ComplexType) -> Result<()> {
        let reference = node
            .attribute("ref")
            .ok_or_else(|| self.err(doc, "local attributeGroup without ref"))?;
        let qname = self.resolve_ref(doc, node, reference)?;
        let global = self.lookup(&self.attribute_groups, doc, "attribute group", &qname)?;
        for child in xs_children(global.node) {
            match child.tag_name().name() {
                "attribute" | "attributeGroup" | "anyAttribute" => self.absorb(global.doc, child, ct)?,
                _ => {}
            }
        }
        Ok(())
    }
}

fn push_attribute(list: &mut Vec<AttributeUse>, attribute: AttributeUse) {
    // a derived type redeclaring an inherited attribute replaces it
    match list.iter_mut().find(|a| a.name == attribute.name) {
        Some(existing) => *existing = attribute,
        None => list.push(attribute),
    }
}

// ------------------------------- Helpers ---------------------------------- //

fn is_xs(node: Node<'_, '_>, local: &str) -> bool {
    node.is_element() && node.tag_name().namespace() == Some(XS_NS) && node.tag_name().name() == local
}

/// Schema-namespace element children, annotations skipped.
fn xs_children<'d, 't>(node: Node<'d, 't>) -> impl Iterator<Item = Node<'d, 't>> {
    node.children().filter(|c| {
        c.is_element() && c.tag_name().namespace() == Some(XS_NS) && c.tag_name().name() != "annotation"
    })
}

fn xs_child<'d, 't>(node: Node<'d, 't>, local: &str) -> Option<Node<'d, 't>> {
    xs_children(node).find(|c| c.tag_name().name() == local)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(body: &str) -> String {
        format!(r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">{body}</xs:schema>"#)
    }

    #[test]
    fn global_elements_become_roots_in_order() {
        let model = load_str(&schema(
            r#"<xs:element name="a" type="xs:int"/><xs:element name="b" type="xs:string"/>"#,
        ))
        .unwrap();
        let names: Vec<_> = model.roots.iter().map(|r| r.name.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(model.roots[0].ty, TypeRef::Simple(SimpleType::Int));
    }

    #[test]
    fn recursive_named_type_resolves_to_one_id() {
        let model = load_str(&schema(
            r#"<xs:element name="node" type="Node"/>
               <xs:complexType name="Node">
                 <xs:sequence><xs:element name="child" type="Node" minOccurs="0"/></xs:sequence>
               </xs:complexType>"#,
        ))
        .unwrap();
        let TypeRef::Complex(id) = model.roots[0].ty else { panic!("complex root") };
        let content = model.complex(id).content.as_ref().unwrap();
        let Term::Group(group) = &content.term else { panic!("group") };
        let Term::Element(child) = &group.particles[0].term else { panic!("element") };
        assert_eq!(child.ty, TypeRef::Complex(id));
        assert_eq!(group.particles[0].min_occurs, 0);
    }

    #[test]
    fn extension_prepends_base_content_and_attributes() {
        let model = load_str(&schema(
            r#"<xs:element name="d" type="Derived"/>
               <xs:complexType name="Base">
                 <xs:sequence><xs:element name="a" type="xs:string"/></xs:sequence>
                 <xs:attribute name="id" type="xs:int" use="required"/>
               </xs:complexType>
               <xs:complexType name="Derived">
                 <xs:complexContent><xs:extension base="Base">
                   <xs:sequence><xs:element name="b" type="xs:string"/></xs:sequence>
                 </xs:extension></xs:complexContent>
               </xs:complexType>"#,
        ))
        .unwrap();
        let TypeRef::Complex(id) = model.roots[0].ty else { panic!() };
        let ct = model.complex(id);
        assert_eq!(ct.attributes.len(), 1);
        assert!(ct.attributes[0].required);
        let Term::Group(outer) = &ct.content.as_ref().unwrap().term else { panic!() };
        assert_eq!(outer.particles.len(), 2);
    }

    #[test]
    fn named_simple_type_follows_restriction_base() {
        let model = load_str(&schema(
            r#"<xs:element name="e" type="Code"/>
               <xs:simpleType name="Code"><xs:restriction base="xs:long"/></xs:simpleType>"#,
        ))
        .unwrap();
        assert_eq!(model.roots[0].ty, TypeRef::Simple(SimpleType::Long));
    }

    #[test]
    fn element_form_default_qualifies_local_elements() {
        let model = load_str(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t"
                          xmlns:t="urn:t" elementFormDefault="qualified">
                 <xs:element name="r"><xs:complexType><xs:sequence>
                   <xs:element name="s" type="xs:string"/>
                 </xs:sequence></xs:complexType></xs:element>
               </xs:schema>"#,
        )
        .unwrap();
        let TypeRef::Complex(id) = model.roots[0].ty else { panic!() };
        let Term::Group(g) = &model.complex(id).content.as_ref().unwrap().term else { panic!() };
        let Term::Element(s) = &g.particles[0].term else { panic!() };
        assert_eq!(s.name, QName::new("s", Some("urn:t")));
    }

    #[test]
    fn unknown_type_stops_loading() {
        let err = load_str(&schema(r#"<xs:element name="e" type="Missing"/>"#)).unwrap_err();
        assert!(matches!(err, Error::XsdLoad { .. }));
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn unknown_content_tag_is_kept_as_unsupported() {
        let model = load_str(&schema(
            r#"<xs:element name="e"><xs:complexType><xs:sequence>
                 <xs:openContent/>
               </xs:sequence></xs:complexType></xs:element>"#,
        ))
        .unwrap();
        let TypeRef::Complex(id) = model.roots[0].ty else { panic!() };
        let Term::Group(g) = &model.complex(id).content.as_ref().unwrap().term else { panic!() };
        assert_eq!(g.particles[0].term, Term::Unsupported("openContent".to_string()));
    }
}
