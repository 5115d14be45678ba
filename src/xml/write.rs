use quick_xml::escape::escape;

use super::{XmlContent, XmlElement};

/// Serialize the content of `element` (not its own tag) back to XML text.
///
/// Child elements whose namespace differs from their parent's get an
/// `xmlns` declaration; namespaced attributes get generated `ns0`, `ns1`, ...
/// prefixes.
pub fn inner_xml(element: &XmlElement) -> String {
    let mut out = String::new();
    let scope = element.name.namespace.as_deref();
    for content in &element.content {
        write_content(content, scope, &mut out);
    }
    out.trim().to_string()
}

fn write_content(content: &XmlContent, scope: Option<&str>, out: &mut String) {
    match content {
        XmlContent::Text(text) => out.push_str(&escape(text.as_str())),
        XmlContent::Element(child) => write_element(child, scope, out),
    }
}

fn write_element(element: &XmlElement, scope: Option<&str>, out: &mut String) {
    let namespace = element.name.namespace.as_deref();
    out.push('<');
    out.push_str(&element.name.name);
    if namespace != scope {
        out.push_str(" xmlns=\"");
        out.push_str(&escape(namespace.unwrap_or_default()));
        out.push('"');
    }
    let mut prefixes = 0usize;
    for attribute in element.attributes.iter().filter(|a| !a.is_meta()) {
        out.push(' ');
        if let Some(ns) = attribute.name.namespace.as_deref() {
            let prefix = format!("ns{prefixes}");
            prefixes += 1;
            out.push_str(&format!("xmlns:{prefix}=\"{}\" {prefix}:", escape(ns)));
        }
        out.push_str(&attribute.name.name);
        out.push_str("=\"");
        out.push_str(&escape(attribute.value.as_str()));
        out.push('"');
    }
    if element.content.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for content in &element.content {
        write_content(content, namespace, out);
    }
    out.push_str("</");
    out.push_str(&element.name.name);
    out.push('>');
}
