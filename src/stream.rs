//! Bounded-memory transcoding over a push event stream.
//!
//! Only the open path of elements is held. When an element at the emission
//! depth closes, its subtree is transcoded, emitted and dropped, so with
//! [`EmitDepth::Children`] the document root stays a shell without children.
use std::io::BufRead;

use tracing::{debug, trace};

use crate::datum::{Transcoder, TranscoderConfig};
use crate::error::{Error, Result};
use crate::ir::{NodeId, QName, RecordSource, SchemaGraph};
use crate::value::Value;
use crate::xml::{too_deep, EventReader, XmlContent, XmlElement, XmlEvent};

/// Which closing elements produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitDepth {
    /// The document element, as one value.
    #[default]
    Root,
    /// Each child of the document element, one value per child.
    Children,
}

impl EmitDepth {
    fn level(self) -> usize {
        match self {
            EmitDepth::Root => 1,
            EmitDepth::Children => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    BeforeRoot,
    Building,
    Finished,
}

/// A value together with the schema node it was transcoded against.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub node: NodeId,
    pub value: Value,
}

pub struct StreamingTranscoder<'g> {
    transcoder: Transcoder<'g>,
    depth: EmitDepth,
    state: StreamState,
    /// Open elements, document element first.
    stack: Vec<XmlElement>,
    /// Record node that children of the document element are matched in.
    unit_parent: Option<NodeId>,
    emitted: usize,
}

impl<'g> StreamingTranscoder<'g> {
    pub fn new(graph: &'g SchemaGraph, config: TranscoderConfig, depth: EmitDepth) -> Self {
        Self {
            transcoder: Transcoder::new(graph, config),
            depth,
            state: StreamState::BeforeRoot,
            stack: Vec::new(),
            unit_parent: None,
            emitted: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of currently open elements.
    pub fn open_elements(&self) -> usize {
        self.stack.len()
    }

    /// Child elements still attached to the document element.
    pub fn retained_children(&self) -> usize {
        self.stack.first().map_or(0, XmlElement::child_count)
    }

    pub fn handle(&mut self, event: XmlEvent) -> Result<Option<Emitted>> {
        if self.state == StreamState::Finished {
            return Err(Error::XmlParse("content after the document element".to_string()));
        }
        match event {
            XmlEvent::StartElement { name, attributes } => {
                let max_depth = self.transcoder.config().max_depth;
                if self.stack.len() >= max_depth {
                    return Err(too_deep(max_depth));
                }
                if self.stack.is_empty() {
                    self.state = StreamState::Building;
                    if self.depth == EmitDepth::Children {
                        let parent = self.children_record(&name)?;
                        if let Some(record) = self.transcoder.graph().record(parent) {
                            self.transcoder.check_attributes(record, &attributes)?;
                        }
                        self.unit_parent = Some(parent);
                    }
                }
                self.stack.push(XmlElement::new(name, attributes));
                Ok(None)
            }
            XmlEvent::Characters(text) => match self.stack.last_mut() {
                Some(top) => {
                    top.push_text(&text);
                    Ok(None)
                }
                None if text.trim().is_empty() => Ok(None),
                None => Err(Error::XmlParse("text outside the document element".to_string())),
            },
            XmlEvent::EndElement => {
                let level = self.stack.len();
                let element = self
                    .stack
                    .pop()
                    .ok_or_else(|| Error::XmlParse("closing tag without an open element".to_string()))?;
                if self.stack.is_empty() {
                    self.state = StreamState::Finished;
                }
                if level == self.depth.level() {
                    return self.emit(&element).map(Some);
                }
                if let Some(parent) = self.stack.last_mut() {
                    parent.push_child(element);
                }
                Ok(None)
            }
        }
    }

    /// Check that the input ended on a complete document.
    pub fn finish(&self) -> Result<()> {
        match self.state {
            StreamState::Finished => {
                debug!(values = self.emitted, "stream finished");
                Ok(())
            }
            StreamState::Building => Err(Error::UnterminatedDocument { open: self.stack.len() }),
            StreamState::BeforeRoot => Err(Error::XmlParse("document has no root element".to_string())),
        }
    }

    /// Feed an already materialized element through as its event sequence.
    pub fn replay(&mut self, element: &XmlElement, out: &mut Vec<Emitted>) -> Result<()> {
        let start = XmlEvent::StartElement { name: element.name.clone(), attributes: element.attributes.clone() };
        self.handle(start)?;
        for content in &element.content {
            match content {
                XmlContent::Text(text) => {
                    self.handle(XmlEvent::Characters(text.clone()))?;
                }
                XmlContent::Element(child) => self.replay(child, out)?,
            }
        }
        out.extend(self.handle(XmlEvent::EndElement)?);
        Ok(())
    }

    /// Drive the transcoder from a reader, yielding values as they close.
    pub fn run<R: BufRead>(self, events: EventReader<R>) -> Values<'g, R> {
        Values { transcoder: self, events, done: false }
    }

    fn emit(&mut self, element: &XmlElement) -> Result<Emitted> {
        let graph = self.transcoder.graph();
        let (node, value) = match self.depth {
            EmitDepth::Root => {
                let node = graph
                    .root()
                    .ok_or_else(|| Error::SchemaConstruction("schema graph has no root".to_string()))?;
                (node, self.transcoder.transcode_root(node, element)?)
            }
            EmitDepth::Children => {
                let record = self
                    .unit_parent
                    .and_then(|parent| graph.record(parent))
                    .ok_or_else(|| Error::FieldResolution("no document element to split".to_string()))?;
                self.transcoder.transcode_child(record, element)?
            }
        };
        self.emitted += 1;
        trace!(element = %element.name, index = self.emitted, "emitted");
        Ok(Emitted { node, value })
    }

    /// Record whose fields describe the children of the document element.
    fn children_record(&self, root: &QName) -> Result<NodeId> {
        let graph = self.transcoder.graph();
        let mut node = graph
            .root()
            .ok_or_else(|| Error::SchemaConstruction("schema graph has no root".to_string()))?;
        if let Some(record) = graph.record(node) {
            if record.source == RecordSource::Document {
                let (_, ty) = self.transcoder.document_field(record, root)?;
                node = graph.element_type(ty);
            }
        }
        match graph.record(node) {
            Some(_) => Ok(node),
            None => Err(Error::FieldResolution(format!("root element `{root}` has no child fields"))),
        }
    }
}

/// Iterator returned by [`StreamingTranscoder::run`]. Stops after the first
/// error.
pub struct Values<'g, R: BufRead> {
    transcoder: StreamingTranscoder<'g>,
    events: EventReader<R>,
    done: bool,
}

impl<R: BufRead> Iterator for Values<'_, R> {
    type Item = Result<Emitted>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let outcome = match self.events.next() {
                Some(Ok(event)) => self.transcoder.handle(event),
                Some(Err(e)) => Err(e),
                None => {
                    self.done = true;
                    return self.transcoder.finish().err().map(Err);
                }
            };
            match outcome {
                Ok(Some(emitted)) => return Some(Ok(emitted)),
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::{build, BuildOptions};
    use crate::xml::parse_document;
    use crate::xsd::load_str;
    use pretty_assertions::assert_eq;

    const ITEMS: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
        <xs:element name="feed"><xs:complexType><xs:sequence>
          <xs:element name="item" maxOccurs="unbounded"><xs:complexType><xs:sequence>
            <xs:element name="id" type="xs:int"/>
          </xs:sequence></xs:complexType></xs:element>
        </xs:sequence></xs:complexType></xs:element>
      </xs:schema>"#;

    const FEED: &str = "<feed>\n  <item><id>1</id></item>\n  <item><id>2</id></item>\n  <item><id>3</id></item>\n</feed>";

    fn items_graph() -> SchemaGraph {
        build(&load_str(ITEMS).unwrap(), &BuildOptions::default()).unwrap()
    }

    fn collect(graph: &SchemaGraph, depth: EmitDepth, xml: &str) -> Result<Vec<Emitted>> {
        StreamingTranscoder::new(graph, TranscoderConfig::default(), depth)
            .run(EventReader::from_text(xml))
            .collect()
    }

    #[test]
    fn root_depth_matches_in_memory_transcoding() {
        let g = items_graph();
        let streamed = collect(&g, EmitDepth::Root, FEED).unwrap();
        let in_memory = Transcoder::new(&g, TranscoderConfig::default())
            .transcode_document(&parse_document(FEED).unwrap())
            .unwrap();
        assert_eq!(streamed.len(), 1);
        assert_eq!(streamed[0].value, in_memory);
    }

    #[test]
    fn children_depth_emits_each_child_in_order() {
        let g = items_graph();
        let values = collect(&g, EmitDepth::Children, FEED).unwrap();
        let ids: Vec<_> = values.iter().map(|e| e.value.to_json(&g, e.node)["id"].clone()).collect();
        assert_eq!(ids, vec![serde_json::json!(1), serde_json::json!(2), serde_json::json!(3)]);
    }

    #[test]
    fn emitted_subtrees_are_released() {
        let g = items_graph();
        let mut stream = StreamingTranscoder::new(&g, TranscoderConfig::default(), EmitDepth::Children);
        let mut emitted = 0;
        for event in EventReader::from_text(FEED) {
            if stream.handle(event.unwrap()).unwrap().is_some() {
                emitted += 1;
                assert_eq!(stream.open_elements(), 1);
                assert_eq!(stream.retained_children(), 0);
            }
        }
        stream.finish().unwrap();
        assert_eq!(emitted, 3);
    }

    #[test]
    fn unterminated_document_is_reported() {
        let g = items_graph();
        let mut stream = StreamingTranscoder::new(&g, TranscoderConfig::default(), EmitDepth::Children);
        let item = QName::local("item");
        for event in [
            XmlEvent::StartElement { name: QName::local("feed"), attributes: vec![] },
            XmlEvent::StartElement { name: item, attributes: vec![] },
        ] {
            stream.handle(event).unwrap();
        }
        assert!(matches!(stream.finish(), Err(Error::UnterminatedDocument { open: 2 })));
    }

    #[test]
    fn events_after_the_root_closes_fail() {
        let g = items_graph();
        let mut stream = StreamingTranscoder::new(&g, TranscoderConfig::default(), EmitDepth::Root);
        stream.handle(XmlEvent::StartElement { name: QName::local("feed"), attributes: vec![] }).unwrap();
        assert!(stream.handle(XmlEvent::EndElement).unwrap().is_some());
        assert_eq!(stream.state(), StreamState::Finished);
        let again = XmlEvent::StartElement { name: QName::local("feed"), attributes: vec![] };
        assert!(matches!(stream.handle(again), Err(Error::XmlParse(_))));
    }

    #[test]
    fn replaying_a_tree_matches_streaming() {
        let g = items_graph();
        let mut stream = StreamingTranscoder::new(&g, TranscoderConfig::default(), EmitDepth::Children);
        let mut replayed = Vec::new();
        stream.replay(&parse_document(FEED).unwrap(), &mut replayed).unwrap();
        stream.finish().unwrap();
        assert_eq!(replayed, collect(&g, EmitDepth::Children, FEED).unwrap());
    }

    #[test]
    fn unknown_child_is_a_resolution_error() {
        let g = items_graph();
        let result = collect(&g, EmitDepth::Children, "<feed><item><id>1</id></item><other/></feed>");
        assert!(matches!(result, Err(Error::FieldResolution(_))));
    }

    #[test]
    fn multi_root_schema_selects_root_before_splitting() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:element name="left"><xs:complexType><xs:sequence>
              <xs:element name="n" type="xs:int" maxOccurs="unbounded"/>
            </xs:sequence></xs:complexType></xs:element>
            <xs:element name="right" type="xs:string"/>
          </xs:schema>"#;
        let g = build(&load_str(xsd).unwrap(), &BuildOptions::default()).unwrap();
        let values = collect(&g, EmitDepth::Children, "<left><n>4</n><n>5</n></left>").unwrap();
        let plain: Vec<_> = values.into_iter().map(|e| e.value).collect();
        assert_eq!(plain, vec![Value::Int(4), Value::Int(5)]);
    }

    const MIXED: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
        <xs:element name="root"><xs:complexType>
          <xs:sequence>
            <xs:element name="s" type="xs:string"/>
            <xs:element name="i" type="xs:int"/>
            <xs:choice maxOccurs="2">
              <xs:element name="x" type="xs:string"/>
              <xs:element name="y" type="xs:int"/>
            </xs:choice>
            <xs:any minOccurs="0" maxOccurs="unbounded" processContents="skip"/>
          </xs:sequence>
          <xs:attribute name="id" type="xs:int"/>
        </xs:complexType></xs:element>
      </xs:schema>"#;

    const MIXED_DOC: &str = "<root><s>s</s><i>1</i><x>x1</x><y>2</y><extra>e</extra></root>";

    #[test]
    fn children_route_through_groups_and_wildcard_like_in_memory() {
        let g = build(&load_str(MIXED).unwrap(), &BuildOptions::default()).unwrap();
        let whole = Transcoder::new(&g, TranscoderConfig::default())
            .transcode_document(&parse_document(MIXED_DOC).unwrap())
            .unwrap()
            .to_json(&g, g.root().unwrap());
        assert_eq!(
            whole,
            serde_json::json!({
                "s": "s", "i": 1,
                "group": [{"x": "x1", "y": null}, {"x": null, "y": 2}],
                "others": {"extra": "e"},
                "id": null
            })
        );

        let split = collect(&g, EmitDepth::Children, MIXED_DOC).unwrap();
        let lines: Vec<_> = split.iter().map(|e| e.value.to_json(&g, e.node)).collect();
        assert_eq!(
            lines,
            vec![
                serde_json::json!("s"),
                serde_json::json!(1),
                serde_json::json!("x1"),
                serde_json::json!(2),
                serde_json::json!("e"),
            ]
        );
    }

    #[test]
    fn split_checks_root_attributes() {
        let g = build(&load_str(MIXED).unwrap(), &BuildOptions::default()).unwrap();
        assert_eq!(collect(&g, EmitDepth::Children, r#"<root id="3"><s>s</s></root>"#).unwrap().len(), 1);
        let unknown = collect(&g, EmitDepth::Children, r#"<root other="1"><s>s</s></root>"#);
        assert!(matches!(unknown, Err(Error::FieldResolution(_))));
        let bad = collect(&g, EmitDepth::Children, r#"<root id="three"><s>s</s></root>"#);
        assert!(matches!(bad, Err(Error::ValueParse { kind: "int", .. })));
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:element name="n" type="Node"/>
            <xs:complexType name="Node"><xs:sequence>
              <xs:element name="n" type="Node" minOccurs="0"/>
            </xs:sequence></xs:complexType>
          </xs:schema>"#;
        let g = build(&load_str(xsd).unwrap(), &BuildOptions::default()).unwrap();
        let levels = 50_000;
        let deep = format!("{}{}", "<n>".repeat(levels), "</n>".repeat(levels));
        for depth in [EmitDepth::Root, EmitDepth::Children] {
            assert!(matches!(collect(&g, depth, &deep), Err(Error::XmlParse(_))));
        }

        let config = TranscoderConfig { max_depth: 3, ..TranscoderConfig::default() };
        let shallow = StreamingTranscoder::new(&g, config.clone(), EmitDepth::Root)
            .run(EventReader::from_text("<n><n><n/></n></n>"))
            .collect::<Result<Vec<_>>>();
        assert_eq!(shallow.unwrap().len(), 1);
        let nested = StreamingTranscoder::new(&g, config, EmitDepth::Root)
            .run(EventReader::from_text("<n><n><n><n/></n></n></n>"))
            .collect::<Result<Vec<_>>>();
        assert!(matches!(nested, Err(Error::XmlParse(_))));
    }
}
