//! Owned XML element tree built from quick-xml events.
//!
//! Only elements are structured; text, declarations, comments and the like
//! are kept as the events they were read as and written back unchanged.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thesis_core::{Error, Result};

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Element(Element),
    Text(BytesText<'static>),
    Other(Event<'static>),
    /// Paragraph moved out of the tree into the package arena.
    Paragraph(usize),
}

impl Node {
    pub fn is_element(&self, local: &[u8]) -> bool {
        matches!(self, Node::Element(e) if e.is(local))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub start: BytesStart<'static>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            start: BytesStart::new(name.to_string()),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.start.push_attribute((key, value));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(BytesText::new(text).into_owned()));
        self
    }

    /// Name without namespace prefix.
    pub fn local_name(&self) -> &[u8] {
        local_name(self.start.name().into_inner())
    }

    pub fn is(&self, local: &[u8]) -> bool {
        self.local_name() == local
    }

    pub fn attribute(&self, local: &[u8]) -> Option<String> {
        attribute(&self.start, local)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child(&self, local: &[u8]) -> Option<&Element> {
        self.elements().find(|e| e.is(local))
    }

    pub fn child_mut(&mut self, local: &[u8]) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.is(local))
    }

    /// Child named `local`, created as the first child when missing.
    pub fn ensure_first_child(&mut self, local: &[u8], name: &str) -> &mut Element {
        let index = match self.children.iter().position(|n| n.is_element(local)) {
            Some(index) => index,
            None => {
                self.children.insert(0, Node::Element(Element::new(name)));
                0
            }
        };
        match &mut self.children[index] {
            Node::Element(e) => e,
            _ => unreachable!("position only matches elements"),
        }
    }

    /// Unescaped text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(
                    t.unescape()
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(t).into_owned()),
                ),
                _ => None,
            })
            .collect()
    }
}

/// Parse an XML part into a list of top-level nodes.
pub(crate) fn parse(xml: &str) -> Result<Vec<Node>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = Vec::new();

    loop {
        let node = match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(Element {
                    start: e.into_owned(),
                    children: Vec::new(),
                });
                continue;
            }
            Ok(Event::End(_)) => match stack.pop() {
                Some(element) => Node::Element(element),
                None => {
                    return Err(Error::XmlError(format!(
                        "Unexpected end tag at position {}",
                        reader.buffer_position()
                    )))
                }
            },
            Ok(Event::Empty(e)) => Node::Element(Element {
                start: e.into_owned(),
                children: Vec::new(),
            }),
            Ok(Event::Text(e)) => Node::Text(e.into_owned()),
            Ok(Event::Eof) => break,
            Ok(other) => Node::Other(other.into_owned()),
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        };

        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => root.push(node),
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::XmlError(format!(
            "Unclosed element <{}>",
            String::from_utf8_lossy(open.start.name().into_inner())
        )));
    }

    Ok(root)
}

/// Serialize nodes back to XML.
pub(crate) fn write(nodes: &[Node]) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    for node in nodes {
        write_node(&mut writer, node)?;
    }
    Ok(writer.into_inner())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    let written = match node {
        Node::Element(e) if e.children.is_empty() => writer.write_event(Event::Empty(e.start.borrow())),
        Node::Element(e) => {
            writer
                .write_event(Event::Start(e.start.borrow()))
                .map_err(|err| Error::XmlError(format!("Failed to write XML: {}", err)))?;
            for child in &e.children {
                write_node(writer, child)?;
            }
            writer.write_event(Event::End(e.start.to_end()))
        }
        Node::Text(t) => writer.write_event(Event::Text(t.borrow())),
        Node::Other(event) => writer.write_event(event),
        Node::Paragraph(id) => {
            return Err(Error::XmlError(format!("Paragraph {} was not restored before writing", id)));
        }
    };
    written.map_err(|err| Error::XmlError(format!("Failed to write XML: {}", err)))
}

/// First element named `local` among `nodes`.
pub(crate) fn find_mut<'a>(nodes: &'a mut [Node], local: &[u8]) -> Option<&'a mut Element> {
    nodes.iter_mut().find_map(|n| match n {
        Node::Element(e) if e.is(local) => Some(e),
        _ => None,
    })
}

pub(crate) fn attribute(start: &BytesStart, local: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == local)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Extract the local name from a potentially namespaced XML name.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"w:p"), b"p");
        assert_eq!(local_name(b"xml:space"), b"space");
        assert_eq!(local_name(b"body"), b"body");
    }

    #[test]
    fn test_parse_and_write_keeps_content() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="urn:w"><w:body><w:p><w:r><w:t xml:space="preserve">A &amp; B </w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;
        let nodes = parse(xml).unwrap();
        assert_eq!(nodes.len(), 2);

        let written = String::from_utf8(write(&nodes).unwrap()).unwrap();
        assert_eq!(written, xml);
    }

    #[test]
    fn test_text_is_unescaped() {
        let mut nodes = parse("<w:t>Tom &amp; Jerry</w:t>").unwrap();
        let t = find_mut(&mut nodes, b"t").unwrap();
        assert_eq!(t.text(), "Tom & Jerry");
    }

    #[test]
    fn test_ensure_first_child() {
        let mut nodes = parse(r#"<w:p><w:r/></w:p>"#).unwrap();
        let p = find_mut(&mut nodes, b"p").unwrap();
        p.ensure_first_child(b"pPr", "w:pPr");
        p.ensure_first_child(b"pPr", "w:pPr");

        assert_eq!(p.children.len(), 2);
        assert!(p.children[0].is_element(b"pPr"));
        assert_eq!(String::from_utf8(write(&nodes).unwrap()).unwrap(), "<w:p><w:pPr/><w:r/></w:p>");
    }

    #[test]
    fn test_unbalanced_xml() {
        assert!(parse("<w:p><w:r></w:p>").is_err());
        assert!(parse("<w:p>").is_err());
    }

    #[test]
    fn test_attribute() {
        let element = Element::new("w:pStyle").with_attribute("w:val", "Heading1");
        assert_eq!(element.attribute(b"val"), Some("Heading1".to_string()));
        assert_eq!(element.attribute(b"other"), None);
    }
}
