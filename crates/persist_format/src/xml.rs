use std::io;

use persist_graph::{ArchiveConfig, DocumentFormat, Error, Node, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

/// XML: one element per node, attributes in order.
///
/// XML has no notion of a container, so [`parse`](DocumentFormat::parse)
/// guesses: an element without attributes whose children all share one name
/// is marked as a container.
///
/// ```
/// use persist_format::XmlFormat;
/// use persist_graph::{DocumentFormat, Node};
///
/// let mut node = Node::new("Person");
/// node.push_attribute("name", "Ann & Bo");
///
/// let xml = XmlFormat::new().with_declaration(false).render(&node).unwrap();
/// assert_eq!(xml, br#"<Person name="Ann &amp; Bo"/>"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlFormat {
    indent: Option<usize>,
    declaration: bool,
    item: String,
    root: String,
}

impl XmlFormat {
    /// Two-space indentation, with a declaration, default keywords.
    pub fn new() -> Self {
        Self::from_config(&ArchiveConfig::default())
    }

    /// Takes the names of unnamed nodes from `config`.
    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self {
            indent: Some(2),
            declaration: true,
            item: config.keywords.item.clone(),
            root: config.keywords.root.clone(),
        }
    }

    /// Spaces per level, or `None` for a single line.
    pub fn with_indent(mut self, indent: Option<usize>) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    fn element_name<'a>(&'a self, node: &'a Node, is_root: bool) -> &'a str {
        if !node.name.is_empty() {
            &node.name
        } else if is_root {
            &self.root
        } else {
            &self.item
        }
    }

    fn render_node<W: io::Write>(
        &self,
        writer: &mut Writer<W>,
        node: &Node,
        is_root: bool,
    ) -> Result<()> {
        let name = self.element_name(node, is_root);
        let mut start = BytesStart::new(name);
        for attr in &node.attributes {
            start.push_attribute((attr.name.as_str(), attr.value.as_str()));
        }

        if node.children.is_empty() {
            writer.write_event(Event::Empty(start)).map_err(Error::format)?;
        } else {
            writer.write_event(Event::Start(start)).map_err(Error::format)?;
            for child in &node.children {
                self.render_node(writer, child, false)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(Error::format)?;
        }
        Ok(())
    }
}

impl Default for XmlFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentFormat for XmlFormat {
    fn render(&self, node: &Node) -> Result<Vec<u8>> {
        let mut writer = match self.indent {
            Some(indent) => Writer::new_with_indent(Vec::new(), b' ', indent),
            None => Writer::new(Vec::new()),
        };
        if self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
                .map_err(Error::format)?;
        }
        self.render_node(&mut writer, node, true)?;
        Ok(writer.into_inner())
    }

    fn parse(&self, bytes: &[u8]) -> Result<Node> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Node> = Vec::new();
        let mut root = None;
        loop {
            match reader.read_event().map_err(Error::format)? {
                Event::Start(start) => stack.push(element(&start)?),
                Event::Empty(start) => close(element(&start)?, &mut stack, &mut root)?,
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| Error::Format("unbalanced end tag".into()))?;
                    close(node, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(Error::format)?;
                    if !text.trim().is_empty() {
                        log::warn!("ignoring text content {text:?}");
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::Format(format!("element `{}` is not closed", open.name)));
        }
        root.ok_or_else(|| Error::Format("document has no root element".into()))
    }
}

fn element(start: &BytesStart<'_>) -> Result<Node> {
    let qname = start.name();
    let name = std::str::from_utf8(qname.as_ref()).map_err(Error::format)?;
    let mut node = Node::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(Error::format)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(Error::format)?;
        let value = attr.unescape_value().map_err(Error::format)?;
        node.push_attribute(key, value);
    }
    Ok(node)
}

fn close(mut node: Node, stack: &mut [Node], root: &mut Option<Node>) -> Result<()> {
    node.is_container = node.attributes.is_empty()
        && node
            .children
            .first()
            .is_some_and(|first| node.children.iter().all(|child| child.name == first.name));

    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => {
            return Err(Error::Format(format!(
                "second root element `{}`",
                node.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use persist_graph::{DocumentFormat, Error, Node};

    use super::XmlFormat;

    fn sample() -> Node {
        let mut root = Node::new("Classroom");
        root.push_attribute("room", "4<b>");
        let tags = root.push_child(Node::container("tags"));
        tags.push_child(Node::new("String")).push_attribute("value", "quiet");
        tags.push_child(Node::new("String")).push_attribute("value", "\"sunny\"");
        root.push_child(Node::new("Student"))
            .push_attribute("name", "Ann");
        root
    }

    #[test]
    fn round_trip() {
        let format = XmlFormat::new();
        let node = sample();
        let bytes = format.render(&node).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("\n  <tags>"));

        let back = format.parse(&bytes).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn single_line() {
        let format = XmlFormat::new().with_indent(None).with_declaration(false);
        let mut node = Node::new("a");
        node.push_child(Node::new("b"));
        assert_eq!(format.render(&node).unwrap(), b"<a><b/></a>");
    }

    #[test]
    fn unnamed_nodes() {
        let format = XmlFormat::new().with_indent(None).with_declaration(false);
        let mut node = Node::container("");
        node.push_child(Node::new(""));
        assert_eq!(format.render(&node).unwrap(), b"<root><item/></root>");
    }

    #[test]
    fn malformed() {
        let format = XmlFormat::new();
        assert!(matches!(format.parse(b"<a><b></a>"), Err(Error::Format(_))));
        assert!(matches!(format.parse(b""), Err(Error::Format(_))));
        assert!(matches!(format.parse(b"<a/><b/>"), Err(Error::Format(_))));
    }
}
