use persist_graph::{ArchiveConfig, DocumentFormat, Error, Node, Result};

use crate::tree::TreeKeywords;

/// JSON: records are objects, containers are arrays.
///
/// Attributes are written as strings. On parse numbers and booleans become
/// attributes with their literal text and `null` members are dropped, so a
/// hand-written document may use native JSON scalars.
///
/// ```
/// use persist_format::JsonFormat;
/// use persist_graph::{DocumentFormat, Node};
///
/// let node = JsonFormat::new().parse(br#"{ "name": "Ann", "age": 41 }"#).unwrap();
/// assert_eq!(node.attribute("age"), Some("41"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFormat {
    pretty: bool,
    keywords: TreeKeywords,
}

impl JsonFormat {
    /// Pretty-printed, default keywords.
    pub fn new() -> Self {
        Self::from_config(&ArchiveConfig::default())
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self {
            pretty: true,
            keywords: TreeKeywords::new(&config.keywords),
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentFormat for JsonFormat {
    fn render(&self, node: &Node) -> Result<Vec<u8>> {
        let value = self.keywords.to_value(node)?;
        if self.pretty {
            serde_json::to_vec_pretty(&value).map_err(Error::format)
        } else {
            serde_json::to_vec(&value).map_err(Error::format)
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<Node> {
        let value = serde_json::from_slice(bytes).map_err(Error::format)?;
        Ok(self.keywords.to_node(value))
    }
}

#[cfg(test)]
mod tests {
    use persist_graph::{DocumentFormat, Error, Node};

    use super::JsonFormat;

    #[test]
    fn compact() {
        let mut node = Node::new("Person");
        node.push_attribute("name", "Ann");
        let list = node.push_child(Node::container("pets"));
        list.push_child(Node::new("Pet")).push_attribute("kind", "cat");

        let bytes = JsonFormat::new().with_pretty(false).render(&node).unwrap();
        assert_eq!(bytes, br#"{"name":"Ann","pets":[{"kind":"cat"}]}"#);
    }

    #[test]
    fn invalid_json() {
        let err = JsonFormat::new().parse(b"{ name: }").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
