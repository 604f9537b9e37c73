use persist_graph::{ArchiveConfig, DocumentFormat, Error, Node, Result};

use crate::tree::TreeKeywords;

/// YAML: records are mappings, containers are sequences.
///
/// Maps the tree exactly like [`JsonFormat`](crate::JsonFormat).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlFormat {
    keywords: TreeKeywords,
}

impl YamlFormat {
    pub fn new() -> Self {
        Self::from_config(&ArchiveConfig::default())
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self {
            keywords: TreeKeywords::new(&config.keywords),
        }
    }
}

impl Default for YamlFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentFormat for YamlFormat {
    fn render(&self, node: &Node) -> Result<Vec<u8>> {
        let value = self.keywords.to_value(node)?;
        serde_yaml::to_string(&value)
            .map(String::into_bytes)
            .map_err(Error::format)
    }

    fn parse(&self, bytes: &[u8]) -> Result<Node> {
        let value: serde_json::Value = serde_yaml::from_slice(bytes).map_err(Error::format)?;
        Ok(self.keywords.to_node(value))
    }
}

#[cfg(test)]
mod tests {
    use persist_graph::DocumentFormat;

    use super::YamlFormat;

    #[test]
    fn hand_written() {
        let text = "name: Ann\nage: 41\npets:\n  - kind: cat\n  - kind: dog\n";
        let node = YamlFormat::new().parse(text.as_bytes()).unwrap();
        assert_eq!(node.attribute("age"), Some("41"));
        let pets = node.child("pets").unwrap();
        assert!(pets.is_container);
        assert_eq!(pets.children[1].attribute("kind"), Some("dog"));
    }

    #[test]
    fn numbers_stay_text() {
        let mut node = persist_graph::Node::new("Person");
        node.push_attribute("age", "041");
        let format = YamlFormat::new();
        let back = format.parse(&format.render(&node).unwrap()).unwrap();
        assert_eq!(back.attribute("age"), Some("041"));
    }
}
