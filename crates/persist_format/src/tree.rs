//! Mapping between document trees and JSON-like values, shared by the JSON
//! and YAML adapters.
//!
//! A keyed node is an object: attributes become string entries, children
//! become nested values keyed by their names. A container is an array of its
//! children. A scalar wrapper inside a container collapses to its text. The
//! root's name is not represented.

use persist_graph::{Error, Keywords, Node, Result};
use serde_json::{Map, Value};

/// Keywords needed to map the tree in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TreeKeywords {
    pub value: String,
    pub root: String,
}

impl TreeKeywords {
    pub fn new(keywords: &Keywords) -> Self {
        Self {
            value: keywords.value.clone(),
            root: keywords.root.clone(),
        }
    }

    fn is_wrapper(&self, node: &Node) -> bool {
        !node.is_container
            && node.children.is_empty()
            && node.attributes.len() == 1
            && node.attributes[0].name == self.value
    }

    pub fn to_value(&self, node: &Node) -> Result<Value> {
        if node.is_container {
            if let Some(attr) = node.attributes.first() {
                return Err(Error::Structural(format!(
                    "container `{}` carries the attribute `{}`",
                    node.name, attr.name
                )));
            }
            let items = node
                .children
                .iter()
                .map(|child| {
                    if self.is_wrapper(child) {
                        Ok(Value::String(child.attributes[0].value.clone()))
                    } else {
                        self.to_value(child)
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(Value::Array(items));
        }

        let mut map = Map::with_capacity(node.attributes.len() + node.children.len());
        for attr in &node.attributes {
            map.insert(attr.name.clone(), Value::String(attr.value.clone()));
        }
        for child in &node.children {
            if map.contains_key(&child.name) {
                return Err(Error::Structural(format!(
                    "`{}` has more than one member named `{}`",
                    node.name, child.name
                )));
            }
            map.insert(child.name.clone(), self.to_value(child)?);
        }
        Ok(Value::Object(map))
    }

    pub fn to_node(&self, value: Value) -> Node {
        self.node_from(self.root.clone(), value)
    }

    fn node_from(&self, name: String, value: Value) -> Node {
        match value {
            Value::Object(map) => {
                let mut node = Node::new(name);
                for (key, value) in map {
                    match value {
                        Value::Null => {}
                        Value::Object(_) | Value::Array(_) => {
                            node.children.push(self.node_from(key, value));
                        }
                        scalar => node.push_attribute(key, text(scalar)),
                    }
                }
                node
            }
            Value::Array(items) => {
                let mut node = Node::container(name);
                for item in items {
                    match item {
                        Value::Null => {}
                        Value::Object(_) | Value::Array(_) => {
                            node.children.push(self.node_from(String::new(), item));
                        }
                        scalar => node
                            .push_child(Node::new(String::new()))
                            .push_attribute(self.value.as_str(), text(scalar)),
                    }
                }
                node
            }
            Value::Null => Node::new(name),
            scalar => {
                let mut node = Node::new(name);
                node.push_attribute(self.value.as_str(), text(scalar));
                node
            }
        }
    }
}

fn text(scalar: Value) -> String {
    match scalar {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use persist_graph::{Error, Keywords, Node};
    use serde_json::json;

    use super::TreeKeywords;

    #[test]
    fn records_and_containers() {
        let keywords = TreeKeywords::new(&Keywords::default());
        let mut node = Node::new("Classroom");
        node.push_attribute("room", "4b");
        let tags = node.push_child(Node::container("tags"));
        tags.push_child(Node::new("String")).push_attribute("value", "quiet");
        node.push_child(Node::new("tutor")).push_attribute("name", "Bo");

        let value = keywords.to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({ "room": "4b", "tags": ["quiet"], "tutor": { "name": "Bo" } })
        );

        let back = keywords.to_node(value);
        assert_eq!(back.name, "root");
        assert_eq!(back.attribute("room"), Some("4b"));
        let tags = back.child("tags").unwrap();
        assert!(tags.is_container);
        assert_eq!(tags.children[0].attribute("value"), Some("quiet"));
    }

    #[test]
    fn parse_scalars() {
        let keywords = TreeKeywords::new(&Keywords::default());
        let node = keywords.to_node(json!({ "age": 41, "alive": true, "gone": null }));
        assert_eq!(node.attribute("age"), Some("41"));
        assert_eq!(node.attribute("alive"), Some("true"));
        assert_eq!(node.attribute("gone"), None);
    }

    #[test]
    fn duplicate_members() {
        let keywords = TreeKeywords::new(&Keywords::default());
        let mut node = Node::new("Classroom");
        node.push_child(Node::new("Student"));
        node.push_child(Node::new("Student"));
        assert!(matches!(keywords.to_value(&node), Err(Error::Structural(_))));

        let mut list = Node::container("list");
        list.push_attribute("count", "1");
        assert!(matches!(keywords.to_value(&list), Err(Error::Structural(_))));
    }
}
