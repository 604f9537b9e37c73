use alloc::string::String;
use alloc::vec::Vec;
use core::str::FromStr;

use super::Node;
use crate::{Error, Result};

// -----------------------------------------------------------------------------
// DynamicValue

/// What a key of a [`DynamicNode`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicValue<'a> {
    /// An attribute.
    Text(&'a str),
    /// A child node.
    Node(&'a Node),
}

impl<'a> DynamicValue<'a> {
    /// Returns the text if this is an attribute.
    pub fn as_text(&self) -> Option<&'a str> {
        match *self {
            Self::Text(text) => Some(text),
            Self::Node(_) => None,
        }
    }

    /// Returns the node if this is a child.
    pub fn as_node(&self) -> Option<&'a Node> {
        match *self {
            Self::Text(_) => None,
            Self::Node(node) => Some(node),
        }
    }
}

// -----------------------------------------------------------------------------
// DynamicNode

/// An untyped, map-like view over a keyed [`Node`].
///
/// Attributes and children share one key space: setting text on a key that
/// currently names a child replaces the child, and the other way around. Use
/// it for documents whose shape is not known ahead of time.
///
/// ```
/// use persist_graph::{DynamicNode, Node};
///
/// let mut config = DynamicNode::new("Settings");
/// config.set_text("Port", "8080");
/// config.set_node("Owner", Node::new("ignored"));
///
/// assert_eq!(config.get_as::<u16>("Port").unwrap(), Some(8080));
/// assert_eq!(config.get("Owner").and_then(|v| v.as_node()).map(|n| n.name.as_str()), Some("Owner"));
///
/// config.set_text("Owner", "root");
/// assert_eq!(config.keys().collect::<Vec<_>>(), ["Port", "Owner"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicNode {
    node: Node,
}

impl DynamicNode {
    /// Creates an empty view named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            node: Node::new(name),
        }
    }

    /// Wraps an existing node.
    pub fn from_node(node: Node) -> Self {
        Self { node }
    }

    /// Returns the wrapped node.
    pub fn into_node(self) -> Node {
        self.node
    }

    /// Borrows the wrapped node.
    pub fn as_node(&self) -> &Node {
        &self.node
    }

    /// Looks `key` up among the attributes, then among the children.
    pub fn get(&self, key: &str) -> Option<DynamicValue<'_>> {
        self.node
            .attribute(key)
            .map(DynamicValue::Text)
            .or_else(|| self.node.child(key).map(DynamicValue::Node))
    }

    /// Parses the attribute `key` as `T`.
    ///
    /// Returns `Ok(None)` if the key is absent or names a child.
    pub fn get_as<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        let Some(text) = self.node.attribute(key) else {
            return Ok(None);
        };
        text.parse()
            .map(Some)
            .map_err(|_| Error::parse(core::any::type_name::<T>(), text))
    }

    /// Returns the child `key` as another view.
    pub fn get_node(&self, key: &str) -> Option<DynamicNode> {
        self.node.child(key).cloned().map(DynamicNode::from_node)
    }

    /// Sets `key` to an attribute holding `value`.
    pub fn set_text(&mut self, key: &str, value: impl Into<String>) {
        self.node.children.retain(|child| child.name != key);
        self.node.set_attribute(key, value);
    }

    /// Sets `key` to a child node; the node is renamed to `key`.
    pub fn set_node(&mut self, key: &str, mut node: Node) {
        self.node.attributes.retain(|attr| attr.name != key);
        node.name = key.into();
        match self.node.child_mut(key) {
            Some(slot) => *slot = node,
            None => {
                self.node.push_child(node);
            }
        }
    }

    /// Removes `key`; returns `true` if something was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.node.remove_attribute(key).is_some() || self.node.remove_child(key).is_some()
    }

    /// Returns `true` if `key` is an attribute or a child.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over attribute names, then distinct child names, in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = Vec::new();
        let attrs = self.node.attributes.iter().map(|attr| attr.name.as_str());
        let children = self.node.children.iter().map(|child| child.name.as_str());
        attrs.chain(children).filter(move |key| {
            if seen.contains(key) {
                false
            } else {
                seen.push(*key);
                true
            }
        })
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys().count()
    }

    /// Returns `true` if the view holds no keys.
    pub fn is_empty(&self) -> bool {
        self.node.attributes.is_empty() && self.node.children.is_empty()
    }
}

impl From<Node> for DynamicNode {
    fn from(node: Node) -> Self {
        Self::from_node(node)
    }
}

impl From<DynamicNode> for Node {
    fn from(view: DynamicNode) -> Self {
        view.node
    }
}
