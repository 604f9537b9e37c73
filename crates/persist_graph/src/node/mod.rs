//! The format-neutral document tree.
//!
//! A [`Node`] is either a keyed record (children are told apart by name) or a
//! container (children are homogeneous repeated elements). Attributes are
//! ordered name/text pairs.

// -----------------------------------------------------------------------------
// Modules

mod dynamic;

// -----------------------------------------------------------------------------
// Exports

pub use dynamic::{DynamicNode, DynamicValue};

use alloc::string::String;
use alloc::vec::Vec;

// -----------------------------------------------------------------------------
// Attribute

/// One `name = value` pair of a [`Node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    #[inline]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// -----------------------------------------------------------------------------
// Node

/// One element of the document tree.
///
/// `id` is the identity of the object written into this node. It only lives
/// for the duration of one write, is never rendered, and is cleared when the
/// write finishes.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub is_container: bool,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub id: Option<u64>,
}

impl Node {
    /// Creates a keyed node without attributes or children.
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Creates a container node.
    #[inline]
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_container: true,
            ..Default::default()
        }
    }

    /// Returns `true` if this node has no name.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Returns the value of the first attribute called `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Appends an attribute, keeping any existing one with the same name.
    #[inline]
    pub fn push_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push(Attribute::new(name, value));
    }

    /// Replaces the value of the attribute `name`, or appends it.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.value = value.into(),
            None => self.push_attribute(name, value),
        }
    }

    /// Removes the first attribute called `name` and returns its value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|attr| attr.name == name)?;
        Some(self.attributes.remove(index).value)
    }

    /// Returns the first child called `name`.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Returns the first child called `name`, mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|child| child.name == name)
    }

    /// Iterates over the children called `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Appends a child and returns it.
    pub fn push_child(&mut self, child: Node) -> &mut Node {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Removes the first child called `name`.
    pub fn remove_child(&mut self, name: &str) -> Option<Node> {
        let index = self.children.iter().position(|child| child.name == name)?;
        Some(self.children.remove(index))
    }

    /// Number of children.
    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns `true` if this node has no children.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }

    /// Visits every node of the subtree in document order.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Node)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }

    /// Compares two trees, ignoring the order of attributes and the transient id.
    pub fn eq_unordered(&self, other: &Node) -> bool {
        self.name == other.name
            && self.is_container == other.is_container
            && self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .all(|attr| other.attribute(&attr.name) == Some(attr.value.as_str()))
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.eq_unordered(b))
    }
}

impl PartialEq for Node {
    /// Structural equality; the transient id is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.is_container == other.is_container
            && self.attributes == other.attributes
            && self.children == other.children
    }
}

impl Eq for Node {}

#[cfg(test)]
mod tests {
    use super::Node;

    #[test]
    fn attributes() {
        let mut node = Node::new("Person");
        node.push_attribute("Name", "Ann");
        node.set_attribute("Age", "31");
        node.set_attribute("Name", "Bea");

        assert_eq!(node.attribute("Name"), Some("Bea"));
        assert_eq!(node.attribute("Age"), Some("31"));
        assert_eq!(node.remove_attribute("Age").as_deref(), Some("31"));
        assert_eq!(node.attribute("Age"), None);
    }

    #[test]
    fn children() {
        let mut list = Node::container("Students");
        list.push_child(Node::new("Student")).push_attribute("Name", "a");
        list.push_child(Node::new("Student")).push_attribute("Name", "b");
        list.push_child(Node::new("Tutor"));

        assert_eq!(list.len(), 3);
        assert_eq!(list.children_named("Student").count(), 2);
        assert_eq!(list.child("Tutor").map(|n| n.len()), Some(0));
        assert_eq!(list.count(), 4);
    }

    #[test]
    fn unordered_equality() {
        let mut a = Node::new("x");
        a.push_attribute("a", "1");
        a.push_attribute("b", "2");
        a.id = Some(3);

        let mut b = Node::new("x");
        b.push_attribute("b", "2");
        b.push_attribute("a", "1");

        assert!(a.eq_unordered(&b));
        assert_ne!(a, b);

        b.attributes.reverse();
        assert_eq!(a, b);
    }
}
