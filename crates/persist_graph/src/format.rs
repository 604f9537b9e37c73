use alloc::vec::Vec;

use crate::{Node, Result};

/// A concrete syntax for document trees.
///
/// Adapters render a [`Node`] tree to bytes and parse bytes back into a tree.
/// `parse` must restore names, attributes in order, children in order and
/// the container flag of every node. The transient node id is never part of
/// the syntax.
pub trait DocumentFormat {
    fn render(&self, node: &Node) -> Result<Vec<u8>>;

    fn parse(&self, bytes: &[u8]) -> Result<Node>;
}

impl<F: DocumentFormat + ?Sized> DocumentFormat for &F {
    #[inline]
    fn render(&self, node: &Node) -> Result<Vec<u8>> {
        (**self).render(node)
    }

    #[inline]
    fn parse(&self, bytes: &[u8]) -> Result<Node> {
        (**self).parse(bytes)
    }
}
