#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use persist_format as format;
pub use persist_graph as graph;
pub use persist_utils as utils;

pub use persist_graph::derive::Persist;
pub use persist_graph::{Archive, ArchiveConfig, Error, Node, Shared};
