//! Object-graph persistence over a format-neutral document tree.
//!
//! A value is described once by a [`Schema`], written into a [`Node`] tree by
//! an [`Archive`], and rendered to text by a [`DocumentFormat`]. Reading runs
//! the same path backwards in two phases: the owned graph is materialized
//! first, then members marked as references are wired to the objects they
//! point at.
//!
//! ```
//! use persist_graph::{Archive, Shared, derive::Persist};
//!
//! #[derive(Persist, Default)]
//! pub struct Person {
//!     pub name: String,
//!     #[persist(reference)]
//!     pub best_friend: Option<Shared<Person>>,
//! }
//!
//! #[derive(Persist, Default)]
//! pub struct Pair {
//!     pub first: Shared<Person>,
//!     pub second: Shared<Person>,
//! }
//!
//! let pair = Pair::default();
//! pair.first.borrow_mut().name = "Ann".into();
//! pair.second.borrow_mut().best_friend = Some(pair.first.clone());
//!
//! let archive = Archive::<Pair>::new().unwrap();
//! let node = archive.write(&pair, None).unwrap();
//! let back = archive.read(&node).unwrap();
//!
//! let friend = back.second.borrow().best_friend.clone().unwrap();
//! assert!(Shared::ptr_eq(&friend, &back.first));
//! ```

// -----------------------------------------------------------------------------
// Extern Self

// Lets the derive refer to `::persist_graph` from inside this crate's tests.
extern crate self as persist_graph;

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod archive;
mod config;
mod error;
mod format;
mod read;
mod shared;
mod trace;
mod write;

pub mod impls;
pub mod node;
pub mod registry;
pub mod schema;

// -----------------------------------------------------------------------------
// Top-Level exports

pub mod __macro_exports;

pub use archive::{Archive, ArchiveBuilder};
pub use config::{ArchiveConfig, Keywords};
pub use error::{Error, Result, SchemaError};
pub use format::DocumentFormat;
pub use node::{Attribute, DynamicNode, DynamicValue, Node};
pub use persist_graph_derive as derive;
pub use schema::{DynPersist, Persist, Schema};
pub use shared::Shared;
