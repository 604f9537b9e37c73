//! Shared containers for the persist crates.
//!
//! - [`hash`]: `hashbrown` maps and sets seeded with a fixed `foldhash` state,
//!   so that iteration order only depends on the inserted keys.
//! - [`TypeIdMap`]: a map keyed by [`TypeId`](core::any::TypeId), used by the
//!   schema cache and the polymorphic registry.
#![no_std]

// -----------------------------------------------------------------------------
// No STD Support

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod typeid_map;

pub mod hash;

// -----------------------------------------------------------------------------
// Top-level exports

pub use typeid_map::TypeIdMap;
