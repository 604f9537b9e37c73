//! Type shapes and the schema compiler.
//!
//! ## Menu
//!
//! - [`Persist`]: the trait of persistable types, usually derived.
//! - [`Shape`]: the uncompiled description a type gives of itself.
//! - [`Schema`]: compiles shapes into [`TypeDescriptor`]s, memoized by type.
//! - [`Member`]: how one use of a type is named and linked in the document.
//!
//! Compiling a type runs three passes:
//!
//! 1. Every reachable type is reserved an id, depth first. A type already
//!    reserved is reused, which bounds recursive shapes.
//! 2. Members are linked: names, reference flags and item members are
//!    resolved and validated.
//! 3. Ownership cycles are rejected. An owning edge is any member not marked
//!    as a reference, so a type that owns a value of its own type, directly
//!    or through containers and variants, does not compile.

// -----------------------------------------------------------------------------
// Modules

mod compiler;
mod descriptor;
mod persist;
mod shape;

// -----------------------------------------------------------------------------
// Exports

pub use compiler::{Schema, SchemaTable};
pub use descriptor::{
    DescriptorId, DescriptorKind, Field, Items, Kind, Member, PolymorphicDescriptor,
    RecordDescriptor, TypeDescriptor,
};
pub use persist::{DynPersist, Persist, TypeRef};
pub use shape::{
    Construct, FieldAccess, FieldShape, MapLike, MapShape, MemberOptions, OptionalShape,
    PolymorphicShape, RecordShape, ScalarShape, SequenceLike, SequenceShape, Shape, SharedShape,
};
pub use shape::{downcast_box, downcast_mut, downcast_ref};
