use alloc::borrow::Cow;
use core::any::{Any, TypeId};
use core::fmt;

use super::Shape;

// -----------------------------------------------------------------------------
// Persist

/// A type whose values can be written to and read from a document tree.
///
/// Usually implemented through `#[derive(Persist)]`. Manual implementations
/// describe the type with the builders of [`Shape`].
///
/// # Naming
///
/// - `type_path`: the fully qualified name, used as the discriminator in
///   discover mode, e.g. `my_crate::model::Person`.
/// - `type_name`: the friendly name, used for document element names and
///   default discriminators, e.g. `Person` or `Vec<Person>`.
/// - `type_ident`: the name without generic arguments, e.g. `Vec`.
///
/// A `type_name` containing `<` marks a generic type; sequences of generic
/// types fall back to the configured item name for their elements.
pub trait Persist: Any {
    fn type_path() -> Cow<'static, str>;

    fn type_name() -> Cow<'static, str>;

    fn type_ident() -> &'static str;

    fn shape() -> Shape;
}

// -----------------------------------------------------------------------------
// DynPersist

/// Object-safe access to [`Persist`], implemented for every persistable type.
///
/// Traits used as polymorphic bases take it as a supertrait, so a
/// `Box<dyn Trait>` can report the concrete type it holds:
///
/// ```
/// use persist_graph::DynPersist;
///
/// pub trait Shape2D: DynPersist {
///     fn area(&self) -> f64;
/// }
/// ```
pub trait DynPersist: Any {
    /// The concrete type of `self`.
    fn persist_type(&self) -> TypeRef;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Persist> DynPersist for T {
    #[inline]
    fn persist_type(&self) -> TypeRef {
        TypeRef::of::<T>()
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// -----------------------------------------------------------------------------
// TypeRef

/// A handle to a [`Persist`] type that can be stored without naming it.
///
/// Shapes refer to the types of their members through `TypeRef`, and the
/// schema compiles them lazily, so recursive types never expand eagerly.
#[derive(Clone, Copy)]
pub struct TypeRef {
    type_id: TypeId,
    type_path: fn() -> Cow<'static, str>,
    type_name: fn() -> Cow<'static, str>,
    type_ident: fn() -> &'static str,
    shape: fn() -> Shape,
}

impl TypeRef {
    /// Creates the handle of `T`.
    #[inline]
    pub fn of<T: Persist>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_path: T::type_path,
            type_name: T::type_name,
            type_ident: T::type_ident,
            shape: T::shape,
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn type_path(&self) -> Cow<'static, str> {
        (self.type_path)()
    }

    #[inline]
    pub fn type_name(&self) -> Cow<'static, str> {
        (self.type_name)()
    }

    #[inline]
    pub fn type_ident(&self) -> &'static str {
        (self.type_ident)()
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        (self.shape)()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeRef {}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.type_path()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{DynPersist, Persist, TypeRef};
    use alloc::vec::Vec;

    #[test]
    fn names() {
        assert_eq!(<Vec<i32> as Persist>::type_name(), "Vec<i32>");
        assert_eq!(<Vec<i32> as Persist>::type_ident(), "Vec");
        assert_eq!(TypeRef::of::<Option<u8>>().type_name(), "Option<u8>");
        assert_eq!(TypeRef::of::<u8>(), TypeRef::of::<u8>());
        assert_ne!(TypeRef::of::<u8>(), TypeRef::of::<u16>());
    }

    #[test]
    fn dyn_persist() {
        let value: &dyn DynPersist = &7_u32;
        assert_eq!(value.persist_type(), TypeRef::of::<u32>());
        assert_eq!(value.as_any().downcast_ref::<u32>(), Some(&7));
    }
}
