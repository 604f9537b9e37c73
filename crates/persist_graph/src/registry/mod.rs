//! Polymorphic registry.
//!
//! A field typed `Box<dyn Trait>` may hold any type declared compatible with
//! `Trait`. Compatible types come from three sources:
//!
//! - the inclusion list of [`polymorphic!`](crate::polymorphic),
//! - variants passed to [`ArchiveBuilder::include`](crate::ArchiveBuilder::include),
//! - with [`ArchiveConfig::discover_derived`](crate::ArchiveConfig::discover_derived),
//!   every variant submitted through `#[persist(variant_of = dyn Trait)]` or
//!   [`submit_variant!`](crate::submit_variant). Discovery relies on the
//!   `auto_register` feature and the `inventory` crate.
//!
//! When the concrete type differs from the base type, the written node
//! carries a discriminator attribute naming it.

// -----------------------------------------------------------------------------
// Modules

mod variants;

// -----------------------------------------------------------------------------
// Exports

pub use variants::{RegisteredVariant, VariantSet};

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::any::{Any, TypeId};
use core::fmt;

use crate::schema::{DynPersist, Persist, TypeRef, downcast_box};
use crate::Result;

// -----------------------------------------------------------------------------
// Variant

trait ErasedUpcast: Send + Sync {
    fn upcast(&self, value: Box<dyn Any>) -> Result<Box<dyn Any>>;
}

struct TypedUpcast<B: ?Sized, T> {
    upcast: fn(Box<T>) -> Box<B>,
}

impl<B: ?Sized + DynPersist, T: Persist> ErasedUpcast for TypedUpcast<B, T> {
    fn upcast(&self, value: Box<dyn Any>) -> Result<Box<dyn Any>> {
        let value = downcast_box::<T>(value)?;
        let boxed: Box<B> = (self.upcast)(Box::new(value));
        Ok(Box::new(boxed))
    }
}

/// A concrete type usable where a `Box<B>` is declared.
///
/// Usually built with [`variant!`](crate::variant).
#[derive(Clone)]
pub struct Variant {
    ty: TypeRef,
    base: TypeId,
    base_name: &'static str,
    upcast: Arc<dyn ErasedUpcast>,
}

impl Variant {
    /// Declares `T` as a variant of `B`; `upcast` converts the concrete box.
    pub fn new<B: ?Sized + DynPersist, T: Persist>(upcast: fn(Box<T>) -> Box<B>) -> Self {
        Self {
            ty: TypeRef::of::<T>(),
            base: TypeId::of::<Box<B>>(),
            base_name: core::any::type_name::<B>(),
            upcast: Arc::new(TypedUpcast { upcast }),
        }
    }

    /// The concrete type.
    #[inline]
    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    /// `TypeId` of `Box<B>`, the polymorphic type this variant belongs to.
    #[inline]
    pub fn base(&self) -> TypeId {
        self.base
    }

    /// Converts a boxed `T` into a boxed `Box<B>`.
    #[inline]
    pub(crate) fn upcast(&self, value: Box<dyn Any>) -> Result<Box<dyn Any>> {
        self.upcast.upcast(value)
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("ty", &self.ty)
            .field("base", &self.base_name)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// VariantRegistration

/// A variant submitted for discovery.
///
/// Created by `#[persist(variant_of = dyn Trait)]` and
/// [`submit_variant!`](crate::submit_variant).
pub struct VariantRegistration {
    variant: fn() -> Variant,
}

impl VariantRegistration {
    #[inline]
    pub const fn new(variant: fn() -> Variant) -> Self {
        Self { variant }
    }

    #[inline]
    pub fn variant(&self) -> Variant {
        (self.variant)()
    }
}

#[cfg(feature = "auto_register")]
inventory::collect!(VariantRegistration);

/// Variants of the polymorphic type `base` submitted for discovery.
///
/// Always empty without the `auto_register` feature.
pub fn submitted(base: TypeId) -> impl Iterator<Item = Variant> {
    #[cfg(feature = "auto_register")]
    let all = inventory::iter::<VariantRegistration>.into_iter();
    #[cfg(not(feature = "auto_register"))]
    let all = core::iter::empty::<&'static VariantRegistration>();

    all.map(VariantRegistration::variant)
        .filter(move |variant| variant.base == base)
}

// -----------------------------------------------------------------------------
// Macros

/// Implements [`Persist`](crate::Persist) for `Box<dyn Trait>`.
///
/// The first form names the base type, written without a discriminator,
/// followed by the included variants. The second form has no base: every
/// value carries a discriminator. Each listed type must implement `Trait`.
///
/// ```
/// use persist_graph::{DynPersist, derive::Persist, polymorphic};
///
/// pub trait Transition: DynPersist {}
///
/// #[derive(Persist, Default)]
/// pub struct Plain {
///     pub target: String,
/// }
///
/// #[derive(Persist, Default)]
/// pub struct Command {
///     pub target: String,
///     pub command: String,
/// }
///
/// impl Transition for Plain {}
/// impl Transition for Command {}
///
/// polymorphic!(dyn Transition => Plain, [Command]);
/// ```
#[macro_export]
macro_rules! polymorphic {
    (dyn $tr:path => [$($variant:ty),* $(,)?]) => {
        $crate::polymorphic!(@impl $tr, ::core::option::Option::None, [$($variant),*]);
    };
    (dyn $tr:path => $base:ty, [$($variant:ty),* $(,)?]) => {
        $crate::polymorphic!(@impl $tr,
            ::core::option::Option::Some($crate::variant!(dyn $tr => $base)),
            [$($variant),*]);
    };
    (@impl $tr:path, $base:expr, [$($variant:ty),*]) => {
        impl $crate::Persist for $crate::__macro_exports::Box<dyn $tr> {
            fn type_path() -> $crate::__macro_exports::Cow<'static, str> {
                $crate::__macro_exports::Cow::Borrowed(::core::any::type_name::<Self>())
            }

            fn type_name() -> $crate::__macro_exports::Cow<'static, str> {
                $crate::__macro_exports::Cow::Borrowed(<Self as $crate::Persist>::type_ident())
            }

            fn type_ident() -> &'static str {
                $crate::__macro_exports::last_segment(::core::stringify!($tr))
            }

            fn shape() -> $crate::schema::Shape {
                $crate::schema::Shape::Polymorphic($crate::schema::PolymorphicShape::new::<dyn $tr>(
                    $base,
                    $crate::__macro_exports::vec![$($crate::variant!(dyn $tr => $variant)),*],
                ))
            }
        }
    };
}

/// Builds a [`Variant`] of `dyn Trait`.
///
/// ```
/// # use persist_graph::{DynPersist, derive::Persist};
/// # pub trait Animal: DynPersist {}
/// # #[derive(Persist, Default)]
/// # pub struct Cat { pub lives: u8 }
/// # impl Animal for Cat {}
/// let variant = persist_graph::variant!(dyn Animal => Cat);
/// assert_eq!(variant.ty().type_name(), "Cat");
/// ```
#[macro_export]
macro_rules! variant {
    (dyn $tr:path => $ty:ty) => {
        $crate::registry::Variant::new::<dyn $tr, $ty>(|value| value as $crate::__macro_exports::Box<dyn $tr>)
    };
}

/// Submits a variant for discovery.
///
/// Has no effect without the `auto_register` feature.
#[macro_export]
macro_rules! submit_variant {
    (dyn $tr:path => $ty:ty) => {
        $crate::__submit_variant! {
            fn __variant() -> $crate::registry::Variant {
                $crate::variant!(dyn $tr => $ty)
            }
        }
    };
}

#[cfg(feature = "auto_register")]
#[doc(hidden)]
#[macro_export]
macro_rules! __submit_variant {
    ($f:item) => {
        const _: () = {
            $f
            $crate::__macro_exports::inventory::submit! {
                $crate::registry::VariantRegistration::new(__variant)
            }
        };
    };
}

#[cfg(not(feature = "auto_register"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __submit_variant {
    ($f:item) => {};
}
