use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt::{self, Debug, Display};
use core::str::FromStr;

use super::{DynPersist, Persist, TypeRef};
use crate::registry::Variant;
use crate::{Error, Result};

/// Creates a fresh, type-erased value.
pub type Construct = fn() -> Box<dyn Any>;

// -----------------------------------------------------------------------------
// Downcast helpers

/// Downcasts `value` to `T`, or reports a [`Error::TypeMismatch`].
#[inline]
pub fn downcast_ref<T: Persist>(value: &dyn Any) -> Result<&T> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| Error::mismatch(T::type_name()))
}

/// Downcasts `value` to `T`, or reports a [`Error::TypeMismatch`].
#[inline]
pub fn downcast_mut<T: Persist>(value: &mut dyn Any) -> Result<&mut T> {
    value
        .downcast_mut::<T>()
        .ok_or_else(|| Error::mismatch(T::type_name()))
}

/// Unboxes `value` as `T`, or reports a [`Error::TypeMismatch`].
#[inline]
pub fn downcast_box<T: Persist>(value: Box<dyn Any>) -> Result<T> {
    value
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| Error::mismatch(T::type_name()))
}

fn construct_default<T: Default + Any>() -> Box<dyn Any> {
    Box::new(T::default())
}

// -----------------------------------------------------------------------------
// Shape

/// The uncompiled description of one type, as produced by [`Persist::shape`].
///
/// `Scalar`, `Sequence`, `Map` and `Record` map to document structure.
/// The remaining variants are carriers that have no node of their own:
///
/// - `Optional`: an absent value writes nothing.
/// - `Shared`: a value with identity, the only thing a reference can point to.
/// - `Polymorphic`: a trait object whose concrete type is one of the
///   registered variants.
#[derive(Clone)]
pub enum Shape {
    Scalar(ScalarShape),
    Sequence(SequenceShape),
    Map(MapShape),
    Record(RecordShape),
    Optional(OptionalShape),
    Shared(SharedShape),
    Polymorphic(PolymorphicShape),
}

impl Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(_) => f.pad("Scalar"),
            Self::Sequence(s) => write!(f, "Sequence<{}>", s.element.type_name()),
            Self::Map(m) => write!(f, "Map<{}, {}>", m.key.type_name(), m.value.type_name()),
            Self::Record(r) => write!(f, "Record({} fields)", r.fields.len()),
            Self::Optional(o) => write!(f, "Optional<{}>", o.inner.type_name()),
            Self::Shared(s) => write!(f, "Shared<{}>", s.inner.type_name()),
            Self::Polymorphic(p) => write!(f, "Polymorphic({} variants)", p.variants.len()),
        }
    }
}

// -----------------------------------------------------------------------------
// ScalarShape

/// A leaf converted to and from a single piece of text.
#[derive(Clone, Copy)]
pub struct ScalarShape {
    pub(crate) to_text: fn(&dyn Any) -> Result<String>,
    pub(crate) from_text: fn(&str) -> Result<Box<dyn Any>>,
}

impl ScalarShape {
    /// Creates a scalar from its two conversions.
    #[inline]
    pub const fn new(
        to_text: fn(&dyn Any) -> Result<String>,
        from_text: fn(&str) -> Result<Box<dyn Any>>,
    ) -> Self {
        Self { to_text, from_text }
    }

    /// A scalar converted through [`Display`] and [`FromStr`].
    #[inline]
    pub fn of<T: Persist + Display + FromStr>() -> Self {
        Self::new(display_text::<T>, parse_text::<T>)
    }
}

fn display_text<T: Persist + Display>(value: &dyn Any) -> Result<String> {
    downcast_ref::<T>(value).map(ToString::to_string)
}

fn parse_text<T: Persist + FromStr>(text: &str) -> Result<Box<dyn Any>> {
    match text.parse::<T>() {
        Ok(value) => Ok(Box::new(value)),
        Err(_) => Err(Error::parse(T::type_name(), text)),
    }
}

// -----------------------------------------------------------------------------
// SequenceShape

/// An ordered collection that can be rebuilt by pushing its elements.
pub trait SequenceLike: Persist + Default {
    type Item: Persist;

    fn items_len(&self) -> usize;

    fn item(&self, index: usize) -> Option<&Self::Item>;

    fn item_mut(&mut self, index: usize) -> Option<&mut Self::Item>;

    fn push_item(&mut self, item: Self::Item);
}

/// Type-erased operations of a [`SequenceLike`] type.
#[derive(Clone, Copy)]
pub struct SequenceShape {
    pub(crate) element: TypeRef,
    pub(crate) new: Construct,
    pub(crate) len: fn(&dyn Any) -> Result<usize>,
    pub(crate) get: fn(&dyn Any, usize) -> Result<Option<&dyn Any>>,
    pub(crate) get_mut: fn(&mut dyn Any, usize) -> Result<Option<&mut dyn Any>>,
    pub(crate) push: fn(&mut dyn Any, Box<dyn Any>) -> Result<()>,
}

impl SequenceShape {
    pub fn of<S: SequenceLike>() -> Self {
        Self {
            element: TypeRef::of::<S::Item>(),
            new: construct_default::<S>,
            len: |seq| Ok(downcast_ref::<S>(seq)?.items_len()),
            get: |seq, index| Ok(downcast_ref::<S>(seq)?.item(index).map(|v| v as &dyn Any)),
            get_mut: |seq, index| {
                Ok(downcast_mut::<S>(seq)?
                    .item_mut(index)
                    .map(|v| v as &mut dyn Any))
            },
            push: |seq, item| {
                let item = downcast_box::<S::Item>(item)?;
                downcast_mut::<S>(seq)?.push_item(item);
                Ok(())
            },
        }
    }
}

// -----------------------------------------------------------------------------
// MapShape

/// An associative collection keyed by values that compare equal after a
/// round trip.
pub trait MapLike: Persist + Default {
    type Key: Persist;
    type Value: Persist;

    /// Whether [`entries`](Self::entries) yields a stable order. Entries of
    /// unordered maps are written sorted by their key text.
    const ORDERED: bool = true;

    fn entries(&self) -> Vec<(&Self::Key, &Self::Value)>;

    fn value_mut(&mut self, key: &Self::Key) -> Option<&mut Self::Value>;

    fn insert_entry(&mut self, key: Self::Key, value: Self::Value);
}

/// Type-erased operations of a [`MapLike`] type.
#[derive(Clone, Copy)]
pub struct MapShape {
    pub(crate) key: TypeRef,
    pub(crate) value: TypeRef,
    pub(crate) new: Construct,
    pub(crate) ordered: bool,
    pub(crate) entries: for<'a> fn(&'a dyn Any) -> Result<Vec<(&'a dyn Any, &'a dyn Any)>>,
    pub(crate) value_mut:
        for<'a, 'k> fn(&'a mut dyn Any, &'k dyn Any) -> Result<Option<&'a mut dyn Any>>,
    pub(crate) insert: fn(&mut dyn Any, Box<dyn Any>, Box<dyn Any>) -> Result<()>,
}

impl MapShape {
    pub fn of<M: MapLike>() -> Self {
        Self {
            key: TypeRef::of::<M::Key>(),
            value: TypeRef::of::<M::Value>(),
            new: construct_default::<M>,
            ordered: M::ORDERED,
            entries: map_entries::<M>,
            value_mut: map_value_mut::<M>,
            insert: |map, key, value| {
                let key = downcast_box::<M::Key>(key)?;
                let value = downcast_box::<M::Value>(value)?;
                downcast_mut::<M>(map)?.insert_entry(key, value);
                Ok(())
            },
        }
    }
}

fn map_entries<M: MapLike>(map: &dyn Any) -> Result<Vec<(&dyn Any, &dyn Any)>> {
    let map = downcast_ref::<M>(map)?;
    Ok(map
        .entries()
        .into_iter()
        .map(|(k, v)| (k as &dyn Any, v as &dyn Any))
        .collect())
}

fn map_value_mut<'a, M: MapLike>(
    map: &'a mut dyn Any,
    key: &dyn Any,
) -> Result<Option<&'a mut dyn Any>> {
    let key = downcast_ref::<M::Key>(key)?;
    let map = downcast_mut::<M>(map)?;
    Ok(map.value_mut(key).map(|v| v as &mut dyn Any))
}

// -----------------------------------------------------------------------------
// RecordShape

/// Per-member options, set by `#[persist(..)]` or by hand.
///
/// ```
/// use persist_graph::schema::MemberOptions;
///
/// const STUDENTS: MemberOptions = MemberOptions::new().rename("").child_name("Student");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberOptions {
    pub(crate) name: Option<&'static str>,
    pub(crate) reference: bool,
    pub(crate) child_name: Option<&'static str>,
    pub(crate) key_name: Option<&'static str>,
    pub(crate) value_name: Option<&'static str>,
    pub(crate) run_constructor: bool,
}

impl MemberOptions {
    pub const fn new() -> Self {
        Self {
            name: None,
            reference: false,
            child_name: None,
            key_name: None,
            value_name: None,
            run_constructor: true,
        }
    }

    /// Document name of the member. An empty name splices the member's
    /// content into the enclosing node.
    pub const fn rename(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Write an address instead of the value. On a sequence or map the flag
    /// applies to the elements or values.
    pub const fn reference(mut self) -> Self {
        self.reference = true;
        self
    }

    /// Name of sequence elements or map entries.
    pub const fn child_name(mut self, name: &'static str) -> Self {
        self.child_name = Some(name);
        self
    }

    pub const fn key_name(mut self, name: &'static str) -> Self {
        self.key_name = Some(name);
        self
    }

    pub const fn value_name(mut self, name: &'static str) -> Self {
        self.value_name = Some(name);
        self
    }

    /// `false` materializes records through their blank constructor instead
    /// of [`Default`].
    pub const fn run_constructor(mut self, run: bool) -> Self {
        self.run_constructor = run;
        self
    }
}

impl Default for MemberOptions {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// Typed accessors of one record field, erased behind [`FieldAccess`].
trait ErasedField: Send + Sync {
    fn get<'a>(&self, owner: &'a dyn Any) -> Result<&'a dyn Any>;

    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Result<&'a mut dyn Any>;

    fn set(&self, owner: &mut dyn Any, value: Box<dyn Any>) -> Result<()>;
}

struct TypedField<T, F> {
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T: Persist, F: Persist> ErasedField for TypedField<T, F> {
    fn get<'a>(&self, owner: &'a dyn Any) -> Result<&'a dyn Any> {
        Ok((self.get)(downcast_ref::<T>(owner)?))
    }

    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Result<&'a mut dyn Any> {
        Ok((self.get_mut)(downcast_mut::<T>(owner)?))
    }

    fn set(&self, owner: &mut dyn Any, value: Box<dyn Any>) -> Result<()> {
        let value = downcast_box::<F>(value)?;
        *(self.get_mut)(downcast_mut::<T>(owner)?) = value;
        Ok(())
    }
}

/// Get/set access to one field of a record, bound to the owning type.
#[derive(Clone)]
pub struct FieldAccess(Arc<dyn ErasedField>);

impl FieldAccess {
    #[inline]
    pub fn get<'a>(&self, owner: &'a dyn Any) -> Result<&'a dyn Any> {
        self.0.get(owner)
    }

    #[inline]
    pub fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Result<&'a mut dyn Any> {
        self.0.get_mut(owner)
    }

    #[inline]
    pub fn set(&self, owner: &mut dyn Any, value: Box<dyn Any>) -> Result<()> {
        self.0.set(owner, value)
    }
}

/// One declared field of a [`RecordShape`].
#[derive(Clone)]
pub struct FieldShape {
    pub(crate) ident: &'static str,
    pub(crate) options: MemberOptions,
    pub(crate) ty: TypeRef,
    pub(crate) access: FieldAccess,
}

/// A record: an ordered list of fields plus the ways to create an instance.
///
/// ```
/// use std::borrow::Cow;
///
/// use persist_graph::Persist;
/// use persist_graph::schema::{MemberOptions, RecordShape, Shape};
///
/// #[derive(Default)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl Persist for Point {
///     fn type_path() -> Cow<'static, str> {
///         Cow::Borrowed("geometry::Point")
///     }
///
///     fn type_name() -> Cow<'static, str> {
///         Cow::Borrowed("Point")
///     }
///
///     fn type_ident() -> &'static str {
///         "Point"
///     }
///
///     fn shape() -> Shape {
///         Shape::Record(
///             RecordShape::new()
///                 .with_default::<Point>()
///                 .field::<Point, i32>("x", MemberOptions::new().rename("X"), |p| &p.x, |p| &mut p.x)
///                 .field::<Point, i32>("y", MemberOptions::new().rename("Y"), |p| &p.y, |p| &mut p.y),
///         )
///     }
/// }
/// ```
#[derive(Clone, Default)]
pub struct RecordShape {
    pub(crate) fields: Vec<FieldShape>,
    pub(crate) construct: Option<Construct>,
    pub(crate) blank: Option<Construct>,
}

impl RecordShape {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize through `T::default()`.
    pub fn with_default<T: Default + Any>(mut self) -> Self {
        self.construct = Some(construct_default::<T>);
        self
    }

    /// Materialize members with `run_constructor = false` through `blank`.
    pub fn with_blank(mut self, blank: Construct) -> Self {
        self.blank = Some(blank);
        self
    }

    /// Appends a field.
    pub fn field<T: Persist, F: Persist>(
        mut self,
        ident: &'static str,
        options: MemberOptions,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        self.fields.push(FieldShape {
            ident,
            options,
            ty: TypeRef::of::<F>(),
            access: FieldAccess(Arc::new(TypedField { get, get_mut })),
        });
        self
    }
}

// -----------------------------------------------------------------------------
// OptionalShape

/// `Option<T>`: `None` is never written, and an absent node reads as `None`.
#[derive(Clone, Copy)]
pub struct OptionalShape {
    pub(crate) inner: TypeRef,
    pub(crate) get: fn(&dyn Any) -> Result<Option<&dyn Any>>,
    pub(crate) get_mut: fn(&mut dyn Any) -> Result<Option<&mut dyn Any>>,
    pub(crate) some: fn(Box<dyn Any>) -> Result<Box<dyn Any>>,
    pub(crate) none: Construct,
}

impl OptionalShape {
    /// The shape of `Option<T>`.
    pub fn of<T: Persist>() -> Self {
        Self {
            inner: TypeRef::of::<T>(),
            get: |value| Ok(downcast_ref::<Option<T>>(value)?.as_ref().map(|v| v as &dyn Any)),
            get_mut: |value| {
                Ok(downcast_mut::<Option<T>>(value)?
                    .as_mut()
                    .map(|v| v as &mut dyn Any))
            },
            some: |value| Ok(Box::new(Some(downcast_box::<T>(value)?))),
            none: || Box::new(None::<T>),
        }
    }
}

// -----------------------------------------------------------------------------
// PolymorphicShape

/// `Box<dyn Trait>`: the concrete value decides which variant is written.
#[derive(Clone)]
pub struct PolymorphicShape {
    pub(crate) base: Option<Variant>,
    pub(crate) variants: Vec<Variant>,
    pub(crate) concrete: fn(&dyn Any) -> Result<&dyn Any>,
    pub(crate) concrete_mut: fn(&mut dyn Any) -> Result<&mut dyn Any>,
    pub(crate) persist_type: fn(&dyn Any) -> Result<TypeRef>,
}

impl PolymorphicShape {
    /// The shape of `Box<B>`.
    ///
    /// `base` is the type written without a discriminator; `variants` are the
    /// types declared compatible with `B`.
    pub fn new<B: ?Sized + DynPersist>(base: Option<Variant>, variants: Vec<Variant>) -> Self {
        Self {
            base,
            variants,
            concrete: concrete::<B>,
            concrete_mut: concrete_mut::<B>,
            persist_type: |value| {
                let boxed = value
                    .downcast_ref::<Box<B>>()
                    .ok_or_else(|| Error::mismatch(core::any::type_name::<Box<B>>()))?;
                Ok(DynPersist::persist_type(&**boxed))
            },
        }
    }
}

fn concrete<B: ?Sized + DynPersist>(value: &dyn Any) -> Result<&dyn Any> {
    value
        .downcast_ref::<Box<B>>()
        .map(|boxed| DynPersist::as_any(&**boxed))
        .ok_or_else(|| Error::mismatch(core::any::type_name::<Box<B>>()))
}

fn concrete_mut<B: ?Sized + DynPersist>(value: &mut dyn Any) -> Result<&mut dyn Any> {
    value
        .downcast_mut::<Box<B>>()
        .map(|boxed| DynPersist::as_any_mut(&mut **boxed))
        .ok_or_else(|| Error::mismatch(core::any::type_name::<Box<B>>()))
}

pub use crate::shared::SharedShape;
