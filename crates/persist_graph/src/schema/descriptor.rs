use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use super::{
    Construct, FieldAccess, MapShape, OptionalShape, PolymorphicShape, ScalarShape, SequenceShape,
    SharedShape, TypeRef,
};

// -----------------------------------------------------------------------------
// DescriptorId

/// Index of a [`TypeDescriptor`] in its [`Schema`](super::Schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorId(pub(crate) u32);

impl DescriptorId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

// -----------------------------------------------------------------------------
// Kind

/// How values of a type appear in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A single attribute.
    Scalar,
    /// A container node of repeated elements.
    Sequence,
    /// A container node of key/value entries.
    Map,
    /// A keyed node with one entry per member.
    Record,
}

impl Kind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Kind::Scalar => "Scalar",
            Kind::Sequence => "Sequence",
            Kind::Map => "Map",
            Kind::Record => "Record",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// Member

/// The per-use description of a value: what it is called in the document and
/// how it is linked to its owner.
///
/// The same type can appear under many members with different names and
/// flags, while its [`TypeDescriptor`] is compiled once.
#[derive(Debug, Clone)]
pub struct Member {
    pub(crate) name: Arc<str>,
    pub(crate) target: DescriptorId,
    pub(crate) is_reference: bool,
    pub(crate) run_constructor: bool,
    pub(crate) items: Option<Box<Items>>,
}

impl Member {
    /// Document name; empty for a transparent member.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    #[inline]
    pub fn target(&self) -> DescriptorId {
        self.target
    }

    /// Whether only an address is written for this member.
    #[inline]
    pub fn is_reference(&self) -> bool {
        self.is_reference
    }

    #[inline]
    pub fn run_constructor(&self) -> bool {
        self.run_constructor
    }

    /// Members of the elements or entries, if the target is a container.
    #[inline]
    pub fn items(&self) -> Option<&Items> {
        self.items.as_deref()
    }
}

/// Naming of the items of a sequence or map member.
#[derive(Debug, Clone)]
pub enum Items {
    Sequence {
        element: Member,
    },
    Map {
        /// Name of the node wrapping one key/value pair.
        entry: Arc<str>,
        key: Member,
        value: Member,
    },
}

// -----------------------------------------------------------------------------
// TypeDescriptor

/// The compiled description of one type.
pub struct TypeDescriptor {
    pub(crate) id: DescriptorId,
    pub(crate) ty: TypeRef,
    pub(crate) name: Cow<'static, str>,
    pub(crate) path: Cow<'static, str>,
    pub(crate) kind: DescriptorKind,
}

impl TypeDescriptor {
    #[inline]
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    #[inline]
    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    /// The friendly name, e.g. `Person` or `Vec<Person>`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fully qualified type path.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A generic type reports a name with type arguments.
    #[inline]
    pub fn is_generic(&self) -> bool {
        self.name.contains('<')
    }

    #[inline]
    pub fn kind(&self) -> &DescriptorKind {
        &self.kind
    }

    pub fn as_record(&self) -> Option<&RecordDescriptor> {
        match &self.kind {
            DescriptorKind::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Per-shape content of a [`TypeDescriptor`].
pub enum DescriptorKind {
    Scalar(ScalarShape),
    Sequence {
        shape: SequenceShape,
        element: DescriptorId,
    },
    Map {
        shape: MapShape,
        key: DescriptorId,
        value: DescriptorId,
    },
    Record(RecordDescriptor),
    Optional {
        shape: OptionalShape,
        inner: DescriptorId,
    },
    Shared {
        shape: SharedShape,
        inner: DescriptorId,
    },
    Polymorphic(PolymorphicDescriptor),
}

impl fmt::Debug for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(_) => f.write_str("Scalar"),
            Self::Sequence { element, .. } => f.debug_tuple("Sequence").field(element).finish(),
            Self::Map { key, value, .. } => f.debug_tuple("Map").field(key).field(value).finish(),
            Self::Record(record) => f
                .debug_list()
                .entries(record.fields.iter().map(|field| field.member.name()))
                .finish(),
            Self::Optional { inner, .. } => f.debug_tuple("Optional").field(inner).finish(),
            Self::Shared { inner, .. } => f.debug_tuple("Shared").field(inner).finish(),
            Self::Polymorphic(poly) => f.debug_tuple("Polymorphic").field(&poly.base).finish(),
        }
    }
}

/// A compiled record member.
#[derive(Clone)]
pub struct Field {
    pub(crate) ident: &'static str,
    pub(crate) member: Member,
    pub(crate) access: FieldAccess,
}

impl Field {
    /// The Rust field name.
    #[inline]
    pub fn ident(&self) -> &'static str {
        self.ident
    }

    #[inline]
    pub fn member(&self) -> &Member {
        &self.member
    }
}

pub struct RecordDescriptor {
    pub(crate) fields: Vec<Field>,
    pub(crate) construct: Option<Construct>,
    pub(crate) blank: Option<Construct>,
}

impl RecordDescriptor {
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Creates an instance for a member with the given constructor choice.
    pub(crate) fn instantiate(&self, run_constructor: bool) -> Option<Construct> {
        if run_constructor {
            self.construct.or(self.blank)
        } else {
            self.blank
        }
    }
}

/// A trait object type; its variants live in the schema's registry.
pub struct PolymorphicDescriptor {
    pub(crate) shape: PolymorphicShape,
    pub(crate) base: Option<DescriptorId>,
}

impl PolymorphicDescriptor {
    /// The variant written without a discriminator.
    #[inline]
    pub fn base(&self) -> Option<DescriptorId> {
        self.base
    }
}
