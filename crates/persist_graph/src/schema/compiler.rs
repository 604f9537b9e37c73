use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::TypeId;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use persist_utils::TypeIdMap;
use persist_utils::hash::HashMap;

use super::{
    DescriptorId, DescriptorKind, Field, Items, MapShape, Member, MemberOptions, OptionalShape,
    Persist, PolymorphicDescriptor, PolymorphicShape, RecordDescriptor, RecordShape, ScalarShape,
    SequenceShape, Shape, SharedShape, TypeDescriptor, TypeRef,
};
use crate::registry::{self, RegisteredVariant, Variant, VariantSet};
use crate::{ArchiveConfig, Error, Keywords, Result, SchemaError};

// -----------------------------------------------------------------------------
// Schema

/// A thread-safe handle to a [`SchemaTable`].
///
/// Clones share the same table: archives derived from one another see every
/// type and variant compiled by any of them. Compilation takes the write
/// lock, so it is serialized.
#[derive(Clone)]
pub struct Schema {
    internal: Arc<RwLock<SchemaTable>>,
}

impl Schema {
    /// Creates an empty schema using the keywords and discovery mode of
    /// `config`.
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            internal: Arc::new(RwLock::new(SchemaTable::new(config))),
        }
    }

    /// Takes a read lock on the underlying table.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, SchemaTable> {
        self.internal.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a write lock on the underlying table.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, SchemaTable> {
        self.internal.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compiles `T` and every type reachable from it.
    #[inline]
    pub fn compile<T: Persist>(&self) -> Result<DescriptorId> {
        self.compile_type(TypeRef::of::<T>())
    }

    /// Compiles `ty` and every type reachable from it.
    ///
    /// Compilation is all or nothing: on error no type of this call stays in
    /// the table.
    pub fn compile_type(&self, ty: TypeRef) -> Result<DescriptorId> {
        if let Some(&id) = self.read().by_type.get(&ty.type_id()) {
            return Ok(id);
        }
        Ok(self.write().compile(ty)?)
    }

    /// Returns the descriptor `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this schema.
    #[inline]
    pub fn descriptor(&self, id: DescriptorId) -> Arc<TypeDescriptor> {
        Arc::clone(&self.read().descriptors[id.index()])
    }

    /// Registers an additional variant for its polymorphic type.
    ///
    /// If the polymorphic type is not compiled yet, the variant is kept and
    /// registered when it is.
    pub fn include(&self, variant: Variant) -> Result<()> {
        Ok(self.write().include(variant)?)
    }

    /// The member describing a document root of type `id`.
    pub fn root_member(&self, id: DescriptorId, name: Option<&str>) -> Result<Member> {
        Ok(self.read().root_member(id, name)?)
    }

    /// The variant of `poly` to write a value of the concrete type `ty`.
    ///
    /// Returns the descriptor and the discriminator to write, or `None` for
    /// the discriminator of the base variant.
    pub(crate) fn variant_to_write(
        &self,
        poly: DescriptorId,
        ty: TypeRef,
    ) -> Result<(DescriptorId, Option<String>)> {
        {
            let table = self.read();
            if let Some(found) = table.variant_to_write(poly, ty) {
                return Ok(found);
            }
            if !table.discover {
                return Err(SchemaError::UnknownVariant {
                    base: table.descriptors[poly.index()].name.to_string(),
                    ty: ty.type_name().into_owned(),
                }
                .into());
            }
        }

        let mut table = self.write();
        let id = table.compile(ty)?;
        table.register(poly, id, None)?;
        log::debug!(
            "compiled `{}` on the fly as a variant of `{}`",
            ty.type_path(),
            table.descriptors[poly.index()].name
        );
        table
            .variant_to_write(poly, ty)
            .ok_or_else(|| Error::mismatch(ty.type_name()))
    }

    /// The variant of `poly` named by `discriminator`, or its base variant.
    pub(crate) fn variant_to_read(
        &self,
        poly: DescriptorId,
        discriminator: Option<&str>,
    ) -> Result<(DescriptorId, Variant)> {
        let table = self.read();
        let descriptor = &table.descriptors[poly.index()];
        let base = descriptor.name.as_ref();
        let empty = VariantSet::new();
        let set = table.variants.get(&poly).unwrap_or(&empty);

        let entry = match discriminator {
            Some(discriminator) => set.find(base, discriminator)?,
            None => {
                let base_id = match &descriptor.kind {
                    DescriptorKind::Polymorphic(poly) => poly.base,
                    _ => None,
                };
                base_id
                    .and_then(|id| set.get(table.descriptors[id.index()].ty.type_id()))
                    .ok_or_else(|| SchemaError::MissingDiscriminator {
                        base: base.to_string(),
                    })?
            }
        };

        match &entry.variant {
            Some(variant) => Ok((entry.descriptor, variant.clone())),
            None => Err(SchemaError::UnknownVariant {
                base: base.to_string(),
                ty: entry.path.clone(),
            }
            .into()),
        }
    }
}

impl core::fmt::Debug for Schema {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let table = self.read();
        f.debug_list().entries(table.descriptors.iter()).finish()
    }
}

// -----------------------------------------------------------------------------
// SchemaTable

/// Compiled descriptors, indexed by [`DescriptorId`], plus the variants of
/// every polymorphic type.
pub struct SchemaTable {
    descriptors: Vec<Arc<TypeDescriptor>>,
    by_type: TypeIdMap<DescriptorId>,
    variants: HashMap<DescriptorId, VariantSet>,
    included: TypeIdMap<Vec<Variant>>,
    keywords: Keywords,
    discover: bool,
}

impl SchemaTable {
    fn new(config: &ArchiveConfig) -> Self {
        Self {
            descriptors: Vec::new(),
            by_type: TypeIdMap::new(),
            variants: HashMap::default(),
            included: TypeIdMap::new(),
            keywords: config.keywords.clone(),
            discover: config.discover_derived,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    #[inline]
    pub fn get(&self, id: DescriptorId) -> Option<&TypeDescriptor> {
        self.descriptors.get(id.index()).map(|d| &**d)
    }

    #[inline]
    pub fn get_id(&self, type_id: TypeId) -> Option<DescriptorId> {
        self.by_type.get(&type_id).copied()
    }

    /// The variants registered for the polymorphic type `id`.
    #[inline]
    pub fn variants(&self, id: DescriptorId) -> Option<&VariantSet> {
        self.variants.get(&id)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TypeDescriptor> {
        self.descriptors.iter().map(|d| &**d)
    }

    fn compile(&mut self, ty: TypeRef) -> Result<DescriptorId, SchemaError> {
        if let Some(&id) = self.by_type.get(&ty.type_id()) {
            return Ok(id);
        }

        let mut compiler = Compiler {
            start: self.descriptors.len(),
            table: self,
            staged: Vec::new(),
        };
        let root = compiler.reserve(ty);
        let staged = core::mem::take(&mut compiler.staged);
        let start = compiler.start;

        match self.link(start, staged) {
            Ok((built, variants)) => {
                self.commit(built, variants);
                Ok(root)
            }
            Err((err, types)) => {
                for type_id in types {
                    self.by_type.remove(&type_id);
                }
                Err(err)
            }
        }
    }

    /// Runs the link and cycle passes over freshly reserved types.
    ///
    /// On error returns the types to forget.
    fn link(&self, start: usize, staged: Vec<Staged>) -> Result<Linked, Unlinked> {
        let drafts: Vec<(TypeRef, Draft)> = staged
            .into_iter()
            .filter_map(|staged| Some((staged.ty, staged.draft?)))
            .collect();
        let types = || drafts.iter().map(|(ty, _)| ty.type_id()).collect();

        let linker = Linker {
            table: self,
            start,
            drafts: &drafts,
        };

        let mut built = Vec::with_capacity(drafts.len());
        let mut variants = Vec::new();
        for (index, (ty, draft)) in drafts.iter().enumerate() {
            let id = DescriptorId((start + index) as u32);
            let kind = linker
                .link(id, *ty, draft, &mut variants)
                .map_err(|err| (err, types()))?;
            built.push(TypeDescriptor {
                id,
                ty: *ty,
                name: ty.type_name(),
                path: ty.type_path(),
                kind,
            });
        }

        let graph = Graph {
            table: self,
            start,
            built: &built,
            pending: &variants,
        };
        graph.check_cycles().map_err(|err| (err, types()))?;
        Ok((built, variants))
    }

    fn commit(&mut self, built: Vec<TypeDescriptor>, variants: Vec<PendingVariant>) {
        for descriptor in built {
            log::debug!(
                "compiled `{}` as {:?}",
                descriptor.path,
                descriptor.kind
            );
            self.descriptors.push(Arc::new(descriptor));
        }
        for pending in variants {
            self.insert_variant(pending);
        }
    }

    fn insert_variant(&mut self, pending: PendingVariant) {
        let descriptor = &self.descriptors[pending.descriptor.index()];
        let entry = RegisteredVariant {
            descriptor: pending.descriptor,
            type_id: descriptor.ty.type_id(),
            name: descriptor.name.to_string(),
            path: descriptor.path.to_string(),
            variant: pending.variant,
        };
        log::debug!(
            "registered `{}` as a variant of `{}`",
            entry.path,
            self.descriptors[pending.poly.index()].name
        );
        self.variants.entry(pending.poly).or_default().insert(entry);
    }

    fn include(&mut self, variant: Variant) -> Result<(), SchemaError> {
        let id = self.compile(variant.ty())?;
        let base = variant.base();
        match self.by_type.get(&base).copied() {
            Some(poly) => self.register(poly, id, Some(variant)),
            None => {
                self.included.get_or_insert(base, Vec::new).push(variant);
                Ok(())
            }
        }
    }

    /// Adds the compiled type `id` as a variant of the compiled polymorphic
    /// type `poly`.
    fn register(
        &mut self,
        poly: DescriptorId,
        id: DescriptorId,
        variant: Option<Variant>,
    ) -> Result<(), SchemaError> {
        if self
            .variants
            .get(&poly)
            .is_some_and(|set| set.get(self.descriptors[id.index()].ty.type_id()).is_some())
        {
            return Ok(());
        }

        let linker = Linker {
            table: self,
            start: self.descriptors.len(),
            drafts: &[],
        };
        linker.check_variant(poly, id, variant.is_some())?;

        let pending = [PendingVariant {
            poly,
            descriptor: id,
            variant,
        }];
        Graph {
            table: self,
            start: self.descriptors.len(),
            built: &[],
            pending: &pending,
        }
        .check_cycles()?;

        let [pending] = pending;
        self.insert_variant(pending);
        Ok(())
    }

    fn variant_to_write(&self, poly: DescriptorId, ty: TypeRef) -> Option<(DescriptorId, Option<String>)> {
        let base = match &self.descriptors[poly.index()].kind {
            DescriptorKind::Polymorphic(poly) => poly.base,
            _ => None,
        };
        if let Some(base) = base
            && self.descriptors[base.index()].ty == ty
        {
            return Some((base, None));
        }

        let set = self.variants.get(&poly)?;
        let entry = set.get(ty.type_id())?;
        let discriminator = set.discriminator(entry, self.discover);
        Some((entry.descriptor, Some(discriminator.to_string())))
    }

    fn root_member(&self, id: DescriptorId, name: Option<&str>) -> Result<Member, SchemaError> {
        let linker = Linker {
            table: self,
            start: self.descriptors.len(),
            drafts: &[],
        };
        let name = match name {
            Some(name) => Arc::from(name),
            None => Arc::from(linker.ty(linker.strip(id, true)).type_ident()),
        };
        linker.member("<root>", name, id, &MemberOptions::new())
    }
}

// -----------------------------------------------------------------------------
// Compiler: reserve

#[derive(Clone)]
enum Draft {
    Scalar(ScalarShape),
    Sequence(SequenceShape, DescriptorId),
    Map(MapShape, DescriptorId, DescriptorId),
    Record(RecordShape, Vec<DescriptorId>),
    Optional(OptionalShape, DescriptorId),
    Shared(SharedShape, DescriptorId),
    Polymorphic(PolymorphicShape, Option<DescriptorId>, Vec<(Variant, DescriptorId)>),
}

type Linked = (Vec<TypeDescriptor>, Vec<PendingVariant>);
type Unlinked = (SchemaError, Vec<TypeId>);

struct Staged {
    ty: TypeRef,
    draft: Option<Draft>,
}

struct PendingVariant {
    poly: DescriptorId,
    descriptor: DescriptorId,
    variant: Option<Variant>,
}

/// Walks shapes depth first and assigns ids.
///
/// A type gets its id before its children are visited, so recursive shapes
/// find themselves in `by_type` and stop.
struct Compiler<'t> {
    table: &'t mut SchemaTable,
    start: usize,
    staged: Vec<Staged>,
}

impl Compiler<'_> {
    fn reserve(&mut self, ty: TypeRef) -> DescriptorId {
        if let Some(&id) = self.table.by_type.get(&ty.type_id()) {
            return id;
        }
        let id = DescriptorId((self.start + self.staged.len()) as u32);
        self.table.by_type.insert(ty.type_id(), id);
        self.staged.push(Staged { ty, draft: None });

        let draft = match ty.shape() {
            Shape::Scalar(shape) => Draft::Scalar(shape),
            Shape::Sequence(shape) => Draft::Sequence(shape, self.reserve(shape.element)),
            Shape::Map(shape) => {
                let key = self.reserve(shape.key);
                let value = self.reserve(shape.value);
                Draft::Map(shape, key, value)
            }
            Shape::Record(shape) => {
                let targets = shape.fields.iter().map(|f| self.reserve(f.ty)).collect();
                Draft::Record(shape, targets)
            }
            Shape::Optional(shape) => Draft::Optional(shape, self.reserve(shape.inner)),
            Shape::Shared(shape) => Draft::Shared(shape, self.reserve(shape.inner)),
            Shape::Polymorphic(shape) => {
                let base_box = ty.type_id();
                let mut all: Vec<Variant> = shape.base.iter().cloned().collect();
                all.extend(shape.variants.iter().cloned());
                if let Some(included) = self.table.included.get(&base_box) {
                    all.extend(included.iter().cloned());
                }
                if self.table.discover {
                    all.extend(registry::submitted(base_box));
                }

                let base = shape.base.as_ref().map(|base| self.reserve(base.ty()));
                let variants = all
                    .into_iter()
                    .map(|variant| {
                        let id = self.reserve(variant.ty());
                        (variant, id)
                    })
                    .collect();
                Draft::Polymorphic(shape, base, variants)
            }
        };

        self.staged[id.index() - self.start].draft = Some(draft);
        id
    }
}

// -----------------------------------------------------------------------------
// Compiler: link

/// What the linker needs to know about a descriptor, staged or committed.
#[derive(Clone, Copy)]
enum Outline {
    Scalar,
    Sequence(DescriptorId),
    Map(DescriptorId, DescriptorId),
    Record { construct: bool, blank: bool },
    Optional(DescriptorId),
    Shared(DescriptorId),
    Polymorphic,
}

/// Resolves members against the committed table and the staged drafts.
struct Linker<'a> {
    table: &'a SchemaTable,
    start: usize,
    drafts: &'a [(TypeRef, Draft)],
}

impl Linker<'_> {
    fn outline(&self, id: DescriptorId) -> Outline {
        if id.index() < self.start {
            return match &self.table.descriptors[id.index()].kind {
                DescriptorKind::Scalar(_) => Outline::Scalar,
                DescriptorKind::Sequence { element, .. } => Outline::Sequence(*element),
                DescriptorKind::Map { key, value, .. } => Outline::Map(*key, *value),
                DescriptorKind::Record(record) => Outline::Record {
                    construct: record.construct.is_some(),
                    blank: record.blank.is_some(),
                },
                DescriptorKind::Optional { inner, .. } => Outline::Optional(*inner),
                DescriptorKind::Shared { inner, .. } => Outline::Shared(*inner),
                DescriptorKind::Polymorphic(_) => Outline::Polymorphic,
            };
        }
        match &self.drafts[id.index() - self.start].1 {
            Draft::Scalar(_) => Outline::Scalar,
            Draft::Sequence(_, element) => Outline::Sequence(*element),
            Draft::Map(_, key, value) => Outline::Map(*key, *value),
            Draft::Record(record, _) => Outline::Record {
                construct: record.construct.is_some(),
                blank: record.blank.is_some(),
            },
            Draft::Optional(_, inner) => Outline::Optional(*inner),
            Draft::Shared(_, inner) => Outline::Shared(*inner),
            Draft::Polymorphic(..) => Outline::Polymorphic,
        }
    }

    fn ty(&self, id: DescriptorId) -> TypeRef {
        if id.index() < self.start {
            self.table.descriptors[id.index()].ty
        } else {
            self.drafts[id.index() - self.start].0
        }
    }

    /// Looks through `Optional`, and through `Shared` if `shared` is set.
    fn strip(&self, mut id: DescriptorId, shared: bool) -> DescriptorId {
        loop {
            match self.outline(id) {
                Outline::Optional(inner) => id = inner,
                Outline::Shared(inner) if shared => id = inner,
                _ => return id,
            }
        }
    }

    fn link(
        &self,
        id: DescriptorId,
        ty: TypeRef,
        draft: &Draft,
        variants: &mut Vec<PendingVariant>,
    ) -> Result<DescriptorKind, SchemaError> {
        Ok(match draft.clone() {
            Draft::Scalar(shape) => DescriptorKind::Scalar(shape),
            Draft::Sequence(shape, element) => DescriptorKind::Sequence { shape, element },
            Draft::Map(shape, key, value) => DescriptorKind::Map { shape, key, value },
            Draft::Optional(shape, inner) => DescriptorKind::Optional { shape, inner },
            Draft::Shared(shape, inner) => DescriptorKind::Shared { shape, inner },
            Draft::Record(shape, targets) => {
                let owner = ty.type_name();
                let fields = shape
                    .fields
                    .into_iter()
                    .zip(targets)
                    .map(|(field, target)| {
                        let name = field.options.name.unwrap_or(field.ident);
                        let label = format!("{owner}.{}", field.ident);
                        Ok::<_, SchemaError>(Field {
                            ident: field.ident,
                            member: self.member(&label, Arc::from(name), target, &field.options)?,
                            access: field.access,
                        })
                    })
                    .collect::<Result<_, SchemaError>>()?;
                DescriptorKind::Record(RecordDescriptor {
                    fields,
                    construct: shape.construct,
                    blank: shape.blank,
                })
            }
            Draft::Polymorphic(shape, base, all) => {
                for (variant, variant_id) in all {
                    self.check_variant(id, variant_id, true)?;
                    variants.push(PendingVariant {
                        poly: id,
                        descriptor: variant_id,
                        variant: Some(variant),
                    });
                }
                DescriptorKind::Polymorphic(PolymorphicDescriptor { shape, base })
            }
        })
    }

    fn check_variant(
        &self,
        poly: DescriptorId,
        id: DescriptorId,
        readable: bool,
    ) -> Result<(), SchemaError> {
        let base = || self.ty(poly).type_name().into_owned();
        let ty = || self.ty(id).type_name().into_owned();
        match self.outline(id) {
            Outline::Record { construct, blank } => {
                if readable && !construct && !blank {
                    return Err(SchemaError::NoConstructor {
                        member: base(),
                        ty: ty(),
                    });
                }
                Ok(())
            }
            _ => Err(SchemaError::VariantNotRecord {
                base: base(),
                ty: ty(),
            }),
        }
    }

    /// Builds the member `name` of type `target`.
    ///
    /// `label` names the member in errors.
    fn member(
        &self,
        label: &str,
        name: Arc<str>,
        target: DescriptorId,
        options: &MemberOptions,
    ) -> Result<Member, SchemaError> {
        let type_name = || self.ty(target).type_name().into_owned();

        let mut is_reference = false;
        let mut items_reference = false;
        if options.reference {
            match self.outline(self.strip(target, false)) {
                Outline::Shared(inner) => match self.outline(inner) {
                    Outline::Record { .. } | Outline::Polymorphic => is_reference = true,
                    Outline::Scalar => {
                        return Err(SchemaError::ReferenceOnScalar {
                            member: label.into(),
                            ty: type_name(),
                        });
                    }
                    _ => {
                        return Err(SchemaError::ReferenceNotShared {
                            member: label.into(),
                            ty: type_name(),
                        });
                    }
                },
                Outline::Sequence(_) | Outline::Map(..) => items_reference = true,
                Outline::Scalar => {
                    return Err(SchemaError::ReferenceOnScalar {
                        member: label.into(),
                        ty: type_name(),
                    });
                }
                _ => {
                    return Err(SchemaError::ReferenceNotShared {
                        member: label.into(),
                        ty: type_name(),
                    });
                }
            }
        }

        let content = self.strip(target, !is_reference);
        let outline = self.outline(content);

        if name.is_empty() && matches!(outline, Outline::Scalar) {
            return Err(SchemaError::AnonymousScalar {
                member: label.into(),
                ty: type_name(),
            });
        }

        if let Outline::Record { construct, blank } = outline
            && !is_reference
        {
            let usable = if options.run_constructor {
                construct || blank
            } else {
                blank
            };
            if !usable {
                return Err(SchemaError::NoConstructor {
                    member: label.into(),
                    ty: self.ty(content).type_name().into_owned(),
                });
            }
        }

        let keywords = &self.table.keywords;
        let items_options = MemberOptions {
            reference: items_reference,
            run_constructor: options.run_constructor,
            ..MemberOptions::new()
        };
        let items = match outline {
            Outline::Sequence(element) if !is_reference => {
                let element_name = self.item_name(options.child_name, element, &keywords.item);
                Some(Items::Sequence {
                    element: self.member(label, element_name, element, &items_options)?,
                })
            }
            Outline::Map(key, value) if !is_reference => {
                let entry: Arc<str> = Arc::from(options.child_name.unwrap_or(keywords.item.as_str()));
                let mut key_name = self.item_name(options.key_name, key, &keywords.key);
                let mut value_name = self.item_name(options.value_name, value, &keywords.value);
                if key_name == value_name {
                    key_name = Arc::from(keywords.key.as_str());
                    value_name = Arc::from(keywords.value.as_str());
                }
                let key_options = MemberOptions {
                    run_constructor: options.run_constructor,
                    ..MemberOptions::new()
                };
                Some(Items::Map {
                    entry,
                    key: self.member(label, key_name, key, &key_options)?,
                    value: self.member(label, value_name, value, &items_options)?,
                })
            }
            _ => None,
        };

        Ok(Member {
            name,
            target,
            is_reference,
            run_constructor: options.run_constructor,
            items: items.map(Box::new),
        })
    }

    /// Override, else `fallback` for generic types, else the friendly name.
    fn item_name(&self, name: Option<&'static str>, id: DescriptorId, fallback: &str) -> Arc<str> {
        if let Some(name) = name {
            return Arc::from(name);
        }
        let ty = self.ty(self.strip(id, true));
        let type_name = ty.type_name();
        if type_name.contains('<') {
            Arc::from(fallback)
        } else {
            Arc::from(type_name.as_ref())
        }
    }
}

// -----------------------------------------------------------------------------
// Compiler: cycle check

/// The ownership graph over committed and freshly built descriptors.
struct Graph<'a> {
    table: &'a SchemaTable,
    start: usize,
    built: &'a [TypeDescriptor],
    pending: &'a [PendingVariant],
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Active,
    Done,
}

impl Graph<'_> {
    fn descriptor(&self, id: DescriptorId) -> &TypeDescriptor {
        if id.index() < self.start {
            &self.table.descriptors[id.index()]
        } else {
            &self.built[id.index() - self.start]
        }
    }

    fn check_cycles(&self) -> Result<(), SchemaError> {
        let total = self.start + self.built.len();
        let mut marks = alloc::vec![Mark::New; total];
        for index in 0..total {
            if marks[index] == Mark::New {
                self.visit(DescriptorId(index as u32), &mut marks)?;
            }
        }
        Ok(())
    }

    fn visit(&self, id: DescriptorId, marks: &mut [Mark]) -> Result<(), SchemaError> {
        marks[id.index()] = Mark::Active;
        let descriptor = self.descriptor(id);
        if let Some(record) = descriptor.as_record() {
            for field in &record.fields {
                let mut owned = Vec::new();
                self.owned(&field.member, &mut owned);
                let mut records = Vec::new();
                for target in owned {
                    self.records(target, &mut records);
                }
                for next in records {
                    match marks[next.index()] {
                        Mark::Active => {
                            return Err(SchemaError::Cycle {
                                member: format!("{}.{}", descriptor.name, field.ident),
                            });
                        }
                        Mark::New => self.visit(next, marks)?,
                        Mark::Done => {}
                    }
                }
            }
        }
        marks[id.index()] = Mark::Done;
        Ok(())
    }

    /// Records and polymorphic types owned, not referenced, by `member`.
    fn owned(&self, member: &Member, out: &mut Vec<DescriptorId>) {
        if member.is_reference {
            return;
        }
        match member.items() {
            Some(Items::Sequence { element }) => self.owned(element, out),
            Some(Items::Map { key, value, .. }) => {
                self.owned(key, out);
                self.owned(value, out);
            }
            None => {
                let mut id = member.target;
                loop {
                    match &self.descriptor(id).kind {
                        DescriptorKind::Optional { inner, .. }
                        | DescriptorKind::Shared { inner, .. } => id = *inner,
                        DescriptorKind::Record(_) | DescriptorKind::Polymorphic(_) => {
                            out.push(id);
                            return;
                        }
                        _ => return,
                    }
                }
            }
        }
    }

    /// Expands a polymorphic type into its variants.
    fn records(&self, id: DescriptorId, out: &mut Vec<DescriptorId>) {
        match &self.descriptor(id).kind {
            DescriptorKind::Polymorphic(_) => {
                if let Some(set) = self.table.variants.get(&id) {
                    out.extend(set.iter().map(RegisteredVariant::descriptor));
                }
                out.extend(
                    self.pending
                        .iter()
                        .filter(|pending| pending.poly == id)
                        .map(|pending| pending.descriptor),
                );
            }
            _ => out.push(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::collections::BTreeMap;
    use alloc::string::String;
    use alloc::vec::Vec;

    use super::Schema;
    use crate::derive::Persist;
    use crate::schema::{DescriptorKind, Items};
    use crate::{ArchiveConfig, DynPersist, Error, SchemaError, Shared};

    #[derive(Persist, Default)]
    pub struct Person {
        pub name: String,
        #[persist(reference)]
        pub friend: Option<Shared<Person>>,
    }

    #[derive(Persist, Default)]
    pub struct Owner {
        pub pet: Option<Shared<Owner>>,
    }

    #[derive(Persist, Default)]
    pub struct Tagged {
        #[persist(reference)]
        pub tag: String,
    }

    #[derive(Persist, Default)]
    pub struct Roster {
        #[persist(child_name = "Member")]
        pub people: Vec<Person>,
        pub scores: BTreeMap<String, Vec<i32>>,
        pub names: BTreeMap<String, String>,
    }

    #[derive(Persist)]
    #[persist(no_default)]
    pub struct NoDefault {
        pub value: i32,
    }

    #[derive(Persist, Default)]
    pub struct HoldsNoDefault {
        pub inner: Option<NoDefault>,
    }

    fn schema() -> Schema {
        Schema::new(&ArchiveConfig::default())
    }

    #[test]
    fn recursive_reference_compiles() {
        let schema = schema();
        let id = schema.compile::<Person>().unwrap();
        assert_eq!(schema.compile::<Person>().unwrap(), id);

        let person = schema.descriptor(id);
        let record = person.as_record().unwrap();
        assert_eq!(record.fields().len(), 2);
        assert!(record.fields()[1].member().is_reference());
        assert!(!record.fields()[0].member().is_reference());
    }

    #[test]
    fn owning_cycle_is_rejected() {
        let schema = schema();
        let err = schema.compile::<Owner>().unwrap_err();
        match err {
            Error::Schema(SchemaError::Cycle { member }) => assert_eq!(member, "Owner.pet"),
            other => panic!("unexpected {other:?}"),
        }
        // Nothing of the failed call stays behind.
        assert!(schema.read().is_empty());
        assert!(schema.compile::<Person>().is_ok());
    }

    #[test]
    fn reference_on_scalar_is_rejected() {
        let err = schema().compile::<Tagged>().unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::ReferenceOnScalar { .. })
        ));
    }

    #[test]
    fn item_names() {
        let schema = schema();
        let id = schema.compile::<Roster>().unwrap();
        let roster = schema.descriptor(id);
        let fields = roster.as_record().unwrap().fields();

        match fields[0].member().items() {
            Some(Items::Sequence { element }) => assert_eq!(element.name(), "Member"),
            _ => panic!("expected a sequence"),
        }
        match fields[1].member().items() {
            Some(Items::Map { entry, key, value }) => {
                assert_eq!(&**entry, "item");
                assert_eq!(key.name(), "String");
                assert_eq!(value.name(), "value");
            }
            _ => panic!("expected a map"),
        }
        match fields[2].member().items() {
            Some(Items::Map { key, value, .. }) => {
                assert_eq!(key.name(), "key");
                assert_eq!(value.name(), "value");
            }
            _ => panic!("expected a map"),
        }
    }

    #[test]
    fn missing_constructor() {
        let err = schema().compile::<HoldsNoDefault>().unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::NoConstructor { .. })));
    }

    pub trait Shape2D: DynPersist {}

    #[derive(Persist, Default)]
    pub struct Square {
        pub side: f64,
    }

    #[derive(Persist, Default)]
    pub struct Group {
        pub shapes: Vec<Box<dyn Shape2D>>,
    }

    impl Shape2D for Square {}
    impl Shape2D for Group {}

    crate::polymorphic!(dyn Shape2D => [Square, Group]);

    #[test]
    fn polymorphic_cycle_is_rejected() {
        let schema = schema();
        let err = schema.compile::<Box<dyn Shape2D>>().unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::Cycle { .. })));
        assert!(schema.read().is_empty());
    }

    #[test]
    fn root_member_names() {
        let schema = schema();
        let id = schema.compile::<Option<Shared<Person>>>().unwrap();
        assert_eq!(schema.root_member(id, None).unwrap().name(), "Person");
        assert_eq!(schema.root_member(id, Some("Who")).unwrap().name(), "Who");

        let list = schema.compile::<Vec<Person>>().unwrap();
        let member = schema.root_member(list, None).unwrap();
        assert_eq!(member.name(), "Vec");
        assert!(matches!(
            schema.descriptor(list).kind(),
            DescriptorKind::Sequence { .. }
        ));
    }
}
