use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::any::Any;

use persist_utils::hash::HashMap;

use crate::schema::{DescriptorId, DescriptorKind, Items, Member, RecordDescriptor, Schema};
use crate::trace::MemberPath;
use crate::{Error, Keywords, Node, Result, SchemaError};

// -----------------------------------------------------------------------------
// Cursor

/// Read position within one node.
///
/// A keyed cursor hands out children by name; a container cursor hands them
/// out in order. Either way a child is consumed once.
struct Cursor<'n> {
    node: &'n Node,
    taken: Vec<bool>,
    keyed: bool,
}

impl<'n> Cursor<'n> {
    fn new(node: &'n Node, keyed: bool) -> Self {
        Self {
            node,
            taken: vec![false; node.children.len()],
            keyed,
        }
    }

    fn matches(&self, index: usize, name: &str) -> bool {
        !self.taken[index] && (!self.keyed || self.node.children[index].name == name)
    }

    /// Consumes the next child called `name`, or the next child of a
    /// container.
    fn take(&mut self, name: &str) -> Option<&'n Node> {
        let node = self.node;
        let index = (0..node.children.len()).find(|&index| self.matches(index, name))?;
        self.taken[index] = true;
        Some(&node.children[index])
    }

    /// Number of children [`take`](Self::take) would still hand out.
    fn count(&self, name: &str) -> usize {
        (0..self.node.children.len())
            .filter(|&index| self.matches(index, name))
            .count()
    }

    fn untaken(&self) -> impl Iterator<Item = &'n Node> + '_ {
        let node = self.node;
        node.children
            .iter()
            .zip(&self.taken)
            .filter(|(_, taken)| !**taken)
            .map(|(child, _)| child)
    }
}

/// The cursor of an opened record, sequence or map.
enum Opened<'c, 'n> {
    /// A child node of the enclosing cursor.
    Child(Cursor<'n>),
    /// The enclosing cursor itself: the document root (`real`), or a
    /// transparent member.
    Parent {
        cursor: &'c mut Cursor<'n>,
        real: bool,
    },
}

impl<'n> Opened<'_, 'n> {
    fn cursor(&mut self) -> &mut Cursor<'n> {
        match self {
            Self::Child(cursor) => cursor,
            Self::Parent { cursor, .. } => cursor,
        }
    }

    /// The node opened, unless transparent.
    fn node(&self) -> Option<&'n Node> {
        match self {
            Self::Child(cursor) => Some(cursor.node),
            Self::Parent { cursor, real: true } => Some(cursor.node),
            Self::Parent { real: false, .. } => None,
        }
    }

    fn real_cursor(&self) -> Option<&Cursor<'n>> {
        match self {
            Self::Child(cursor) => Some(cursor),
            Self::Parent { cursor, real: true } => Some(cursor),
            Self::Parent { real: false, .. } => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Place {
    Root,
    Member,
    Element,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Build the owned graph and register every addressed shared value.
    Materialize,
    /// Wire references into the built graph.
    Resolve,
}

/// A value built in the first phase, with the node it was read from.
struct Read<'n> {
    value: Box<dyn Any>,
    node: Option<&'n Node>,
}

// -----------------------------------------------------------------------------
// Reader

/// The state of one read call.
///
/// The reference table maps addresses to handles of the shared values built
/// so far. It lives and dies with the call.
pub(crate) struct Reader<'a> {
    schema: &'a Schema,
    keywords: &'a Keywords,
    references: HashMap<String, Rc<dyn Any>>,
    phase: Phase,
    pending: usize,
    path: MemberPath,
}

impl<'a> Reader<'a> {
    pub fn new(schema: &'a Schema, keywords: &'a Keywords) -> Self {
        Self {
            schema,
            keywords,
            references: HashMap::default(),
            phase: Phase::Materialize,
            pending: 0,
            path: MemberPath::new(),
        }
    }

    /// Reads the value described by the root `member` from `root`.
    ///
    /// The second phase only runs if the first one met a reference.
    pub fn read(mut self, member: &Member, root: &Node) -> Result<Box<dyn Any>> {
        self.path.push(&member.name);

        let mut cursor = Cursor::new(root, true);
        let read = self.read_member(&mut cursor, member, Place::Root)?;
        let Some(mut value) = read.map(|read| read.value).or_else(|| self.absent(member.target())) else {
            return Err(self.path.structural(format!(
                "`{}` carries no value",
                root.name
            )));
        };

        if self.pending > 0 {
            self.phase = Phase::Resolve;
            let mut cursor = Cursor::new(root, true);
            self.resolve_member(&mut cursor, member, &mut *value, Place::Root)?;
        }

        log::trace!(
            "read `{}`: {} addressed values, {} reference sites",
            root.name,
            self.references.len(),
            self.pending
        );
        Ok(value)
    }

    fn open<'c, 'n>(
        cursor: &'c mut Cursor<'n>,
        name: &str,
        place: Place,
        keyed: bool,
    ) -> Option<Opened<'c, 'n>> {
        if place == Place::Root {
            cursor.keyed = keyed;
            Some(Opened::Parent { cursor, real: true })
        } else if name.is_empty() {
            Some(Opened::Parent {
                cursor,
                real: false,
            })
        } else {
            let node = cursor.take(name)?;
            Some(Opened::Child(Cursor::new(node, keyed)))
        }
    }

    /// The value of a member whose content is absent, if it has one.
    fn absent(&self, id: DescriptorId) -> Option<Box<dyn Any>> {
        match &self.schema.descriptor(id).kind {
            DescriptorKind::Optional { shape, .. } => Some((shape.none)()),
            _ => None,
        }
    }

    fn note_reference(&mut self) {
        if self.phase == Phase::Materialize {
            self.pending += 1;
        }
    }

    // -------------------------------------------------------------------------
    // Phase 1

    fn read_member<'n>(
        &mut self,
        cursor: &mut Cursor<'n>,
        member: &Member,
        place: Place,
    ) -> Result<Option<Read<'n>>> {
        if member.is_reference() {
            self.note_reference();
            return Ok(None);
        }
        self.read_content(cursor, member, member.target(), place)
    }

    fn read_content<'n>(
        &mut self,
        cursor: &mut Cursor<'n>,
        member: &Member,
        id: DescriptorId,
        place: Place,
    ) -> Result<Option<Read<'n>>> {
        let descriptor = self.schema.descriptor(id);
        match &descriptor.kind {
            DescriptorKind::Scalar(shape) => {
                let text = match place {
                    Place::Root => cursor.node.attribute(&self.keywords.value),
                    Place::Element => cursor
                        .take(member.name())
                        .and_then(|wrapper| wrapper.attribute(&self.keywords.value)),
                    Place::Member => cursor.node.attribute(member.name()),
                };
                match text {
                    Some(text) => Ok(Some(Read {
                        value: (shape.from_text)(text)?,
                        node: None,
                    })),
                    None => Ok(None),
                }
            }
            DescriptorKind::Optional { shape, inner } => {
                match self.read_content(cursor, member, *inner, place)? {
                    Some(read) => Ok(Some(Read {
                        value: (shape.some)(read.value)?,
                        node: read.node,
                    })),
                    None => Ok(None),
                }
            }
            DescriptorKind::Shared { shape, inner } => {
                let Some(read) = self.read_content(cursor, member, *inner, place)? else {
                    return Ok(None);
                };
                let value = (shape.wrap)(read.value)?;
                if self.phase == Phase::Materialize
                    && let Some(address) = read
                        .node
                        .and_then(|node| node.attribute(&self.keywords.address))
                {
                    let handle = (shape.handle)(&*value)?;
                    self.references.insert(address.to_string(), handle);
                }
                Ok(Some(Read {
                    value,
                    node: read.node,
                }))
            }
            DescriptorKind::Polymorphic(_) => {
                let Some(mut opened) = Self::open(cursor, member.name(), place, true) else {
                    return Ok(None);
                };
                let discriminator = opened
                    .node()
                    .and_then(|node| node.attribute(&self.keywords.class));
                let (variant_id, variant) = self.schema.variant_to_read(id, discriminator)?;
                let variant_descriptor = self.schema.descriptor(variant_id);
                let Some(record) = variant_descriptor.as_record() else {
                    return Err(Error::mismatch(variant_descriptor.name.clone()));
                };
                let value = self.read_record(&mut opened, &variant_descriptor.name, record, true)?;
                Ok(Some(Read {
                    value: variant.upcast(value)?,
                    node: opened.node(),
                }))
            }
            DescriptorKind::Record(record) => {
                let Some(mut opened) = Self::open(cursor, member.name(), place, true) else {
                    return Ok(None);
                };
                let value =
                    self.read_record(&mut opened, &descriptor.name, record, member.run_constructor())?;
                Ok(Some(Read {
                    value,
                    node: opened.node(),
                }))
            }
            DescriptorKind::Sequence { shape, .. } => {
                let Some(Items::Sequence { element }) = member.items() else {
                    return Err(self.path.structural(format!(
                        "`{}` is read without its element member",
                        descriptor.name
                    )));
                };
                let Some(mut opened) = Self::open(cursor, member.name(), place, false) else {
                    return Ok(None);
                };
                let mut list = (shape.new)();
                if element.is_reference() {
                    self.note_reference();
                } else {
                    for _ in 0..opened.cursor().count(element.name()) {
                        let item = match self.read_member(opened.cursor(), element, Place::Element)? {
                            Some(read) => read.value,
                            None => match self.absent(element.target()) {
                                Some(value) => value,
                                None => continue,
                            },
                        };
                        (shape.push)(&mut *list, item)?;
                    }
                }
                Ok(Some(Read {
                    value: list,
                    node: opened.node(),
                }))
            }
            DescriptorKind::Map { shape, .. } => {
                let Some(Items::Map {
                    entry,
                    key,
                    value: value_member,
                }) = member.items()
                else {
                    return Err(self.path.structural(format!(
                        "`{}` is read without its entry members",
                        descriptor.name
                    )));
                };
                let Some(mut opened) = Self::open(cursor, member.name(), place, false) else {
                    return Ok(None);
                };
                let mut map = (shape.new)();
                if value_member.is_reference() {
                    self.note_reference();
                } else {
                    for _ in 0..opened.cursor().count(entry) {
                        let Some(mut pair) = Self::open(opened.cursor(), entry, Place::Element, true)
                        else {
                            break;
                        };
                        let k = self.read_key(pair.cursor(), key)?;
                        let v = match self.read_member(pair.cursor(), value_member, Place::Member)? {
                            Some(read) => read.value,
                            None => match self.absent(value_member.target()) {
                                Some(value) => value,
                                None => continue,
                            },
                        };
                        (shape.insert)(&mut *map, k, v)?;
                    }
                }
                Ok(Some(Read {
                    value: map,
                    node: opened.node(),
                }))
            }
        }
    }

    fn read_key(&mut self, cursor: &mut Cursor<'_>, key: &Member) -> Result<Box<dyn Any>> {
        match self.read_member(cursor, key, Place::Member)? {
            Some(read) => Ok(read.value),
            None => Err(self.path.structural(format!(
                "map entry `{}` has no key `{}`",
                cursor.node.name,
                key.name()
            ))),
        }
    }

    fn read_record<'n>(
        &mut self,
        opened: &mut Opened<'_, 'n>,
        name: &str,
        record: &RecordDescriptor,
        run_constructor: bool,
    ) -> Result<Box<dyn Any>> {
        let construct =
            record
                .instantiate(run_constructor)
                .ok_or_else(|| SchemaError::NoConstructor {
                    member: self.path_text(),
                    ty: name.to_string(),
                })?;
        let mut value = construct();

        for field in &record.fields {
            self.path.push(&field.member.name);
            let read = self.read_member(opened.cursor(), &field.member, Place::Member)?;
            self.path.pop();
            if let Some(read) = read {
                field.access.set(&mut *value, read.value)?;
            }
        }

        if let Some(cursor) = opened.real_cursor() {
            for child in cursor.untaken() {
                log::warn!(
                    "ignoring `{}` in `{}`: no member of `{name}` reads it",
                    child.name,
                    cursor.node.name
                );
            }
        }
        Ok(value)
    }

    fn path_text(&self) -> String {
        format!("{:?}", self.path)
    }

    // -------------------------------------------------------------------------
    // Phase 2

    fn lookup(&self, address: &str) -> Result<Rc<dyn Any>> {
        self.references
            .get(address)
            .cloned()
            .ok_or_else(|| Error::UnresolvedReference {
                address: address.to_string(),
            })
    }

    /// Wraps the shared value `handle` into a value of type `id`.
    fn reference_value(&self, id: DescriptorId, handle: Rc<dyn Any>) -> Result<Box<dyn Any>> {
        let descriptor = self.schema.descriptor(id);
        match &descriptor.kind {
            DescriptorKind::Optional { shape, inner } => {
                (shape.some)(self.reference_value(*inner, handle)?)
            }
            DescriptorKind::Shared { shape, .. } => (shape.from_handle)(handle),
            _ => Err(Error::mismatch(descriptor.name.clone())),
        }
    }

    fn resolve_member(
        &mut self,
        cursor: &mut Cursor<'_>,
        member: &Member,
        value: &mut dyn Any,
        place: Place,
    ) -> Result<()> {
        if member.is_reference() {
            return Ok(());
        }
        self.resolve_content(cursor, member, member.target(), value, place)
    }

    fn resolve_content(
        &mut self,
        cursor: &mut Cursor<'_>,
        member: &Member,
        id: DescriptorId,
        value: &mut dyn Any,
        place: Place,
    ) -> Result<()> {
        let descriptor = self.schema.descriptor(id);
        match &descriptor.kind {
            DescriptorKind::Scalar(_) => {
                if place == Place::Element {
                    cursor.take(member.name());
                }
                Ok(())
            }
            DescriptorKind::Optional { shape, inner } => match (shape.get_mut)(value)? {
                Some(value) => self.resolve_content(cursor, member, *inner, value, place),
                None => Ok(()),
            },
            DescriptorKind::Shared { shape, inner } => {
                let inner = *inner;
                (shape.with_mut)(value, &mut |value| {
                    self.resolve_content(cursor, member, inner, value, place)
                })
            }
            DescriptorKind::Polymorphic(poly) => {
                let Some(mut opened) = Self::open(cursor, member.name(), place, true) else {
                    return Ok(());
                };
                let discriminator = opened
                    .node()
                    .and_then(|node| node.attribute(&self.keywords.class));
                let (variant_id, _) = self.schema.variant_to_read(id, discriminator)?;
                let variant_descriptor = self.schema.descriptor(variant_id);
                let Some(record) = variant_descriptor.as_record() else {
                    return Err(Error::mismatch(variant_descriptor.name.clone()));
                };
                let concrete = (poly.shape.concrete_mut)(value)?;
                self.resolve_record(&mut opened, record, concrete)
            }
            DescriptorKind::Record(record) => {
                let Some(mut opened) = Self::open(cursor, member.name(), place, true) else {
                    return Ok(());
                };
                self.resolve_record(&mut opened, record, value)
            }
            DescriptorKind::Sequence { shape, .. } => {
                let Some(Items::Sequence { element }) = member.items() else {
                    return Ok(());
                };
                let Some(mut opened) = Self::open(cursor, member.name(), place, false) else {
                    return Ok(());
                };
                let count = opened.cursor().count(element.name());
                if element.is_reference() {
                    for _ in 0..count {
                        let Some(child) = opened.cursor().take(element.name()) else {
                            break;
                        };
                        let Some(address) = child.attribute(&self.keywords.address) else {
                            continue;
                        };
                        let item = self.reference_value(element.target(), self.lookup(address)?)?;
                        (shape.push)(value, item)?;
                    }
                } else {
                    for index in 0..count {
                        let Some(item) = (shape.get_mut)(value, index)? else {
                            break;
                        };
                        self.resolve_member(opened.cursor(), element, item, Place::Element)?;
                    }
                }
                Ok(())
            }
            DescriptorKind::Map { shape, .. } => {
                let Some(Items::Map {
                    entry,
                    key,
                    value: value_member,
                }) = member.items()
                else {
                    return Ok(());
                };
                let Some(mut opened) = Self::open(cursor, member.name(), place, false) else {
                    return Ok(());
                };
                for _ in 0..opened.cursor().count(entry) {
                    let Some(mut pair) = Self::open(opened.cursor(), entry, Place::Element, true)
                    else {
                        break;
                    };
                    let k = self.read_key(pair.cursor(), key)?;
                    if value_member.is_reference() {
                        let Some(address) = pair.cursor().node.attribute(value_member.name()) else {
                            continue;
                        };
                        let item = self.reference_value(value_member.target(), self.lookup(address)?)?;
                        (shape.insert)(value, k, item)?;
                    } else if let Some(slot) = (shape.value_mut)(value, &*k)? {
                        self.resolve_member(pair.cursor(), value_member, slot, Place::Member)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn resolve_record(
        &mut self,
        opened: &mut Opened<'_, '_>,
        record: &RecordDescriptor,
        value: &mut dyn Any,
    ) -> Result<()> {
        for field in &record.fields {
            let member = &field.member;
            self.path.push(&member.name);
            if member.is_reference() {
                if let Some(address) = opened.cursor().node.attribute(member.name()) {
                    let item = self.reference_value(member.target(), self.lookup(address)?)?;
                    field.access.set(value, item)?;
                }
            } else {
                let slot = field.access.get_mut(value)?;
                self.resolve_member(opened.cursor(), member, slot, Place::Member)?;
            }
            self.path.pop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::collections::BTreeMap;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::any::Any;

    use super::Reader;
    use crate::derive::Persist;
    use crate::write::Writer;
    use crate::{ArchiveConfig, Error, Node, Schema, Shared};

    #[derive(Persist, Default, Debug, PartialEq)]
    pub struct City {
        pub name: String,
    }

    #[derive(Persist, Default)]
    pub struct Atlas {
        pub cities: Vec<Shared<City>>,
        #[persist(reference)]
        pub capital: Option<Shared<City>>,
        #[persist(reference)]
        pub visited: Vec<Shared<City>>,
        #[persist(reference)]
        pub twins: BTreeMap<String, Shared<City>>,
    }

    fn round_trip<T: crate::Persist>(value: &T) -> (Node, Box<dyn Any>) {
        let config = ArchiveConfig::default();
        let schema = Schema::new(&config);
        let id = schema.compile::<T>().unwrap();
        let member = schema.root_member(id, None).unwrap();
        let node = Writer::new(&schema, &config.keywords)
            .write(&member, value)
            .unwrap();
        let back = Reader::new(&schema, &config.keywords)
            .read(&member, &node)
            .unwrap();
        (node, back)
    }

    fn read<T: crate::Persist>(node: &Node) -> crate::Result<Box<dyn Any>> {
        let config = ArchiveConfig::default();
        let schema = Schema::new(&config);
        let id = schema.compile::<T>()?;
        let member = schema.root_member(id, None)?;
        Reader::new(&schema, &config.keywords).read(&member, node)
    }

    #[test]
    fn references_resolve_to_owners() {
        let rome = Shared::new(City {
            name: "Rome".into(),
        });
        let oslo = Shared::new(City {
            name: "Oslo".into(),
        });
        let atlas = Atlas {
            cities: vec![rome.clone(), oslo.clone()],
            capital: Some(oslo.clone()),
            visited: vec![oslo.clone(), rome.clone(), oslo.clone()],
            twins: BTreeMap::from([(String::from("north"), oslo)]),
        };

        let (_, back) = round_trip(&atlas);
        let back = back.downcast::<Atlas>().unwrap();

        assert_eq!(back.cities.len(), 2);
        assert_eq!(back.cities[0].borrow().name, "Rome");
        let capital = back.capital.clone().unwrap();
        assert!(Shared::ptr_eq(&capital, &back.cities[1]));
        assert_eq!(back.visited.len(), 3);
        assert!(Shared::ptr_eq(&back.visited[1], &back.cities[0]));
        assert!(Shared::ptr_eq(&back.visited[2], &back.cities[1]));
        assert!(Shared::ptr_eq(&back.twins["north"], &back.cities[1]));
    }

    #[test]
    fn unknown_address_fails() {
        let mut node = Node::new("Atlas");
        node.push_attribute("capital", "42");
        let err = read::<Atlas>(&node).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { address } if address == "42"));
    }

    #[test]
    fn missing_members_keep_defaults() {
        let node = Node::new("Atlas");
        let back = read::<Atlas>(&node).unwrap().downcast::<Atlas>().unwrap();
        assert!(back.cities.is_empty());
        assert!(back.capital.is_none());
    }

    #[test]
    fn reference_to_wrong_type() {
        #[derive(Persist, Default)]
        pub struct Mixed {
            pub city: Shared<City>,
            #[persist(reference)]
            pub other: Option<Shared<Atlas>>,
        }

        let mut node = Node::new("Mixed");
        node.push_child(Node::new("city")).push_attribute("id", "1");
        node.push_attribute("other", "1");
        let err = read::<Mixed>(&node).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn scalar_sequence() {
        let (node, back) = round_trip(&vec![3_i32, 1, 2]);
        assert!(node.is_container);
        assert_eq!(back.downcast_ref::<Vec<i32>>(), Some(&vec![3, 1, 2]));
    }
}
