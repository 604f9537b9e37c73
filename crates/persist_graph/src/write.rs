use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::any::Any;

use persist_utils::hash::{HashMap, HashSet};

use crate::schema::{DescriptorId, DescriptorKind, Items, Member, Schema};
use crate::trace::MemberPath;
use crate::{Error, Keywords, Node, Result};

// -----------------------------------------------------------------------------
// IdentityGenerator

/// Assigns small integers to shared values, counting from 1.
///
/// Identity is the address of the shared allocation, which is stable for the
/// whole write since every value is borrowed by it.
#[derive(Default)]
struct IdentityGenerator {
    ids: HashMap<usize, u64>,
    next: u64,
    referenced: HashSet<u64>,
}

impl IdentityGenerator {
    fn identify(&mut self, pointer: usize) -> u64 {
        *self.ids.entry(pointer).or_insert_with(|| {
            self.next += 1;
            self.next
        })
    }

    fn reference(&mut self, pointer: usize) -> u64 {
        let id = self.identify(pointer);
        self.referenced.insert(id);
        id
    }
}

// -----------------------------------------------------------------------------
// Scope

/// The node content is currently written into.
///
/// A transparent scope writes into its parent's node. Its container flag is
/// its own, so an anonymous sequence does not turn the parent into a
/// container.
struct Scope<'n> {
    node: &'n mut Node,
    transparent: bool,
    container: bool,
}

/// Where a value is written relative to the scope.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Place {
    /// The scope is the document root itself.
    Root,
    /// A member of a keyed node.
    Member,
    /// An element of a container.
    Element,
}

/// Properties handed from a carrier to the node of its content.
#[derive(Clone, Copy, Default)]
struct Tags<'d> {
    identity: Option<u64>,
    discriminator: Option<&'d str>,
}

// -----------------------------------------------------------------------------
// Writer

/// The state of one write call.
pub(crate) struct Writer<'a> {
    schema: &'a Schema,
    keywords: &'a Keywords,
    identities: IdentityGenerator,
    path: MemberPath,
}

impl<'a> Writer<'a> {
    pub fn new(schema: &'a Schema, keywords: &'a Keywords) -> Self {
        Self {
            schema,
            keywords,
            identities: IdentityGenerator::default(),
            path: MemberPath::new(),
        }
    }

    /// Writes `value`, described by the root `member`, into a new tree.
    pub fn write(mut self, member: &Member, value: &dyn Any) -> Result<Node> {
        let mut root = Node::new(member.name());
        let mut scope = Scope {
            node: &mut root,
            transparent: false,
            container: false,
        };
        self.path.push(&member.name);
        self.write_member(&mut scope, member, value, Place::Root)?;
        self.path.pop();
        self.finish(&mut root)?;
        Ok(root)
    }

    fn write_member(
        &mut self,
        scope: &mut Scope<'_>,
        member: &Member,
        value: &dyn Any,
        place: Place,
    ) -> Result<()> {
        if member.is_reference() {
            self.write_reference(scope, member, member.target(), value, place)
        } else {
            self.write_content(scope, member, member.target(), value, place, Tags::default())
        }
    }

    fn write_reference(
        &mut self,
        scope: &mut Scope<'_>,
        member: &Member,
        id: DescriptorId,
        value: &dyn Any,
        place: Place,
    ) -> Result<()> {
        let descriptor = self.schema.descriptor(id);
        match &descriptor.kind {
            DescriptorKind::Optional { shape, inner } => match (shape.get)(value)? {
                Some(value) => self.write_reference(scope, member, *inner, value, place),
                None => Ok(()),
            },
            DescriptorKind::Shared { shape, .. } => {
                let address = self.identities.reference((shape.identity)(value)?);
                let address = address.to_string();
                match place {
                    Place::Element => {
                        let child = scope.node.push_child(Node::new(member.name()));
                        child.push_attribute(self.keywords.address.as_str(), address);
                        Ok(())
                    }
                    Place::Member | Place::Root => self.push_attribute(scope, member.name(), address),
                }
            }
            _ => Err(Error::mismatch(format!("Shared<{}>", descriptor.name))),
        }
    }

    fn write_content(
        &mut self,
        scope: &mut Scope<'_>,
        member: &Member,
        id: DescriptorId,
        value: &dyn Any,
        place: Place,
        tags: Tags<'_>,
    ) -> Result<()> {
        let descriptor = self.schema.descriptor(id);
        match &descriptor.kind {
            DescriptorKind::Scalar(shape) => {
                let text = (shape.to_text)(value)?;
                self.write_scalar(scope, member.name(), text, place)
            }
            DescriptorKind::Optional { shape, inner } => match (shape.get)(value)? {
                Some(value) => self.write_content(scope, member, *inner, value, place, tags),
                None => Ok(()),
            },
            DescriptorKind::Shared { shape, inner } => {
                let identity = self.identities.identify((shape.identity)(value)?);
                let inner = *inner;
                let tags = Tags {
                    identity: Some(identity),
                    discriminator: None,
                };
                (shape.with)(value, &mut |value| {
                    self.write_content(scope, member, inner, value, place, tags)
                })
            }
            DescriptorKind::Polymorphic(poly) => {
                let concrete = (poly.shape.concrete)(value)?;
                let ty = (poly.shape.persist_type)(value)?;
                let (variant, discriminator) = self.schema.variant_to_write(id, ty)?;
                let tags = Tags {
                    identity: tags.identity,
                    discriminator: discriminator.as_deref(),
                };
                self.write_content(scope, member, variant, concrete, place, tags)
            }
            DescriptorKind::Record(record) => {
                let mut node = self.open(scope, member.name(), place, tags.identity);
                if let Some(discriminator) = tags.discriminator {
                    if node.transparent {
                        return Err(self.path.structural(format!(
                            "anonymous member `{}` cannot carry the discriminator `{discriminator}`",
                            descriptor.name
                        )));
                    }
                    self.push_attribute(&mut node, &self.keywords.class, discriminator.to_string())?;
                }
                for field in &record.fields {
                    let value = field.access.get(value)?;
                    self.path.push(&field.member.name);
                    self.write_member(&mut node, &field.member, value, Place::Member)?;
                    self.path.pop();
                }
                Ok(())
            }
            DescriptorKind::Sequence { shape, .. } => {
                let Some(Items::Sequence { element }) = member.items() else {
                    return Err(self.path.structural(format!(
                        "`{}` is written without its element member",
                        descriptor.name
                    )));
                };
                let mut list = self.open(scope, member.name(), place, tags.identity);
                Self::mark_container(&mut list);
                for index in 0..(shape.len)(value)? {
                    let Some(item) = (shape.get)(value, index)? else {
                        break;
                    };
                    self.write_member(&mut list, element, item, Place::Element)?;
                }
                Ok(())
            }
            DescriptorKind::Map { shape, .. } => {
                let Some(Items::Map { entry, key, value: value_member }) = member.items() else {
                    return Err(self.path.structural(format!(
                        "`{}` is written without its entry members",
                        descriptor.name
                    )));
                };
                let mut entries = (shape.entries)(value)?;
                if !shape.ordered {
                    entries = self.sort_entries(key, entries)?;
                }
                let mut map = self.open(scope, member.name(), place, tags.identity);
                Self::mark_container(&mut map);
                for (k, v) in entries {
                    let mut pair = self.open(&mut map, entry, Place::Element, None);
                    self.write_member(&mut pair, key, k, Place::Member)?;
                    self.write_member(&mut pair, value_member, v, Place::Member)?;
                }
                Ok(())
            }
        }
    }

    /// Orders the entries of an unordered map by the text of their keys.
    /// Keys without a text form keep their relative order.
    fn sort_entries<'v>(
        &self,
        key: &Member,
        entries: Vec<(&'v dyn Any, &'v dyn Any)>,
    ) -> Result<Vec<(&'v dyn Any, &'v dyn Any)>> {
        let mut keyed = entries
            .into_iter()
            .map(|(k, v)| Ok((self.key_text(key.target(), k)?, k, v)))
            .collect::<Result<Vec<_>>>()?;
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(keyed.into_iter().map(|(_, k, v)| (k, v)).collect())
    }

    fn key_text(&self, id: DescriptorId, value: &dyn Any) -> Result<Option<String>> {
        let descriptor = self.schema.descriptor(id);
        match &descriptor.kind {
            DescriptorKind::Scalar(shape) => Ok(Some((shape.to_text)(value)?)),
            DescriptorKind::Optional { shape, inner } => match (shape.get)(value)? {
                Some(value) => self.key_text(*inner, value),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn write_scalar(
        &mut self,
        scope: &mut Scope<'_>,
        name: &str,
        text: String,
        place: Place,
    ) -> Result<()> {
        match place {
            Place::Root => {
                scope.node.push_attribute(self.keywords.value.as_str(), text);
                Ok(())
            }
            Place::Element => {
                let wrapper = scope.node.push_child(Node::new(name));
                wrapper.push_attribute(self.keywords.value.as_str(), text);
                Ok(())
            }
            Place::Member => self.push_attribute(scope, name, text),
        }
    }

    /// Opens the node of a record, sequence or map.
    fn open<'s>(
        &self,
        scope: &'s mut Scope<'_>,
        name: &str,
        place: Place,
        identity: Option<u64>,
    ) -> Scope<'s> {
        let (node, transparent) = if place == Place::Root {
            (&mut *scope.node, false)
        } else if name.is_empty() {
            (&mut *scope.node, true)
        } else {
            (scope.node.push_child(Node::new(name)), false)
        };

        if transparent {
            Scope {
                node,
                transparent,
                container: scope.container,
            }
        } else {
            node.id = identity.or(node.id);
            Scope {
                node,
                transparent,
                container: false,
            }
        }
    }

    fn mark_container(scope: &mut Scope<'_>) {
        scope.container = true;
        if !scope.transparent {
            scope.node.is_container = true;
        }
    }

    fn push_attribute(&self, scope: &mut Scope<'_>, name: &str, value: String) -> Result<()> {
        if scope.container {
            return Err(self.path.structural(format!(
                "attribute `{name}` cannot be written into the container `{}`",
                scope.node.name
            )));
        }
        scope.node.push_attribute(name, value);
        Ok(())
    }

    /// Adds the address attribute to every referenced node.
    fn finish(&mut self, root: &mut Node) -> Result<()> {
        let mut pending = self.identities.referenced.clone();
        let address = self.keywords.address.as_str();
        root.walk_mut(&mut |node| {
            if let Some(id) = node.id.take()
                && pending.remove(&id)
            {
                node.push_attribute(address, id.to_string());
            }
        });

        if let Some(missing) = pending.iter().min() {
            return Err(Error::UnresolvedReference {
                address: missing.to_string(),
            });
        }

        log::trace!(
            "wrote `{}`: {} nodes, {} shared values, {} referenced",
            root.name,
            root.count(),
            self.identities.ids.len(),
            self.identities.referenced.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use std::collections::HashMap;

    use super::Writer;
    use crate::derive::Persist;
    use crate::{ArchiveConfig, Error, Node, Persist as _, Schema, Shared};

    #[derive(Persist, Default)]
    pub struct Student {
        pub name: String,
    }

    #[derive(Persist, Default)]
    pub struct Classroom {
        pub room: u32,
        #[persist(name = "")]
        pub students: Vec<Student>,
        #[persist(reference)]
        pub monitor: Option<Shared<Student>>,
        pub tags: Vec<String>,
    }

    #[derive(Persist, Default)]
    pub struct Registry {
        pub owned: Vec<Shared<Student>>,
        #[persist(reference)]
        pub favourite: Option<Shared<Student>>,
    }

    fn write<T: crate::Persist>(value: &T, root: Option<&str>) -> crate::Result<Node> {
        let config = ArchiveConfig::default();
        let schema = Schema::new(&config);
        let id = schema.compile::<T>()?;
        let member = schema.root_member(id, root)?;
        Writer::new(&schema, &config.keywords).write(&member, value)
    }

    #[test]
    fn anonymous_sequence_is_spliced() {
        let room = Classroom {
            room: 7,
            students: vec![
                Student { name: "Ann".into() },
                Student { name: "Bob".into() },
            ],
            monitor: None,
            tags: vec!["east".into()],
        };
        let node = write(&room, None).unwrap();

        assert_eq!(node.name, "Classroom");
        assert!(!node.is_container);
        assert_eq!(node.attribute("room"), Some("7"));
        assert_eq!(node.children_named("Student").count(), 2);

        let tags = node.child("tags").unwrap();
        assert!(tags.is_container);
        assert_eq!(tags.children[0].name, "String");
        assert_eq!(tags.children[0].attribute("value"), Some("east"));
    }

    #[test]
    fn references_get_addresses() {
        let first = Shared::new(Student { name: "Ann".into() });
        let registry = Registry {
            owned: vec![first.clone(), Shared::new(Student::default())],
            favourite: Some(first),
        };
        let node = write(&registry, Some("Reg")).unwrap();

        assert_eq!(node.name, "Reg");
        assert_eq!(node.attribute("favourite"), Some("1"));
        let owned = node.child("owned").unwrap();
        assert_eq!(owned.children[0].attribute("id"), Some("1"));
        assert_eq!(owned.children[1].attribute("id"), None);

        let mut ids = Vec::new();
        let mut copy = node.clone();
        copy.walk_mut(&mut |n| ids.push(n.id));
        assert!(ids.iter().all(Option::is_none));
    }

    #[test]
    fn reference_to_unwritten_value() {
        let room = Classroom {
            monitor: Some(Shared::new(Student::default())),
            ..Default::default()
        };
        let err = write(&room, None).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { address } if address == "1"));
    }

    #[test]
    fn hash_map_entries_are_sorted() {
        let scores: HashMap<String, i32> = (0..12).map(|i| (format!("k{i:02}"), i)).collect();
        let node = write(&scores, None).unwrap();

        let keys: Vec<&str> = node
            .children
            .iter()
            .map(|entry| entry.attribute("String").unwrap())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys.len(), 12);
        assert_eq!(keys, sorted);
    }

    #[test]
    fn scalar_root() {
        let node = write(&5_u8, None).unwrap();
        assert_eq!(node.name, "u8");
        assert_eq!(node.attribute("value"), Some("5"));
        assert_eq!(<u8>::type_name(), "u8");
    }
}
