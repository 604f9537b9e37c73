use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;
use core::marker::PhantomData;
use std::io;

use crate::read::Reader;
use crate::registry::Variant;
use crate::schema::{DescriptorId, Persist, Schema, TypeDescriptor, downcast_box};
use crate::write::Writer;
use crate::{ArchiveConfig, DocumentFormat, Error, Keywords, Node, Result};

// -----------------------------------------------------------------------------
// Archive

/// Writes values of `T` to document trees and reads them back.
///
/// The schema of `T` is compiled at construction, so an archive that exists
/// describes a valid type. An archive keeps no state between calls: every
/// write and read builds its own identity or reference table, and concurrent
/// calls on clones of one [`Schema`] only contend on its lock.
pub struct Archive<T> {
    schema: Schema,
    config: ArchiveConfig,
    root: DescriptorId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Persist> Archive<T> {
    /// Creates an archive with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ArchiveConfig::default())
    }

    /// Creates an archive with `config`.
    pub fn with_config(config: ArchiveConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Starts an [`ArchiveBuilder`].
    #[inline]
    pub fn builder() -> ArchiveBuilder<T> {
        ArchiveBuilder::new()
    }

    fn from_schema(schema: Schema, config: ArchiveConfig) -> Result<Self> {
        let root = schema.compile::<T>()?;
        Ok(Self {
            schema,
            config,
            root,
            _marker: PhantomData,
        })
    }

    /// Creates an archive of `U` sharing this archive's schema and
    /// configuration.
    pub fn derive<U: Persist>(&self) -> Result<Archive<U>> {
        Archive::from_schema(self.schema.clone(), self.config.clone())
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[inline]
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    #[inline]
    pub fn keywords(&self) -> &Keywords {
        &self.config.keywords
    }

    /// The compiled descriptor of `T`.
    #[inline]
    pub fn descriptor(&self) -> Arc<TypeDescriptor> {
        self.schema.descriptor(self.root)
    }

    /// Writes `value` to a new tree whose root is called `name`, or the
    /// type's name.
    pub fn write(&self, value: &T, name: Option<&str>) -> Result<Node> {
        let member = self.schema.root_member(self.root, name)?;
        Writer::new(&self.schema, &self.config.keywords).write(&member, value)
    }

    /// Like [`write`](Self::write), for a type-erased value.
    ///
    /// Fails with [`Error::TypeMismatch`] unless `value` is a `T`.
    pub fn write_any(&self, value: &dyn Any, name: Option<&str>) -> Result<Node> {
        if !value.is::<T>() {
            return Err(Error::mismatch(T::type_name()));
        }
        let member = self.schema.root_member(self.root, name)?;
        Writer::new(&self.schema, &self.config.keywords).write(&member, value)
    }

    /// Reads a `T` from `node`, resolving every reference in the tree.
    pub fn read(&self, node: &Node) -> Result<T> {
        let member = self.schema.root_member(self.root, None)?;
        let value = Reader::new(&self.schema, &self.config.keywords).read(&member, node)?;
        downcast_box::<T>(value)
    }

    /// Writes `value` and renders it with `format`.
    pub fn to_bytes(&self, value: &T, format: impl DocumentFormat) -> Result<Vec<u8>> {
        format.render(&self.write(value, None)?)
    }

    /// Parses `bytes` with `format` and reads a `T`.
    pub fn from_bytes(&self, bytes: &[u8], format: impl DocumentFormat) -> Result<T> {
        self.read(&format.parse(bytes)?)
    }

    /// Writes `value` to `writer` in `format`.
    pub fn write_to(
        &self,
        value: &T,
        mut writer: impl io::Write,
        format: impl DocumentFormat,
    ) -> Result<()> {
        writer.write_all(&self.to_bytes(value, format)?)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a `T` in `format` from `reader`.
    pub fn read_from(&self, mut reader: impl io::Read, format: impl DocumentFormat) -> Result<T> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.from_bytes(&bytes, format)
    }
}

impl<T> Clone for Archive<T> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            config: self.config.clone(),
            root: self.root,
            _marker: PhantomData,
        }
    }
}

impl<T: Persist> fmt::Debug for Archive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("root", &T::type_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// ArchiveBuilder

/// Configures an [`Archive`] before its schema is compiled.
///
/// ```
/// use persist_graph::{Archive, DynPersist, derive::Persist, polymorphic, variant};
///
/// pub trait Animal: DynPersist {}
///
/// #[derive(Persist, Default)]
/// pub struct Cat { pub lives: u8 }
///
/// #[derive(Persist, Default)]
/// pub struct Dog { pub good: bool }
///
/// impl Animal for Cat {}
/// impl Animal for Dog {}
///
/// polymorphic!(dyn Animal => [Cat]);
///
/// #[derive(Persist, Default)]
/// pub struct Zoo { pub animals: Vec<Box<dyn Animal>> }
///
/// let archive = Archive::<Zoo>::builder()
///     .include(variant!(dyn Animal => Dog))
///     .build()
///     .unwrap();
///
/// let zoo = Zoo { animals: vec![Box::new(Cat { lives: 9 }) as Box<dyn Animal>, Box::new(Dog { good: true })] };
/// let node = archive.write(&zoo, None).unwrap();
/// let animals = node.child("animals").unwrap();
/// assert_eq!(animals.children[0].attribute("class"), Some("Cat"));
/// assert_eq!(animals.children[1].attribute("class"), Some("Dog"));
/// ```
pub struct ArchiveBuilder<T> {
    config: ArchiveConfig,
    variants: Vec<Variant>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Persist> ArchiveBuilder<T> {
    pub fn new() -> Self {
        Self {
            config: ArchiveConfig::default(),
            variants: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ArchiveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn keywords(mut self, keywords: Keywords) -> Self {
        self.config.keywords = keywords;
        self
    }

    /// See [`ArchiveConfig::discover_derived`].
    pub fn discover_derived(mut self, enabled: bool) -> Self {
        self.config.discover_derived = enabled;
        self
    }

    /// Registers `variant` for its polymorphic type.
    pub fn include(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Compiles the schema of `T`.
    pub fn build(self) -> Result<Archive<T>> {
        let schema = Schema::new(&self.config);
        for variant in self.variants {
            schema.include(variant)?;
        }
        Archive::from_schema(schema, self.config)
    }
}

impl<T: Persist> Default for ArchiveBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::collections::BTreeMap;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::any::TypeId;

    use super::Archive;
    use crate::derive::Persist;
    use crate::{
        ArchiveConfig, DocumentFormat, DynPersist, Error, Node, Result, SchemaError, Shared,
        polymorphic, variant,
    };

    // Renders the root name only.
    struct NameOnly;

    impl DocumentFormat for NameOnly {
        fn render(&self, node: &Node) -> Result<Vec<u8>> {
            Ok(alloc::format!("{}", node.name).into_bytes())
        }

        fn parse(&self, bytes: &[u8]) -> Result<Node> {
            Ok(Node::new(String::from_utf8_lossy(bytes).into_owned()))
        }
    }

    #[derive(Persist, Default, Debug)]
    pub struct Person {
        pub name: String,
        pub age: u32,
        #[persist(reference)]
        pub friend: Option<Shared<Person>>,
    }

    pub trait Transition: DynPersist {
        fn target(&self) -> &str;
    }

    #[derive(Persist, Default, Debug)]
    pub struct Plain {
        pub target: String,
    }

    #[derive(Persist, Default, Debug)]
    pub struct Command {
        pub target: String,
        pub command: String,
    }

    impl Transition for Plain {
        fn target(&self) -> &str {
            &self.target
        }
    }

    impl Transition for Command {
        fn target(&self) -> &str {
            &self.target
        }
    }

    polymorphic!(dyn Transition => Plain, [Command]);

    #[derive(Persist, Default)]
    pub struct State {
        pub name: String,
        pub transitions: Vec<Box<dyn Transition>>,
    }

    #[derive(Persist, Default)]
    pub struct Machine {
        pub states: Vec<Shared<State>>,
        #[persist(reference)]
        pub start: Option<Shared<State>>,
        pub labels: BTreeMap<String, u8>,
    }

    #[test]
    fn scalar_round_trip() {
        let archive = Archive::<Person>::new().unwrap();
        let person = Person {
            name: "Ann".into(),
            age: 41,
            friend: None,
        };
        let node = archive.write(&person, None).unwrap();
        assert_eq!(node.name, "Person");
        assert_eq!(node.attribute("name"), Some("Ann"));
        assert_eq!(node.attribute("age"), Some("41"));
        let back = archive.read(&node).unwrap();
        assert_eq!((back.name.as_str(), back.age), ("Ann", 41));
        assert!(back.friend.is_none());
    }

    #[test]
    fn root_name() {
        let archive = Archive::<Person>::new().unwrap();
        let node = archive.write(&Person::default(), Some("Owner")).unwrap();
        assert_eq!(node.name, "Owner");
        assert!(archive.read(&node).is_ok());
    }

    #[test]
    fn polymorphic_round_trip() {
        let archive = Archive::<Machine>::new().unwrap();

        let idle = Shared::new(State {
            name: "idle".into(),
            transitions: vec![
                Box::new(Plain {
                    target: "busy".into(),
                }) as Box<dyn Transition>,
                Box::new(Command {
                    target: "idle".into(),
                    command: "reset".into(),
                }),
            ],
        });
        let machine = Machine {
            states: vec![idle.clone()],
            start: Some(idle),
            labels: BTreeMap::from([(String::from("a"), 1)]),
        };

        let node = archive.write(&machine, None).unwrap();
        let state = &node.child("states").unwrap().children[0];
        assert_eq!(state.attribute("id"), Some("1"));
        let transitions = state.child("transitions").unwrap();
        assert_eq!(transitions.children[0].attribute("class"), None);
        assert_eq!(transitions.children[1].attribute("class"), Some("Command"));

        let back = archive.read(&node).unwrap();
        assert!(Shared::ptr_eq(back.start.as_ref().unwrap(), &back.states[0]));
        let state = back.states[0].borrow();
        assert_eq!(state.transitions.len(), 2);
        assert_eq!(state.transitions[1].target(), "idle");
        let command: &dyn Transition = &*state.transitions[1];
        assert!(command.as_any().is::<Command>());
        assert_eq!(back.labels["a"], 1);
    }

    #[test]
    fn idempotent_write() {
        let archive = Archive::<Machine>::new().unwrap();
        let state = Shared::new(State::default());
        let machine = Machine {
            states: vec![state.clone()],
            start: Some(state),
            labels: BTreeMap::new(),
        };
        let first = archive.write(&machine, None).unwrap();
        let second = archive.write(&archive.read(&first).unwrap(), None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_discriminator() {
        let archive = Archive::<Machine>::new().unwrap();
        let mut node = Node::new("Machine");
        let states = node.push_child(Node::container("states"));
        let state = states.push_child(Node::new("State"));
        let transitions = state.push_child(Node::container("transitions"));
        transitions
            .push_child(Node::new("Transition"))
            .push_attribute("class", "Teleport");

        let Err(err) = archive.read(&node) else {
            panic!("`Teleport` is not a variant of `Transition`");
        };
        assert!(matches!(
            err,
            Error::Schema(SchemaError::UnknownVariant { ty, .. }) if ty == "Teleport"
        ));
    }

    #[test]
    fn included_variant() {
        #[derive(Persist, Default)]
        pub struct Jump {
            pub target: String,
        }

        impl Transition for Jump {
            fn target(&self) -> &str {
                &self.target
            }
        }

        let value = State {
            name: "s".into(),
            transitions: vec![Box::new(Jump {
                target: "t".into(),
            }) as Box<dyn Transition>],
        };

        let archive = Archive::<State>::new().unwrap();
        assert!(archive.write(&value, None).is_err());

        let archive = Archive::<State>::builder()
            .include(variant!(dyn Transition => Jump))
            .build()
            .unwrap();
        let node = archive.write(&value, None).unwrap();
        let back = archive.read(&node).unwrap();
        assert_eq!(back.transitions[0].target(), "t");
    }

    pub trait Signal: DynPersist {}

    #[derive(Persist, Default)]
    pub struct Beep {
        pub pitch: u16,
    }

    #[derive(Persist, Default)]
    pub struct Flash {
        pub color: String,
    }

    impl Signal for Beep {}
    impl Signal for Flash {}

    polymorphic!(dyn Signal => [Beep, Flash]);

    #[test]
    fn variants_without_a_base() {
        let archive = Archive::<Vec<Box<dyn Signal>>>::new().unwrap();
        let signals: Vec<Box<dyn Signal>> = vec![
            Box::new(Beep { pitch: 440 }),
            Box::new(Flash {
                color: "red".into(),
            }),
        ];

        let node = archive.write(&signals, None).unwrap();
        assert_eq!(node.children[0].attribute("class"), Some("Beep"));
        assert_eq!(node.children[1].attribute("class"), Some("Flash"));

        let back = archive.read(&node).unwrap();
        let (first, second): (&dyn Signal, &dyn Signal) = (&*back[0], &*back[1]);
        let beep = first.as_any().downcast_ref::<Beep>().unwrap();
        assert_eq!(beep.pitch, 440);
        let flash = second.as_any().downcast_ref::<Flash>().unwrap();
        assert_eq!(flash.color, "red");
    }

    #[test]
    fn derived_archives_share_the_schema() {
        let archive = Archive::<Person>::new().unwrap();
        let states = archive.derive::<Vec<Shared<State>>>().unwrap();
        assert_eq!(states.descriptor().name(), "Vec<Shared<State>>");
        assert!(archive.schema().read().get_id(TypeId::of::<State>()).is_some());
        assert_eq!(states.config(), &ArchiveConfig::default());
    }

    #[test]
    fn write_any_checks_the_type() {
        let archive = Archive::<Person>::new().unwrap();
        let err = archive.write_any(&5_u8, None).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(archive.write_any(&Person::default(), None).is_ok());
    }

    #[test]
    fn io_plumbing() {
        let archive = Archive::<Person>::new().unwrap();
        let mut out = Vec::new();
        archive.write_to(&Person::default(), &mut out, NameOnly).unwrap();
        assert_eq!(out, b"Person");
        let back = archive.read_from(out.as_slice(), &NameOnly).unwrap();
        assert!(back.name.is_empty() && back.friend.is_none());
    }
}
