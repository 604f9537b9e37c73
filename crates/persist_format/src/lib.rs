//! Concrete syntaxes for `persist_graph` document trees.
//!
//! - [`XmlFormat`] through `quick-xml`.
//! - [`JsonFormat`] through `serde_json`.
//! - [`YamlFormat`] through `serde_yaml`.
//!
//! [`Format`] picks one at runtime, e.g. from a file extension.

// -----------------------------------------------------------------------------
// Modules

mod json;
mod tree;
mod xml;
mod yaml;

// -----------------------------------------------------------------------------
// Exports

pub use json::JsonFormat;
pub use xml::XmlFormat;
pub use yaml::YamlFormat;

use std::path::Path;

use persist_graph::{ArchiveConfig, DocumentFormat, Node, Result};

// -----------------------------------------------------------------------------
// Format

/// One of the bundled adapters.
///
/// ```
/// use persist_format::Format;
/// use persist_graph::ArchiveConfig;
///
/// let config = ArchiveConfig::default();
/// assert!(matches!(Format::from_path("scene.yml", &config), Some(Format::Yaml(_))));
/// assert!(Format::from_path("scene.bin", &config).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    Xml(XmlFormat),
    Json(JsonFormat),
    Yaml(YamlFormat),
}

impl Format {
    /// The adapter for a file extension, case-insensitive: `xml`, `json`,
    /// `yaml` or `yml`.
    pub fn from_extension(extension: &str, config: &ArchiveConfig) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "xml" => Some(Self::Xml(XmlFormat::from_config(config))),
            "json" => Some(Self::Json(JsonFormat::from_config(config))),
            "yaml" | "yml" => Some(Self::Yaml(YamlFormat::from_config(config))),
            _ => None,
        }
    }

    pub fn from_path(path: impl AsRef<Path>, config: &ArchiveConfig) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?;
        Self::from_extension(extension, config)
    }
}

impl DocumentFormat for Format {
    fn render(&self, node: &Node) -> Result<Vec<u8>> {
        match self {
            Self::Xml(format) => format.render(node),
            Self::Json(format) => format.render(node),
            Self::Yaml(format) => format.render(node),
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<Node> {
        match self {
            Self::Xml(format) => format.parse(bytes),
            Self::Json(format) => format.parse(bytes),
            Self::Yaml(format) => format.parse(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use persist_graph::derive::Persist;
    use persist_graph::{
        Archive, ArchiveConfig, DocumentFormat, DynPersist, Error, Keywords, Shared, polymorphic,
    };

    use super::{Format, JsonFormat, XmlFormat, YamlFormat};

    fn formats() -> [Format; 3] {
        [
            Format::Xml(XmlFormat::new()),
            Format::Json(JsonFormat::new()),
            Format::Yaml(YamlFormat::new()),
        ]
    }

    // Sample model: people.

    #[derive(Persist, Default, Debug, PartialEq)]
    pub struct Person {
        pub name: String,
        pub age: u32,
        pub nicknames: Vec<String>,
        pub scores: HashMap<String, f64>,
    }

    #[derive(Persist, Default, Debug, PartialEq)]
    pub struct Student {
        pub name: String,
    }

    #[derive(Persist, Default, Debug, PartialEq)]
    pub struct Classroom {
        pub room: String,
        #[persist(name = "")]
        pub students: Vec<Student>,
    }

    // Sample model: an automaton whose transitions point back at states.

    pub trait Edge: DynPersist {
        fn target(&self) -> Option<Shared<State>>;
    }

    #[derive(Persist, Default)]
    pub struct Transition {
        #[persist(reference)]
        pub target: Option<Shared<State>>,
    }

    #[derive(Persist, Default)]
    pub struct CommandTransition {
        #[persist(reference)]
        pub target: Option<Shared<State>>,
        pub command: String,
    }

    impl Edge for Transition {
        fn target(&self) -> Option<Shared<State>> {
            self.target.clone()
        }
    }

    impl Edge for CommandTransition {
        fn target(&self) -> Option<Shared<State>> {
            self.target.clone()
        }
    }

    polymorphic!(dyn Edge => Transition, [CommandTransition]);

    #[derive(Persist, Default)]
    pub struct State {
        pub name: String,
        pub transitions: Vec<Box<dyn Edge>>,
    }

    #[derive(Persist, Default)]
    pub struct Automata {
        pub states: Vec<Shared<State>>,
        #[persist(reference)]
        pub start: Option<Shared<State>>,
    }

    fn automata() -> Automata {
        let idle = Shared::new(State {
            name: "idle".into(),
            transitions: Vec::new(),
        });
        let busy = Shared::new(State {
            name: "busy".into(),
            transitions: Vec::new(),
        });
        idle.borrow_mut().transitions.push(Box::new(Transition {
            target: Some(busy.clone()),
        }));
        busy.borrow_mut().transitions.push(Box::new(CommandTransition {
            target: Some(idle.clone()),
            command: "reset".into(),
        }));
        Automata {
            states: vec![idle.clone(), busy],
            start: Some(idle),
        }
    }

    #[test]
    fn person_round_trip() {
        let archive = Archive::<Person>::new().unwrap();
        let person = Person {
            name: "Ann <\"A\">".into(),
            age: 41,
            nicknames: vec!["annie".into(), "a".into()],
            scores: HashMap::from([("math".into(), 9.5), ("art".into(), 7.0)]),
        };
        for format in formats() {
            let bytes = archive.to_bytes(&person, &format).unwrap();
            assert_eq!(archive.from_bytes(&bytes, &format).unwrap(), person, "{format:?}");
        }
    }

    #[test]
    fn anonymous_splice_in_xml() {
        let archive = Archive::<Classroom>::new().unwrap();
        let classroom = Classroom {
            room: "4b".into(),
            students: vec![Student { name: "Ann".into() }, Student { name: "Bo".into() }],
        };
        let format = XmlFormat::new().with_indent(None).with_declaration(false);
        let bytes = archive.to_bytes(&classroom, &format).unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            r#"<Classroom room="4b"><Student name="Ann"/><Student name="Bo"/></Classroom>"#
        );
        assert_eq!(archive.from_bytes(&bytes, &format).unwrap(), classroom);

        // Two members named `Student` have no JSON rendering.
        let err = archive.to_bytes(&classroom, JsonFormat::new()).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn automata_round_trip() {
        let archive = Archive::<Automata>::new().unwrap();
        for format in formats() {
            let bytes = archive.to_bytes(&automata(), &format).unwrap();
            let back = archive.from_bytes(&bytes, &format).unwrap();

            let idle = &back.states[0];
            let busy = &back.states[1];
            assert!(Shared::ptr_eq(back.start.as_ref().unwrap(), idle), "{format:?}");

            let to_busy = idle.borrow().transitions[0].target().unwrap();
            assert!(Shared::ptr_eq(&to_busy, busy));

            let state = busy.borrow();
            let edge: &dyn Edge = &*state.transitions[0];
            let command = edge.as_any().downcast_ref::<CommandTransition>().unwrap();
            assert_eq!(command.command, "reset");
            assert!(Shared::ptr_eq(command.target.as_ref().unwrap(), idle));
        }
    }

    #[test]
    fn rewrite_is_stable() {
        let archive = Archive::<Automata>::new().unwrap();
        for format in formats() {
            let first = archive.to_bytes(&automata(), &format).unwrap();
            let second = archive
                .to_bytes(&archive.from_bytes(&first, &format).unwrap(), &format)
                .unwrap();
            assert_eq!(first, second, "{format:?}");
        }
    }

    #[test]
    fn roots_of_every_kind() {
        let names = vec![String::from("Ann"), String::from("Bo"), String::from("Cy")];
        let ages = BTreeMap::from([(String::from("Ann"), 41_u32), (String::from("Bo"), 7)]);
        let scores: HashMap<String, i32> = (0..5).map(|i| (format!("round{i}"), i * 10)).collect();

        for format in formats() {
            let archive = Archive::<Vec<String>>::new().unwrap();
            let bytes = archive.to_bytes(&names, &format).unwrap();
            assert_eq!(archive.from_bytes(&bytes, &format).unwrap(), names, "{format:?}");

            let archive = Archive::<BTreeMap<String, u32>>::new().unwrap();
            let bytes = archive.to_bytes(&ages, &format).unwrap();
            assert_eq!(archive.from_bytes(&bytes, &format).unwrap(), ages, "{format:?}");

            let archive = Archive::<HashMap<String, i32>>::new().unwrap();
            let bytes = archive.to_bytes(&scores, &format).unwrap();
            assert_eq!(archive.from_bytes(&bytes, &format).unwrap(), scores, "{format:?}");

            let archive = Archive::<u8>::new().unwrap();
            let bytes = archive.to_bytes(&200, &format).unwrap();
            assert_eq!(archive.from_bytes(&bytes, &format).unwrap(), 200, "{format:?}");
        }
    }

    #[test]
    fn map_rewrite_is_stable() {
        let archive = Archive::<Person>::new().unwrap();
        let person = Person {
            name: "Ann".into(),
            age: 41,
            nicknames: vec!["annie".into()],
            scores: (0..12).map(|i| (format!("subject{i}"), f64::from(i) / 2.0)).collect(),
        };
        for format in formats() {
            let first = archive.to_bytes(&person, &format).unwrap();
            let back = archive.from_bytes(&first, &format).unwrap();
            let second = archive.to_bytes(&back, &format).unwrap();
            assert_eq!(first, second, "{format:?}");
        }
    }

    #[test]
    fn custom_keywords() {
        let config = ArchiveConfig::default().with_keywords(Keywords {
            class: "type".into(),
            address: "ref".into(),
            ..Keywords::default()
        });
        let archive = Archive::<Automata>::with_config(config.clone()).unwrap();
        let format = Format::from_extension("JSON", &config).unwrap();

        let bytes = archive.to_bytes(&automata(), &format).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(r#""type": "CommandTransition""#));
        assert!(text.contains(r#""ref": "1""#));
        assert!(!text.contains(r#""class""#));

        let back = archive.from_bytes(&bytes, &format).unwrap();
        assert!(Shared::ptr_eq(back.start.as_ref().unwrap(), &back.states[0]));
    }

    #[test]
    fn dispatch() {
        let node = {
            let mut node = persist_graph::Node::new("Person");
            node.push_attribute("name", "Ann");
            node
        };
        for format in formats() {
            let back = format.parse(&format.render(&node).unwrap()).unwrap();
            assert_eq!(back.attribute("name"), Some("Ann"));
        }
    }
}
