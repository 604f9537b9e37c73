use alloc::string::String;

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// Keywords

/// Reserved names shared by the archive and the format adapters.
///
/// Both sides of a document must agree on these, so they travel with the
/// [`ArchiveConfig`] instead of being hardcoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keywords {
    /// Attribute carrying the polymorphic type discriminator.
    pub class: String,
    /// Attribute carrying an object's address.
    pub address: String,
    /// Fallback name for sequence elements and map entries.
    pub item: String,
    /// Fallback name for map keys.
    pub key: String,
    /// Fallback name for map values, and the attribute of scalar wrapper nodes.
    pub value: String,
    /// Element name used by adapters that need one when a node has none.
    pub root: String,
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            class: "class".into(),
            address: "id".into(),
            item: "item".into(),
            key: "key".into(),
            value: "value".into(),
            root: "root".into(),
        }
    }
}

// -----------------------------------------------------------------------------
// ArchiveConfig

/// Configuration handed to every [`Archive`](crate::Archive) at construction.
///
/// ```
/// use persist_graph::ArchiveConfig;
///
/// let config: ArchiveConfig =
///     serde_json::from_str(r#"{ "keywords": { "class": "type" }, "discover_derived": true }"#)
///         .unwrap();
///
/// assert_eq!(config.keywords.class, "type");
/// assert_eq!(config.keywords.address, "id");
/// assert!(config.discover_derived);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub keywords: Keywords,
    /// Register derived types submitted through `inventory` when their
    /// polymorphic base is compiled, and compile unknown runtime types on
    /// the fly while writing. Discriminators then carry full type paths.
    pub discover_derived: bool,
}

impl ArchiveConfig {
    /// Returns a copy with `discover_derived` set.
    pub fn with_discover_derived(mut self, enabled: bool) -> Self {
        self.discover_derived = enabled;
        self
    }

    /// Returns a copy with the given keywords.
    pub fn with_keywords(mut self, keywords: Keywords) -> Self {
        self.keywords = keywords;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{ArchiveConfig, Keywords};

    #[test]
    fn defaults() {
        let keywords = Keywords::default();
        assert_eq!(keywords.class, "class");
        assert_eq!(keywords.address, "id");
        assert_eq!(keywords.item, "item");
        assert_eq!(keywords.key, "key");
        assert_eq!(keywords.value, "value");
        assert!(!ArchiveConfig::default().discover_derived);
    }

    #[test]
    fn json_round_trip() {
        let config = ArchiveConfig::default().with_discover_derived(true);
        let text = serde_json::to_string(&config).unwrap();
        let back: ArchiveConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(config, back);
    }
}
