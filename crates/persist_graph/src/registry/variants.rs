use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::any::TypeId;

use persist_utils::TypeIdMap;
use persist_utils::hash::{HashMap, HashSet};

use super::Variant;
use crate::SchemaError;
use crate::schema::DescriptorId;

// -----------------------------------------------------------------------------
// RegisteredVariant

/// A compiled variant of one polymorphic type.
#[derive(Debug, Clone)]
pub struct RegisteredVariant {
    pub(crate) descriptor: DescriptorId,
    pub(crate) type_id: TypeId,
    pub(crate) name: String,
    pub(crate) path: String,
    /// `None` for types compiled on the fly while writing; they can be
    /// written but not read back.
    pub(crate) variant: Option<Variant>,
}

impl RegisteredVariant {
    #[inline]
    pub fn descriptor(&self) -> DescriptorId {
        self.descriptor
    }

    /// The friendly name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full type path.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }
}

// -----------------------------------------------------------------------------
// VariantSet

/// The variants registered for one polymorphic type.
///
/// Lookup by discriminator accepts the friendly name or the full path. A
/// friendly name shared by two variants is ambiguous; those variants are
/// written with their path instead.
#[derive(Debug, Default, Clone)]
pub struct VariantSet {
    entries: Vec<RegisteredVariant>,
    by_type: TypeIdMap<usize>,
    by_name: HashMap<String, usize>,
    by_path: HashMap<String, usize>,
    ambiguous: HashSet<String>,
}

impl VariantSet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variant; returns `false` if its type is already present.
    pub fn insert(&mut self, entry: RegisteredVariant) -> bool {
        if self.by_type.contains(&entry.type_id) {
            return false;
        }
        let index = self.entries.len();
        self.by_type.insert(entry.type_id, index);
        self.by_path.insert(entry.path.clone(), index);

        if self.ambiguous.contains(&entry.name) {
            // Already ambiguous.
        } else if self.by_name.remove(&entry.name).is_some() {
            self.ambiguous.insert(entry.name.clone());
        } else {
            self.by_name.insert(entry.name.clone(), index);
        }

        self.entries.push(entry);
        true
    }

    #[inline]
    pub fn get(&self, type_id: TypeId) -> Option<&RegisteredVariant> {
        self.by_type.get(&type_id).map(|&index| &self.entries[index])
    }

    /// Finds the variant named by a discriminator.
    pub fn find(&self, base: &str, discriminator: &str) -> Result<&RegisteredVariant, SchemaError> {
        if let Some(&index) = self.by_path.get(discriminator) {
            return Ok(&self.entries[index]);
        }
        if self.ambiguous.contains(discriminator) {
            return Err(SchemaError::AmbiguousVariant {
                base: base.to_string(),
                name: discriminator.to_string(),
            });
        }
        match self.by_name.get(discriminator) {
            Some(&index) => Ok(&self.entries[index]),
            None => Err(SchemaError::UnknownVariant {
                base: base.to_string(),
                ty: discriminator.to_string(),
            }),
        }
    }

    /// The discriminator written for `entry`.
    pub fn discriminator<'a>(&self, entry: &'a RegisteredVariant, full_path: bool) -> &'a str {
        if full_path || self.ambiguous.contains(&entry.name) {
            &entry.path
        } else {
            &entry.name
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &RegisteredVariant> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use core::any::TypeId;

    use super::{RegisteredVariant, VariantSet};
    use crate::SchemaError;
    use crate::schema::DescriptorId;

    fn entry<T: 'static>(id: u32, name: &str, path: &str) -> RegisteredVariant {
        RegisteredVariant {
            descriptor: DescriptorId(id),
            type_id: TypeId::of::<T>(),
            name: String::from(name),
            path: String::from(path),
            variant: None,
        }
    }

    #[test]
    fn lookup_by_name_and_path() {
        let mut set = VariantSet::new();
        assert!(set.insert(entry::<u8>(1, "Command", "app::Command")));
        assert!(!set.insert(entry::<u8>(1, "Command", "app::Command")));

        assert_eq!(set.find("T", "Command").unwrap().descriptor(), DescriptorId(1));
        assert_eq!(set.find("T", "app::Command").unwrap().descriptor(), DescriptorId(1));
        assert!(matches!(
            set.find("T", "Other"),
            Err(SchemaError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn shared_names_are_ambiguous() {
        let mut set = VariantSet::new();
        set.insert(entry::<u8>(1, "Node", "a::Node"));
        set.insert(entry::<u16>(2, "Node", "b::Node"));
        set.insert(entry::<u32>(3, "Node", "c::Node"));

        assert!(matches!(
            set.find("T", "Node"),
            Err(SchemaError::AmbiguousVariant { .. })
        ));
        assert_eq!(set.find("T", "b::Node").unwrap().descriptor(), DescriptorId(2));

        let first = set.get(TypeId::of::<u8>()).unwrap();
        assert_eq!(set.discriminator(first, false), "a::Node");
        assert_eq!(set.len(), 3);
    }
}
