use core::any::TypeId;
use core::fmt::{self, Debug, Formatter};

use crate::hash::NoOpHashState;
use crate::hash::hashbrown::HashMap;
use crate::hash::hashbrown::hash_map::Entry;

// -----------------------------------------------------------------------------
// TypeIdMap

/// A map with [`TypeId`] as the fixed key type.
///
/// The interface hides the underlying [`HashMap`], so the storage can change
/// without touching callers.
pub struct TypeIdMap<V>(HashMap<TypeId, V, NoOpHashState>);

impl<V> TypeIdMap<V> {
    /// Creates an empty `TypeIdMap`.
    ///
    /// # Examples
    ///
    /// ```
    /// use persist_utils::TypeIdMap;
    /// let map = TypeIdMap::<u32>::new();
    /// assert!(!map.contains(&core::any::TypeId::of::<u8>()));
    /// ```
    #[inline]
    pub const fn new() -> Self {
        Self(HashMap::with_hasher(NoOpHashState))
    }

    /// Gets a mutable reference to the value associated with the given key,
    /// inserting the result of `f` if the key is not present.
    #[inline]
    pub fn get_or_insert(&mut self, type_id: TypeId, f: impl FnOnce() -> V) -> &mut V {
        match self.0.entry(type_id) {
            Entry::Vacant(entry) => entry.insert(f()),
            Entry::Occupied(entry) => entry.into_mut(),
        }
    }

    /// Returns a reference to the value corresponding to the type.
    pub fn get(&self, type_id: &TypeId) -> Option<&V> {
        self.0.get(type_id)
    }

    /// Inserts a key-value pair into the map.
    pub fn insert(&mut self, type_id: TypeId, v: V) -> Option<V> {
        self.0.insert(type_id, v)
    }

    /// Removes a key from the map, returning the value if it was present.
    pub fn remove(&mut self, type_id: &TypeId) -> Option<V> {
        self.0.remove(type_id)
    }

    /// Returns `true` if the map contains a value for the specified key.
    pub fn contains(&self, type_id: &TypeId) -> bool {
        self.0.contains_key(type_id)
    }
}

// -----------------------------------------------------------------------------
// Traits

impl<T> Default for TypeIdMap<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for TypeIdMap<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Debug> Debug for TypeIdMap<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use core::any::TypeId;

    use super::TypeIdMap;

    #[test]
    fn insert_and_lookup() {
        let mut map = TypeIdMap::new();
        assert!(map.insert(TypeId::of::<u8>(), "u8").is_none());
        *map.get_or_insert(TypeId::of::<u16>(), || "u16") = "short";

        assert_eq!(map.get(&TypeId::of::<u8>()), Some(&"u8"));
        assert_eq!(map.get(&TypeId::of::<u16>()), Some(&"short"));
        assert!(map.contains(&TypeId::of::<u16>()));
        assert_eq!(map.remove(&TypeId::of::<u8>()), Some("u8"));
        assert!(!map.contains(&TypeId::of::<u8>()));
    }
}
