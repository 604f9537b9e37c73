//! Provide hash containers, re-exports *hashbrown* and *foldhash*.

// -----------------------------------------------------------------------------
// Modules

mod hasher;

// -----------------------------------------------------------------------------
// Exports

pub use hasher::{FixedHashState, FixedHasher};
pub use hasher::{NoOpHashState, NoOpHasher};

/// A [`hashbrown::HashMap`] using [`FixedHashState`] by default.
pub type HashMap<K, V, S = FixedHashState> = hashbrown::HashMap<K, V, S>;

/// A [`hashbrown::HashSet`] using [`FixedHashState`] by default.
pub type HashSet<T, S = FixedHashState> = hashbrown::HashSet<T, S>;

// -----------------------------------------------------------------------------
// Re-export crates

pub use foldhash;
pub use hashbrown;

#[cfg(test)]
mod tests {
    use super::{HashMap, HashSet};

    #[test]
    fn fixed_state_is_deterministic() {
        let mut a: HashMap<_, _> = HashMap::default();
        let mut b: HashMap<_, _> = HashMap::default();
        for i in 0..64_u32 {
            a.insert(i, i * 2);
            b.insert(i, i * 2);
        }
        let left: alloc::vec::Vec<_> = a.iter().collect();
        let right: alloc::vec::Vec<_> = b.iter().collect();
        assert_eq!(left, right);
    }

    #[test]
    fn set_dedups() {
        let mut set: HashSet<_> = HashSet::default();
        assert!(set.insert(7_usize));
        assert!(!set.insert(7_usize));
        assert_eq!(set.len(), 1);
    }
}
