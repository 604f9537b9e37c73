use alloc::borrow::Cow;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::format;
use alloc::vec::Vec;
use core::hash::{BuildHasher, Hash};
use std::collections::HashMap;

use crate::Persist;
use crate::schema::{MapLike, MapShape, SequenceLike, SequenceShape, Shape};

// -----------------------------------------------------------------------------
// Sequences

impl<T: Persist> SequenceLike for Vec<T> {
    type Item = T;

    #[inline]
    fn items_len(&self) -> usize {
        self.len()
    }

    #[inline]
    fn item(&self, index: usize) -> Option<&T> {
        self.get(index)
    }

    #[inline]
    fn item_mut(&mut self, index: usize) -> Option<&mut T> {
        self.get_mut(index)
    }

    #[inline]
    fn push_item(&mut self, item: T) {
        self.push(item);
    }
}

impl<T: Persist> Persist for Vec<T> {
    fn type_path() -> Cow<'static, str> {
        Cow::Owned(format!("alloc::vec::Vec<{}>", T::type_path()))
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("Vec<{}>", T::type_name()))
    }

    fn type_ident() -> &'static str {
        "Vec"
    }

    fn shape() -> Shape {
        Shape::Sequence(SequenceShape::of::<Self>())
    }
}

impl<T: Persist> SequenceLike for VecDeque<T> {
    type Item = T;

    #[inline]
    fn items_len(&self) -> usize {
        self.len()
    }

    #[inline]
    fn item(&self, index: usize) -> Option<&T> {
        self.get(index)
    }

    #[inline]
    fn item_mut(&mut self, index: usize) -> Option<&mut T> {
        self.get_mut(index)
    }

    #[inline]
    fn push_item(&mut self, item: T) {
        self.push_back(item);
    }
}

impl<T: Persist> Persist for VecDeque<T> {
    fn type_path() -> Cow<'static, str> {
        Cow::Owned(format!("alloc::collections::VecDeque<{}>", T::type_path()))
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("VecDeque<{}>", T::type_name()))
    }

    fn type_ident() -> &'static str {
        "VecDeque"
    }

    fn shape() -> Shape {
        Shape::Sequence(SequenceShape::of::<Self>())
    }
}

// -----------------------------------------------------------------------------
// Maps

impl<K, V, S> MapLike for HashMap<K, V, S>
where
    K: Persist + Eq + Hash,
    V: Persist,
    S: BuildHasher + Default + 'static,
{
    type Key = K;
    type Value = V;

    const ORDERED: bool = false;

    fn entries(&self) -> Vec<(&K, &V)> {
        self.iter().collect()
    }

    #[inline]
    fn value_mut(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }

    #[inline]
    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K, V, S> Persist for HashMap<K, V, S>
where
    K: Persist + Eq + Hash,
    V: Persist,
    S: BuildHasher + Default + 'static,
{
    fn type_path() -> Cow<'static, str> {
        Cow::Owned(format!(
            "std::collections::HashMap<{}, {}>",
            K::type_path(),
            V::type_path()
        ))
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("HashMap<{}, {}>", K::type_name(), V::type_name()))
    }

    fn type_ident() -> &'static str {
        "HashMap"
    }

    fn shape() -> Shape {
        Shape::Map(MapShape::of::<Self>())
    }
}

impl<K: Persist + Ord, V: Persist> MapLike for BTreeMap<K, V> {
    type Key = K;
    type Value = V;

    fn entries(&self) -> Vec<(&K, &V)> {
        self.iter().collect()
    }

    #[inline]
    fn value_mut(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }

    #[inline]
    fn insert_entry(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K: Persist + Ord, V: Persist> Persist for BTreeMap<K, V> {
    fn type_path() -> Cow<'static, str> {
        Cow::Owned(format!(
            "alloc::collections::BTreeMap<{}, {}>",
            K::type_path(),
            V::type_path()
        ))
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("BTreeMap<{}, {}>", K::type_name(), V::type_name()))
    }

    fn type_ident() -> &'static str {
        "BTreeMap"
    }

    fn shape() -> Shape {
        Shape::Map(MapShape::of::<Self>())
    }
}

#[cfg(test)]
mod tests {
    use alloc::collections::{BTreeMap, VecDeque};
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use std::collections::HashMap;

    use crate::Persist;
    use crate::schema::{MapShape, SequenceShape};

    #[test]
    fn names() {
        assert_eq!(<Vec<String> as Persist>::type_name(), "Vec<String>");
        assert_eq!(<VecDeque<u8> as Persist>::type_ident(), "VecDeque");
        assert_eq!(
            <HashMap<String, Vec<i32>> as Persist>::type_name(),
            "HashMap<String, Vec<i32>>"
        );
        assert_eq!(<BTreeMap<u8, u8> as Persist>::type_ident(), "BTreeMap");
    }

    #[test]
    fn erased_sequence() {
        let shape = SequenceShape::of::<Vec<i32>>();
        let mut list = (shape.new)();
        (shape.push)(&mut *list, Box::new(4_i32)).unwrap();
        (shape.push)(&mut *list, Box::new(5_i32)).unwrap();
        assert!((shape.push)(&mut *list, Box::new(5_u8)).is_err());

        assert_eq!((shape.len)(&*list).unwrap(), 2);
        let second = (shape.get)(&*list, 1).unwrap().unwrap();
        assert_eq!(second.downcast_ref::<i32>(), Some(&5));
        assert_eq!(list.downcast_ref::<Vec<i32>>(), Some(&vec![4, 5]));
    }

    #[test]
    fn erased_map() {
        let shape = MapShape::of::<BTreeMap<String, u8>>();
        assert!(shape.ordered);
        assert!(!MapShape::of::<HashMap<String, u8>>().ordered);
        let mut map = (shape.new)();
        (shape.insert)(
            &mut *map,
            Box::new(String::from("a")),
            Box::new(1_u8),
        )
        .unwrap();

        let key = String::from("a");
        let value = (shape.value_mut)(&mut *map, &key).unwrap().unwrap();
        *value.downcast_mut::<u8>().unwrap() = 9;

        let entries = (shape.entries)(&*map).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.downcast_ref::<u8>(), Some(&9));
    }
}
