use std::collections::HashMap;
use std::hash::Hash;

use crate::mvt::tile_value::TileValue;

/// Deduplicating index assigning dense `u32` ids in insertion order.
#[derive(Debug)]
struct DedupIndex<T> {
    by_value: HashMap<T, u32>,
    values: Vec<T>,
}

impl<T> Default for DedupIndex<T> {
    fn default() -> Self {
        Self {
            by_value: HashMap::new(),
            values: Vec::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> DedupIndex<T> {
    fn insert(&mut self, value: T) -> u32 {
        if let Some(&idx) = self.by_value.get(&value) {
            return idx;
        }
        let idx = u32::try_from(self.values.len()).expect("fewer than 2^32 tags per layer");
        self.by_value.insert(value.clone(), idx);
        self.values.push(value);
        idx
    }

    fn into_vec(self) -> Vec<T> {
        self.values
    }
}

/// A builder for key-value pairs, where the key is a `String` and the value
/// is a [`TileValue`] holding any of the MVT value types. Keys and values are
/// shared across all features of a layer.
#[derive(Debug, Default)]
pub struct TagsBuilder {
    keys: DedupIndex<String>,
    values: DedupIndex<TileValue>,
}

impl TagsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: TileValue) -> (u32, u32) {
        (self.keys.insert(key), self.values.insert(value))
    }

    #[must_use]
    pub fn into_tags(self) -> (Vec<String>, Vec<TileValue>) {
        (self.keys.into_vec(), self.values.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::TileValue::{Int, Str};
    use super::*;

    fn s(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_add_value() {
        let mut lb = TagsBuilder::new();
        assert_eq!((0, 0), lb.insert(s("foo"), Str(s("bar"))));
        assert_eq!((0, 1), lb.insert(s("foo"), Str(s("baz"))));
        assert_eq!((0, 2), lb.insert(s("foo"), Int(42)));
        assert_eq!((1, 2), lb.insert(s("bar"), Int(42)));

        let (keys, values) = lb.into_tags();
        assert_eq!(vec![s("foo"), s("bar")], keys);
        assert_eq!(vec![Str(s("bar")), Str(s("baz")), Int(42)], values);
    }
}
