//! Attribute predicates in the compact query syntax used against the feature
//! store, e.g. `n[place=city,town]`, `wra[boundary=administrative,disputed]`,
//! `a[natural=water,glacier]`, `n[place=*]`.

use crate::osm::{Feature, FeatureKind, FeatureStore};

#[derive(Debug, Clone)]
pub struct Predicate {
    nodes: bool,
    ways: bool,
    relations: bool,
    areas: bool,
    key: String,
    /// Accepted values; empty means any value (`*`).
    values: Vec<String>,
}

impl Predicate {
    /// Parses a predicate; returns `None` for malformed input.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let open = s.find('[')?;
        let close = s.rfind(']')?;
        if close != s.len() - 1 || close <= open {
            return None;
        }
        let (mut nodes, mut ways, mut relations, mut areas) = (false, false, false, false);
        for c in s[..open].chars() {
            match c {
                'n' => nodes = true,
                'w' => ways = true,
                'r' => relations = true,
                'a' => areas = true,
                _ => return None,
            }
        }
        if !(nodes || ways || relations || areas) {
            return None;
        }
        let body = &s[open + 1..close];
        let (key, values) = match body.split_once('=') {
            Some((k, "*")) => (k, Vec::new()),
            Some((k, vals)) => (k, vals.split(',').map(str::to_string).collect()),
            None => (body, Vec::new()),
        };
        if key.is_empty() {
            return None;
        }
        Some(Self {
            nodes,
            ways,
            relations,
            areas,
            key: key.to_string(),
            values,
        })
    }

    #[must_use]
    pub fn matches(&self, feature: &Feature, store: &FeatureStore) -> bool {
        let kind_ok = (self.nodes && feature.kind == FeatureKind::Node)
            || (self.ways && feature.kind == FeatureKind::Way)
            || (self.relations && feature.kind == FeatureKind::Relation)
            || (self.areas && feature.is_area());
        if !kind_ok {
            return false;
        }
        let Some(key) = store.key(&self.key) else {
            return false;
        };
        let val = feature.tag(key);
        if !val.is_set() {
            return false;
        }
        self.values.is_empty() || self.values.iter().any(|v| v == val.as_str())
    }
}
