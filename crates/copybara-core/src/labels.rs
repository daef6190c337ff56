use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered label multimap. Names keep first-insertion order, values keep
/// insertion order within a name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Labels(IndexMap<String, Vec<String>>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    /// Insert unless the exact name/value pair is already present.
    pub fn put_unique(&mut self, name: &str, value: &str) {
        let values = self.0.entry(name.to_string()).or_default();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }

    pub fn get(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Most recent value of a label.
    pub fn last(&self, name: &str) -> Option<&str> {
        self.get(name).last().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.get(name).is_empty()
    }

    /// Merge `other` into a copy of `self`, skipping duplicate pairs.
    pub fn merged(&self, other: &Labels) -> Labels {
        let mut out = self.clone();
        for (name, value) in other.iter() {
            out.put_unique(name, value);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut labels = Labels::new();
        for (k, v) in iter {
            labels.put(k, v);
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_order_and_multiple_values() {
        let labels: Labels = [("b", "1"), ("a", "2"), ("b", "3")].into_iter().collect();
        let pairs: Vec<_> = labels.iter().collect();
        assert_eq!(pairs, vec![("b", "1"), ("b", "3"), ("a", "2")]);
        assert_eq!(labels.last("b"), Some("3"));
        assert!(labels.get("missing").is_empty());
    }

    #[test]
    fn merge_skips_duplicate_pairs() {
        let a: Labels = [("Bug", "1")].into_iter().collect();
        let b: Labels = [("Bug", "1"), ("Bug", "2"), ("Team", "x")].into_iter().collect();
        let m = a.merged(&b);
        assert_eq!(m.get("Bug"), ["1".to_string(), "2".to_string()]);
        assert_eq!(m.get("Team"), ["x".to_string()]);
    }
}
