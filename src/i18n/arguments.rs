//! Message arguments
//!
//! Arguments are kept in a sorted map so that the same bindings always
//! produce the same hash, independent of insertion order and of the process
//! computing it. The hash is part of the shared cache key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single argument value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ArgValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Another translation key, resolved in the same locale with no arguments
    Message(String),
}

impl ArgValue {
    /// Numeric view used for plural selection
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ArgValue::Integer(i) => Some(*i as f64),
            ArgValue::Float(f) if f.is_finite() => Some(*f),
            ArgValue::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    fn type_tag(&self) -> &'static str {
        match self {
            ArgValue::Text(_) => "s",
            ArgValue::Integer(_) => "i",
            ArgValue::Float(_) => "f",
            ArgValue::Bool(_) => "b",
            ArgValue::Message(_) => "m",
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Text(s) | ArgValue::Message(s) => f.write_str(s),
            ArgValue::Integer(i) => write!(f, "{}", i),
            ArgValue::Float(v) => write!(f, "{}", v),
            ArgValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Text(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Integer(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        ArgValue::Integer(value.into())
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        ArgValue::Integer(value.into())
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Float(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

/// Named argument bindings for a resolution request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments(BTreeMap<String, ArgValue>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Bind `name` to a nested translation key
    pub fn with_message(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.0.insert(name.into(), ArgValue::Message(key.into()));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Option<ArgValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First of `pivots` bound to a numeric value
    pub fn pivot<S: AsRef<str>>(&self, pivots: &[S]) -> Option<f64> {
        pivots
            .iter()
            .find_map(|name| self.0.get(name.as_ref()).and_then(ArgValue::as_number))
    }

    /// Hex SHA-256 over the sorted bindings, stable across processes
    pub fn stable_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in &self.0 {
            let rendered = match value {
                // Bit pattern keeps 1.0 and 1.00000001 apart
                ArgValue::Float(f) => format!("{:016x}", f.to_bits()),
                other => other.to_string(),
            };
            hasher.update(name.len().to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update(value.type_tag().as_bytes());
            hasher.update(rendered.len().to_le_bytes());
            hasher.update(rendered.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl<K, V> FromIterator<(K, V)> for Arguments
where
    K: Into<String>,
    V: Into<ArgValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_values() {
        assert_eq!(ArgValue::from(5.0).to_string(), "5");
        assert_eq!(ArgValue::from(2.5).to_string(), "2.5");
        assert_eq!(ArgValue::from(-3).to_string(), "-3");
        assert_eq!(ArgValue::from(true).to_string(), "true");
    }

    #[test]
    fn test_pivot_picks_first_numeric() {
        let args = Arguments::new().with("count", "many").with("n", 3);
        assert_eq!(args.pivot(&["count", "n"]), Some(3.0));
        assert_eq!(args.pivot(&["missing"]), None);

        let args = Arguments::new().with("count", " 7 ");
        assert_eq!(args.pivot(&["count"]), Some(7.0));
    }

    #[test]
    fn test_hash_distinguishes_types_and_values() {
        let text = Arguments::new().with("n", "1");
        let int = Arguments::new().with("n", 1);
        let float = Arguments::new().with("n", 1.0);
        assert_ne!(text.stable_hash(), int.stable_hash());
        assert_ne!(int.stable_hash(), float.stable_hash());

        let split_a = Arguments::new().with("ab", "c");
        let split_b = Arguments::new().with("a", "bc");
        assert_ne!(split_a.stable_hash(), split_b.stable_hash());
    }

    #[test]
    fn test_empty_hash_is_fixed() {
        assert_eq!(
            Arguments::new().stable_hash(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    proptest! {
        #[test]
        fn prop_hash_ignores_insertion_order(
            pairs in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..6)
        ) {
            let forward: Arguments = pairs.iter().map(|(k, v)| (k.clone(), *v)).collect();
            let backward: Arguments = pairs.iter().rev().map(|(k, v)| (k.clone(), *v)).collect();
            prop_assert_eq!(forward.stable_hash(), backward.stable_hash());
        }
    }
}
