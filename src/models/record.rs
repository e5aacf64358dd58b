//! Follower record data structure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One follower as returned by a platform, keyed by field name.
///
/// Field order is the order the upstream API produced them in. The set of
/// fields varies between platforms and between pages of the same platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FollowerRecord(Map<String, Value>);

impl FollowerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field names in iteration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Merge detail fields into the record, overwriting existing values.
    pub fn merge(&mut self, detail: FollowerRecord) {
        for (key, value) in detail.0 {
            self.0.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text form of a field, used for identifiers and CSV cells.
    ///
    /// Strings are returned verbatim, scalars via their JSON text, `null`
    /// and absent fields as `None`.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl From<Map<String, Value>> for FollowerRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FollowerRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
