//! Decoded per-packet readings

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

use super::Value;

/// Name-keyed snapshot of every field decoded from a single packet.
///
/// Entries keep schema order. A reading is never mutated after the decoder
/// hands it over.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reading {
    entries: Vec<(Arc<str>, Value)>,
}

impl Reading {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    pub(crate) fn push(&mut self, name: Arc<str>, value: Value) {
        self.entries.push((name, value));
    }

    /// Value for `name`, if the schema has such a field.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.iter().find(|(n, _)| n.as_ref() == name).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.entries.iter().map(|(n, v)| (n.as_ref(), *v))
    }

    /// Encode as the flat JSON object sent to subscribers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl FromIterator<(Arc<str>, Value)> for Reading {
    fn from_iter<I: IntoIterator<Item = (Arc<str>, Value)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name.as_ref(), value)?;
        }
        map.end()
    }
}
