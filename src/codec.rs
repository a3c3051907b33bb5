//! Flat document shape over store snapshots
//!
//! Callers see one mapping per document with the identifier under `id`.
//! The store keeps identifier and fields apart, so reads merge them
//! ([`decode`]) and writes split them again ([`encode`]).

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::store::Snapshot;
use crate::{AdapterError, Result};

/// Key the identifier is exposed under
pub const ID_FIELD: &str = "id";

/// A document as returned to resolvers
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Stored fields, never containing `id`
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == ID_FIELD {
            return None;
        }
        self.fields.get(field)
    }

    /// Flat mapping with `id` set to the store identifier.
    pub fn into_map(self) -> Map<String, Value> {
        let mut map = self.fields;
        map.insert(ID_FIELD.to_string(), Value::String(self.id));
        map
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.clone().into_map())
    }
}

/// Serializes flat, identifier first.
impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(ID_FIELD, &self.id)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Merge a snapshot into a [`Document`]. A stored field literally named `id`
/// is dropped; the store identifier wins.
pub fn decode(snapshot: Snapshot) -> Document {
    let Snapshot { id, mut data } = snapshot;
    if data.remove(ID_FIELD).is_some() {
        tracing::trace!(%id, "stored 'id' field shadowed by document identifier");
    }
    Document { id, fields: data }
}

/// Split a caller-supplied document into an optional explicit identifier and
/// the fields to persist. An empty `id` counts as absent.
pub fn encode(mut input: Map<String, Value>) -> Result<(Option<String>, Map<String, Value>)> {
    let id = match input.remove(ID_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            return Err(AdapterError::Validation(format!(
                "document id must be a string, got {other}"
            )))
        }
    };
    Ok((id, input))
}
