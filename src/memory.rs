//! In-process document store
//!
//! Evaluates [`Query`] refinements the way a hosted document database does:
//! filters first, then ordering by the requested fields with the document id
//! as final tie-break, then `start_after` and `limit`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::filter::{FilterOperator, SortDirection};
use crate::store::{DocumentStore, Query, Refinement, Snapshot, StoreError};

type Collection = BTreeMap<String, Map<String, Value>>;

/// Thread-safe in-memory [`DocumentStore`]
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document; non-object values are stored as empty documents.
    pub async fn insert(&self, collection: &str, id: &str, data: Value) {
        let fields = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
    }

    pub async fn len(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Snapshot::new(id, data.clone())))
    }

    async fn add(&self, collection: &str, fields: Map<String, Value>) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        merge: bool,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.get_mut(id) {
            Some(existing) if merge => existing.extend(fields),
            _ => {
                docs.insert(id.to_string(), fields);
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<Snapshot>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(query.collection_name()) else {
            return Ok(Vec::new());
        };

        let mut orderings: Vec<(&str, SortDirection)> = Vec::new();
        let mut filters = Vec::new();
        let mut start_after = None;
        let mut limit = None;
        for refinement in query.refinements() {
            match refinement {
                Refinement::OrderBy { field, direction } => orderings.push((field.as_str(), *direction)),
                Refinement::Where { field, op, value } => filters.push((field, *op, value)),
                Refinement::StartAfter(boundary) => start_after = Some(boundary),
                Refinement::Limit(n) => limit = Some(*n),
            }
        }

        let mut matched: Vec<Snapshot> = docs
            .iter()
            // ordering on a field implies the field exists
            .filter(|(_, data)| orderings.iter().all(|(field, _)| data.contains_key(*field)))
            .filter(|(_, data)| {
                filters
                    .iter()
                    .all(|(field, op, value)| matches_filter(data.get(field.as_str()), *op, value))
            })
            .map(|(id, data)| Snapshot::new(id.clone(), data.clone()))
            .collect();

        matched.sort_by(|a, b| compare_snapshots(a, b, &orderings));

        if let Some(boundary) = start_after {
            matched.retain(|s| compare_snapshots(s, boundary, &orderings) == Ordering::Greater);
        }
        if let Some(n) = limit {
            matched.truncate(n);
        }

        Ok(matched)
    }
}

fn compare_snapshots(a: &Snapshot, b: &Snapshot, orderings: &[(&str, SortDirection)]) -> Ordering {
    for (field, direction) in orderings {
        let ord = compare_optional(a.data.get(*field), b.data.get(*field));
        let ord = match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.id.cmp(&b.id)
}

fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_values(a, b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order: null < bool < number < string < array < object.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(x, y)| compare_values(x, y))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y)
            .map(|((kx, vx), (ky, vy))| kx.cmp(ky).then_with(|| compare_values(vx, vy)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

fn matches_filter(field: Option<&Value>, op: FilterOperator, expected: &Value) -> bool {
    let Some(actual) = field else {
        return false;
    };
    // range comparisons never cross value types
    let comparable = type_rank(actual) == type_rank(expected);
    match op {
        FilterOperator::Eq => values_equal(actual, expected),
        FilterOperator::NotEq => !values_equal(actual, expected),
        FilterOperator::Lt => comparable && compare_values(actual, expected) == Ordering::Less,
        FilterOperator::Lte => comparable && compare_values(actual, expected) != Ordering::Greater,
        FilterOperator::Gt => comparable && compare_values(actual, expected) == Ordering::Greater,
        FilterOperator::Gte => comparable && compare_values(actual, expected) != Ordering::Less,
        FilterOperator::ArrayContains => actual
            .as_array()
            .is_some_and(|items| items.iter().any(|v| values_equal(v, expected))),
        FilterOperator::ArrayContainsAny => match (actual.as_array(), expected.as_array()) {
            (Some(items), Some(wanted)) => items
                .iter()
                .any(|v| wanted.iter().any(|w| values_equal(v, w))),
            _ => false,
        },
        FilterOperator::In => expected
            .as_array()
            .is_some_and(|wanted| wanted.iter().any(|w| values_equal(actual, w))),
        FilterOperator::NotIn => expected
            .as_array()
            .is_some_and(|wanted| !wanted.iter().any(|w| values_equal(actual, w))),
    }
}
