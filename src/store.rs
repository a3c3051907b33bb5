//! Document store collaborator and query handles

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::{FilterOperator, SortDirection};

/// Store-side failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("write conflict on {collection}/{id}")]
    Conflict { collection: String, id: String },
}

/// A stored document as the store returns it: identifier and field data kept apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Snapshot {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// One query refinement. Order is significant.
#[derive(Debug, Clone, PartialEq)]
pub enum Refinement {
    OrderBy {
        field: String,
        direction: SortDirection,
    },
    Where {
        field: String,
        op: FilterOperator,
        value: Value,
    },
    /// Resume strictly after this document in the current ordering
    StartAfter(Snapshot),
    Limit(usize),
}

/// Collection handle with accumulated refinements.
///
/// Building a query never touches the store; hand it to
/// [`DocumentStore::run_query`] to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    refinements: Vec<Refinement>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            refinements: Vec::new(),
        }
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.refinements.push(Refinement::OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn where_field(mut self, field: impl Into<String>, op: FilterOperator, value: Value) -> Self {
        self.refinements.push(Refinement::Where {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn start_after(mut self, boundary: Snapshot) -> Self {
        self.refinements.push(Refinement::StartAfter(boundary));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.refinements.push(Refinement::Limit(n));
        self
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn refinements(&self) -> &[Refinement] {
        &self.refinements
    }
}

/// Document store operations the adapter relies on
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>, StoreError>;

    /// Insert with a store-assigned id; returns that id.
    async fn add(&self, collection: &str, fields: Map<String, Value>) -> Result<String, StoreError>;

    /// Write `fields` at `id`. With `merge` the existing fields not named in
    /// `fields` are kept; without it the document is replaced.
    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        merge: bool,
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn run_query(&self, query: &Query) -> Result<Vec<Snapshot>, StoreError>;
}
