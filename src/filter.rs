//! Declarative query filters
//!
//! A [`FilterSpec`] arrives from the resolver layer as comma-joined sort
//! specifications plus predicate triples. [`build`] turns it into an ordered
//! chain of refinements on a [`Query`]. Empty fields and operators are
//! defaults, not instructions, and are never forwarded to the store.

use std::fmt;
use std::str::FromStr;

use async_graphql::{InputObject, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Query;
use crate::{AdapterError, Result};

/// Ordering direction for one sort field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = AdapterError;

    /// Empty means ascending.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(AdapterError::Validation(format!(
                "unknown sort direction '{other}'"
            ))),
        }
    }
}

/// Comparison applied by a `where` refinement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    ArrayContains,
    ArrayContainsAny,
    In,
    NotIn,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 10] = [
        FilterOperator::Eq,
        FilterOperator::NotEq,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::ArrayContains,
        FilterOperator::ArrayContainsAny,
        FilterOperator::In,
        FilterOperator::NotIn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "==",
            FilterOperator::NotEq => "!=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::ArrayContains => "array-contains",
            FilterOperator::ArrayContainsAny => "array-contains-any",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not-in",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self> {
        let op = match s.trim() {
            "==" | "=" => FilterOperator::Eq,
            "!=" => FilterOperator::NotEq,
            "<" => FilterOperator::Lt,
            "<=" => FilterOperator::Lte,
            ">" => FilterOperator::Gt,
            ">=" => FilterOperator::Gte,
            "array-contains" => FilterOperator::ArrayContains,
            "array-contains-any" => FilterOperator::ArrayContainsAny,
            "in" => FilterOperator::In,
            "not-in" => FilterOperator::NotIn,
            other => {
                return Err(AdapterError::Validation(format!(
                    "unknown filter operator '{other}'"
                )))
            }
        };
        Ok(op)
    }
}

/// One `(field, operator, value)` triple
#[derive(InputObject, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    #[graphql(default)]
    #[serde(default)]
    pub field: String,

    #[graphql(default)]
    #[serde(default)]
    pub operator: String,

    #[serde(default = "null_value")]
    pub value: Json<Value>,
}

fn null_value() -> Json<Value> {
    Json(Value::Null)
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: Json(value),
        }
    }

    /// A predicate is only forwarded when field, operator and value are all present.
    pub fn is_complete(&self) -> bool {
        !self.field.trim().is_empty()
            && !self.operator.trim().is_empty()
            && !is_empty_value(&self.value.0)
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Filter and ordering for a collection read.
///
/// `order_by` and `sort_direction` are comma-joined and aligned by position,
/// e.g. `"lastName,age"` with `"asc,desc"`.
#[derive(InputObject, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSpec {
    #[graphql(default)]
    pub order_by: String,

    #[graphql(default)]
    pub sort_direction: String,

    #[graphql(default)]
    pub predicates: Vec<Predicate>,
}

impl FilterSpec {
    /// `(field, direction)` pairs in application order; a field without a
    /// direction sorts ascending.
    pub fn orderings(&self) -> Result<Vec<(String, SortDirection)>> {
        let mut directions = self.sort_direction.split(',');
        let mut orderings = Vec::new();

        for field in self.order_by.split(',') {
            let direction = directions.next().unwrap_or("");
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            orderings.push((field.to_string(), direction.parse()?));
        }

        Ok(orderings)
    }
}

/// Layer the filter's refinements onto `base`.
///
/// Orderings are applied first, left to right, then each complete predicate.
/// The query is not executed.
pub fn build(base: Query, spec: &FilterSpec) -> Result<Query> {
    let mut query = base;

    for (field, direction) in spec.orderings()? {
        query = query.order_by(field, direction);
    }

    for predicate in &spec.predicates {
        if !predicate.is_complete() {
            tracing::trace!(field = %predicate.field, "skipping incomplete predicate");
            continue;
        }
        let op: FilterOperator = predicate.operator.parse()?;
        query = query.where_field(predicate.field.trim(), op, predicate.value.0.clone());
    }

    Ok(query)
}
