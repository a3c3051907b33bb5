//! Client-held cursor pagination
//!
//! The cursor is the list of page-boundary document ids the client has
//! already visited. The server keeps no pagination state: every paged call
//! receives the cursor, derives the next `start_after` refinement from it and
//! returns an updated cursor that the client resends verbatim.

use std::sync::Arc;

use async_graphql::{Enum, InputObject, SimpleObject};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::codec::{decode, Document};
use crate::store::{DocumentStore, Query};
use crate::{AdapterError, Result};

/// Page size used when the client does not ask for one
pub const DEFAULT_PAGE_SIZE: i32 = 20;

/// Which way to move from the current page
#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Back,
}

/// Opaque pagination state handed back and forth with the client
#[derive(SimpleObject, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageCursor {
    pub page_size: i32,

    pub direction: Direction,

    /// Last document id of each visited page, most recent last
    pub visited_boundary_ids: Vec<String>,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            direction: Direction::Forward,
            visited_boundary_ids: Vec::new(),
        }
    }
}

/// GraphQL input form of [`PageCursor`]. Omitted fields take the same
/// defaults as [`PageCursor::default`].
#[derive(InputObject, Debug, Clone, PartialEq)]
pub struct PageCursorInput {
    #[graphql(default_with = "DEFAULT_PAGE_SIZE")]
    pub page_size: i32,

    #[graphql(default)]
    pub direction: Direction,

    #[graphql(default)]
    pub visited_boundary_ids: Vec<String>,
}

impl From<PageCursorInput> for PageCursor {
    fn from(input: PageCursorInput) -> Self {
        Self {
            page_size: input.page_size,
            direction: input.direction,
            visited_boundary_ids: input.visited_boundary_ids,
        }
    }
}

impl PageCursor {
    pub fn forward(mut self) -> Self {
        self.direction = Direction::Forward;
        self
    }

    pub fn back(mut self) -> Self {
        self.direction = Direction::Back;
        self
    }

    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Validate the cursor
    pub fn validate(&self) -> Result<()> {
        if self.page_size <= 0 {
            return Err(AdapterError::Validation(
                "'pageSize' must be positive".to_string(),
            ));
        }
        if self.visited_boundary_ids.iter().any(String::is_empty) {
            return Err(AdapterError::Validation(
                "cursor contains an empty boundary id".to_string(),
            ));
        }
        Ok(())
    }

    /// Get limit for the store query
    pub fn limit(&self, max_page_size: usize) -> usize {
        usize::try_from(self.page_size)
            .unwrap_or(1)
            .clamp(1, max_page_size.max(1))
    }

    /// Encode to an opaque base64 string
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_string(self)
            .map_err(|e| AdapterError::Validation(format!("invalid cursor: {e}")))?;
        Ok(BASE64.encode(json.as_bytes()))
    }

    /// Decode from [`PageCursor::encode`] output
    pub fn decode(cursor: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(cursor.as_bytes())
            .map_err(|e| AdapterError::Validation(format!("invalid cursor: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AdapterError::Validation(format!("invalid cursor: {e}")))
    }
}

/// One page of documents plus the cursor for the next call
#[derive(Debug, Clone, Serialize)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub cursor: PageCursor,
}

/// Computes positional refinements from a [`PageCursor`] and runs paged reads.
#[derive(Clone)]
pub struct CursorPaginator {
    store: Arc<dyn DocumentStore>,
    max_page_size: usize,
}

impl CursorPaginator {
    pub fn new(store: Arc<dyn DocumentStore>, max_page_size: usize) -> Self {
        Self {
            store,
            max_page_size,
        }
    }

    /// Position `base` according to the cursor.
    ///
    /// Returns the refined query (without limit) and the cursor as it stands
    /// before the new page's boundary is recorded. Going back drops the two
    /// most recent boundaries: the current page's and the one it started after.
    pub async fn advance(&self, base: Query, cursor: PageCursor) -> Result<(Query, PageCursor)> {
        let mut cursor = cursor;

        if cursor.direction == Direction::Back {
            let keep = cursor.visited_boundary_ids.len().saturating_sub(2);
            cursor.visited_boundary_ids.truncate(keep);
        }

        let Some(boundary_id) = cursor.visited_boundary_ids.last() else {
            tracing::trace!(direction = ?cursor.direction, "first page, no positional refinement");
            return Ok((base, cursor));
        };

        let boundary = self
            .store
            .get(base.collection_name(), boundary_id)
            .await
            .map_err(|e| AdapterError::upstream("store.get boundary", e))?
            .ok_or_else(|| {
                AdapterError::NotFound(format!(
                    "boundary document '{boundary_id}' no longer exists"
                ))
            })?;
        tracing::trace!(boundary = %boundary.id, direction = ?cursor.direction, "resuming after boundary");

        Ok((base.start_after(boundary), cursor))
    }

    /// Run one paged read.
    ///
    /// An empty page is [`AdapterError::NotFound`] when the incoming cursor
    /// already had history (the client paged past the end); an empty first
    /// page is a normal, empty result.
    pub async fn fetch_page(&self, base: Query, cursor: PageCursor) -> Result<DocumentPage> {
        cursor.validate()?;
        let had_history = !cursor.visited_boundary_ids.is_empty();
        let limit = cursor.limit(self.max_page_size);

        let (query, mut cursor) = self.advance(base, cursor).await?;
        let query = query.limit(limit);
        let snapshots = self
            .store
            .run_query(&query)
            .await
            .map_err(|e| AdapterError::upstream("store.run_query", e))?;

        if snapshots.is_empty() && had_history {
            tracing::debug!(collection = %query.collection_name(), "paged past the end");
            return Err(AdapterError::NotFound("no more pages".to_string()));
        }

        if let Some(last) = snapshots.last() {
            cursor.visited_boundary_ids.push(last.id.clone());
        }
        tracing::debug!(
            collection = %query.collection_name(),
            returned = snapshots.len(),
            depth = cursor.visited_boundary_ids.len(),
            "page fetched"
        );

        Ok(DocumentPage {
            documents: snapshots.into_iter().map(decode).collect(),
            cursor,
        })
    }
}
