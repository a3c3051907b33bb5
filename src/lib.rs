//! # graphql-docstore-helpers
//!
//! Data-access helpers that sit between a GraphQL resolver layer and a
//! document store, with identity verification delegated to an external
//! provider.
//!
//! ## Features
//!
//! - **Claim Normalization** - strip reserved token claims, coerce boolean literals
//! - **Session Context** - one authenticated caller (or none) per request
//! - **Authorization Gate** - authenticated / admin-only / self-or-admin checks
//! - **Query Filters** - comma-joined sort specs and predicate triples to query refinements
//! - **Cursor Pagination** - client-held boundary-id cursors, forward and back
//! - **Document Codec** - flat `{id, ...fields}` documents over store snapshots
//! - **Auth Middleware** - bearer-token extraction and session injection for GraphQL handlers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use graphql_docstore_helpers::{AdapterConfig, DocumentService, FilterSpec, PageCursor};
//! # async fn example(
//! #     service: DocumentService,
//! #     session: graphql_docstore_helpers::SessionContext,
//! # ) -> graphql_docstore_helpers::Result<()> {
//! let filter = FilterSpec {
//!     order_by: "age".into(),
//!     sort_direction: "desc".into(),
//!     ..FilterSpec::default()
//! };
//! let page = service
//!     .page_documents(&session, "people", &filter, PageCursor::default())
//!     .await?;
//! // Hand `page.cursor` back to the client; it resends it verbatim for the next page.
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod claims;
pub mod clients;
pub mod codec;
pub mod config;
pub mod filter;
pub mod gate;
pub mod identity;
pub mod memory;
pub mod pagination;
pub mod service;
pub mod session;
pub mod store;

pub use auth::{extract_bearer_token, get_document_service, get_session, graphql_handler};
pub use claims::{normalize, ClaimSet, ADMIN_CLAIM, RESERVED_CLAIMS};
pub use clients::{ClientRegistry, Clients};
pub use codec::{decode, encode, Document};
pub use config::AdapterConfig;
pub use filter::{FilterOperator, FilterSpec, Predicate, SortDirection};
pub use gate::{AccessLevel, Decision, DenyReason};
pub use identity::{
    IdentityAdmin, IdentityError, IdentityVerifier, UserChanges, UserPage, UserRecord,
    VerifiedIdentity,
};
pub use memory::InMemoryStore;
pub use pagination::{CursorPaginator, Direction, DocumentPage, PageCursor, PageCursorInput};
pub use service::DocumentService;
pub use session::{ActiveUser, SessionContext};
pub use store::{DocumentStore, Query, Refinement, Snapshot, StoreError};

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// Boxed cause carried by [`AdapterError::Upstream`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Adapter errors
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not authorized: {0}")]
    Authorization(DenyReason),

    #[error("Supplied token does not match the active session")]
    TokenMismatch,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Upstream failure during {context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl AdapterError {
    /// Wrap a collaborator failure, keeping the original cause.
    pub fn upstream(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        let context = context.into();
        let source = source.into();
        tracing::error!(%context, error = %source, "upstream call failed");
        AdapterError::Upstream { context, source }
    }

    /// Stable machine-readable code exposed as a GraphQL error extension.
    pub fn code(&self) -> &'static str {
        match self {
            AdapterError::Authentication(_) => "UNAUTHENTICATED",
            AdapterError::Authorization(_) => "FORBIDDEN",
            AdapterError::TokenMismatch => "TOKEN_MISMATCH",
            AdapterError::NotFound(_) => "NOT_FOUND",
            AdapterError::Validation(_) => "BAD_USER_INPUT",
            AdapterError::Upstream { .. } => "UPSTREAM",
        }
    }
}

impl ErrorExtensions for AdapterError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| {
            e.set("code", self.code());
            if let AdapterError::Authorization(reason) = self {
                e.set("reason", reason.as_str());
            }
        })
    }
}

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;
