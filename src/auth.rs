//! GraphQL authentication middleware and context extraction
//!
//! Provides helpers for:
//! - Extracting the bearer token from the configured header
//! - Building the request's [`SessionContext`] once and injecting it
//! - Standard Axum handler for GraphQL endpoints with auth

use async_graphql::{Context, Request, Response, Schema, ServerError};
use axum::{extract::Extension, http::HeaderMap, Json};

use crate::config::AdapterConfig;
use crate::service::DocumentService;
use crate::session::SessionContext;
use crate::AdapterError;

/// Extract the bearer token from the configured header.
///
/// The scheme prefix is matched case-insensitively. A missing header, a
/// different scheme or an empty token all yield `None`.
pub fn extract_bearer_token(headers: &HeaderMap, config: &AdapterConfig) -> Option<String> {
    let value = headers
        .get(config.auth_header.as_str())
        .and_then(|v| v.to_str().ok())?
        .trim();

    let token = if config.token_scheme.is_empty() {
        value
    } else {
        let (scheme, rest) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case(&config.token_scheme) {
            return None;
        }
        rest.trim()
    };

    (!token.is_empty()).then(|| token.to_string())
}

/// Standard GraphQL handler with session injection
///
/// Verifies the caller's token once, then injects the resulting
/// [`SessionContext`] and the [`DocumentService`] into the request. A token
/// the provider rejects ends the request with an `UNAUTHENTICATED` error.
///
/// # Example
///
/// ```rust,no_run
/// use axum::{routing::post, Extension, Router};
/// use graphql_docstore_helpers::{graphql_handler, DocumentService};
/// use async_graphql::{EmptyMutation, EmptySubscription, Object, Schema};
///
/// struct Query;
///
/// #[Object]
/// impl Query {
///     async fn ping(&self) -> &str { "pong" }
/// }
///
/// # fn example(service: DocumentService) {
/// let schema = Schema::new(Query, EmptyMutation, EmptySubscription);
/// let app: Router = Router::new()
///     .route("/graphql", post(graphql_handler::<Query, EmptyMutation, EmptySubscription>))
///     .layer(Extension(schema))
///     .layer(Extension(service));
/// # }
/// ```
pub async fn graphql_handler<Query, Mutation, Subscription>(
    Extension(schema): Extension<Schema<Query, Mutation, Subscription>>,
    Extension(service): Extension<DocumentService>,
    headers: HeaderMap,
    req: Json<Request>,
) -> Json<Response>
where
    Query: async_graphql::ObjectType + 'static,
    Mutation: async_graphql::ObjectType + 'static,
    Subscription: async_graphql::SubscriptionType + 'static,
{
    let token = extract_bearer_token(&headers, service.config());

    let session =
        match SessionContext::initialize(service.clients().verifier.as_ref(), token.as_deref())
            .await
        {
            Ok(session) => session,
            Err(err) => return Json(error_response(&err)),
        };

    let request = req.0.data(session).data(service);
    let response = schema.execute(request).await;

    Json(response)
}

fn error_response(err: &AdapterError) -> Response {
    let mut error = ServerError::new(err.to_string(), None);
    let mut extensions = async_graphql::ErrorExtensionValues::default();
    extensions.set("code", err.code());
    error.extensions = Some(extensions);
    Response::from_errors(vec![error])
}

/// Get the request's session from GraphQL context
///
/// # Example
///
/// ```rust,no_run
/// use async_graphql::Context;
/// use graphql_docstore_helpers::auth::get_session;
///
/// fn resolver(ctx: &Context<'_>) -> bool {
///     get_session(ctx).is_authenticated()
/// }
/// ```
pub fn get_session(ctx: &Context<'_>) -> SessionContext {
    ctx.data_opt::<SessionContext>()
        .cloned()
        .unwrap_or_else(SessionContext::anonymous)
}

/// Get the [`DocumentService`] injected by [`graphql_handler`]
pub fn get_document_service<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a DocumentService> {
    ctx.data::<DocumentService>()
}
