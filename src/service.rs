//! Data operations exposed to resolvers
//!
//! Every method takes the request's [`SessionContext`] and checks the
//! authorization gate before any collaborator is called, so a denied
//! request never reads or writes anything.

use serde_json::{Map, Value};

use crate::claims::{normalize, ClaimSet};
use crate::clients::Clients;
use crate::codec::{decode, encode, Document};
use crate::config::AdapterConfig;
use crate::filter::{self, FilterSpec};
use crate::gate::{require, AccessLevel};
use crate::identity::{UserChanges, UserPage, UserRecord};
use crate::pagination::{CursorPaginator, DocumentPage, PageCursor};
use crate::session::{identity_failure, ActiveUser, SessionContext};
use crate::store::Query;
use crate::{AdapterError, Result};

/// Document and user operations over the shared clients
#[derive(Clone)]
pub struct DocumentService {
    clients: Clients,
    config: AdapterConfig,
    paginator: CursorPaginator,
}

impl DocumentService {
    pub fn new(clients: Clients, config: AdapterConfig) -> Self {
        let paginator = CursorPaginator::new(clients.store.clone(), config.max_page_size);
        Self {
            clients,
            config,
            paginator,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    /// Fetch one document; `None` when it does not exist.
    pub async fn get_document(
        &self,
        session: &SessionContext,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>> {
        require(session, &AccessLevel::Authenticated)?;
        non_empty("collection", collection)?;
        non_empty("id", id)?;

        let snapshot = self
            .clients
            .store
            .get(collection, id)
            .await
            .map_err(|e| AdapterError::upstream("store.get", e))?;
        Ok(snapshot.map(decode))
    }

    /// Create a document. With an `id` the document is written at that id,
    /// replacing anything there; otherwise the store assigns one.
    pub async fn add_document(
        &self,
        session: &SessionContext,
        collection: &str,
        document: Map<String, Value>,
    ) -> Result<Document> {
        require(session, &AccessLevel::Authenticated)?;
        non_empty("collection", collection)?;
        let (id, fields) = encode(document)?;

        let id = match id {
            Some(id) => {
                self.clients
                    .store
                    .set(collection, &id, fields.clone(), false)
                    .await
                    .map_err(|e| AdapterError::upstream("store.set", e))?;
                id
            }
            None => self
                .clients
                .store
                .add(collection, fields.clone())
                .await
                .map_err(|e| AdapterError::upstream("store.add", e))?,
        };
        tracing::debug!(%collection, %id, "document added");

        Ok(Document { id, fields })
    }

    /// Update an existing document addressed by its `id` field.
    ///
    /// With `merge` only the supplied fields change. Returns the stored
    /// document after the write.
    pub async fn update_document(
        &self,
        session: &SessionContext,
        collection: &str,
        document: Map<String, Value>,
        merge: bool,
    ) -> Result<Document> {
        require(session, &AccessLevel::Authenticated)?;
        non_empty("collection", collection)?;
        let (id, fields) = encode(document)?;
        let id = id.ok_or_else(|| AdapterError::Validation("update requires an 'id'".into()))?;

        let store = &self.clients.store;
        store
            .get(collection, &id)
            .await
            .map_err(|e| AdapterError::upstream("store.get", e))?
            .ok_or_else(|| AdapterError::NotFound(format!("{collection}/{id}")))?;
        store
            .set(collection, &id, fields, merge)
            .await
            .map_err(|e| AdapterError::upstream("store.set", e))?;

        let snapshot = store
            .get(collection, &id)
            .await
            .map_err(|e| AdapterError::upstream("store.get", e))?
            .ok_or_else(|| AdapterError::NotFound(format!("{collection}/{id}")))?;
        Ok(decode(snapshot))
    }

    /// Delete a document, returning its id.
    pub async fn delete_document(
        &self,
        session: &SessionContext,
        collection: &str,
        id: &str,
    ) -> Result<String> {
        require(session, &AccessLevel::Authenticated)?;
        non_empty("collection", collection)?;
        non_empty("id", id)?;

        self.clients
            .store
            .delete(collection, id)
            .await
            .map_err(|e| AdapterError::upstream("store.delete", e))?;
        tracing::debug!(%collection, %id, "document deleted");
        Ok(id.to_string())
    }

    /// Filtered, unpaged read. An empty result is a valid answer.
    pub async fn query_documents(
        &self,
        session: &SessionContext,
        collection: &str,
        spec: &FilterSpec,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        require(session, &AccessLevel::Authenticated)?;
        non_empty("collection", collection)?;

        let mut query = filter::build(Query::collection(collection), spec)?;
        if let Some(limit) = limit {
            if limit == 0 {
                return Err(AdapterError::Validation("'limit' must be positive".into()));
            }
            query = query.limit(limit);
        }

        let snapshots = self
            .clients
            .store
            .run_query(&query)
            .await
            .map_err(|e| AdapterError::upstream("store.run_query", e))?;
        Ok(snapshots.into_iter().map(decode).collect())
    }

    /// Filtered read of one page; see [`CursorPaginator::fetch_page`].
    pub async fn page_documents(
        &self,
        session: &SessionContext,
        collection: &str,
        spec: &FilterSpec,
        cursor: PageCursor,
    ) -> Result<DocumentPage> {
        require(session, &AccessLevel::Authenticated)?;
        non_empty("collection", collection)?;

        let base = filter::build(Query::collection(collection), spec)?;
        self.paginator.fetch_page(base, cursor).await
    }

    /// A fresh cursor using the configured default page size.
    pub fn first_page_cursor(&self) -> PageCursor {
        let page_size = i32::try_from(self.config.default_page_size).unwrap_or(i32::MAX);
        PageCursor::default().with_page_size(page_size)
    }

    pub async fn list_users(
        &self,
        session: &SessionContext,
        page_size: Option<usize>,
        page_token: Option<&str>,
    ) -> Result<UserPage> {
        require(session, &AccessLevel::AdminOnly)?;

        let page_size = page_size
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size.max(1));
        self.clients
            .admin
            .list_users(page_size, page_token.filter(|t| !t.is_empty()))
            .await
            .map_err(|e| identity_failure("list_users", e))
    }

    /// Update the profile of the user with `target_email`. Callers may update
    /// themselves; anyone else requires admin.
    pub async fn update_user(
        &self,
        session: &SessionContext,
        target_email: &str,
        changes: &UserChanges,
    ) -> Result<UserRecord> {
        require(session, &AccessLevel::SelfOrAdmin(target_email.to_string()))?;
        non_empty("email", target_email)?;
        if changes.is_empty() {
            return Err(AdapterError::Validation("no user fields to update".into()));
        }

        let uid = match session.user() {
            Some(me) if me.email.as_deref() == Some(target_email) => me.uid.clone(),
            _ => {
                self.clients
                    .admin
                    .get_user_by_email(target_email)
                    .await
                    .map_err(|e| identity_failure("get_user_by_email", e))?
                    .uid
            }
        };

        let user = self
            .clients
            .admin
            .update_user(&uid, changes)
            .await
            .map_err(|e| identity_failure("update_user", e))?;
        tracing::debug!(%uid, "user updated");
        Ok(user)
    }

    /// Replace a user's custom claims. Reserved names are dropped before the
    /// provider sees them.
    pub async fn set_custom_claims(
        &self,
        session: &SessionContext,
        uid: &str,
        claims: Map<String, Value>,
    ) -> Result<ClaimSet> {
        require(session, &AccessLevel::AdminOnly)?;
        non_empty("uid", uid)?;

        let claims = normalize(claims);
        self.clients
            .admin
            .set_custom_claims(uid, claims.as_map())
            .await
            .map_err(|e| identity_failure("set_custom_claims", e))?;
        tracing::info!(%uid, admin = claims.is_admin(), "custom claims updated");
        Ok(claims)
    }

    /// See [`SessionContext::refresh_token`].
    pub async fn refresh_token(&self, session: &SessionContext, token: &str) -> Result<ActiveUser> {
        session
            .refresh_token(
                self.clients.verifier.as_ref(),
                self.clients.admin.as_ref(),
                token,
            )
            .await
    }
}

fn non_empty(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AdapterError::Validation(format!("'{name}' cannot be empty")));
    }
    Ok(())
}
