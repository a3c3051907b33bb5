//! Identity provider collaborators
//!
//! Token verification and user administration are delegated to an external
//! provider. These traits are the seams; the adapter never verifies a
//! signature itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::BoxError;

/// Provider-side failures
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Token is malformed, expired, revoked or signed by someone else
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(#[source] BoxError),
}

/// User record as the provider stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, async_graphql::SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// Result of a successful token verification
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub user: UserRecord,
    /// Every claim carried by the token, reserved ones included
    pub claims: Map<String, Value>,
}

/// One page of provider users
#[derive(Debug, Clone, Default, Serialize, Deserialize, async_graphql::SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub users: Vec<UserRecord>,
    pub next_page_token: Option<String>,
}

/// Profile fields to change; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, async_graphql::InputObject)]
#[serde(rename_all = "camelCase")]
pub struct UserChanges {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub disabled: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.display_name.is_none() && self.disabled.is_none()
    }
}

/// Verifies bearer tokens
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token` and return the user it belongs to with its raw claims.
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Privileged user management
#[async_trait]
pub trait IdentityAdmin: Send + Sync {
    async fn list_users(
        &self,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<UserPage, IdentityError>;

    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, IdentityError>;

    async fn set_custom_claims(
        &self,
        uid: &str,
        claims: &Map<String, Value>,
    ) -> Result<(), IdentityError>;

    async fn update_user(
        &self,
        uid: &str,
        changes: &UserChanges,
    ) -> Result<UserRecord, IdentityError>;

    /// Mint a fresh token for `uid` carrying `claims`.
    async fn issue_custom_token(
        &self,
        uid: &str,
        claims: &Map<String, Value>,
    ) -> Result<String, IdentityError>;
}
