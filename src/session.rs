//! Per-request session context
//!
//! A [`SessionContext`] is built once when a request arrives and then read by
//! every operation of that request. It is never shared across requests.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::claims::{normalize, ClaimSet};
use crate::gate::{self, AccessLevel};
use crate::identity::{IdentityAdmin, IdentityError, IdentityVerifier, VerifiedIdentity};
use crate::{AdapterError, Result};

/// The authenticated caller of one request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub claims: ClaimSet,
    #[serde(skip_serializing)]
    pub token: String,
    /// Token expiry, read from `exp` before reserved claims are dropped
    pub expires_at: Option<DateTime<Utc>>,
}

impl ActiveUser {
    fn from_verified(identity: VerifiedIdentity, token: String) -> Self {
        let expires_at = expiry_of(&identity.claims);
        let VerifiedIdentity { user, claims } = identity;
        Self {
            uid: user.uid,
            email: user.email,
            display_name: user.display_name,
            claims: normalize(claims),
            token,
            expires_at,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.claims.is_admin()
    }
}

fn expiry_of(claims: &Map<String, Value>) -> Option<DateTime<Utc>> {
    let secs = claims.get("exp")?.as_i64()?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Request-scoped authentication state: one active user or none
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    user: Option<ActiveUser>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn with_user(user: ActiveUser) -> Self {
        Self { user: Some(user) }
    }

    /// Build the session for a request.
    ///
    /// No token yields an anonymous session. A token the provider rejects is
    /// an [`AdapterError::Authentication`]; any other provider failure is
    /// [`AdapterError::Upstream`].
    pub async fn initialize(verifier: &dyn IdentityVerifier, token: Option<&str>) -> Result<Self> {
        let Some(token) = token else {
            tracing::debug!("no bearer token, anonymous session");
            return Ok(Self::anonymous());
        };

        let identity = verifier
            .verify_token(token)
            .await
            .map_err(|e| identity_failure("verify_token", e))?;
        let user = ActiveUser::from_verified(identity, token.to_string());
        tracing::debug!(uid = %user.uid, admin = user.is_admin(), "session initialized");

        Ok(Self::with_user(user))
    }

    pub fn user(&self) -> Option<&ActiveUser> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Re-verify the session token and mint a replacement.
    ///
    /// `token` must be the token this session was built from.
    pub async fn refresh_token(
        &self,
        verifier: &dyn IdentityVerifier,
        admin: &dyn IdentityAdmin,
        token: &str,
    ) -> Result<ActiveUser> {
        gate::require(self, &AccessLevel::Authenticated)?;
        let current = self
            .user
            .as_ref()
            .ok_or_else(|| AdapterError::Authentication("no active session".into()))?;

        if current.token != token {
            tracing::warn!(uid = %current.uid, "refresh requested with a foreign token");
            return Err(AdapterError::TokenMismatch);
        }

        let identity = verifier
            .verify_token(token)
            .await
            .map_err(|e| identity_failure("verify_token", e))?;
        let refreshed = ActiveUser::from_verified(identity, token.to_string());

        let new_token = admin
            .issue_custom_token(&refreshed.uid, refreshed.claims.as_map())
            .await
            .map_err(|e| identity_failure("issue_custom_token", e))?;
        tracing::debug!(uid = %refreshed.uid, "token refreshed");

        Ok(ActiveUser {
            token: new_token,
            ..refreshed
        })
    }
}

pub(crate) fn identity_failure(context: &str, err: IdentityError) -> AdapterError {
    match err {
        IdentityError::InvalidToken(reason) => {
            tracing::warn!(%reason, "token verification failed");
            AdapterError::Authentication(reason)
        }
        IdentityError::UserNotFound(who) => AdapterError::NotFound(format!("user {who}")),
        other => AdapterError::upstream(context, other),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::identity::{UserChanges, UserPage, UserRecord};
    use async_trait::async_trait;
    use serde_json::json;

    pub(crate) fn user_with(uid: &str, email: &str, admin: bool) -> ActiveUser {
        let mut raw = Map::new();
        raw.insert("admin".into(), Value::Bool(admin));
        ActiveUser {
            uid: uid.into(),
            email: Some(email.into()),
            display_name: None,
            claims: normalize(raw),
            token: format!("token-{uid}"),
            expires_at: None,
        }
    }

    struct StaticProvider;

    #[async_trait]
    impl IdentityVerifier for StaticProvider {
        async fn verify_token(&self, token: &str) -> std::result::Result<VerifiedIdentity, IdentityError> {
            match token {
                "good" | "minted" => Ok(VerifiedIdentity {
                    user: UserRecord {
                        uid: "u1".into(),
                        email: Some("u1@example.com".into()),
                        display_name: Some("Una".into()),
                        disabled: false,
                    },
                    claims: json!({
                        "iss": "issuer",
                        "exp": 1_700_000_000,
                        "admin": "true",
                        "team": "core",
                    })
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
                }),
                "down" => Err(IdentityError::Unavailable("connection refused".into())),
                _ => Err(IdentityError::InvalidToken("signature mismatch".into())),
            }
        }
    }

    #[async_trait]
    impl IdentityAdmin for StaticProvider {
        async fn list_users(&self, _: usize, _: Option<&str>) -> std::result::Result<UserPage, IdentityError> {
            Ok(UserPage::default())
        }

        async fn get_user_by_email(&self, email: &str) -> std::result::Result<UserRecord, IdentityError> {
            Err(IdentityError::UserNotFound(email.into()))
        }

        async fn set_custom_claims(&self, _: &str, _: &Map<String, Value>) -> std::result::Result<(), IdentityError> {
            Ok(())
        }

        async fn update_user(&self, uid: &str, _: &UserChanges) -> std::result::Result<UserRecord, IdentityError> {
            Err(IdentityError::UserNotFound(uid.into()))
        }

        async fn issue_custom_token(&self, uid: &str, _: &Map<String, Value>) -> std::result::Result<String, IdentityError> {
            Ok(format!("minted-for-{uid}"))
        }
    }

    #[tokio::test]
    async fn test_no_token_is_anonymous() {
        let session = SessionContext::initialize(&StaticProvider, None).await.unwrap();
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_valid_token_builds_user() {
        let session = SessionContext::initialize(&StaticProvider, Some("good")).await.unwrap();
        let user = session.user().unwrap();
        assert_eq!(user.uid, "u1");
        assert!(user.is_admin());
        assert_eq!(user.claims.get("team"), Some(&json!("core")));
        assert!(user.claims.get("iss").is_none());
        assert_eq!(user.expires_at.map(|t| t.timestamp()), Some(1_700_000_000));
        assert_eq!(user.token, "good");
    }

    #[test]
    fn test_bad_token_is_authentication_error() {
        let err = tokio_test::block_on(SessionContext::initialize(&StaticProvider, Some("forged")))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Authentication(_)));
    }

    #[test]
    fn test_provider_outage_is_upstream() {
        let err = tokio_test::block_on(SessionContext::initialize(&StaticProvider, Some("down")))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_refresh_issues_new_token() {
        let session = SessionContext::initialize(&StaticProvider, Some("good")).await.unwrap();
        let refreshed = session
            .refresh_token(&StaticProvider, &StaticProvider, "good")
            .await
            .unwrap();
        assert_eq!(refreshed.token, "minted-for-u1");
        assert_eq!(refreshed.uid, "u1");
    }

    #[tokio::test]
    async fn test_refresh_rejects_foreign_token() {
        let session = SessionContext::initialize(&StaticProvider, Some("good")).await.unwrap();
        let err = session
            .refresh_token(&StaticProvider, &StaticProvider, "minted")
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::TokenMismatch));
    }

    #[tokio::test]
    async fn test_refresh_requires_session() {
        let err = SessionContext::anonymous()
            .refresh_token(&StaticProvider, &StaticProvider, "good")
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Authorization(_)));
    }
}
