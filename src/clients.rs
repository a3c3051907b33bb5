//! Shared collaborator handles
//!
//! Built once per process and passed explicitly to whatever needs them.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::identity::{IdentityAdmin, IdentityVerifier};
use crate::store::DocumentStore;

/// Handles to the document store and identity provider
#[derive(Clone)]
pub struct Clients {
    pub store: Arc<dyn DocumentStore>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub admin: Arc<dyn IdentityAdmin>,
}

impl Clients {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        verifier: Arc<dyn IdentityVerifier>,
        admin: Arc<dyn IdentityAdmin>,
    ) -> Self {
        Self {
            store,
            verifier,
            admin,
        }
    }
}

/// Idempotent initializer for [`Clients`]
#[derive(Default)]
pub struct ClientRegistry {
    cell: OnceCell<Clients>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handles, running `init` only if nothing was built yet.
    ///
    /// Concurrent callers wait for the first initialization instead of
    /// starting their own.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Clients
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Clients>,
    {
        self.cell
            .get_or_init(|| async {
                tracing::info!("initializing document store and identity clients");
                init().await
            })
            .await
            .clone()
    }

    /// Like [`ClientRegistry::get_or_init`] for fallible initialization.
    /// A failed attempt leaves the registry empty.
    pub async fn get_or_try_init<F, Fut, E>(&self, init: F) -> Result<Clients, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Clients, E>>,
    {
        self.cell.get_or_try_init(init).await.cloned()
    }

    pub fn get(&self) -> Option<Clients> {
        self.cell.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdentityError, UserChanges, UserPage, UserRecord, VerifiedIdentity};
    use crate::memory::InMemoryStore;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoProvider;

    #[async_trait]
    impl IdentityVerifier for NoProvider {
        async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
            Err(IdentityError::InvalidToken(token.to_string()))
        }
    }

    #[async_trait]
    impl IdentityAdmin for NoProvider {
        async fn list_users(&self, _: usize, _: Option<&str>) -> Result<UserPage, IdentityError> {
            Ok(UserPage::default())
        }
        async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, IdentityError> {
            Err(IdentityError::UserNotFound(email.to_string()))
        }
        async fn set_custom_claims(&self, _: &str, _: &Map<String, Value>) -> Result<(), IdentityError> {
            Ok(())
        }
        async fn update_user(&self, uid: &str, _: &UserChanges) -> Result<UserRecord, IdentityError> {
            Err(IdentityError::UserNotFound(uid.to_string()))
        }
        async fn issue_custom_token(&self, _: &str, _: &Map<String, Value>) -> Result<String, IdentityError> {
            Ok(String::new())
        }
    }

    fn build() -> Clients {
        let provider = Arc::new(NoProvider);
        Clients::new(Arc::new(InMemoryStore::new()), provider.clone(), provider)
    }

    #[tokio::test]
    async fn test_initializes_once() {
        let registry = ClientRegistry::new();
        let calls = AtomicUsize::new(0);

        assert!(registry.get().is_none());
        let first = registry
            .get_or_init(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                build()
            })
            .await;
        let second = registry
            .get_or_init(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                build()
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first.store, &second.store));
        assert!(registry.is_initialized());
    }

    #[tokio::test]
    async fn test_failed_init_can_retry() {
        let registry = ClientRegistry::new();
        let failed: Result<Clients, &str> = registry.get_or_try_init(|| async { Err("no credentials") }).await;
        assert!(failed.is_err());
        assert!(!registry.is_initialized());

        let ok: Result<Clients, &str> = registry.get_or_try_init(|| async { Ok(build()) }).await;
        assert!(ok.is_ok());
    }
}
