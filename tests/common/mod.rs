//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use graphql_docstore_helpers::{
    AdapterConfig, Clients, DocumentService, IdentityAdmin, IdentityError, IdentityVerifier,
    InMemoryStore, SessionContext, UserChanges, UserPage, UserRecord, VerifiedIdentity,
};
use serde_json::{json, Map, Value};

/// Identity provider that knows a fixed set of tokens
#[derive(Default)]
pub struct FakeIdentity {
    users: Mutex<HashMap<String, (UserRecord, Map<String, Value>)>>,
    pub claim_writes: Mutex<Vec<(String, Map<String, Value>)>>,
    pub calls: Mutex<usize>,
}

impl FakeIdentity {
    pub fn with_user(self, token: &str, uid: &str, email: &str, admin: bool) -> Self {
        let user = UserRecord {
            uid: uid.to_string(),
            email: Some(email.to_string()),
            display_name: None,
            disabled: false,
        };
        let admin_claim = if admin { "true" } else { "false" };
        let claims = obj(json!({
            "iss": "https://securetoken.example/project",
            "aud": "project",
            "sub": uid,
            "user_id": uid,
            "iat": 1_700_000_000,
            "exp": 1_700_003_600,
            "admin": admin_claim,
        }));
        self.users
            .lock()
            .unwrap()
            .insert(token.to_string(), (user, claims));
        self
    }

    fn record(&self) {
        *self.calls.lock().unwrap() += 1;
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl IdentityVerifier for FakeIdentity {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        self.record();
        let users = self.users.lock().unwrap();
        let (user, claims) = users
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::InvalidToken("unknown token".into()))?;
        Ok(VerifiedIdentity { user, claims })
    }
}

#[async_trait]
impl IdentityAdmin for FakeIdentity {
    async fn list_users(
        &self,
        page_size: usize,
        _page_token: Option<&str>,
    ) -> Result<UserPage, IdentityError> {
        self.record();
        let users = self.users.lock().unwrap();
        let mut records: Vec<UserRecord> = users.values().map(|(u, _)| u.clone()).collect();
        records.sort_by(|a, b| a.uid.cmp(&b.uid));
        records.truncate(page_size);
        Ok(UserPage {
            users: records,
            next_page_token: None,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, IdentityError> {
        self.record();
        let users = self.users.lock().unwrap();
        users
            .values()
            .map(|(u, _)| u)
            .find(|u| u.email.as_deref() == Some(email))
            .cloned()
            .ok_or_else(|| IdentityError::UserNotFound(email.to_string()))
    }

    async fn set_custom_claims(
        &self,
        uid: &str,
        claims: &Map<String, Value>,
    ) -> Result<(), IdentityError> {
        self.record();
        self.claim_writes
            .lock()
            .unwrap()
            .push((uid.to_string(), claims.clone()));
        Ok(())
    }

    async fn update_user(
        &self,
        uid: &str,
        changes: &UserChanges,
    ) -> Result<UserRecord, IdentityError> {
        self.record();
        let mut users = self.users.lock().unwrap();
        let (user, _) = users
            .values_mut()
            .find(|(u, _)| u.uid == uid)
            .ok_or_else(|| IdentityError::UserNotFound(uid.to_string()))?;
        if let Some(email) = &changes.email {
            user.email = Some(email.clone());
        }
        if let Some(name) = &changes.display_name {
            user.display_name = Some(name.clone());
        }
        if let Some(disabled) = changes.disabled {
            user.disabled = disabled;
        }
        Ok(user.clone())
    }

    async fn issue_custom_token(
        &self,
        uid: &str,
        _claims: &Map<String, Value>,
    ) -> Result<String, IdentityError> {
        self.record();
        Ok(format!("fresh-{uid}"))
    }
}

pub fn obj(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub identity: Arc<FakeIdentity>,
    pub service: DocumentService,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let identity = Arc::new(
            FakeIdentity::default()
                .with_user("alice-token", "alice", "alice@example.com", false)
                .with_user("root-token", "root", "root@example.com", true),
        );
        let clients = Clients::new(store.clone(), identity.clone(), identity.clone());
        let service = DocumentService::new(clients, AdapterConfig::default());
        Self {
            store,
            identity,
            service,
        }
    }

    pub async fn session(&self, token: Option<&str>) -> SessionContext {
        SessionContext::initialize(self.identity.as_ref(), token)
            .await
            .expect("session")
    }
}
