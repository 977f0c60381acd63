//! Record-store abstraction and the domain records the authorization core
//! reads and writes through it.
//!
//! The store itself is an external collaborator (a database, a remote
//! service, anything offering the five operations below). This module
//! defines the trait the core depends on and ships an in-memory
//! implementation good enough to embed without bringing your own store, and
//! to drive the integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A minimal filter: field name -> expected string value. Good enough for
/// the lookups the core needs (`client_id`, `email`, `tenant_id`, ...).
pub type Filter = HashMap<String, String>;

/// Generic record-store contract: insert/get/update/delete/query/list.
#[async_trait]
pub trait Store<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    async fn insert(&self, record: T) -> Result<T, StoreError>;
    async fn get(&self, id: &str) -> Result<Option<T>, StoreError>;
    async fn update(&self, id: &str, record: T) -> Result<T, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
    async fn query(&self, filter: &Filter) -> Result<Vec<T>, StoreError>;
    async fn list(&self, limit: Option<usize>) -> Result<Vec<T>, StoreError>;
}

/// An item storable in the in-memory reference store must expose its own
/// identifier and a way to be matched against a simple field filter.
pub trait Identified {
    fn id(&self) -> String;
    /// Returns the string value of `field` on this record, if it has one.
    fn field(&self, field: &str) -> Option<String>;
}

/// In-memory `Store` implementation backed by a sharded map.
///
/// Used as the default store for embedders who don't bring their own, and
/// by the integration tests.
pub struct InMemoryStore<T> {
    records: DashMap<String, T>,
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl<T> InMemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<T> Store<T> for InMemoryStore<T>
where
    T: Clone + Send + Sync + Identified + 'static,
{
    async fn insert(&self, record: T) -> Result<T, StoreError> {
        let id = record.id();
        self.records.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        Ok(self.records.get(id).map(|r| r.clone()))
    }

    async fn update(&self, id: &str, record: T) -> Result<T, StoreError> {
        if !self.records.contains_key(id) {
            return Err(StoreError::NotFound);
        }
        self.records.insert(id.to_string(), record.clone());
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.records.remove(id);
        Ok(())
    }

    async fn query(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        let matches = self
            .records
            .iter()
            .filter(|entry| {
                filter
                    .iter()
                    .all(|(k, v)| entry.value().field(k).as_deref() == Some(v.as_str()))
            })
            .map(|entry| entry.value().clone())
            .collect();
        Ok(matches)
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<T>, StoreError> {
        let mut all: Vec<T> = self.records.iter().map(|e| e.value().clone()).collect();
        if let Some(limit) = limit {
            all.truncate(limit);
        }
        Ok(all)
    }
}

pub type DynStore<T> = Arc<dyn Store<T>>;

// ---------------------------------------------------------------------
// Domain records
// ---------------------------------------------------------------------

/// An OAuth2 client application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub client_id: String,
    /// Secrets: plaintext entries compared constant-time, `$argon2`-prefixed
    /// entries verified through the password hasher. Supports rotation.
    pub secrets: Vec<String>,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
    pub require_pkce: bool,
    pub active: bool,
    pub tenant_id: Option<String>,
}

impl Identified for Client {
    fn id(&self) -> String {
        self.client_id.clone()
    }
    fn field(&self, field: &str) -> Option<String> {
        match field {
            "client_id" => Some(self.client_id.clone()),
            "tenant_id" => self.tenant_id.clone(),
            _ => None,
        }
    }
}

impl Client {
    pub fn supports_grant_type(&self, grant: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant)
    }

    pub fn is_confidential(&self) -> bool {
        !self.secrets.is_empty()
    }
}

/// An end-user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Argon2id hash, or empty when the user cannot authenticate by password.
    pub password_hash: String,
    pub email_verified: bool,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub nickname: Option<String>,
    pub picture: Option<String>,
    pub locale: Option<String>,
    pub scopes: Vec<String>,
    pub roles: Vec<String>,
    pub tenant_id: Option<String>,
    pub active: bool,
    pub failed_attempts: u32,
    pub locked_until: Option<i64>,
}

impl Identified for User {
    fn id(&self) -> String {
        self.id.clone()
    }
    fn field(&self, field: &str) -> Option<String> {
        match field {
            "id" => Some(self.id.clone()),
            "email" => Some(self.email.clone()),
            "tenant_id" => self.tenant_id.clone(),
            _ => None,
        }
    }
}

impl User {
    /// A copy of this record safe to hand back to a caller: secrets stripped.
    pub fn sanitized(&self) -> Self {
        let mut u = self.clone();
        u.password_hash = String::new();
        u
    }
}

/// A one-shot authorization code minted by the authorize endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
    pub expires_at: i64,
    pub used: bool,
}

impl Identified for AuthorizationCode {
    fn id(&self) -> String {
        self.code.clone()
    }
    fn field(&self, field: &str) -> Option<String> {
        match field {
            "code" => Some(self.code.clone()),
            "client_id" => Some(self.client_id.clone()),
            _ => None,
        }
    }
}

/// A revoked/consumed token, tracked so `verify_token` can reject it even
/// though its signature still validates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedTokenEntry {
    pub jti: String,
    pub expires_at: i64,
}

impl Identified for RevokedTokenEntry {
    fn id(&self) -> String {
        self.jti.clone()
    }
    fn field(&self, field: &str) -> Option<String> {
        match field {
            "jti" => Some(self.jti.clone()),
            _ => None,
        }
    }
}
