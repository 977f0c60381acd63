//! Pluggable authentication drivers.
//!
//! The source material this crate generalizes from allows a driver to be
//! registered as a class instance, a constructor, a constructor+options
//! tuple, or any duck-typed object exposing the right methods. That
//! menagerie collapses here to one trait object: registration only ever
//! accepts a value that already implements [`AuthDriver`].

pub mod client_credentials;
pub mod password;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::OAuthError;
use crate::store::User;

/// Outcome of a driver's authentication attempt, generic over what was
/// authenticated (a [`User`] for password, nothing extra for client
/// credentials — the client is already resolved by the registry's own
/// client-credentials check before `authenticate` is even called for other
/// grants).
pub enum AuthOutcome {
    Success(User),
    MfaRequired,
}

#[async_trait]
pub trait AuthDriver: Send + Sync {
    /// Grant types this driver can service, e.g. `["password"]`.
    fn supported_grant_types(&self) -> &[&str];

    fn supports_grant(&self, grant_type: &str) -> bool {
        self.supported_grant_types().contains(&grant_type)
    }

    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthOutcome, OAuthError>;
}

/// A normalized view over a token-endpoint request body, enough for any
/// built-in or custom driver to authenticate against.
#[derive(Debug, Default, Clone)]
pub struct AuthRequest {
    pub identifier: Option<String>,
    pub password: Option<String>,
    pub tenant_id: Option<String>,
    pub params: HashMap<String, String>,
}

/// Registers at most one driver per grant type; duplicate registration is a
/// configuration-time error (spec 4.4).
#[derive(Default)]
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn AuthDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, driver: Arc<dyn AuthDriver>) -> anyhow::Result<()> {
        for grant in driver.supported_grant_types() {
            if self.find(grant).is_some() {
                return Err(anyhow::anyhow!(
                    "duplicate driver registration for grant type '{grant}'"
                ));
            }
        }
        self.drivers.push(driver);
        Ok(())
    }

    pub fn find(&self, grant_type: &str) -> Option<Arc<dyn AuthDriver>> {
        self.drivers
            .iter()
            .find(|d| d.supports_grant(grant_type))
            .cloned()
    }
}
