//! Password (ROPC) authentication driver.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::PasswordDriverConfig;
use crate::drivers::{AuthDriver, AuthOutcome, AuthRequest};
use crate::errors::OAuthError;
use crate::lockout::LockoutManager;
use crate::password_hash;
use crate::store::{DynStore, Filter, User};

pub struct PasswordDriver {
    config: PasswordDriverConfig,
    users: DynStore<User>,
    lockout: std::sync::Arc<LockoutManager>,
}

impl PasswordDriver {
    pub fn new(
        config: PasswordDriverConfig,
        users: DynStore<User>,
        lockout: std::sync::Arc<LockoutManager>,
    ) -> Self {
        Self {
            config,
            users,
            lockout,
        }
    }

    fn normalize(&self, identifier: &str) -> String {
        if self.config.case_insensitive_identifier {
            identifier.trim().to_lowercase()
        } else {
            identifier.trim().to_string()
        }
    }
}

#[async_trait]
impl AuthDriver for PasswordDriver {
    fn supported_grant_types(&self) -> &[&str] {
        &["password"]
    }

    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthOutcome, OAuthError> {
        let identifier = request
            .identifier
            .as_deref()
            .ok_or_else(|| OAuthError::invalid_request("missing identifier"))?;
        let password = request
            .password
            .as_deref()
            .ok_or_else(|| OAuthError::invalid_request("missing password"))?;

        let normalized = self.normalize(identifier);
        let mut filter: Filter = HashMap::new();
        filter.insert(self.config.identifier_field.clone(), normalized);
        if let Some(tenant) = &request.tenant_id {
            filter.insert("tenant_id".to_string(), tenant.clone());
        }

        let candidates = self
            .users
            .query(&filter)
            .await
            .map_err(|e| OAuthError::server(e.to_string()))?;
        let Some(user) = candidates.into_iter().next() else {
            return Err(OAuthError::invalid_credentials());
        };

        if self.lockout.is_locked(&user) {
            return Err(OAuthError::locked());
        }

        if user.password_hash.is_empty() {
            return Err(OAuthError::password_not_set());
        }

        if !password_hash::verify(password, &user.password_hash) {
            self.lockout.record_failure(&self.users, &user).await;
            return Err(OAuthError::invalid_credentials());
        }

        if !user.active {
            return Err(OAuthError::invalid_grant("account is not active"));
        }

        self.lockout.record_success(&self.users, &user).await;
        Ok(AuthOutcome::Success(user.sanitized()))
    }
}
