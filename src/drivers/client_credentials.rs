//! Client-credentials authentication: client lookup plus constant-time (or
//! hash-verified) secret check, with multi-secret rotation support.
//!
//! This does not implement [`super::AuthDriver`] — it authenticates a
//! *client*, not a user, and runs ahead of grant dispatch for every grant
//! that requires client authentication (spec 4.10 step 2), not only the
//! `client_credentials` grant.

use std::collections::HashMap;

use subtle::ConstantTimeEq;

use crate::errors::OAuthError;
use crate::password_hash;
use crate::store::{Client, DynStore, Filter};

pub struct ClientAuthenticator {
    clients: DynStore<Client>,
}

impl ClientAuthenticator {
    pub fn new(clients: DynStore<Client>) -> Self {
        Self { clients }
    }

    pub async fn authenticate(&self, client_id: &str, client_secret: Option<&str>) -> Result<Client, OAuthError> {
        let mut filter: Filter = HashMap::new();
        filter.insert("client_id".to_string(), client_id.to_string());
        let candidates = self
            .clients
            .query(&filter)
            .await
            .map_err(|e| OAuthError::server(e.to_string()))?;
        let Some(client) = candidates.into_iter().next() else {
            return Err(OAuthError::invalid_client("unknown client"));
        };

        if !client.active {
            return Err(OAuthError::inactive_client());
        }

        if client.secrets.is_empty() {
            // Public client: no secret expected or checked.
            return Ok(client);
        }

        let Some(secret) = client_secret else {
            return Err(OAuthError::invalid_client("client secret required"));
        };
        if secret.is_empty() {
            return Err(OAuthError::invalid_client("empty client secret"));
        }

        let matches = client
            .secrets
            .iter()
            .any(|stored| secret_matches(secret, stored));
        if !matches {
            return Err(OAuthError::invalid_client("client secret mismatch"));
        }

        Ok(client)
    }
}

fn secret_matches(candidate: &str, stored: &str) -> bool {
    if stored.starts_with('$') || stored.starts_with("s3db$") {
        password_hash::verify(candidate, stored)
    } else {
        bool::from(candidate.as_bytes().ct_eq(stored.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_secret_is_constant_time_compared() {
        assert!(secret_matches("s3cret", "s3cret"));
        assert!(!secret_matches("s3cret", "other"));
    }

    #[test]
    fn hashed_secret_is_verified_through_argon2() {
        let hashed = crate::password_hash::hash("s3cret").unwrap();
        assert!(secret_matches("s3cret", &hashed));
        assert!(!secret_matches("wrong", &hashed));
    }

    #[test]
    fn s3db_prefixed_secret_is_routed_to_the_hashed_branch() {
        // A stored `s3db$...` digest must never be compared byte-for-byte
        // against the plaintext candidate, even if they happen to match.
        assert!(!secret_matches("s3db$abc", "s3db$abc"));
    }
}
