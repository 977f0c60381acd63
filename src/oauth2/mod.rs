//! OAuth2 / OIDC endpoint state machines (spec 4.10) composing the key
//! manager, token codec, scope policy, drivers, and abuse-control layer.

pub mod authorize;
pub mod discovery;
pub mod introspect;
pub mod register;
pub mod revoke;
pub mod router;
pub mod token;
pub mod userinfo;

use std::sync::Arc;

use crate::audit::AuditSink;
use crate::config::AuthServerConfig;
use crate::drivers::client_credentials::ClientAuthenticator;
use crate::drivers::DriverRegistry;
use crate::failban::FailbanManager;
use crate::keys::KeyManager;
use crate::lockout::LockoutManager;
use crate::ratelimit::RateLimiter;
use crate::store::{AuthorizationCode, Client, DynStore, RevokedTokenEntry, User};

/// Everything an OAuth2/OIDC endpoint handler needs, shared behind an
/// `Arc` and injected into axum via `Extension`.
pub struct AppState {
    pub config: AuthServerConfig,
    pub keys: Arc<KeyManager>,
    pub clients: DynStore<Client>,
    pub users: DynStore<User>,
    pub auth_codes: DynStore<AuthorizationCode>,
    pub revocations: DynStore<RevokedTokenEntry>,
    pub client_auth: ClientAuthenticator,
    pub drivers: DriverRegistry,
    pub lockout: Arc<LockoutManager>,
    pub failban: Arc<FailbanManager>,
    pub rate_limit_login: RateLimiter,
    pub rate_limit_token: RateLimiter,
    pub rate_limit_authorize: RateLimiter,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    pub async fn initialize_keys(&self) -> anyhow::Result<()> {
        self.keys.initialize().await
    }
}
