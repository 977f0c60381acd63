//! Embeddable OAuth 2.0 + OpenID Connect authorization server core.
//!
//! [`bootstrap`] wires the configuration, key manager, record stores, and
//! abuse-control layer into an [`oauth2::AppState`] and an axum [`Router`],
//! for hosts that want the HTTP surface as-is. Embedders who need their own
//! persistence swap in a [`store::Store`] implementation before calling
//! [`bootstrap`]; everything else here is reusable as a library.

pub mod audit;
pub mod config;
pub mod drivers;
pub mod errors;
pub mod failban;
pub mod health;
pub mod keys;
pub mod lockout;
pub mod oauth2;
pub mod password_hash;
pub mod ratelimit;
pub mod scope;
pub mod state;
pub mod store;
pub mod token;

use std::sync::Arc;

use axum::Router;

use crate::audit::{AuditSink, TracingAuditSink};
use crate::config::AuthServerConfig;
use crate::drivers::client_credentials::ClientAuthenticator;
use crate::drivers::password::PasswordDriver;
use crate::drivers::DriverRegistry;
use crate::failban::{FailbanManager, NullGeoResolver};
use crate::keys::KeyManager;
use crate::lockout::LockoutManager;
use crate::oauth2::AppState;
use crate::ratelimit::RateLimiter;
use crate::state::{ApplicationState, LifecycleState, SharedLifecycle};
use crate::store::{AuthorizationCode, Client, InMemoryStore, RevokedTokenEntry, User};

/// Everything [`bootstrap`] produces: the router to serve, the shared state
/// behind it (for tests or admin tooling that need direct store access),
/// and the lifecycle tracker driving `/livez` and `/readyz`.
pub struct AuthServer {
    pub router: Router,
    pub state: Arc<AppState>,
    pub lifecycle: SharedLifecycle,
}

/// Build a ready-to-serve [`AuthServer`] from configuration, using the
/// in-memory record stores and the built-in password driver. Embedders
/// needing a persistent store or additional [`drivers::AuthDriver`]s should
/// construct [`AppState`] directly instead of going through this helper.
pub async fn bootstrap(config: AuthServerConfig) -> anyhow::Result<AuthServer> {
    let lifecycle: SharedLifecycle = Arc::new(LifecycleState::default());
    lifecycle.set_state(ApplicationState::Initializing);

    let keys = Arc::new(KeyManager::new(config.keys.purpose.clone()));
    keys.initialize().await?;

    let clients: crate::store::DynStore<Client> = Arc::new(InMemoryStore::new());
    let users: crate::store::DynStore<User> = Arc::new(InMemoryStore::new());
    let auth_codes: crate::store::DynStore<AuthorizationCode> = Arc::new(InMemoryStore::new());
    let revocations: crate::store::DynStore<RevokedTokenEntry> = Arc::new(InMemoryStore::new());

    let lockout = Arc::new(LockoutManager::new(config.lockout.clone()));
    let failban = Arc::new(FailbanManager::new(
        config.failban.clone(),
        Box::new(NullGeoResolver),
    ));

    let mut drivers = DriverRegistry::new();
    if config.password_driver.enabled {
        drivers.register(Arc::new(PasswordDriver::new(
            config.password_driver.clone(),
            users.clone(),
            lockout.clone(),
        )))?;
    }

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);

    lifecycle.set_state(ApplicationState::StartingNetwork);

    let state = Arc::new(AppState {
        rate_limit_login: RateLimiter::new(config.rate_limit.login.clone()),
        rate_limit_token: RateLimiter::new(config.rate_limit.token.clone()),
        rate_limit_authorize: RateLimiter::new(config.rate_limit.authorize.clone()),
        client_auth: ClientAuthenticator::new(clients.clone()),
        config,
        keys,
        clients,
        users,
        auth_codes,
        revocations,
        drivers,
        lockout,
        failban,
        audit,
    });

    let router = oauth2::router::router(state.clone(), lifecycle.clone());
    lifecycle.set_state(ApplicationState::Ready);

    Ok(AuthServer {
        router,
        state,
        lifecycle,
    })
}
