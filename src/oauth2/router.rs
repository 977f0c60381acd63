//! Axum route wiring mapping the HTTP surface (spec 6) onto the handlers in
//! this module. Header/cookie extraction happens in the handlers
//! themselves; this file only does routing.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{authorize, discovery, introspect, register, revoke, token, userinfo, AppState};
use crate::health;
use crate::state::SharedLifecycle;

pub fn router(state: Arc<AppState>, lifecycle: SharedLifecycle) -> Router {
    Router::new()
        .route("/.well-known/openid-configuration", get(discovery::discovery))
        .route("/.well-known/jwks.json", get(discovery::jwks))
        .route(
            "/oauth/authorize",
            get(authorize::authorize_get).post(authorize::authorize_post),
        )
        .route("/oauth/token", post(token::token_endpoint))
        .route("/oauth/userinfo", get(userinfo::userinfo))
        .route("/oauth/introspect", post(introspect::introspect))
        .route("/oauth/revoke", post(revoke::revoke_endpoint))
        .route("/oauth/register", post(register::register))
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .layer(TraceLayer::new_for_http())
        // Token/discovery endpoints are meant to be called from browser-based
        // clients on other origins; CORS is permissive, authentication still
        // gates every non-public endpoint.
        .layer(CorsLayer::permissive())
        .layer(axum::extract::Extension(state))
        .layer(axum::extract::Extension(lifecycle))
}
