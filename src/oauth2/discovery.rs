//! `/.well-known/openid-configuration` and `/.well-known/jwks.json`.

use std::sync::Arc;

use axum::Json;
use axum::extract::Extension;
use serde_json::json;

use super::AppState;

pub async fn discovery(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let issuer = state.config.issuer.trim_end_matches('/');
    let code_challenge_methods = if state.config.pkce.enabled {
        json!(["S256", "plain"])
    } else {
        json!([])
    };

    Json(json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/oauth/authorize"),
        "token_endpoint": format!("{issuer}/oauth/token"),
        "userinfo_endpoint": format!("{issuer}/oauth/userinfo"),
        "jwks_uri": format!("{issuer}/.well-known/jwks.json"),
        "introspection_endpoint": format!("{issuer}/oauth/introspect"),
        "revocation_endpoint": format!("{issuer}/oauth/revoke"),
        "registration_endpoint": format!("{issuer}/oauth/register"),
        "scopes_supported": state.config.scopes.supported_scopes,
        "response_types_supported": state.config.scopes.response_types_supported,
        "grant_types_supported": state.config.scopes.grant_types_supported,
        "token_endpoint_auth_methods_supported": state.config.scopes.token_endpoint_auth_methods_supported,
        "id_token_signing_alg_values_supported": ["RS256"],
        "code_challenge_methods_supported": code_challenge_methods,
        "subject_types_supported": ["public"],
    }))
}

pub async fn jwks(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.keys.jwks().await)
}
