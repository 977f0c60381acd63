//! `GET`/`POST /oauth/authorize` — the authorization-code front channel
//! (spec 4.10). The login/consent UI itself is out of scope; `POST` here
//! accepts the already-collected credentials and mints the code.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, Extension, Form, Query};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::audit::AuditEvent;
use crate::drivers::{AuthOutcome, AuthRequest};
use crate::errors::OAuthError;
use crate::scope::{parse_scopes, validate_scopes};
use crate::store::AuthorizationCode;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizePostParams {
    #[serde(flatten)]
    pub authorize: AuthorizeParams,
    pub username: String,
    pub password: String,
}

/// Validates the request and hands back a descriptor a login UI can render.
/// Errors that can be safely communicated via redirect are; malformed
/// `redirect_uri`/unknown client are returned as direct JSON errors since
/// there is nowhere safe to redirect to.
pub async fn authorize_get(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, OAuthError> {
    validate_static(&state, &params).await?;
    Ok(Json(json!({
        "client_id": params.client_id,
        "scope": params.scope,
        "state": params.state,
    }))
    .into_response())
}

pub async fn authorize_post(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(params): Form<AuthorizePostParams>,
) -> Result<Response, OAuthError> {
    let ip = addr.ip().to_string();
    if let Some(retry_after) = state.failban.is_banned(&ip) {
        return Err(OAuthError::banned(retry_after));
    }
    let decision = state.rate_limit_authorize.consume(&ip);
    if !decision.allowed {
        return Err(OAuthError::rate_limited(decision.retry_after.unwrap_or(60)));
    }

    let client = validate_static(&state, &params.authorize).await?;

    let driver = state
        .drivers
        .find("password")
        .ok_or_else(|| OAuthError::server("no interactive login driver configured"))?;

    let request = AuthRequest {
        identifier: Some(params.username.clone()),
        password: Some(params.password.clone()),
        tenant_id: client.tenant_id.clone(),
        params: Default::default(),
    };

    let outcome = driver.authenticate(&request).await;
    let user = match outcome {
        Ok(AuthOutcome::Success(user)) => user,
        _ => {
            state.failban.record_violation(&ip, "authorize_login_failure");
            return Err(OAuthError::Authentication {
                code: "access_denied".to_string(),
                description: "authentication failed".to_string(),
            });
        }
    };

    let scopes = parse_scopes(params.authorize.scope.as_deref().unwrap_or("openid"));
    let code_value = generate_secure_token();
    let ttl = crate::token::parse_duration(&state.config.tokens.auth_code_ttl)
        .map_err(|e| OAuthError::server(e.to_string()))?;

    let record = AuthorizationCode {
        code: code_value.clone(),
        client_id: client.client_id.clone(),
        user_id: user.id.clone(),
        redirect_uri: params.authorize.redirect_uri.clone(),
        scope: scopes.join(" "),
        code_challenge: params.authorize.code_challenge.clone(),
        code_challenge_method: params.authorize.code_challenge_method.clone(),
        nonce: params.authorize.nonce.clone(),
        expires_at: now() + ttl,
        used: false,
    };
    state
        .auth_codes
        .insert(record)
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?;

    state.audit.emit(AuditEvent::new("login").actor(user.id.clone()));

    let mut redirect_url = Url::parse(&params.authorize.redirect_uri)
        .map_err(|_| OAuthError::invalid_request("invalid redirect_uri"))?;
    redirect_url.query_pairs_mut().append_pair("code", &code_value);
    if let Some(st) = &params.authorize.state {
        redirect_url.query_pairs_mut().append_pair("state", st);
    }

    Ok(Redirect::to(redirect_url.as_str()).into_response())
}

async fn validate_static(
    state: &AppState,
    params: &AuthorizeParams,
) -> Result<crate::store::Client, OAuthError> {
    if !state
        .config
        .scopes
        .response_types_supported
        .iter()
        .any(|r| r == &params.response_type)
    {
        return Err(OAuthError::invalid_request("unsupported response_type"));
    }

    let mut filter = std::collections::HashMap::new();
    filter.insert("client_id".to_string(), params.client_id.clone());
    let candidates = state
        .clients
        .query(&filter)
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?;
    let client = candidates
        .into_iter()
        .next()
        .ok_or_else(|| OAuthError::invalid_request("unknown client_id"))?;

    if !client.active {
        return Err(OAuthError::inactive_client());
    }

    if !client.redirect_uris.iter().any(|u| u == &params.redirect_uri) {
        return Err(OAuthError::invalid_request("redirect_uri not registered for client"));
    }

    let requested = parse_scopes(params.scope.as_deref().unwrap_or(""));
    if !client.allowed_scopes.is_empty() {
        validate_scopes(&requested, &client.allowed_scopes)
            .map_err(|e| OAuthError::invalid_scope(format!("scope '{}' not allowed for client", e.unsupported)))?;
    }

    if client.require_pkce && params.code_challenge.is_none() {
        return Err(OAuthError::invalid_request("code_challenge required for this client"));
    }

    Ok(client)
}

fn generate_secure_token() -> String {
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_ENGINE;
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    BASE64_ENGINE.encode(bytes)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
