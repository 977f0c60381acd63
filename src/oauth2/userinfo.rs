//! `GET /oauth/userinfo` — OIDC UserInfo endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::Extension;
use axum::http::HeaderMap;
use serde_json::{Value, json};

use crate::errors::OAuthError;
use crate::scope::{extract_user_claims, parse_scopes};
use crate::token::{TokenType, verify_token};

use super::AppState;

pub async fn userinfo(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, OAuthError> {
    let token = bearer_token(&headers).ok_or_else(|| OAuthError::invalid_client("missing bearer token"))?;

    let claims = verify_token(&state.keys, &state.revocations, &token)
        .await
        .map_err(|_| OAuthError::invalid_client("invalid or expired access token"))?;

    if claims.token_type != TokenType::AccessToken {
        return Err(OAuthError::invalid_client("not an access token"));
    }
    if claims.iss.trim_end_matches('/') != state.config.issuer.trim_end_matches('/') {
        return Err(OAuthError::invalid_client("issuer mismatch"));
    }

    let user = state
        .users
        .get(&claims.sub)
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?
        .ok_or_else(|| OAuthError::invalid_client("subject no longer exists"))?;

    let scopes = parse_scopes(claims.scope.as_deref().unwrap_or(""));
    let mut body = extract_user_claims(&user, &scopes);
    body.insert("sub".to_string(), json!(user.id));

    Ok(Json(Value::Object(body)))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("authorization")?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::to_string)
}
