//! `POST /oauth/token` — the four grant types (spec 4.10).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, Extension, Form};
use openidconnect::{PkceCodeChallenge, PkceCodeVerifier};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::audit::AuditEvent;
use crate::drivers::{AuthOutcome, AuthRequest};
use crate::errors::OAuthError;
use crate::scope::{extract_user_claims, is_subset, join_scopes, parse_scopes, validate_scopes};
use crate::store::AuthorizationCode;
use crate::token::{TokenType, create_token, verify_token};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenParams {
    pub grant_type: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

pub async fn token_endpoint(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(params): Form<TokenParams>,
) -> Result<Json<TokenResponse>, OAuthError> {
    let ip = addr.ip().to_string();

    if let Some(retry_after) = state.failban.is_banned(&ip) {
        return Err(OAuthError::banned(retry_after));
    }
    if state.failban.check_country_block(&ip) {
        return Err(OAuthError::banned(state.config.failban.ban_duration_ms / 1000));
    }
    let decision = state.rate_limit_token.consume(&ip);
    if !decision.allowed {
        return Err(OAuthError::rate_limited(decision.retry_after.unwrap_or(60)));
    }

    let result = dispatch(&state, &params).await;
    if result.is_err() {
        state.failban.record_violation(&ip, "token_endpoint_failure");
    }
    result
}

async fn dispatch(state: &AppState, params: &TokenParams) -> Result<Json<TokenResponse>, OAuthError> {
    let client_id = params
        .client_id
        .clone()
        .ok_or_else(|| OAuthError::invalid_request("missing client_id"))?;

    let client = state
        .client_auth
        .authenticate(&client_id, params.client_secret.as_deref())
        .await?;

    match params.grant_type.as_str() {
        "client_credentials" => client_credentials_grant(state, &client, params).await,
        "authorization_code" => authorization_code_grant(state, &client, params).await,
        "refresh_token" => refresh_token_grant(state, &client, params).await,
        "password" => password_grant(state, &client, params).await,
        _ => Err(OAuthError::unsupported_grant_type()),
    }
}

async fn client_credentials_grant(
    state: &AppState,
    client: &crate::store::Client,
    params: &TokenParams,
) -> Result<Json<TokenResponse>, OAuthError> {
    if !client.supports_grant_type("client_credentials") {
        return Err(OAuthError::unauthorized_client(
            "client is not permitted to use the client_credentials grant",
        ));
    }

    let requested = parse_scopes(params.scope.as_deref().unwrap_or(""));
    validate_scopes(&requested, &state.config.scopes.supported_scopes)
        .map_err(|e| OAuthError::invalid_scope(format!("unsupported scope '{}'", e.unsupported)))?;
    let allowed = if client.allowed_scopes.is_empty() {
        requested.clone()
    } else {
        validate_scopes(&requested, &client.allowed_scopes)
            .map_err(|e| OAuthError::invalid_scope(format!("scope '{}' not allowed for client", e.unsupported)))?;
        requested.clone()
    };

    let issuer = state.config.issuer.clone();
    let (access_token, claims) = create_token(
        &state.keys,
        &issuer,
        &client.client_id,
        &issuer,
        TokenType::AccessToken,
        Some(join_scopes(&allowed)),
        None,
        Map::new(),
        &state.config.tokens.access_token_ttl,
    )
    .await
    .map_err(|e| OAuthError::server(e.to_string()))?;

    state.audit.emit(
        AuditEvent::new("token_issued")
            .actor(client.client_id.clone())
            .resource("client_credentials"),
    );

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: claims.exp - claims.iat,
        refresh_token: None,
        id_token: None,
        scope: claims.scope,
    }))
}

async fn authorization_code_grant(
    state: &AppState,
    client: &crate::store::Client,
    params: &TokenParams,
) -> Result<Json<TokenResponse>, OAuthError> {
    let code_value = params
        .code
        .clone()
        .ok_or_else(|| OAuthError::invalid_request("missing code"))?;
    let redirect_uri = params
        .redirect_uri
        .clone()
        .ok_or_else(|| OAuthError::invalid_request("missing redirect_uri"))?;

    let stored = state
        .auth_codes
        .get(&code_value)
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?;

    // Single-use: delete on first exchange attempt regardless of outcome.
    if stored.is_some() {
        let _ = state.auth_codes.delete(&code_value).await;
    }

    let code: AuthorizationCode = stored.ok_or_else(|| OAuthError::invalid_grant("unknown authorization code"))?;

    if code.expires_at < now() {
        return Err(OAuthError::invalid_grant("authorization code expired"));
    }
    if code.redirect_uri != redirect_uri {
        return Err(OAuthError::invalid_grant("redirect_uri mismatch"));
    }
    if code.client_id != client.client_id {
        return Err(OAuthError::invalid_grant("client_id mismatch"));
    }

    if let Some(challenge) = &code.code_challenge {
        let verifier = params
            .code_verifier
            .as_deref()
            .ok_or_else(|| OAuthError::invalid_grant("missing code_verifier"))?;
        let method = code.code_challenge_method.as_deref().unwrap_or("plain");
        let ok = match method {
            "plain" => verifier == challenge,
            "S256" => {
                let pkce_verifier = PkceCodeVerifier::new(verifier.to_string());
                let computed = PkceCodeChallenge::from_code_verifier_sha256(&pkce_verifier);
                computed.as_str() == challenge
            }
            _ => false,
        };
        if !ok {
            return Err(OAuthError::invalid_grant("PKCE verification failed"));
        }
    }

    let user = state
        .users
        .get(&code.user_id)
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?
        .ok_or_else(|| OAuthError::invalid_grant("user no longer exists"))?;

    let scopes = parse_scopes(&code.scope);
    let issuer = state.config.issuer.clone();

    let (access_token, claims) = create_token(
        &state.keys,
        &issuer,
        &user.id,
        &client.client_id,
        TokenType::AccessToken,
        Some(join_scopes(&scopes)),
        None,
        Map::new(),
        &state.config.tokens.access_token_ttl,
    )
    .await
    .map_err(|e| OAuthError::server(e.to_string()))?;

    let id_token = if scopes.iter().any(|s| s == "openid") {
        let user_claims = extract_user_claims(&user, &scopes);
        let (compact, _) = create_token(
            &state.keys,
            &issuer,
            &user.id,
            &client.client_id,
            TokenType::IdToken,
            None,
            code.nonce.clone(),
            user_claims,
            &state.config.tokens.access_token_ttl,
        )
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?;
        Some(compact)
    } else {
        None
    };

    let refresh_token = if scopes.iter().any(|s| s == "offline_access")
        && client.supports_grant_type("refresh_token")
    {
        let (compact, _) = create_token(
            &state.keys,
            &issuer,
            &user.id,
            &client.client_id,
            TokenType::RefreshToken,
            Some(join_scopes(&scopes)),
            None,
            Map::new(),
            &state.config.tokens.refresh_token_ttl,
        )
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?;
        Some(compact)
    } else {
        None
    };

    state.audit.emit(
        AuditEvent::new("token_issued")
            .actor(user.id.clone())
            .resource("authorization_code"),
    );

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: claims.exp - claims.iat,
        refresh_token,
        id_token,
        scope: claims.scope,
    }))
}

async fn refresh_token_grant(
    state: &AppState,
    client: &crate::store::Client,
    params: &TokenParams,
) -> Result<Json<TokenResponse>, OAuthError> {
    let refresh = params
        .refresh_token
        .clone()
        .ok_or_else(|| OAuthError::invalid_request("missing refresh_token"))?;

    let claims = verify_token(&state.keys, &state.revocations, &refresh)
        .await
        .map_err(|_| OAuthError::invalid_grant("invalid or expired refresh token"))?;

    if claims.token_type != TokenType::RefreshToken {
        return Err(OAuthError::invalid_grant("not a refresh token"));
    }
    if claims.aud != client.client_id {
        return Err(OAuthError::invalid_grant("refresh token was issued to a different client"));
    }
    if claims.iss.trim_end_matches('/') != state.config.issuer.trim_end_matches('/') {
        return Err(OAuthError::invalid_grant("issuer mismatch"));
    }

    let granted = parse_scopes(claims.scope.as_deref().unwrap_or(""));
    let requested = match &params.scope {
        Some(s) => parse_scopes(s),
        None => granted.clone(),
    };
    if !is_subset(&requested, &granted) {
        return Err(OAuthError::invalid_scope("requested scope exceeds original grant"));
    }
    validate_scopes(&requested, &client.allowed_scopes.iter().cloned().chain(granted.clone()).collect::<Vec<_>>())
        .map_err(|e| OAuthError::invalid_scope(format!("scope '{}' not allowed", e.unsupported)))?;

    let user = state
        .users
        .get(&claims.sub)
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?
        .ok_or_else(|| OAuthError::invalid_grant("user no longer exists"))?;

    let issuer = state.config.issuer.clone();
    let (access_token, new_claims) = create_token(
        &state.keys,
        &issuer,
        &user.id,
        &client.client_id,
        TokenType::AccessToken,
        Some(join_scopes(&requested)),
        None,
        Map::new(),
        &state.config.tokens.access_token_ttl,
    )
    .await
    .map_err(|e| OAuthError::server(e.to_string()))?;

    let id_token = if requested.iter().any(|s| s == "openid") {
        let user_claims = extract_user_claims(&user, &requested);
        let (compact, _) = create_token(
            &state.keys,
            &issuer,
            &user.id,
            &client.client_id,
            TokenType::IdToken,
            None,
            None,
            user_claims,
            &state.config.tokens.access_token_ttl,
        )
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?;
        Some(compact)
    } else {
        None
    };

    let new_refresh = if state.config.tokens.refresh_token_rotation {
        let (compact, _) = create_token(
            &state.keys,
            &issuer,
            &user.id,
            &client.client_id,
            TokenType::RefreshToken,
            Some(join_scopes(&granted)),
            None,
            Map::new(),
            &state.config.tokens.refresh_token_ttl,
        )
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?;
        let _ = crate::token::revoke(&state.revocations, &claims, &refresh).await;
        Some(compact)
    } else {
        None
    };

    state.audit.emit(
        AuditEvent::new("token_issued")
            .actor(user.id.clone())
            .resource("refresh_token"),
    );

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: new_claims.exp - new_claims.iat,
        refresh_token: new_refresh,
        id_token,
        scope: new_claims.scope,
    }))
}

async fn password_grant(
    state: &AppState,
    client: &crate::store::Client,
    params: &TokenParams,
) -> Result<Json<TokenResponse>, OAuthError> {
    let driver = state
        .drivers
        .find("password")
        .ok_or_else(|| OAuthError::unauthorized_client("password grant is not configured"))?;
    if !client.supports_grant_type("password") {
        return Err(OAuthError::unauthorized_client(
            "client is not permitted to use the password grant",
        ));
    }

    let request = AuthRequest {
        identifier: params.username.clone(),
        password: params.password.clone(),
        tenant_id: client.tenant_id.clone(),
        params: HashMap::new(),
    };

    let user = match driver.authenticate(&request).await? {
        AuthOutcome::Success(user) => user,
        AuthOutcome::MfaRequired => {
            return Err(OAuthError::validation("mfa_required", "additional authentication required"));
        }
    };

    if !user.active {
        return Err(OAuthError::invalid_grant("account is not active"));
    }

    let requested = parse_scopes(params.scope.as_deref().unwrap_or(""));
    validate_scopes(&requested, &state.config.scopes.supported_scopes)
        .map_err(|e| OAuthError::invalid_scope(format!("unsupported scope '{}'", e.unsupported)))?;
    if !client.allowed_scopes.is_empty() {
        validate_scopes(&requested, &client.allowed_scopes)
            .map_err(|e| OAuthError::invalid_scope(format!("scope '{}' not allowed for client", e.unsupported)))?;
    }

    let issuer = state.config.issuer.clone();
    let aud = client.client_id.clone();

    let (access_token, claims) = create_token(
        &state.keys,
        &issuer,
        &user.id,
        &aud,
        TokenType::AccessToken,
        Some(join_scopes(&requested)),
        None,
        Map::new(),
        &state.config.tokens.access_token_ttl,
    )
    .await
    .map_err(|e| OAuthError::server(e.to_string()))?;

    let id_token = if requested.iter().any(|s| s == "openid") {
        let user_claims = extract_user_claims(&user, &requested);
        let (compact, _) = create_token(
            &state.keys,
            &issuer,
            &user.id,
            &aud,
            TokenType::IdToken,
            None,
            None,
            user_claims,
            &state.config.tokens.access_token_ttl,
        )
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?;
        Some(compact)
    } else {
        None
    };

    let refresh_token = if requested.iter().any(|s| s == "offline_access")
        && client.supports_grant_type("refresh_token")
    {
        let (compact, _) = create_token(
            &state.keys,
            &issuer,
            &user.id,
            &aud,
            TokenType::RefreshToken,
            Some(join_scopes(&requested)),
            None,
            Map::new(),
            &state.config.tokens.refresh_token_ttl,
        )
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?;
        Some(compact)
    } else {
        None
    };

    state.audit.emit(AuditEvent::new("login").actor(user.id.clone()));

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: claims.exp - claims.iat,
        refresh_token,
        id_token,
        scope: claims.scope,
    }))
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
