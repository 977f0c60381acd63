//! `POST /oauth/register` — RFC 7591 dynamic client registration.

use std::sync::Arc;

use axum::Json;
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_ENGINE;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::OAuthError;
use crate::store::Client;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub client_id: String,
    pub client_secret: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
}

pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, OAuthError> {
    if request.redirect_uris.is_empty() {
        return Err(OAuthError::invalid_request("redirect_uris must not be empty"));
    }
    for uri in &request.redirect_uris {
        Url::parse(uri).map_err(|_| OAuthError::invalid_request(format!("invalid redirect_uri: {uri}")))?;
    }

    let allowed_scopes = match &request.scope {
        Some(s) => crate::scope::parse_scopes(s),
        None => state.config.scopes.supported_scopes.clone(),
    };

    let client_id = random_token(16);
    let client_secret = random_token(32);

    let client = Client {
        client_id: client_id.clone(),
        secrets: vec![client_secret.clone()],
        name: request.client_name.clone().unwrap_or_else(|| client_id.clone()),
        redirect_uris: request.redirect_uris.clone(),
        allowed_scopes,
        grant_types: vec!["authorization_code".to_string(), "refresh_token".to_string()],
        response_types: vec!["code".to_string()],
        token_endpoint_auth_method: "client_secret_post".to_string(),
        require_pkce: false,
        active: true,
        tenant_id: None,
    };

    state
        .clients
        .insert(client.clone())
        .await
        .map_err(|e| OAuthError::server(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            client_id,
            client_secret,
            client_name: client.name,
            redirect_uris: client.redirect_uris,
            grant_types: client.grant_types,
            response_types: client.response_types,
        }),
    )
        .into_response())
}

fn random_token(bytes_len: usize) -> String {
    let mut bytes = vec![0u8; bytes_len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    BASE64_ENGINE.encode(bytes)
}
