//! `POST /oauth/introspect` — RFC 7662. Always responds 200; never leaks
//! why a token was rejected (spec 4.10, invariant: introspection leaks
//! nothing).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Form};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::token::{verify_token};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct IntrospectParams {
    pub token: String,
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

pub async fn introspect(
    Extension(state): Extension<Arc<AppState>>,
    Form(params): Form<IntrospectParams>,
) -> Json<Value> {
    let _ = params.token_type_hint;

    match verify_token(&state.keys, &state.revocations, &params.token).await {
        Ok(claims) => Json(json!({
            "active": true,
            "scope": claims.scope,
            "client_id": claims.aud,
            "username": claims.sub,
            "token_type": claims.token_type,
            "exp": claims.exp,
            "iat": claims.iat,
            "sub": claims.sub,
            "iss": claims.iss,
            "aud": claims.aud,
        })),
        Err(_) => Json(json!({ "active": false })),
    }
}
