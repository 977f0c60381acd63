//! `POST /oauth/revoke` — RFC 7009. Always responds 200.

use std::sync::Arc;

use axum::extract::{Extension, Form};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::token::{revoke, verify_token};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RevokeParams {
    pub token: String,
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

pub async fn revoke_endpoint(
    Extension(state): Extension<Arc<AppState>>,
    Form(params): Form<RevokeParams>,
) -> StatusCode {
    let _ = params.token_type_hint;

    if let Ok(claims) = verify_token(&state.keys, &state.revocations, &params.token).await {
        let _ = revoke(&state.revocations, &claims, &params.token).await;
    }

    StatusCode::OK
}
