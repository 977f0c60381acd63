//! Error taxonomy for the authorization server.
//!
//! [`StartupError`] covers configuration-time failures that prevent the
//! server from starting. [`OAuthError`] covers request-time failures and
//! knows how to render itself as the standard OAuth2 JSON error envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("token signing misconfigured: {0}")]
    SigningMisconfigured(String),

    #[error("key/cert mismatch: {0}")]
    KeyCertMismatch(String),

    #[error("other startup error: {0}")]
    Other(String),
}

/// Request-time error taxonomy (spec section 7).
///
/// Each variant carries the OAuth2 `error` code it renders as. `Server`
/// errors are 5xx and retriable; everything else is a definitive 4xx.
#[derive(Debug, Error, Clone)]
pub enum OAuthError {
    /// Malformed/missing parameters, unsupported grant or response type,
    /// invalid scope, invalid redirect URI.
    #[error("{code}: {description}")]
    Validation { code: String, description: String },

    /// `invalid_client`, `invalid_credentials`, `invalid_grant`. Never
    /// reveals whether an identifier was unknown or a password was wrong.
    #[error("{code}: {description}")]
    Authentication { code: String, description: String },

    /// `inactive_client`, `unauthorized_client`, bans.
    #[error("{code}: {description}")]
    Authorization {
        code: String,
        description: String,
        retry_after: Option<u64>,
    },

    /// 429 with Retry-After.
    #[error("too_many_requests: {description}")]
    RateLimited { description: String, retry_after: u64 },

    /// 5xx, retriable by the caller.
    #[error("server_error: {0}")]
    Server(String),
}

impl OAuthError {
    pub fn validation(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Validation {
            code: code.into(),
            description: description.into(),
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::validation("invalid_request", description)
    }

    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::validation("invalid_scope", description)
    }

    pub fn unsupported_grant_type() -> Self {
        Self::validation("unsupported_grant_type", "grant_type is not supported")
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::Authentication {
            code: "invalid_grant".to_string(),
            description: description.into(),
        }
    }

    /// Uniform "bad credentials" response — identical whether the
    /// identifier was unknown or the password was wrong (invariant 6).
    pub fn invalid_credentials() -> Self {
        Self::Authentication {
            code: "invalid_credentials".to_string(),
            description: "invalid username or password".to_string(),
        }
    }

    /// Distinct from [`Self::invalid_credentials`]: the account exists but
    /// has no password set (e.g. an SSO-only account probing the password
    /// grant). Still a 401, per spec 4.5.
    pub fn password_not_set() -> Self {
        Self::Authentication {
            code: "password_not_set".to_string(),
            description: "no password is set for this account".to_string(),
        }
    }

    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::Authentication {
            code: "invalid_client".to_string(),
            description: description.into(),
        }
    }

    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::Authorization {
            code: "unauthorized_client".to_string(),
            description: description.into(),
            retry_after: None,
        }
    }

    pub fn inactive_client() -> Self {
        Self::Authorization {
            code: "inactive_client".to_string(),
            description: "client is not active".to_string(),
            retry_after: None,
        }
    }

    pub fn banned(retry_after: u64) -> Self {
        Self::Authorization {
            code: "access_denied".to_string(),
            description: "too many failed attempts from this address".to_string(),
            retry_after: Some(retry_after),
        }
    }

    pub fn locked() -> Self {
        Self::Authorization {
            code: "account_locked".to_string(),
            description: "account is temporarily locked".to_string(),
            retry_after: None,
        }
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self::RateLimited {
            description: "too many requests".to_string(),
            retry_after,
        }
    }

    pub fn server(description: impl Into<String>) -> Self {
        Self::Server(description.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            OAuthError::Validation { .. } => StatusCode::BAD_REQUEST,
            OAuthError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            OAuthError::Authorization { code, .. } if code == "account_locked" => {
                StatusCode::LOCKED
            }
            OAuthError::Authorization { .. } => StatusCode::FORBIDDEN,
            OAuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            OAuthError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &str {
        match self {
            OAuthError::Validation { code, .. } => code,
            OAuthError::Authentication { code, .. } => code,
            OAuthError::Authorization { code, .. } => code,
            OAuthError::RateLimited { .. } => "too_many_requests",
            OAuthError::Server(_) => "server_error",
        }
    }

    fn description(&self) -> String {
        match self {
            OAuthError::Validation { description, .. } => description.clone(),
            OAuthError::Authentication { description, .. } => description.clone(),
            OAuthError::Authorization { description, .. } => description.clone(),
            OAuthError::RateLimited { description, .. } => description.clone(),
            OAuthError::Server(description) => description.clone(),
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            OAuthError::Authorization { retry_after, .. } => *retry_after,
            OAuthError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_description: String,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        tracing::info!(target = "authkeep.oauth", code = self.code(), "request rejected");
        let status = self.status();
        let retry_after = self.retry_after();
        let body = ErrorBody {
            error: self.code().to_string(),
            error_description: self.description(),
            retry_after,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}
