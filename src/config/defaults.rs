//! Default value helpers for serde deserialization in config structs.
//!
//! These functions ensure consistent defaulting across `components.rs` and
//! `mod.rs`, and let entire config blocks be absent from the configuration
//! file without failing deserialization.

/// Default bind address for the HTTP listener.
pub(crate) fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

/// Default issuer URL. Embedders are expected to override this in production;
/// it is wired here only so a config omitting `issuer` still deserializes.
pub(crate) fn default_issuer() -> String {
    "http://localhost:8080".to_string()
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_false() -> bool {
    false
}

/// Access tokens live 15 minutes.
pub(crate) fn default_access_token_ttl() -> String {
    "15m".to_string()
}

/// Refresh tokens live 30 days.
pub(crate) fn default_refresh_token_ttl() -> String {
    "30d".to_string()
}

/// Authorization codes live 10 minutes.
pub(crate) fn default_auth_code_ttl() -> String {
    "10m".to_string()
}

pub(crate) fn default_supported_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "profile".to_string(),
        "email".to_string(),
        "offline_access".to_string(),
    ]
}

pub(crate) fn default_response_types() -> Vec<String> {
    vec!["code".to_string()]
}

pub(crate) fn default_grant_types() -> Vec<String> {
    vec![
        "authorization_code".to_string(),
        "client_credentials".to_string(),
        "refresh_token".to_string(),
        "password".to_string(),
    ]
}

pub(crate) fn default_auth_methods() -> Vec<String> {
    vec![
        "client_secret_post".to_string(),
        "client_secret_basic".to_string(),
    ]
}

pub(crate) fn default_key_purpose() -> String {
    "oauth".to_string()
}

// ----------------- Rate limit defaults -----------------

pub(crate) fn default_rl_max() -> u32 {
    20
}
pub(crate) fn default_rl_window_ms() -> u64 {
    60_000
}

// ----------------- Failban defaults -----------------

pub(crate) fn default_max_violations() -> u32 {
    5
}
pub(crate) fn default_violation_window_ms() -> u64 {
    300_000
}
pub(crate) fn default_ban_duration_ms() -> u64 {
    900_000
}

// ----------------- Lockout defaults -----------------

pub(crate) fn default_max_attempts() -> u32 {
    5
}
pub(crate) fn default_lockout_duration() -> String {
    "15m".to_string()
}

// ----------------- PKCE / identifier defaults -----------------

pub(crate) fn default_identifier_field() -> String {
    "email".to_string()
}
