//! Authorization-server configuration components.
//!
//! This module defines the user-facing configuration structures for the
//! authorization core. It mirrors the server's building-block layout: small,
//! independently-defaultable structs composed into the root config in
//! `mod.rs`.

use serde::{Deserialize, Serialize};

use super::defaults;

/// Logging levels exposed on the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        write!(f, "{}", s)
    }
}

/// RSA signing key configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Logical purpose label; all active keys are scoped to a purpose.
    #[serde(default = "defaults::default_key_purpose")]
    pub purpose: String,
    /// Directory to persist generated keypairs in, when running standalone.
    /// When `None`, keys live only in memory for the process lifetime.
    #[serde(default)]
    pub key_dir: Option<String>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            purpose: defaults::default_key_purpose(),
            key_dir: None,
        }
    }
}

/// Token lifetime and issuer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "defaults::default_access_token_ttl")]
    pub access_token_ttl: String,
    #[serde(default = "defaults::default_refresh_token_ttl")]
    pub refresh_token_ttl: String,
    #[serde(default = "defaults::default_auth_code_ttl")]
    pub auth_code_ttl: String,
    /// Whether a new refresh token is minted (and the old one revoked) on refresh.
    #[serde(default = "defaults::default_true")]
    pub refresh_token_rotation: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: defaults::default_access_token_ttl(),
            refresh_token_ttl: defaults::default_refresh_token_ttl(),
            auth_code_ttl: defaults::default_auth_code_ttl(),
            refresh_token_rotation: true,
        }
    }
}

/// Scope and grant/response type policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    #[serde(default = "defaults::default_supported_scopes")]
    pub supported_scopes: Vec<String>,
    #[serde(default = "defaults::default_response_types")]
    pub response_types_supported: Vec<String>,
    #[serde(default = "defaults::default_grant_types")]
    pub grant_types_supported: Vec<String>,
    #[serde(default = "defaults::default_auth_methods")]
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            supported_scopes: defaults::default_supported_scopes(),
            response_types_supported: defaults::default_response_types(),
            grant_types_supported: defaults::default_grant_types(),
            token_endpoint_auth_methods_supported: defaults::default_auth_methods(),
        }
    }
}

/// Fixed-window rate limit settings for one endpoint family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRule {
    #[serde(default = "defaults::default_rl_max")]
    pub max: u32,
    #[serde(default = "defaults::default_rl_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            max: defaults::default_rl_max(),
            window_ms: defaults::default_rl_window_ms(),
        }
    }
}

/// Rate limiting configuration, one rule per sensitive endpoint family.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub login: RateLimitRule,
    #[serde(default)]
    pub token: RateLimitRule,
    #[serde(default)]
    pub authorize: RateLimitRule,
}

/// IP failban configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailbanConfig {
    #[serde(default = "defaults::default_true")]
    pub enabled: bool,
    #[serde(default = "defaults::default_max_violations")]
    pub max_violations: u32,
    #[serde(default = "defaults::default_violation_window_ms")]
    pub violation_window_ms: u64,
    #[serde(default = "defaults::default_ban_duration_ms")]
    pub ban_duration_ms: u64,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Enable country-based blocking via an injected geo resolver.
    #[serde(default = "defaults::default_false")]
    pub geo_enabled: bool,
    #[serde(default)]
    pub allowed_countries: Vec<String>,
    #[serde(default)]
    pub blocked_countries: Vec<String>,
    #[serde(default = "defaults::default_false")]
    pub block_unknown_country: bool,
    /// Persist violations/bans to the record store for cross-process durability.
    #[serde(default = "defaults::default_false")]
    pub persist_violations: bool,
}

impl Default for FailbanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_violations: defaults::default_max_violations(),
            violation_window_ms: defaults::default_violation_window_ms(),
            ban_duration_ms: defaults::default_ban_duration_ms(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            geo_enabled: false,
            allowed_countries: Vec::new(),
            blocked_countries: Vec::new(),
            block_unknown_country: false,
            persist_violations: false,
        }
    }
}

/// Account lockout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutConfig {
    #[serde(default = "defaults::default_true")]
    pub enabled: bool,
    #[serde(default = "defaults::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "defaults::default_lockout_duration")]
    pub lockout_duration: String,
    #[serde(default = "defaults::default_true")]
    pub reset_on_success: bool,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: defaults::default_max_attempts(),
            lockout_duration: defaults::default_lockout_duration(),
            reset_on_success: true,
        }
    }
}

/// Password authentication driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordDriverConfig {
    #[serde(default = "defaults::default_true")]
    pub enabled: bool,
    /// Field used to look up a user (e.g. "email" or "username").
    #[serde(default = "defaults::default_identifier_field")]
    pub identifier_field: String,
    #[serde(default = "defaults::default_true")]
    pub case_insensitive_identifier: bool,
}

impl Default for PasswordDriverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            identifier_field: defaults::default_identifier_field(),
            case_insensitive_identifier: true,
        }
    }
}

/// PKCE policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkceConfig {
    #[serde(default = "defaults::default_true")]
    pub enabled: bool,
    /// Require a `code_challenge` on every authorize request.
    #[serde(default = "defaults::default_false")]
    pub require_for_public_clients: bool,
}

impl Default for PkceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            require_for_public_clients: false,
        }
    }
}
