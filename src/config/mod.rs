//! Authorization server configuration root module.
//!
//! - Defines the root configuration struct (`AuthServerConfig`) and its defaults.
//! - Provides config file loading and error reporting.
//! - Uses `components.rs` for types/enums and `defaults.rs` for default helpers.

use std::path::{Path, PathBuf};
use thiserror::Error;

use serde::{Deserialize, Serialize};

pub mod components;
pub mod defaults;

pub use components::{
    FailbanConfig, KeyConfig, LockoutConfig, PasswordDriverConfig, PkceConfig, RateLimitConfig,
    ScopeConfig, TokenConfig,
};

/// Root configuration for the authorization server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthServerConfig {
    /// Issuer URL used in `iss` claims and the discovery document.
    #[serde(default = "defaults::default_issuer")]
    pub issuer: String,

    /// HTTP bind address for the standalone binary.
    #[serde(default = "defaults::default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub keys: KeyConfig,

    #[serde(default)]
    pub tokens: TokenConfig,

    #[serde(default)]
    pub scopes: ScopeConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub failban: FailbanConfig,

    #[serde(default)]
    pub lockout: LockoutConfig,

    #[serde(default)]
    pub password_driver: PasswordDriverConfig,

    #[serde(default)]
    pub pkce: PkceConfig,
}

impl Default for AuthServerConfig {
    fn default() -> Self {
        Self {
            issuer: defaults::default_issuer(),
            bind_address: defaults::default_bind_address(),
            keys: KeyConfig::default(),
            tokens: TokenConfig::default(),
            scopes: ScopeConfig::default(),
            rate_limit: RateLimitConfig::default(),
            failban: FailbanConfig::default(),
            lockout: LockoutConfig::default(),
            password_driver: PasswordDriverConfig::default(),
            pkce: PkceConfig::default(),
        }
    }
}

impl AuthServerConfig {
    /// Compute the default configuration file path, honoring an env override.
    pub fn default_path() -> PathBuf {
        if let Some(override_path) = std::env::var_os("AUTHKEEP_CONFIG_PATH") {
            return PathBuf::from(override_path);
        }
        if cfg!(target_os = "windows") {
            let home = std::env::var_os("HOME")
                .or_else(|| std::env::var_os("USERPROFILE"))
                .unwrap_or_default();
            let mut p = PathBuf::from(home);
            p.push("authkeep");
            p.push("config");
            p
        } else {
            PathBuf::from("/etc/authkeep/config")
        }
    }

    /// Load configuration from a YAML file if present, else fall back to defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = config_path.unwrap_or_else(Self::default_path);

        if path.exists() {
            tracing::debug!("reading configuration file {:?}", path);
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::Parse(path.clone(), format!("I/O error: {e}")))?;
            Self::parse_yaml_with_path(&path, &text)
        } else {
            tracing::warn!(
                "no configuration file (checked {:?}); using built-in defaults",
                path
            );
            Ok(Self::default())
        }
    }

    fn parse_yaml_with_path(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_yaml_ng::from_str::<Self>(text).map_err(|e| {
            let msg = if let Some(loc) = e.location() {
                format!(
                    "yaml error at line {}, column {}: {}",
                    loc.line(),
                    loc.column(),
                    e
                )
            } else {
                format!("yaml error: {e}")
            };
            ConfigError::Parse(path.to_path_buf(), msg)
        })
    }
}

/// Errors during configuration loading/parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, String),
}
