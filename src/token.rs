//! RS256 JWT encode/decode, claim construction, expiry parsing, and
//! revocation consultation.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_ENGINE;
use jsonwebtoken::Header;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::keys::KeyManager;
use crate::store::{DynStore, RevokedTokenEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    AccessToken,
    RefreshToken,
    IdToken,
}

/// Claims as they appear in a decoded JWT payload. Extra OIDC user claims
/// ride along in `extra` (flattened) since they vary by requested scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub token_type: TokenType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Parses `<int>[smhd]` duration strings (`90s`, `15m`, `12h`, `30d`).
pub fn parse_duration(s: &str) -> Result<i64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(anyhow!("invalid duration: empty string"));
    }
    let (digits, unit) = s.split_at(s.len() - 1);
    let amount: i64 = digits
        .parse()
        .map_err(|_| anyhow!("invalid duration '{s}': not an integer + unit"))?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return Err(anyhow!("invalid duration '{s}': unknown unit '{unit}'")),
    };
    Ok(amount * multiplier)
}

pub fn format_duration(seconds: i64) -> String {
    if seconds % 86_400 == 0 {
        format!("{}d", seconds / 86_400)
    } else if seconds % 3_600 == 0 {
        format!("{}h", seconds / 3_600)
    } else if seconds % 60 == 0 {
        format!("{}m", seconds / 60)
    } else {
        format!("{seconds}s")
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Creates a compact RS256 JWT. `claims` are merged with `iat`/`exp`/`jti`.
pub async fn create_token(
    keys: &KeyManager,
    iss: &str,
    sub: &str,
    aud: &str,
    token_type: TokenType,
    scope: Option<String>,
    nonce: Option<String>,
    extra: serde_json::Map<String, Value>,
    expires_in: &str,
) -> Result<(String, TokenClaims)> {
    let key = keys.current().await.context("no active signing key")?;
    let ttl = parse_duration(expires_in)?;
    let iat = now();
    let jti = uuid_v4();

    let claims = TokenClaims {
        iss: iss.to_string(),
        sub: sub.to_string(),
        aud: aud.to_string(),
        iat,
        exp: iat + ttl,
        scope,
        token_type,
        nonce,
        jti: Some(jti),
        extra,
    };

    let value = serde_json::to_value(&claims).context("serialize claims")?;
    let compact = key.sign(Header::new(jsonwebtoken::Algorithm::RS256), &value)?;
    Ok((compact, claims))
}

fn uuid_v4() -> String {
    // Avoid pulling in the `uuid` crate for a runtime dependency: 16 random
    // bytes formatted as a v4-shaped string is all the jti needs to be.
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    hex::encode(bytes)
}

/// Hash a compact token for revocation bookkeeping when it carries no `jti`.
pub fn token_hash(compact: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(compact.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("unknown signing key")]
    UnknownKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token revoked")]
    Revoked,
}

/// Verifies a compact RS256 JWT against the key manager and revocation
/// store. `alg=none` (or anything but RS256) is rejected unconditionally.
pub async fn verify_token(
    keys: &KeyManager,
    revocations: &DynStore<RevokedTokenEntry>,
    compact: &str,
) -> Result<TokenClaims, VerifyError> {
    let mut parts = compact.split('.');
    let (header_b64, payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(VerifyError::Malformed),
    };

    let header_bytes = BASE64_ENGINE
        .decode(header_b64)
        .map_err(|_| VerifyError::Malformed)?;
    let header: Value = serde_json::from_slice(&header_bytes).map_err(|_| VerifyError::Malformed)?;
    let alg = header.get("alg").and_then(Value::as_str).unwrap_or("");
    if alg != "RS256" {
        return Err(VerifyError::UnsupportedAlgorithm);
    }
    let kid = header
        .get("kid")
        .and_then(Value::as_str)
        .ok_or(VerifyError::Malformed)?;

    let key = keys.get(kid).await.ok_or(VerifyError::UnknownKey)?;

    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "iss", "sub", "aud"]);
    validation.validate_aud = false;

    let decoded = jsonwebtoken::decode::<TokenClaims>(compact, key.decoding_key(), &validation)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => VerifyError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
            _ => VerifyError::Malformed,
        })?;
    let _ = sig_b64;
    let _ = payload_b64;

    let claims = decoded.claims;
    let lookup_key = claims.jti.clone().unwrap_or_else(|| token_hash(compact));
    if let Ok(Some(_)) = revocations.get(&lookup_key).await {
        return Err(VerifyError::Revoked);
    }

    Ok(claims)
}

/// Marks a token (by `jti`, or a hash when it carries none) revoked until
/// it would have expired naturally anyway.
pub async fn revoke(
    revocations: &DynStore<RevokedTokenEntry>,
    claims: &TokenClaims,
    compact: &str,
) -> Result<()> {
    let key = claims.jti.clone().unwrap_or_else(|| token_hash(compact));
    revocations
        .insert(RevokedTokenEntry {
            jti: key,
            expires_at: claims.exp,
        })
        .await
        .map_err(|e| anyhow!("revocation store error: {e}"))?;
    Ok(())
}

/// True if a token with the given `client_id` (`aud`) has been revoked via
/// a stored entry under any identifier — used by introspection's blanket
/// "never leak a reason" contract, which just needs a bool.
pub async fn is_revoked(revocations: &DynStore<RevokedTokenEntry>, claims: &TokenClaims, compact: &str) -> bool {
    let key = claims.jti.clone().unwrap_or_else(|| token_hash(compact));
    matches!(revocations.get(&key).await, Ok(Some(_)))
}

pub type SharedRevocationStore = Arc<dyn crate::store::Store<RevokedTokenEntry>>;
