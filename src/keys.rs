//! RSA signing key lifecycle: generation, rotation, selection by `kid`, and
//! JWKS assembly.
//!
//! Grounded on the PEM/ASN.1 plumbing in the signer this crate started
//! from: modulus/exponent are still extracted by walking the DER with
//! `simple_asn1` and the JWK `kid` is still a SHA-256 fingerprint, but key
//! material is generated in-process instead of being read off disk, and
//! more than one `kid` can be active for verification at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_ENGINE;
use jsonwebtoken::{DecodingKey, EncodingKey, Header};
use pem as pem_crate;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use simple_asn1::{ASN1Block, from_der};
use tokio::sync::RwLock;

const RSA_BITS: usize = 2048;

/// One RSA keypair plus the bookkeeping the key manager needs.
pub struct SigningKey {
    pub kid: String,
    pub purpose: String,
    pub active: AtomicBool,
    pub created_at: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    jwk: serde_json::Value,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("purpose", &self.purpose)
            .field("active", &self.active)
            .finish()
    }
}

impl SigningKey {
    /// Generate a fresh 2048-bit RSA keypair for `purpose`.
    pub fn generate(purpose: &str) -> Result<Self> {
        let mut rng = rand::rngs::OsRng;
        let private_key =
            RsaPrivateKey::new(&mut rng, RSA_BITS).context("failed to generate RSA keypair")?;
        let public_key = private_key.to_public_key();

        let private_pem = private_key
            .to_pkcs1_pem(rsa::pkcs8::LineEnding::LF)
            .context("encode private key pem")?
            .to_string();
        let public_pem = public_key
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .context("encode public key pem")?;

        Self::from_pem(purpose, private_pem.as_bytes(), public_pem.as_bytes())
    }

    /// Build a key from an existing PEM pair (used by tests and by
    /// embedders restoring a previously persisted key).
    pub fn from_pem(purpose: &str, private_pem: &[u8], public_pem: &[u8]) -> Result<Self> {
        let encoding_key =
            EncodingKey::from_rsa_pem(private_pem).context("encoding key from private pem")?;
        let decoding_key =
            DecodingKey::from_rsa_pem(public_pem).context("decoding key from public pem")?;

        let (n_bytes, e_bytes) = extract_modulus_exponent(public_pem)?;
        let n_b64 = BASE64_ENGINE.encode(&n_bytes);
        let e_b64 = BASE64_ENGINE.encode(&e_bytes);

        // kid = first 16 hex chars of SHA-256 over the PEM-encoded SPKI public key.
        let mut hasher = Sha256::new();
        hasher.update(public_pem);
        let digest = hasher.finalize();
        let kid = hex::encode(digest)[..16].to_string();

        let jwk = serde_json::json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": kid,
            "n": n_b64,
            "e": e_b64,
        });

        Ok(Self {
            kid,
            purpose: purpose.to_string(),
            active: AtomicBool::new(true),
            created_at: now(),
            encoding_key,
            decoding_key,
            jwk,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn sign(&self, mut header: Header, claims: &serde_json::Value) -> Result<String> {
        header.kid = Some(self.kid.clone());
        header.alg = jsonwebtoken::Algorithm::RS256;
        jsonwebtoken::encode(&header, claims, &self.encoding_key).context("encode jwt")
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

fn extract_modulus_exponent(public_pem: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let pem = pem_crate::parse(std::str::from_utf8(public_pem).context("public pem to str")?)
        .map_err(|e| anyhow::anyhow!("failed to parse public key pem: {e}"))?;
    let der = pem.contents;
    let asn1 = from_der(&der).context("parse public key DER ASN.1")?;

    // SubjectPublicKeyInfo: SEQUENCE { algorithm, BIT STRING subjectPublicKey }
    // The bit string itself DER-decodes to SEQUENCE { INTEGER n, INTEGER e }.
    fn extract(blocks: &[ASN1Block]) -> Option<(Vec<u8>, Vec<u8>)> {
        for b in blocks {
            match b {
                ASN1Block::Sequence(_, inner) => {
                    if inner.len() == 2
                        && let (ASN1Block::Integer(_, n), ASN1Block::Integer(_, e)) =
                            (&inner[0], &inner[1])
                    {
                        return Some((n.to_signed_bytes_be(), e.to_signed_bytes_be()));
                    }
                    if let Some(found) = extract(inner) {
                        return Some(found);
                    }
                }
                ASN1Block::BitString(_, _, data) => {
                    if let Ok(nested) = from_der(data)
                        && let Some(found) = extract(&nested)
                    {
                        return Some(found);
                    }
                }
                _ => {}
            }
        }
        None
    }

    extract(&asn1).ok_or_else(|| anyhow::anyhow!("failed to locate modulus/exponent in public key"))
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Generation, rotation, lookup-by-`kid`, and JWKS assembly for one purpose
/// (or several, if more than one `purpose` is ever initialized).
pub struct KeyManager {
    purpose: String,
    active_kid: RwLock<Option<String>>,
    keys: RwLock<HashMap<String, Arc<SigningKey>>>,
}

impl KeyManager {
    pub fn new(purpose: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            active_kid: RwLock::new(None),
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Load is a no-op for the in-memory manager (nothing to restore from);
    /// an embedder with a persistent `KeyConfig::key_dir` can pre-populate
    /// keys with [`KeyManager::insert`] before calling this. Rotates a fresh
    /// key into place if none exists yet.
    pub async fn initialize(&self) -> Result<()> {
        if self.active_kid.read().await.is_none() {
            self.rotate().await?;
        }
        Ok(())
    }

    /// Insert a pre-built key (e.g. restored from disk) without demoting
    /// the current active key unless this one is marked active.
    pub async fn insert(&self, key: SigningKey) {
        let kid = key.kid.clone();
        let active = key.is_active();
        self.keys.write().await.insert(kid.clone(), Arc::new(key));
        if active {
            *self.active_kid.write().await = Some(kid);
        }
    }

    /// Generate a new keypair, mark it active, and demote the previous one
    /// (kept, not deleted, so outstanding tokens keep verifying).
    pub async fn rotate(&self) -> Result<Arc<SigningKey>> {
        let purpose = self.purpose.clone();
        let new_key = tokio::task::spawn_blocking(move || SigningKey::generate(&purpose))
            .await
            .context("key generation task panicked")??;
        let kid = new_key.kid.clone();
        let new_key = Arc::new(new_key);

        let mut keys = self.keys.write().await;
        let mut active = self.active_kid.write().await;
        if let Some(prev_kid) = active.as_ref()
            && let Some(prev) = keys.get(prev_kid)
        {
            prev.active.store(false, Ordering::Release);
        }
        keys.insert(kid.clone(), new_key.clone());
        *active = Some(kid);
        Ok(new_key)
    }

    pub async fn current(&self) -> Result<Arc<SigningKey>> {
        let active = self.active_kid.read().await;
        let kid = active
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no active signing key for purpose {}", self.purpose))?;
        let keys = self.keys.read().await;
        keys.get(kid)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("active kid {} missing from key cache", kid))
    }

    pub async fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.read().await.get(kid).cloned()
    }

    pub async fn jwks(&self) -> serde_json::Value {
        let keys = self.keys.read().await;
        let entries: Vec<_> = keys.values().map(|k| k.jwk.clone()).collect();
        serde_json::json!({ "keys": entries })
    }

    pub async fn active_kid(&self) -> Option<String> {
        self.active_kid.read().await.clone()
    }
}

pub type DynKeyManager = Arc<KeyManager>;
