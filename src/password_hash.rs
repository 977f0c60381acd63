//! Argon2id password hashing helpers.
//!
//! The source material left the password hash algorithm unspecified; this
//! crate standardizes on Argon2id (see DESIGN.md's open-question ledger).

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;

pub fn hash(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("argon2 hash failed: {e}"))?;
    Ok(hash.to_string())
}

/// Verifies `plain` against a stored Argon2 hash string. Any malformed hash
/// is treated as a verification failure rather than propagated as an error,
/// so callers can fold it into a uniform invalid-credentials response.
pub fn verify(plain: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let h = hash("correct horse battery staple").unwrap();
        assert!(verify("correct horse battery staple", &h));
        assert!(!verify("wrong password", &h));
    }

    #[test]
    fn malformed_hash_fails_closed() {
        assert!(!verify("anything", "not-a-hash"));
    }
}
