//! Scope parsing, validation against server/client allow-lists, and
//! derivation of OIDC user claims from a granted scope set.

use serde_json::{Map, Value};

use crate::store::User;

/// Splits on ASCII whitespace, drops empties, preserves order, deduplicates.
pub fn parse_scopes(s: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    s.split_ascii_whitespace()
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

pub fn join_scopes(scopes: &[String]) -> String {
    scopes.join(" ")
}

#[derive(Debug)]
pub struct ScopeValidationError {
    pub unsupported: String,
}

/// Every entry of `requested` must appear in `supported`.
pub fn validate_scopes(requested: &[String], supported: &[String]) -> Result<(), ScopeValidationError> {
    for scope in requested {
        if !supported.iter().any(|s| s == scope) {
            return Err(ScopeValidationError {
                unsupported: scope.clone(),
            });
        }
    }
    Ok(())
}

/// `requested` must be a subset of `granted` (used to narrow scope on refresh).
pub fn is_subset(requested: &[String], granted: &[String]) -> bool {
    requested.iter().all(|s| granted.iter().any(|g| g == s))
}

/// Maps granted scopes to OIDC claim subsets. `sub` is not included here;
/// the caller always sets it from `user.id`.
pub fn extract_user_claims(user: &User, scopes: &[String]) -> Map<String, Value> {
    let mut claims = Map::new();
    if scopes.iter().any(|s| s == "profile") {
        if let Some(name) = &user.given_name {
            claims.insert("given_name".to_string(), Value::String(name.clone()));
        }
        if let Some(name) = &user.family_name {
            claims.insert("family_name".to_string(), Value::String(name.clone()));
        }
        if let Some(nickname) = &user.nickname {
            claims.insert("nickname".to_string(), Value::String(nickname.clone()));
        }
        if let Some(picture) = &user.picture {
            claims.insert("picture".to_string(), Value::String(picture.clone()));
        }
        if let Some(locale) = &user.locale {
            claims.insert("locale".to_string(), Value::String(locale.clone()));
        }
        let full_name = [user.given_name.as_deref(), user.family_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !full_name.is_empty() {
            claims.insert("name".to_string(), Value::String(full_name));
        }
    }
    if scopes.iter().any(|s| s == "email") {
        claims.insert("email".to_string(), Value::String(user.email.clone()));
        claims.insert(
            "email_verified".to_string(),
            Value::Bool(user.email_verified),
        );
    }
    claims
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scopes_dedupes_and_preserves_order() {
        let scopes = parse_scopes("openid profile openid  email");
        assert_eq!(scopes, vec!["openid", "profile", "email"]);
    }

    #[test]
    fn parse_scopes_round_trip_is_idempotent() {
        let once = parse_scopes("openid profile email");
        let twice = parse_scopes(&join_scopes(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn validate_scopes_rejects_unsupported() {
        let supported = vec!["openid".to_string(), "email".to_string()];
        let err = validate_scopes(&["openid".to_string(), "admin".to_string()], &supported)
            .unwrap_err();
        assert_eq!(err.unsupported, "admin");
    }

    #[test]
    fn refresh_scope_must_be_subset() {
        let granted = vec!["openid".to_string(), "profile".to_string()];
        assert!(is_subset(&["openid".to_string()], &granted));
        assert!(!is_subset(&["email".to_string()], &granted));
    }
}
