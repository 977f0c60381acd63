//! Per-account failure tracking and lockout (spec 4.9).

use crate::config::LockoutConfig;
use crate::store::{DynStore, User};
use crate::token::parse_duration;

pub struct LockoutManager {
    config: LockoutConfig,
}

impl LockoutManager {
    pub fn new(config: LockoutConfig) -> Self {
        Self { config }
    }

    pub fn is_locked(&self, user: &User) -> bool {
        if !self.config.enabled {
            return false;
        }
        match user.locked_until {
            Some(until) => now() < until,
            None => false,
        }
    }

    /// Increments the failure counter; locks the account once it reaches
    /// `max_attempts`.
    pub async fn record_failure(&self, users: &DynStore<User>, user: &User) {
        if !self.config.enabled {
            return;
        }
        let mut updated = user.clone();
        updated.failed_attempts += 1;
        if updated.failed_attempts >= self.config.max_attempts {
            let duration = parse_duration(&self.config.lockout_duration).unwrap_or(900);
            updated.locked_until = Some(now() + duration);
            tracing::info!(target: "authkeep.lockout", user_id = %user.id, "account_locked");
        }
        let _ = users.update(&user.id, updated).await;
    }

    pub async fn record_success(&self, users: &DynStore<User>, user: &User) {
        if !self.config.enabled || !self.config.reset_on_success {
            return;
        }
        if user.failed_attempts == 0 && user.locked_until.is_none() {
            return;
        }
        let mut updated = user.clone();
        updated.failed_attempts = 0;
        updated.locked_until = None;
        let _ = users.update(&user.id, updated).await;
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn test_user() -> User {
        User {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
            password_hash: String::new(),
            email_verified: true,
            given_name: None,
            family_name: None,
            nickname: None,
            picture: None,
            locale: None,
            scopes: vec![],
            roles: vec![],
            tenant_id: None,
            active: true,
            failed_attempts: 0,
            locked_until: None,
        }
    }

    #[tokio::test]
    async fn locks_after_max_attempts() {
        let config = LockoutConfig {
            enabled: true,
            max_attempts: 3,
            lockout_duration: "15m".to_string(),
            reset_on_success: true,
        };
        let manager = LockoutManager::new(config);
        let users: DynStore<User> = std::sync::Arc::new(InMemoryStore::new());
        let mut user = test_user();
        users.insert(user.clone()).await.unwrap();

        for _ in 0..2 {
            manager.record_failure(&users, &user).await;
            user = users.get(&user.id).await.unwrap().unwrap();
            assert!(!manager.is_locked(&user));
        }
        manager.record_failure(&users, &user).await;
        user = users.get(&user.id).await.unwrap().unwrap();
        assert!(manager.is_locked(&user));
    }

    #[tokio::test]
    async fn success_resets_counter() {
        let manager = LockoutManager::new(LockoutConfig {
            enabled: true,
            max_attempts: 5,
            lockout_duration: "15m".to_string(),
            reset_on_success: true,
        });
        let users: DynStore<User> = std::sync::Arc::new(InMemoryStore::new());
        let mut user = test_user();
        user.failed_attempts = 3;
        users.insert(user.clone()).await.unwrap();

        manager.record_success(&users, &user).await;
        let reloaded = users.get(&user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.failed_attempts, 0);
    }
}
