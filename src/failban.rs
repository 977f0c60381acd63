//! IP violation accumulation, ban creation/lookup, whitelist/blacklist, and
//! optional geo policy (spec 4.8).

use std::collections::HashSet;

use dashmap::DashMap;

use crate::config::components::FailbanConfig;

/// Resolves an IP to a country code. An external collaborator — the core
/// cannot own a GeoIP database, so this is injected.
pub trait GeoResolver: Send + Sync {
    fn resolve(&self, ip: &str) -> Option<String>;
}

/// Default resolver: geo policy is a no-op until an embedder wires a real
/// one in.
pub struct NullGeoResolver;

impl GeoResolver for NullGeoResolver {
    fn resolve(&self, _ip: &str) -> Option<String> {
        None
    }
}

struct Violations {
    timestamps: Vec<i64>,
}

struct Ban {
    expires_at: i64,
    #[allow(dead_code)]
    reason: String,
}

pub struct FailbanManager {
    config: FailbanConfig,
    whitelist: HashSet<String>,
    blacklist: HashSet<String>,
    violations: DashMap<String, Violations>,
    bans: DashMap<String, Ban>,
    geo: Box<dyn GeoResolver>,
}

impl FailbanManager {
    pub fn new(config: FailbanConfig, geo: Box<dyn GeoResolver>) -> Self {
        let whitelist = config.whitelist.iter().cloned().collect();
        let blacklist = config.blacklist.iter().cloned().collect();
        Self {
            config,
            whitelist,
            blacklist,
            violations: DashMap::new(),
            bans: DashMap::new(),
            geo,
        }
    }

    pub fn is_whitelisted(&self, ip: &str) -> bool {
        self.whitelist.contains(ip)
    }

    /// `true` when the IP must be refused outright: blacklisted or an
    /// unexpired ban is on record. Expired bans are lazily cleared.
    pub fn is_banned(&self, ip: &str) -> Option<u64> {
        if self.blacklist.contains(ip) {
            return Some(self.config.ban_duration_ms / 1000);
        }
        if self.whitelist.contains(ip) {
            return None;
        }
        let now = now_ms();
        if let Some(ban) = self.bans.get(ip) {
            if ban.expires_at > now {
                return Some(((ban.expires_at - now).max(1000) / 1000).max(1) as u64);
            }
        }
        if self.bans.get(ip).is_some() {
            self.bans.remove(ip);
        }
        None
    }

    /// Records one violation; creates/refreshes a ban once the count within
    /// `violation_window_ms` reaches `max_violations`.
    pub fn record_violation(&self, ip: &str, reason: &str) {
        if !self.config.enabled || self.whitelist.contains(ip) || self.blacklist.contains(ip) {
            return;
        }
        let now = now_ms();
        let window_start = now - self.config.violation_window_ms as i64;

        let mut entry = self
            .violations
            .entry(ip.to_string())
            .or_insert_with(|| Violations { timestamps: Vec::new() });
        entry.timestamps.retain(|t| *t >= window_start);
        entry.timestamps.push(now);
        let count = entry.timestamps.len() as u32;
        drop(entry);

        if count >= self.config.max_violations {
            self.bans.insert(
                ip.to_string(),
                Ban {
                    expires_at: now + self.config.ban_duration_ms as i64,
                    reason: reason.to_string(),
                },
            );
            tracing::info!(target: "authkeep.failban", ip, reason, "ip_banned");
        }
    }

    /// `true` if geo policy blocks this IP. A no-op unless `geo_enabled`.
    pub fn check_country_block(&self, ip: &str) -> bool {
        if !self.config.geo_enabled {
            return false;
        }
        match self.geo.resolve(ip) {
            Some(country) => {
                if !self.config.allowed_countries.is_empty()
                    && !self.config.allowed_countries.iter().any(|c| c == &country)
                {
                    return true;
                }
                self.config.blocked_countries.iter().any(|c| c == &country)
            }
            None => self.config.block_unknown_country,
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_violations: u32) -> FailbanConfig {
        FailbanConfig {
            enabled: true,
            max_violations,
            violation_window_ms: 300_000,
            ban_duration_ms: 900_000,
            whitelist: vec![],
            blacklist: vec![],
            geo_enabled: false,
            allowed_countries: vec![],
            blocked_countries: vec![],
            block_unknown_country: false,
            persist_violations: false,
        }
    }

    #[test]
    fn bans_after_max_violations() {
        let manager = FailbanManager::new(config(3), Box::new(NullGeoResolver));
        for _ in 0..2 {
            manager.record_violation("9.9.9.9", "bad_password");
            assert!(manager.is_banned("9.9.9.9").is_none());
        }
        manager.record_violation("9.9.9.9", "bad_password");
        assert!(manager.is_banned("9.9.9.9").is_some());
    }

    #[test]
    fn whitelisted_ip_never_bans() {
        let mut cfg = config(1);
        cfg.whitelist.push("10.0.0.1".to_string());
        let manager = FailbanManager::new(cfg, Box::new(NullGeoResolver));
        for _ in 0..10 {
            manager.record_violation("10.0.0.1", "bad_password");
        }
        assert!(manager.is_banned("10.0.0.1").is_none());
    }

    #[test]
    fn blacklisted_ip_is_always_banned() {
        let mut cfg = config(100);
        cfg.blacklist.push("6.6.6.6".to_string());
        let manager = FailbanManager::new(cfg, Box::new(NullGeoResolver));
        assert!(manager.is_banned("6.6.6.6").is_some());
    }
}
