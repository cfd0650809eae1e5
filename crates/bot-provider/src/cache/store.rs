use std::sync::Arc;
use std::time::Duration;

use bot_core::types::{CacheKind, ContextCacheEntry};
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::cache::kv::DistributedKv;

/// Remaining TTL below which a cache handle is extended rather than reused
/// as-is.
pub fn extend_threshold() -> chrono::Duration {
    chrono::Duration::minutes(2)
}
pub fn extension() -> chrono::Duration {
    chrono::Duration::minutes(5)
}
pub fn initial_ttl() -> chrono::Duration {
    chrono::Duration::minutes(15)
}
pub fn maturing_ttl() -> chrono::Duration {
    chrono::Duration::minutes(30)
}

/// Local index over provider-managed context-cache handles, optionally
/// write-through to a distributed store. The actual cache-create/extend
/// RPCs live in each adapter; this type only tracks which fingerprint maps
/// to which handle and for how long it remains valid.
pub struct ContextCacheStore {
    local: DashMap<String, ContextCacheEntry>,
    kv: Option<Arc<dyn DistributedKv>>,
}

impl ContextCacheStore {
    pub fn new(kv: Option<Arc<dyn DistributedKv>>) -> Self {
        Self {
            local: DashMap::new(),
            kv,
        }
    }

    /// Returns the entry for `fingerprint` only if it is still valid at
    /// `now`; a stale entry is left in the index (the caller decides
    /// whether to extend or replace it).
    pub fn get_valid(&self, fingerprint: &str, now: DateTime<Utc>) -> Option<ContextCacheEntry> {
        self.local
            .get(fingerprint)
            .filter(|e| e.is_valid(now))
            .map(|e| e.clone())
    }

    /// Returns the raw entry regardless of expiry, so callers can decide
    /// between "extend" and "recreate".
    pub fn get(&self, fingerprint: &str) -> Option<ContextCacheEntry> {
        self.local.get(fingerprint).map(|e| e.clone())
    }

    pub fn insert(&self, entry: ContextCacheEntry) {
        self.local.insert(entry.fingerprint.clone(), entry);
    }

    pub fn remove(&self, fingerprint: &str) {
        self.local.remove(fingerprint);
    }

    pub fn needs_extension(entry: &ContextCacheEntry, now: DateTime<Utc>) -> bool {
        entry.expires_at - now < extend_threshold()
    }

    /// Writes a `maturing` sentinel under `maturation:{chat_key}` so
    /// observers can see promotion progress even though no provider-side
    /// cache was created (request fell below the eligibility threshold).
    pub fn write_maturing_sentinel(&self, chat_key: &str, model: &str, provider: &str, now: DateTime<Utc>) {
        let key = format!("maturation:{chat_key}");
        self.local.insert(
            key.clone(),
            ContextCacheEntry {
                cache_name: String::new(),
                expires_at: now + maturing_ttl(),
                model: model.to_string(),
                provider: provider.to_string(),
                scope: chat_key.to_string(),
                fingerprint: key,
                stored_content_hash: String::new(),
                kind: CacheKind::Maturing,
            },
        );
    }

    /// Best-effort distributed lock around intuition-cache creation.
    /// Always granted when no distributed store is configured — a single
    /// process has no contention to guard against.
    pub async fn try_lock(&self, name: &str, ttl: Duration) -> bool {
        match &self.kv {
            Some(kv) => kv.lock(name, ttl).await,
            None => true,
        }
    }

    pub async fn unlock(&self, name: &str) {
        if let Some(kv) = &self.kv {
            kv.unlock(name).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fingerprint: &str, expires_at: DateTime<Utc>) -> ContextCacheEntry {
        ContextCacheEntry {
            cache_name: "cachedContents/abc".into(),
            expires_at,
            model: "gemini-2.5-flash".into(),
            provider: "gemini".into(),
            scope: "inst|chat".into(),
            fingerprint: fingerprint.into(),
            stored_content_hash: "h".into(),
            kind: CacheKind::Bot,
        }
    }

    #[test]
    fn get_valid_filters_expired() {
        let store = ContextCacheStore::new(None);
        let now = Utc::now();
        store.insert(entry("fp1", now - chrono::Duration::minutes(1)));
        assert!(store.get_valid("fp1", now).is_none());
        assert!(store.get("fp1").is_some());
    }

    #[test]
    fn needs_extension_near_expiry() {
        let now = Utc::now();
        let e = entry("fp1", now + chrono::Duration::seconds(90));
        assert!(ContextCacheStore::needs_extension(&e, now));
        let e2 = entry("fp1", now + chrono::Duration::minutes(10));
        assert!(!ContextCacheStore::needs_extension(&e2, now));
    }

    #[test]
    fn maturing_sentinel_roundtrips() {
        let store = ContextCacheStore::new(None);
        let now = Utc::now();
        store.write_maturing_sentinel("inst|chat", "gemini-2.5-flash", "gemini", now);
        let got = store.get("maturation:inst|chat").unwrap();
        assert_eq!(got.kind, CacheKind::Maturing);
    }

    #[tokio::test]
    async fn lock_granted_without_distributed_backend() {
        let store = ContextCacheStore::new(None);
        assert!(store.try_lock("global:intuition:gemini-2.5-flash", Duration::from_secs(5)).await);
    }
}
