use std::time::Duration;

use async_trait::async_trait;

/// Optional distributed key-value backing for the context-cache index and
/// the distributed lock guarding intuition-cache creation. When no
/// distributed store is configured, `ContextCacheStore` falls back to an
/// in-process index and an uncontended local mutex.
#[async_trait]
pub trait DistributedKv: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn save(&self, key: &str, value: &str, ttl: Duration);
    async fn delete(&self, key: &str);
    /// Acquire a named lock, returning `true` if acquired. Best-effort —
    /// callers must tolerate a `false` result by proceeding without
    /// exclusivity rather than deadlocking.
    async fn lock(&self, name: &str, ttl: Duration) -> bool;
    async fn unlock(&self, name: &str);
}
