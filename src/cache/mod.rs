// src/cache/mod.rs — Memoization layer
//
// Builds are content-addressed by a fingerprint of (query, settings); raw
// searches are additionally bucketed into coarse time windows so repeat
// searches hit the cache without serving stale data indefinitely. Duplicate
// concurrent builds for the same fingerprint doing redundant work is an
// accepted inefficiency, so no locking beyond the store's own.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::core::types::BuildSettings;

/// Idempotent get/set-with-TTL store boundary.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<serde_json::Value>;
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration);
}

/// In-process cache with per-entry expiry. Injected through the API state
/// rather than living in a global, so its lifecycle is the server's.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (serde_json::Value, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        let mut entries = self.entries.write().await;
        // Opportunistic sweep keeps the map from accumulating dead entries.
        let now = Instant::now();
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (value, now + ttl));
    }
}

/// Fingerprint a build request: identical (query, settings) always map to
/// the same key.
pub fn build_key(query: &str, settings: &BuildSettings) -> String {
    let canonical = serde_json::json!({
        "query": query.trim().to_lowercase(),
        "settings": settings,
    });
    let digest = Sha256::digest(canonical.to_string().as_bytes());
    format!("build:{}", hex::encode(digest))
}

/// Key a raw search into a coarse time window.
pub fn search_key(
    query: &str,
    currency: &str,
    amazon_only: bool,
    limit: usize,
    window_secs: u64,
) -> String {
    let bucket = window_bucket(chrono::Utc::now().timestamp() as u64, window_secs);
    let canonical = format!(
        "{}|{}|{}|{}|{}",
        query.trim().to_lowercase(),
        currency,
        amazon_only,
        limit,
        bucket
    );
    let digest = Sha256::digest(canonical.as_bytes());
    format!("search:{}", hex::encode(digest))
}

fn window_bucket(now_secs: u64, window_secs: u64) -> u64 {
    now_secs / window_secs.max(1)
}
