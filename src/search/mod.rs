// src/search/mod.rs — Marketplace search boundary
//
// The gateway issues a query against the external search provider and
// returns raw payload items; `CandidateFetcher` layers caching, the
// normalization adapter chain, deferred URL resolution, and amazon-only
// filtering on top. The orchestrator only ever talks to the fetcher.

pub mod normalize;
pub mod serpapi;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{search_key, Cache};
use crate::core::types::{RawCandidate, SearchMetadata};
use crate::infra::errors::KitForgeError;
use crate::provider::retry::RetryPolicy;

/// Raw response from the search provider, before normalization.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub items: Vec<serde_json::Value>,
    pub total_results: u64,
}

#[async_trait]
pub trait SearchGateway: Send + Sync {
    fn id(&self) -> &str;

    /// Run a product search. `amazon_mode` switches the provider to its
    /// Amazon-specific engine for the secondary targeted search.
    async fn search(
        &self,
        query: &str,
        currency: &str,
        amazon_mode: bool,
        limit: usize,
    ) -> Result<SearchResponse, KitForgeError>;

    /// Resolve a product URL out of band for candidates that came back
    /// without a link. Best-effort; `None` means unresolvable.
    async fn lookup(&self, product_id: &str) -> Result<Option<String>, KitForgeError>;
}

/// Search + normalize + filter for one need.
pub struct CandidateFetcher {
    gateway: Arc<dyn SearchGateway>,
    cache: Arc<dyn Cache>,
    retry: RetryPolicy,
    timeout: Duration,
    window_secs: u64,
    lookup_quota: usize,
}

impl CandidateFetcher {
    pub fn new(
        gateway: Arc<dyn SearchGateway>,
        cache: Arc<dyn Cache>,
        retry: RetryPolicy,
        timeout: Duration,
        window_secs: u64,
        lookup_quota: usize,
    ) -> Self {
        Self {
            gateway,
            cache,
            retry,
            timeout,
            window_secs,
            lookup_quota,
        }
    }

    /// Fetch normalized, in-allowlist candidates for one query.
    ///
    /// When `amazon_only` filtering empties a non-empty raw result set, one
    /// secondary search against the Amazon engine is attempted before
    /// reporting zero candidates.
    pub async fn fetch(
        &self,
        query: &str,
        currency: &str,
        amazon_only: bool,
        limit: usize,
    ) -> Result<(Vec<RawCandidate>, SearchMetadata), KitForgeError> {
        let (response, cached) = self.search_cached(query, currency, false, limit).await?;
        let mut candidates = normalize::normalize_all(&response.items, currency);
        self.resolve_missing_urls(&mut candidates).await;
        let raw_count = candidates.len();

        if amazon_only {
            candidates = normalize::filter_amazon_only(candidates);

            if candidates.is_empty() && raw_count > 0 {
                tracing::info!(
                    query,
                    "Amazon-only filter emptied results, trying Amazon engine"
                );
                let (secondary, _) = self.search_cached(query, currency, true, limit).await?;
                candidates = normalize::normalize_all(&secondary.items, currency);
                self.resolve_missing_urls(&mut candidates).await;
                candidates = normalize::filter_amazon_only(candidates);
            }
        }

        let metadata = SearchMetadata {
            provider: self.gateway.id().to_string(),
            total_results: response.total_results,
            cached,
        };
        Ok((candidates, metadata))
    }

    /// Search with coarse time-window memoization. Returns whether the
    /// response came from the cache.
    async fn search_cached(
        &self,
        query: &str,
        currency: &str,
        amazon_mode: bool,
        limit: usize,
    ) -> Result<(SearchResponse, bool), KitForgeError> {
        let key = search_key(query, currency, amazon_mode, limit, self.window_secs);

        if let Some(value) = self.cache.get(&key).await {
            if let Some(response) = decode_cached(&value) {
                return Ok((response, true));
            }
        }

        let response = match tokio::time::timeout(
            self.timeout,
            self.retry.run("search", || {
                self.gateway.search(query, currency, amazon_mode, limit)
            }),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(KitForgeError::timeout(
                    "search",
                    self.timeout.as_millis() as u64,
                ))
            }
        };

        self.cache
            .set(
                &key,
                serde_json::json!({
                    "items": response.items,
                    "total_results": response.total_results,
                }),
                Duration::from_secs(self.window_secs),
            )
            .await;

        Ok((response, false))
    }

    /// One extra lookup per URL-less candidate, capped to the configured
    /// quota. Candidates that stay unresolved are dropped.
    async fn resolve_missing_urls(&self, candidates: &mut Vec<RawCandidate>) {
        let mut lookups = 0;
        let mut resolved = Vec::with_capacity(candidates.len());

        for mut candidate in candidates.drain(..) {
            if candidate.url.is_none() && lookups < self.lookup_quota {
                lookups += 1;
                match self.gateway.lookup(&candidate.id).await {
                    Ok(Some(url)) => candidate.url = Some(url),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(id = %candidate.id, "URL lookup failed: {}", e);
                    }
                }
            }
            if candidate.url.is_some() {
                resolved.push(candidate);
            }
        }

        *candidates = resolved;
    }
}

fn decode_cached(value: &serde_json::Value) -> Option<SearchResponse> {
    Some(SearchResponse {
        items: value.get("items")?.as_array()?.clone(),
        total_results: value.get("total_results")?.as_u64()?,
    })
}
