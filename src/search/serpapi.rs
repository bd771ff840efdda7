// src/search/serpapi.rs — SerpApi search gateway

use async_trait::async_trait;

use super::{SearchGateway, SearchResponse};
use crate::infra::errors::KitForgeError;

pub struct SerpApiGateway {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl SerpApiGateway {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://serpapi.com".into())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    async fn get_json(
        &self,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, KitForgeError> {
        let response = self
            .client
            .get(format!("{}/search.json", self.base_url))
            .query(params)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| KitForgeError::Provider {
                provider: "serpapi".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5);
            return Err(KitForgeError::RateLimited {
                provider: "serpapi".into(),
                retry_after_ms: retry_after * 1000,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(KitForgeError::Provider {
                provider: "serpapi".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        response.json().await.map_err(|e| KitForgeError::Provider {
            provider: "serpapi".into(),
            message: format!("Failed to parse response: {}", e),
            retriable: false,
        })
    }
}

#[async_trait]
impl SearchGateway for SerpApiGateway {
    fn id(&self) -> &str {
        "serpapi"
    }

    async fn search(
        &self,
        query: &str,
        currency: &str,
        amazon_mode: bool,
        limit: usize,
    ) -> Result<SearchResponse, KitForgeError> {
        let resp = if amazon_mode {
            self.get_json(&[
                ("engine", "amazon".to_string()),
                ("k", query.to_string()),
            ])
            .await?
        } else {
            self.get_json(&[
                ("engine", "google_shopping".to_string()),
                ("q", query.to_string()),
                ("currency", currency.to_string()),
                ("num", limit.to_string()),
            ])
            .await?
        };

        // The two engines key their result arrays differently.
        let items = resp["shopping_results"]
            .as_array()
            .or_else(|| resp["organic_results"].as_array())
            .cloned()
            .unwrap_or_default();

        let total_results = resp["search_information"]["total_results"]
            .as_u64()
            .unwrap_or(items.len() as u64);

        Ok(SearchResponse {
            items: items.into_iter().take(limit).collect(),
            total_results,
        })
    }

    async fn lookup(&self, product_id: &str) -> Result<Option<String>, KitForgeError> {
        // Product ids without links are resolvable via the product endpoint.
        let resp = self
            .get_json(&[
                ("engine", "google_product".to_string()),
                ("product_id", product_id.to_string()),
            ])
            .await?;

        Ok(resp["product_results"]["link"]
            .as_str()
            .or_else(|| resp["sellers_results"]["online_sellers"][0]["link"].as_str())
            .map(str::to_string))
    }
}
