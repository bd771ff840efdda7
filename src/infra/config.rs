// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub retry: RetryTomlConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model used for need planning ("provider/model" format).
    pub planner: String,
    /// Model used for candidate selection. Cheaper than the planner by
    /// default since it runs once per need.
    pub selector: String,
    pub openai_api_key: Option<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            planner: "openai/gpt-4o".into(),
            selector: "openai/gpt-4o-mini".into(),
            openai_api_key: None,
        }
    }
}

impl ModelsConfig {
    /// API key from config, falling back to the environment.
    pub fn resolve_openai_key(&self) -> Option<String> {
        self.openai_api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    pub serpapi_api_key: Option<String>,
}

impl SearchConfig {
    pub fn resolve_serpapi_key(&self) -> Option<String> {
        self.serpapi_api_key
            .clone()
            .or_else(|| std::env::var("SERPAPI_API_KEY").ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    pub plan_ms: u64,
    pub search_ms: u64,
    pub select_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            plan_ms: 10_000,
            search_ms: 15_000,
            select_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for whole-build memoization.
    pub build_ttl_secs: u64,
    /// Raw searches are keyed into windows of this width, so repeated
    /// searches within a window hit the cache without serving stale data
    /// indefinitely.
    pub search_window_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            build_ttl_secs: 3_600,
            search_window_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryTomlConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub jitter_fraction: f64,
}

impl Default for RetryTomlConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 8_000,
            jitter_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Candidate pool size when the request asks for a single result set.
    pub single_pool: usize,
    /// Candidate pool size for multi-result mode.
    pub multi_pool: usize,
    /// Out-of-band URL lookups allowed per search response.
    pub lookup_quota: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            single_pool: 10,
            multi_pool: 15,
            lookup_quota: 3,
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from file, falling back to defaults when absent.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load_from(p),
            None => Ok(Self::default()),
        }
    }
}
