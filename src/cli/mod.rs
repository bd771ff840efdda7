// src/cli/mod.rs — CLI definition (clap derive)

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::api::{self, AppState};
use crate::cache::{Cache, MemoryCache};
use crate::core::orchestrator::BuildOrchestrator;
use crate::core::types::{BudgetChart, ChartSegment, Need, Style};
use crate::infra::config::Config;
use crate::infra::errors::KitForgeError;
use crate::planner::templates::TemplateRegistry;
use crate::planner::{distribute_budget, NeedPlanner};
use crate::provider::openai::OpenAiProvider;
use crate::provider::retry::RetryPolicy;
use crate::provider::{ModelProvider, ModelRef};
use crate::search::serpapi::SerpApiGateway;
use crate::search::{CandidateFetcher, SearchGateway};
use crate::selector::Selector;

#[derive(Parser)]
#[command(name = "kitforge", version, about = "Budgeted shopping-build service")]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the deterministic template plan for a query (no AI, no network)
    Plan {
        query: String,

        #[arg(short, long, default_value = "1000")]
        budget: f64,

        /// premium or casual
        #[arg(short, long, default_value = "casual")]
        style: String,
    },
}

/// Wire the full pipeline from config and start the HTTP server.
pub async fn run_serve(config: &Config, port_override: Option<u16>) -> anyhow::Result<()> {
    let openai_key =
        config
            .models
            .resolve_openai_key()
            .ok_or_else(|| KitForgeError::MissingCredential {
                name: "OPENAI_API_KEY".into(),
            })?;
    let serpapi_key =
        config
            .search
            .resolve_serpapi_key()
            .ok_or_else(|| KitForgeError::MissingCredential {
                name: "SERPAPI_API_KEY".into(),
            })?;

    let provider: Arc<dyn ModelProvider> = Arc::new(OpenAiProvider::new(openai_key));
    let gateway: Arc<dyn SearchGateway> = Arc::new(SerpApiGateway::new(serpapi_key));
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let retry = RetryPolicy::from_config(&config.retry);

    let planner_ref = ModelRef::parse(&config.models.planner)
        .unwrap_or_else(|| ModelRef::new("openai", config.models.planner.clone()));
    let selector_ref = ModelRef::parse(&config.models.selector)
        .unwrap_or_else(|| ModelRef::new("openai", config.models.selector.clone()));

    let planner = Arc::new(NeedPlanner::new(
        Arc::clone(&provider),
        planner_ref,
        retry.clone(),
        Duration::from_millis(config.timeouts.plan_ms),
    ));
    let selector = Arc::new(Selector::new(
        provider,
        selector_ref,
        Duration::from_millis(config.timeouts.select_ms),
    ));
    let fetcher = Arc::new(CandidateFetcher::new(
        gateway,
        Arc::clone(&cache),
        retry,
        Duration::from_millis(config.timeouts.search_ms),
        config.cache.search_window_secs,
        config.limits.lookup_quota,
    ));
    let orchestrator = Arc::new(BuildOrchestrator::new(
        planner,
        selector,
        fetcher,
        cache,
        config.limits.clone(),
        Duration::from_secs(config.cache.build_ttl_secs),
    ));

    let port = port_override.unwrap_or(config.server.port);
    api::start_server(AppState { orchestrator }, port).await?;
    Ok(())
}

/// Template-plan inspection without touching any provider: which template a
/// query matches and how the budget would distribute across it.
pub fn run_plan(query: &str, budget: f64, style: &str) -> anyhow::Result<()> {
    let style = match style.to_lowercase().as_str() {
        "premium" => Style::Premium,
        "casual" => Style::Casual,
        other => anyhow::bail!("unknown style '{other}', expected premium or casual"),
    };
    if !budget.is_finite() || budget <= 0.0 {
        anyhow::bail!("budget must be positive");
    }

    let registry = TemplateRegistry::standard();
    let (tag, builder) = registry.select(query);
    let template_needs = builder(style);

    let shares: Vec<f64> = template_needs.iter().map(|n| n.percent).collect();
    let amounts = distribute_budget(budget, &shares);
    let needs: Vec<Need> = template_needs
        .into_iter()
        .zip(amounts)
        .filter(|(_, amount)| *amount > 0.0)
        .map(|(t, amount)| Need {
            key: t.key.to_string(),
            name: t.name,
            target_price: amount,
            specs: t.specs,
            priority: t.priority,
        })
        .collect();

    let chart = BudgetChart {
        segments: needs
            .iter()
            .enumerate()
            .map(|(i, n)| ChartSegment {
                label: n.name.clone(),
                amount: n.target_price,
                color: crate::core::types::palette_color(i).to_string(),
            })
            .collect(),
    };

    let output = serde_json::json!({
        "template": tag,
        "needs": needs,
        "chart": chart,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_plan_rejects_bad_style() {
        assert!(run_plan("office setup", 1000.0, "luxurious").is_err());
    }

    #[test]
    fn test_run_plan_rejects_bad_budget() {
        assert!(run_plan("office setup", -1.0, "casual").is_err());
        assert!(run_plan("office setup", f64::NAN, "casual").is_err());
    }

    #[test]
    fn test_run_plan_ok() {
        assert!(run_plan("gaming setup", 1500.0, "premium").is_ok());
    }
}
