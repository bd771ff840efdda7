// src/core/orchestrator.rs — Build pipeline orchestration
//
// Wires plan → parallel search/select fan-out → budget enforcement →
// response assembly, with whole-build memoization around the lot. One
// failed need never sinks the build; the planner failing outright does.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::cache::{build_key, Cache};
use crate::core::budget;
use crate::core::types::{
    BuildRequest, BuildResult, BuildStage, Need, Plan, Product, ResultsMode, SearchMetadata,
};
use crate::infra::config::LimitsConfig;
use crate::infra::errors::KitForgeError;
use crate::planner::NeedPlanner;
use crate::search::CandidateFetcher;
use crate::selector::{SelectionContext, Selector};

pub struct BuildOrchestrator {
    planner: Arc<NeedPlanner>,
    selector: Arc<Selector>,
    fetcher: Arc<CandidateFetcher>,
    cache: Arc<dyn Cache>,
    limits: LimitsConfig,
    build_ttl: Duration,
}

/// What one need's task reports back to the assembly step.
struct NeedOutcome {
    index: usize,
    product: Option<Product>,
    metadata: Option<SearchMetadata>,
    filtered_to_zero: bool,
}

impl BuildOrchestrator {
    pub fn new(
        planner: Arc<NeedPlanner>,
        selector: Arc<Selector>,
        fetcher: Arc<CandidateFetcher>,
        cache: Arc<dyn Cache>,
        limits: LimitsConfig,
        build_ttl: Duration,
    ) -> Self {
        Self {
            planner,
            selector,
            fetcher,
            cache,
            limits,
            build_ttl,
        }
    }

    pub async fn run(&self, request: &BuildRequest) -> Result<BuildResult, KitForgeError> {
        let key = build_key(&request.query, &request.settings);

        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(mut result) = serde_json::from_value::<BuildResult>(cached) {
                tracing::info!(query = %request.query, "Serving memoized build");
                result.search_metadata.cached = true;
                return Ok(result);
            }
        }

        tracing::info!(
            query = %request.query,
            budget = request.settings.budget,
            stage = BuildStage::Planning.as_str(),
            "Starting build"
        );
        let plan = self.planner.plan(&request.query, &request.settings).await?;
        tracing::info!(
            needs = plan.needs.len(),
            is_setup = plan.is_setup,
            fallback = plan.fallback_used,
            "Plan ready"
        );

        let outcomes = self.process_needs(request, &plan).await;
        let result = self.assemble(request, &plan, outcomes);

        if let Ok(value) = serde_json::to_value(&result) {
            tracing::debug!(stage = BuildStage::Caching.as_str(), "Memoizing build");
            self.cache.set(&key, value, self.build_ttl).await;
        }

        Ok(result)
    }

    /// Fan out one task per need. Tasks run in parallel and settle
    /// independently; a failed search or selection logs and yields no
    /// product for that need only.
    async fn process_needs(&self, request: &BuildRequest, plan: &Plan) -> Vec<NeedOutcome> {
        let pool_size = match request.settings.results_mode {
            ResultsMode::Single => self.limits.single_pool,
            ResultsMode::Multiple => self.limits.multi_pool,
        };
        let ctx = SelectionContext {
            budget: request.settings.budget,
            currency: request.settings.currency.clone(),
            style: request.settings.style,
            region: request.settings.region.clone(),
        };
        // Best-effort compatibility context: needs that finish early inform
        // the ones still selecting.
        let selected: Arc<RwLock<Vec<Product>>> = Arc::new(RwLock::new(Vec::new()));

        let mut handles = Vec::with_capacity(plan.needs.len());
        for (index, need) in plan.needs.iter().cloned().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let selector = Arc::clone(&self.selector);
            let selected = Arc::clone(&selected);
            let ctx = ctx.clone();
            let currency = request.settings.currency.clone();
            let amazon_only = request.settings.amazon_only;

            handles.push(tokio::spawn(async move {
                process_one_need(
                    index,
                    need,
                    fetcher,
                    selector,
                    selected,
                    ctx,
                    currency,
                    amazon_only,
                    pool_size,
                )
                .await
            }));
        }

        let joined = futures::future::join_all(handles).await;
        let mut outcomes = Vec::with_capacity(joined.len());
        for (index, result) in joined.into_iter().enumerate() {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::warn!(need_index = index, "Need task panicked: {}", e);
                    outcomes.push(NeedOutcome {
                        index,
                        product: None,
                        metadata: None,
                        filtered_to_zero: false,
                    });
                }
            }
        }
        outcomes
    }

    /// Order products by plan (priority) order, enforce the budget, and
    /// attach ghost tips explaining any gaps.
    fn assemble(
        &self,
        request: &BuildRequest,
        plan: &Plan,
        mut outcomes: Vec<NeedOutcome>,
    ) -> BuildResult {
        outcomes.sort_by_key(|o| o.index);

        let mut metadata = SearchMetadata {
            provider: String::new(),
            total_results: 0,
            cached: false,
        };
        let mut all_cached = true;
        let mut any_metadata = false;
        let mut unmatched: Vec<String> = Vec::new();
        let mut filtered_to_zero = false;
        let mut products: Vec<Product> = Vec::new();

        for outcome in outcomes {
            if let Some(m) = outcome.metadata {
                metadata.provider = m.provider;
                metadata.total_results += m.total_results;
                all_cached &= m.cached;
                any_metadata = true;
            }
            filtered_to_zero |= outcome.filtered_to_zero;
            match outcome.product {
                Some(product) => products.push(product),
                None => {
                    if let Some(need) = plan.needs.get(outcome.index) {
                        unmatched.push(need.name.clone());
                    }
                }
            }
        }
        metadata.cached = any_metadata && all_cached;

        tracing::info!(
            stage = BuildStage::BudgetEnforcing.as_str(),
            products = products.len(),
            "Enforcing budget"
        );
        let before = products.len();
        let products = budget::enforce(products, request.settings.budget);
        let trimmed = before - products.len();

        let mut ghost_tips = Vec::new();
        if products.is_empty() {
            ghost_tips.push(
                "No products fit within the budget. Try a higher budget or a broader query."
                    .to_string(),
            );
        } else if !unmatched.is_empty() {
            ghost_tips.push(format!(
                "No match found within the allocated budget for: {}.",
                unmatched.join(", ")
            ));
        } else if trimmed == 0 {
            let spent: f64 = products.iter().map(|p| p.price).sum();
            ghost_tips.push(format!(
                "All {} items matched, {:.2} of {:.2} {} spent.",
                products.len(),
                spent,
                request.settings.budget,
                request.settings.currency
            ));
        }
        if trimmed > 0 {
            ghost_tips.push(format!(
                "{trimmed} lower-priority item(s) were dropped to keep the total within budget."
            ));
        }
        if request.settings.amazon_only && filtered_to_zero {
            ghost_tips.push(
                "Amazon-only filtering removed all results for some items. Disable it to see more options."
                    .to_string(),
            );
        }
        if plan.fallback_used {
            ghost_tips.push(
                "This plan was built from a standard template because AI planning was unavailable."
                    .to_string(),
            );
        }

        BuildResult {
            products,
            budget_chart: plan.chart.clone(),
            ghost_tips,
            search_metadata: metadata,
            is_setup: plan.is_setup,
            search_id: Uuid::new_v4().to_string(),
            fallback_plan: plan.fallback_used,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_one_need(
    index: usize,
    need: Need,
    fetcher: Arc<CandidateFetcher>,
    selector: Arc<Selector>,
    selected: Arc<RwLock<Vec<Product>>>,
    ctx: SelectionContext,
    currency: String,
    amazon_only: bool,
    pool_size: usize,
) -> NeedOutcome {
    let query = if need.specs.is_empty() {
        need.name.clone()
    } else {
        format!("{} {}", need.name, need.specs)
    };

    tracing::debug!(
        need = %need.key,
        stage = BuildStage::Searching.as_str(),
        query = %query,
        "Searching"
    );
    let (candidates, metadata) = match fetcher.fetch(&query, &currency, amazon_only, pool_size).await
    {
        Ok(fetched) => fetched,
        Err(e) => {
            tracing::warn!(need = %need.key, "Search failed, skipping need: {}", e);
            return NeedOutcome {
                index,
                product: None,
                metadata: None,
                filtered_to_zero: false,
            };
        }
    };
    let filtered_to_zero = amazon_only && candidates.is_empty() && metadata.total_results > 0;

    tracing::debug!(
        need = %need.key,
        stage = BuildStage::Selecting.as_str(),
        candidates = candidates.len(),
        "Selecting"
    );
    let snapshot = selected.read().await.clone();
    let product = selector.select(&need, &candidates, &ctx, &snapshot).await;

    if let Some(product) = &product {
        selected.write().await.push(product.clone());
        tracing::info!(
            need = %need.key,
            title = %product.title,
            price = product.price,
            "Need satisfied"
        );
    } else {
        tracing::info!(need = %need.key, "No product selected");
    }

    NeedOutcome {
        index,
        product,
        metadata: Some(metadata),
        filtered_to_zero,
    }
}
