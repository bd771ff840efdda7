// src/planner/mod.rs — Need Planner
//
// Decomposes a query/budget/style into an ordered list of budgeted needs.
// AI-backed with a deterministic template fallback; single-item queries get
// a tiered plan instead of a multi-category setup. Planning never hard-fails
// on provider trouble: a rate limit or timeout downgrades to the template.

pub mod templates;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::core::types::{
    is_palette_color, palette_color, BudgetChart, BuildSettings, ChartSegment, Need, Plan,
    ResultsMode, Style,
};
use crate::infra::errors::KitForgeError;
use crate::provider::retry::RetryPolicy;
use crate::provider::{ChatRequest, Message, ModelProvider, ModelRef};
use templates::TemplateRegistry;

const STOPWORDS: [&str; 14] = [
    "a", "an", "the", "for", "my", "me", "best", "good", "new", "cheap", "nice", "some", "to",
    "buy",
];

const SINGLE_ITEM_NOUNS: [&str; 24] = [
    "chair", "desk", "monitor", "keyboard", "mouse", "headset", "headphones", "laptop", "phone",
    "tablet", "tv", "camera", "microphone", "speaker", "sofa", "mattress", "blender", "kettle",
    "lamp", "watch", "backpack", "printer", "router", "fan",
];

const SETUP_KEYWORDS: [&str; 12] = [
    "setup", "set up", "battlestation", "station", "room", "office", "kit", "bundle",
    "collection", "everything", "workspace", "studio",
];

pub struct NeedPlanner {
    provider: Arc<dyn ModelProvider>,
    model: ModelRef,
    templates: TemplateRegistry,
    retry: RetryPolicy,
    timeout: Duration,
}

/// One entry of the model's JSON plan, before clamping.
#[derive(Debug, Deserialize)]
struct PlannedEntry {
    #[serde(default)]
    category: Option<String>,
    name: String,
    #[serde(default)]
    specs: String,
    budget_allocation: f64,
    priority: f64,
    #[serde(default)]
    color: Option<String>,
}

impl NeedPlanner {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        model: ModelRef,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model,
            templates: TemplateRegistry::standard(),
            retry,
            timeout,
        }
    }

    /// Produce a plan for the query. Single-item queries bypass the AI call;
    /// AI failure, timeout, or rate limit downgrade to the template fallback.
    pub async fn plan(&self, query: &str, settings: &BuildSettings) -> Result<Plan, KitForgeError> {
        if is_single_item_query(query) {
            return self.single_item_plan(query, settings);
        }

        let plan = match tokio::time::timeout(self.timeout, self.ai_plan(query, settings)).await {
            Ok(Ok(plan)) => plan,
            Ok(Err(KitForgeError::RateLimited { provider, .. })) => {
                tracing::warn!(provider, query, "Planner rate limited, using template plan");
                self.fallback_plan(query, settings)?
            }
            Ok(Err(e)) => {
                tracing::warn!(query, "AI planning failed, using template plan: {}", e);
                self.fallback_plan(query, settings)?
            }
            Err(_) => {
                tracing::warn!(
                    query,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "AI planning timed out, using template plan"
                );
                self.fallback_plan(query, settings)?
            }
        };

        if plan.needs.is_empty() {
            return Err(KitForgeError::Other(anyhow::anyhow!(
                "planner produced no needs for query '{query}'"
            )));
        }
        Ok(plan)
    }

    async fn ai_plan(&self, query: &str, settings: &BuildSettings) -> Result<Plan, KitForgeError> {
        let prompt = self.plan_prompt(query, settings);
        let request = ChatRequest {
            model: self.model.model.clone(),
            messages: vec![Message::user(prompt)],
            max_tokens: Some(1200),
            temperature: Some(0.3),
            system: Some(
                "You are a shopping planner. Respond only with the JSON array requested.".into(),
            ),
        };

        // 5xx gets retry-then-fallback; 429 propagates untouched for
        // immediate fallback upstream.
        let response = self
            .retry
            .run("plan", || self.provider.chat(request.clone()))
            .await?;

        let entries = parse_plan_entries(&response.content).map_err(|e| {
            KitForgeError::Provider {
                provider: self.provider.id().to_string(),
                message: format!("unusable plan response: {e}"),
                retriable: false,
            }
        })?;

        Ok(build_plan_from_entries(entries, settings, false))
    }

    fn plan_prompt(&self, query: &str, settings: &BuildSettings) -> String {
        format!(
            "Decompose this shopping request into budgeted product categories.\n\n\
             Request: {query}\n\
             Total budget: {budget} {currency}\n\
             Style: {style}\n\n\
             Respond with a JSON array of 4-8 entries:\n\
             [{{\"category\": \"short-key\", \"name\": \"display name\", \
             \"specs\": \"one-line spec hint\", \"budget_allocation\": 45, \
             \"priority\": 10, \"color\": \"#6366f1\"}}]\n\n\
             budget_allocation values are percentages summing to 100. \
             priority is 1-10, higher = more essential.",
            query = query,
            budget = settings.budget,
            currency = settings.currency,
            style = match settings.style {
                Style::Premium => "premium",
                Style::Casual => "casual",
            },
        )
    }

    /// Deterministic template plan, marked as fallback.
    pub fn fallback_plan(
        &self,
        query: &str,
        settings: &BuildSettings,
    ) -> Result<Plan, KitForgeError> {
        let (tag, builder) = self.templates.select(query);
        tracing::info!(template = tag, query, "Building template plan");

        let template_needs = builder(settings.style);
        let shares: Vec<f64> = template_needs.iter().map(|n| n.percent).collect();
        let amounts = distribute_budget(settings.budget, &shares);

        let mut needs: Vec<Need> = template_needs
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
        needs.sort_by(|a, b| b.priority.cmp(&a.priority));

        let chart = chart_from_needs(&needs, &[]);
        Ok(Plan {
            needs,
            is_setup: true,
            fallback_used: true,
            chart: Some(chart),
        })
    }

    /// 1-3 budget tiers for a single-product query: the main pick, an
    /// alternative brand/style, and an optional budget variant.
    fn single_item_plan(
        &self,
        query: &str,
        settings: &BuildSettings,
    ) -> Result<Plan, KitForgeError> {
        let item = query.trim();
        let tiers: &[(&str, f64, u8, &str)] = match settings.results_mode {
            ResultsMode::Single => &[("main", 100.0, 10, "Top pick")],
            ResultsMode::Multiple => &[
                ("main", 60.0, 10, "Top pick"),
                ("alternative", 30.0, 6, "Alternative brand or style"),
                ("budget-option", 10.0, 3, "Budget variant"),
            ],
        };

        let shares: Vec<f64> = tiers.iter().map(|(_, pct, _, _)| *pct).collect();
        let amounts = distribute_budget(settings.budget, &shares);

        let needs: Vec<Need> = tiers
            .iter()
            .zip(amounts)
            .filter(|(_, amount)| *amount > 0.0)
            .map(|((key, _, priority, label), amount)| Need {
                key: key.to_string(),
                name: format!("{item} - {label}"),
                target_price: amount,
                specs: String::new(),
                priority: *priority,
            })
            .collect();

        if needs.is_empty() {
            return Err(KitForgeError::Other(anyhow::anyhow!(
                "budget too small to plan '{item}'"
            )));
        }

        Ok(Plan {
            needs,
            is_setup: false,
            fallback_used: false,
            chart: None,
        })
    }
}

/// Split a budget across weighted shares, in cents, with the largest share
/// absorbing the rounding residual so the total is exact.
pub fn distribute_budget(budget: f64, shares: &[f64]) -> Vec<f64> {
    let total_share: f64 = shares.iter().filter(|s| **s > 0.0).sum();
    if total_share <= 0.0 || budget <= 0.0 {
        return vec![0.0; shares.len()];
    }

    let mut amounts: Vec<f64> = shares
        .iter()
        .map(|s| {
            if *s <= 0.0 {
                0.0
            } else {
                (budget * s / total_share * 100.0).round() / 100.0
            }
        })
        .collect();

    let allocated: f64 = amounts.iter().sum();
    let residual = ((budget - allocated) * 100.0).round() / 100.0;
    if residual != 0.0 {
        if let Some(largest) = amounts
            .iter_mut()
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        {
            *largest = ((*largest + residual) * 100.0).round() / 100.0;
        }
    }
    amounts
}

/// Short/noun queries without setup keywords are single products, not setups.
pub fn is_single_item_query(query: &str) -> bool {
    let lower = query.to_lowercase();
    if SETUP_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return false;
    }

    let words: Vec<&str> = lower
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w))
        .collect();

    if words.len() <= 2 && !words.is_empty() {
        return true;
    }
    words.iter().any(|w| SINGLE_ITEM_NOUNS.contains(w))
}

/// Parse the model's plan JSON, tolerating markdown code fences and prose
/// around the array.
fn parse_plan_entries(content: &str) -> anyhow::Result<Vec<PlannedEntry>> {
    let stripped = crate::util::strip_code_fences(content);
    let json = crate::util::extract_json_array(stripped)
        .ok_or_else(|| anyhow::anyhow!("no JSON array in response"))?;
    let entries: Vec<PlannedEntry> = serde_json::from_str(json)?;
    if entries.is_empty() {
        anyhow::bail!("empty plan");
    }
    Ok(entries)
}

/// Clamp, distribute, and order AI plan entries into a Plan.
fn build_plan_from_entries(
    entries: Vec<PlannedEntry>,
    settings: &BuildSettings,
    fallback_used: bool,
) -> Plan {
    let shares: Vec<f64> = entries
        .iter()
        .map(|e| e.budget_allocation.max(0.0))
        .collect();
    let amounts = distribute_budget(settings.budget, &shares);

    // Colors ride along with their entries so sorting keeps them aligned.
    let mut planned: Vec<(Need, Option<String>)> = entries
        .into_iter()
        .zip(amounts)
        .filter(|(_, amount)| *amount > 0.0)
        .map(|(e, amount)| {
            let need = Need {
                key: e
                    .category
                    .unwrap_or_else(|| e.name.clone())
                    .to_lowercase()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join("-"),
                name: e.name,
                target_price: amount,
                specs: e.specs,
                priority: e.priority.clamp(1.0, 10.0).round() as u8,
            };
            (need, e.color)
        })
        .collect();
    planned.sort_by(|a, b| b.0.priority.cmp(&a.0.priority));

    let colors: Vec<Option<String>> = planned.iter().map(|(_, c)| c.clone()).collect();
    let needs: Vec<Need> = planned.into_iter().map(|(n, _)| n).collect();

    let chart = chart_from_needs(&needs, &colors);
    Plan {
        needs,
        is_setup: true,
        fallback_used,
        chart: Some(chart),
    }
}

/// Chart segments from needs; colors outside the fixed palette are replaced
/// positionally.
fn chart_from_needs(needs: &[Need], proposed_colors: &[Option<String>]) -> BudgetChart {
    let segments = needs
        .iter()
        .enumerate()
        .map(|(i, need)| {
            let color = proposed_colors
                .get(i)
                .and_then(|c| c.as_deref())
                .filter(|c| is_palette_color(c))
                .unwrap_or_else(|| palette_color(i))
                .to_string();
            ChartSegment {
                label: need.name.clone(),
                amount: need.target_price,
                color,
            }
        })
        .collect();
    BudgetChart { segments }
}
