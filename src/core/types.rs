// src/core/types.rs — Domain types for the build pipeline

use serde::{Deserialize, Serialize};

use crate::infra::errors::KitForgeError;

/// Budget/style preference attached to a build request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSettings {
    pub style: Style,
    pub budget: f64,
    pub currency: String,
    #[serde(default)]
    pub results_mode: ResultsMode,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub amazon_only: bool,
}

fn default_region() -> String {
    "us".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Style {
    Premium,
    Casual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultsMode {
    Single,
    #[default]
    Multiple,
}

/// A free-text query plus settings. The only user input to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub query: String,
    pub settings: BuildSettings,
}

impl BuildRequest {
    pub fn validate(&self) -> Result<(), KitForgeError> {
        let query = self.query.trim();
        if query.is_empty() || query.len() > 200 {
            return Err(KitForgeError::Validation(
                "query must be 1-200 characters".into(),
            ));
        }
        if !self.settings.budget.is_finite() || self.settings.budget <= 0.0 {
            return Err(KitForgeError::Validation("budget must be positive".into()));
        }
        Ok(())
    }
}

/// A budgeted product category derived from the query. Created once per
/// build by the planner, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Need {
    pub key: String,
    pub name: String,
    pub target_price: f64,
    pub specs: String,
    /// 1-10, higher is more essential.
    pub priority: u8,
}

/// Ordered set of needs whose target prices sum to the requested budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub needs: Vec<Need>,
    /// Multi-category setup (true) vs single-item tiers (false).
    pub is_setup: bool,
    /// Set when the deterministic template served the plan.
    pub fallback_used: bool,
    pub chart: Option<BudgetChart>,
}

impl Plan {
    pub fn total_allocated(&self) -> f64 {
        self.needs.iter().map(|n| n.target_price).sum()
    }
}

/// Unvalidated marketplace search result. Exists only within one search call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCandidate {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub merchant: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    pub image: Option<String>,
}

/// A normalized, selected, and justified recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub merchant: String,
    pub rating: f64,
    pub review_count: u64,
    pub image_url: Option<String>,
    pub product_url: String,
    pub rationale: String,
    pub category: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    /// 0.0-1.0
    pub confidence: f64,
    /// Rank within the candidate pool of its own need. Never used for
    /// cross-product ordering; the budget enforcer orders by need priority.
    pub search_rank: u32,
}

/// Budget distribution chart for multi-need setups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetChart {
    pub segments: Vec<ChartSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSegment {
    pub label: String,
    pub amount: f64,
    pub color: String,
}

/// Fixed chart palette. Colors coming back from the model are validated
/// against this list and replaced positionally when they don't match.
pub const CHART_PALETTE: [&str; 8] = [
    "#6366f1", "#8b5cf6", "#ec4899", "#f59e0b", "#10b981", "#06b6d4", "#f43f5e", "#84cc16",
];

pub fn palette_color(index: usize) -> &'static str {
    CHART_PALETTE[index % CHART_PALETTE.len()]
}

pub fn is_palette_color(color: &str) -> bool {
    CHART_PALETTE.iter().any(|c| c.eq_ignore_ascii_case(color))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    pub provider: String,
    pub total_results: u64,
    pub cached: bool,
}

/// Final response payload assembled by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub products: Vec<Product>,
    pub budget_chart: Option<BudgetChart>,
    pub ghost_tips: Vec<String>,
    pub search_metadata: SearchMetadata,
    pub is_setup: bool,
    pub search_id: String,
    /// Marker mirrored into a response header by the API layer.
    #[serde(default)]
    pub fallback_plan: bool,
}

/// Pipeline stages, used as structured log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Planning,
    Searching,
    Selecting,
    BudgetEnforcing,
    Caching,
}

impl BuildStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStage::Planning => "planning",
            BuildStage::Searching => "searching",
            BuildStage::Selecting => "selecting",
            BuildStage::BudgetEnforcing => "budget_enforcing",
            BuildStage::Caching => "caching",
        }
    }
}
