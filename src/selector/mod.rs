// src/selector/mod.rs — Selector/Ranker
//
// Given a need and its normalized candidates, picks exactly one product.
// AI-backed with the deterministic heuristic as fallback; the heuristic is
// also the rubric the AI prompt describes.

pub mod scoring;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::core::types::{Need, Product, RawCandidate, Style};
use crate::infra::errors::KitForgeError;
use crate::provider::{ChatRequest, Message, ModelProvider, ModelRef};
use crate::util::{extract_json_object, strip_code_fences, truncate_str};

/// How many candidates the AI prompt describes.
const AI_CANDIDATE_LIMIT: usize = 12;

/// Shared request context visible to every need's selection.
#[derive(Debug, Clone)]
pub struct SelectionContext {
    pub budget: f64,
    pub currency: String,
    pub style: Style,
    pub region: String,
}

pub struct Selector {
    provider: Arc<dyn ModelProvider>,
    model: ModelRef,
    timeout: Duration,
}

/// The model's verdict for one need.
#[derive(Debug, Deserialize)]
struct AiSelection {
    index: i64,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    pros: Vec<String>,
    #[serde(default)]
    cons: Vec<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

impl Selector {
    pub fn new(provider: Arc<dyn ModelProvider>, model: ModelRef, timeout: Duration) -> Self {
        Self {
            provider,
            model,
            timeout,
        }
    }

    /// Pick at most one product for the need. Returns `None` when no
    /// candidate fits the need's target price.
    pub async fn select(
        &self,
        need: &Need,
        candidates: &[RawCandidate],
        ctx: &SelectionContext,
        selected: &[Product],
    ) -> Option<Product> {
        // Over-target candidates are never eligible, whatever the AI says.
        let affordable: Vec<&RawCandidate> = candidates
            .iter()
            .filter(|c| c.price.is_some_and(|p| p <= need.target_price))
            .filter(|c| c.url.is_some())
            .collect();

        if affordable.is_empty() {
            tracing::debug!(need = %need.key, "No in-budget candidates");
            return None;
        }

        let pool: Vec<&RawCandidate> = affordable.iter().take(AI_CANDIDATE_LIMIT).copied().collect();

        match tokio::time::timeout(self.timeout, self.ai_select(need, &pool, ctx, selected)).await
        {
            Ok(Ok(verdict)) if (verdict.index as usize) < pool.len() && verdict.index >= 0 => {
                let candidate = pool[verdict.index as usize];
                return Some(build_product(candidate, need, verdict, ctx));
            }
            Ok(Ok(verdict)) => {
                tracing::warn!(
                    need = %need.key,
                    index = verdict.index,
                    pool = pool.len(),
                    "AI selection index out of range, using heuristic"
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(need = %need.key, "AI selection failed, using heuristic: {}", e);
            }
            Err(_) => {
                tracing::warn!(
                    need = %need.key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "AI selection timed out, using heuristic"
                );
            }
        }

        self.heuristic_select(need, &affordable, ctx, selected)
    }

    /// Deterministic fallback path.
    fn heuristic_select(
        &self,
        need: &Need,
        affordable: &[&RawCandidate],
        ctx: &SelectionContext,
        selected: &[Product],
    ) -> Option<Product> {
        let owned: Vec<RawCandidate> = affordable.iter().map(|c| (*c).clone()).collect();
        let index = scoring::best_index(&owned, need, selected)?;
        let candidate = &owned[index];
        let s = scoring::score(candidate, need, selected);
        let (pros, cons) = scoring::derive_pros_cons(candidate.rating, candidate.review_count);

        Some(Product {
            id: candidate.id.clone(),
            title: candidate.title.clone(),
            price: candidate.price.unwrap_or(0.0),
            currency: candidate
                .currency
                .clone()
                .unwrap_or_else(|| ctx.currency.clone()),
            merchant: candidate.merchant.clone().unwrap_or_else(|| "Unknown".into()),
            rating: candidate.rating.unwrap_or(0.0),
            review_count: candidate.review_count.unwrap_or(0),
            image_url: candidate.image.clone(),
            product_url: candidate.url.clone().unwrap_or_default(),
            rationale: format!(
                "Best value for {} under {:.0} {}: strong rating-to-price ratio",
                need.name, need.target_price, ctx.currency
            ),
            category: need.key.clone(),
            pros,
            cons,
            confidence: scoring::confidence_from_score(s),
            search_rank: 1,
        })
    }

    async fn ai_select(
        &self,
        need: &Need,
        pool: &[&RawCandidate],
        ctx: &SelectionContext,
        selected: &[Product],
    ) -> Result<AiSelection, KitForgeError> {
        let prompt = selection_prompt(need, pool, ctx, selected);
        let response = self
            .provider
            .chat(ChatRequest {
                model: self.model.model.clone(),
                messages: vec![Message::user(prompt)],
                max_tokens: Some(600),
                temperature: Some(0.1),
                system: Some(
                    "You pick the single best product for a need. Respond only with the JSON \
                     object requested."
                        .into(),
                ),
            })
            .await?;

        parse_selection(&response.content).ok_or_else(|| KitForgeError::Provider {
            provider: self.provider.id().to_string(),
            message: "unusable selection response".into(),
            retriable: false,
        })
    }
}

fn selection_prompt(
    need: &Need,
    pool: &[&RawCandidate],
    ctx: &SelectionContext,
    selected: &[Product],
) -> String {
    let mut lines = Vec::with_capacity(pool.len());
    for (i, c) in pool.iter().enumerate() {
        lines.push(format!(
            "{i}. {title} — {price:.2} {currency}, {merchant}, rating {rating}, {reviews} reviews",
            title = truncate_str(&c.title, 80),
            price = c.price.unwrap_or(0.0),
            currency = c.currency.as_deref().unwrap_or(&ctx.currency),
            merchant = c.merchant.as_deref().unwrap_or("unknown"),
            rating = c
                .rating
                .map(|r| format!("{r:.1}"))
                .unwrap_or_else(|| "n/a".into()),
            reviews = c.review_count.unwrap_or(0),
        ));
    }

    let already = if selected.is_empty() {
        "none yet".to_string()
    } else {
        selected
            .iter()
            .map(|p| format!("{} ({}, {})", truncate_str(&p.title, 50), p.merchant, p.category))
            .collect::<Vec<_>>()
            .join("; ")
    };

    format!(
        "Need: {name} ({specs}), target price {target:.2} {currency} out of a {budget:.2} total \
         budget, style {style}, region {region}.\n\
         Already selected: {already}.\n\n\
         Candidates:\n{candidates}\n\n\
         Judge value for money (rating and review volume relative to price) and \
         compatibility with the already-selected items (brand, merchant, rating \
         consistency). Respond with one JSON object:\n\
         {{\"index\": <candidate number>, \"rationale\": \"...\", \
         \"pros\": [\"...\"], \"cons\": [\"...\"], \"confidence\": 0.0-1.0}}",
        name = need.name,
        specs = need.specs,
        target = need.target_price,
        budget = ctx.budget,
        currency = ctx.currency,
        style = match ctx.style {
            Style::Premium => "premium",
            Style::Casual => "casual",
        },
        region = ctx.region,
        already = already,
        candidates = lines.join("\n"),
    )
}

fn parse_selection(content: &str) -> Option<AiSelection> {
    let stripped = strip_code_fences(content);
    let json = extract_json_object(stripped)?;
    serde_json::from_str(json).ok()
}

fn build_product(
    candidate: &RawCandidate,
    need: &Need,
    verdict: AiSelection,
    ctx: &SelectionContext,
) -> Product {
    let (default_pros, default_cons) =
        scoring::derive_pros_cons(candidate.rating, candidate.review_count);

    Product {
        id: candidate.id.clone(),
        title: candidate.title.clone(),
        price: candidate.price.unwrap_or(0.0),
        currency: candidate
            .currency
            .clone()
            .unwrap_or_else(|| ctx.currency.clone()),
        merchant: candidate.merchant.clone().unwrap_or_else(|| "Unknown".into()),
        rating: candidate.rating.unwrap_or(0.0),
        review_count: candidate.review_count.unwrap_or(0),
        image_url: candidate.image.clone(),
        product_url: candidate.url.clone().unwrap_or_default(),
        rationale: if verdict.rationale.is_empty() {
            format!("Best match for {}", need.name)
        } else {
            verdict.rationale
        },
        category: need.key.clone(),
        pros: if verdict.pros.is_empty() {
            default_pros
        } else {
            verdict.pros
        },
        cons: if verdict.cons.is_empty() {
            default_cons
        } else {
            verdict.cons
        },
        confidence: verdict.confidence.unwrap_or(0.7).clamp(0.0, 1.0),
        search_rank: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatResponse;
    use async_trait::async_trait;

    struct CannedProvider {
        content: String,
    }

    #[async_trait]
    impl ModelProvider for CannedProvider {
        fn id(&self) -> &str {
            "canned"
        }
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, KitForgeError> {
            Ok(ChatResponse {
                content: self.content.clone(),
            })
        }
    }

    fn selector_with(content: &str) -> Selector {
        Selector::new(
            Arc::new(CannedProvider {
                content: content.to_string(),
            }),
            ModelRef::new("canned", "test-model"),
            Duration::from_secs(8),
        )
    }

    fn ctx() -> SelectionContext {
        SelectionContext {
            budget: 1000.0,
            currency: "USD".into(),
            style: Style::Casual,
            region: "us".into(),
        }
    }

    fn need(target: f64) -> Need {
        Need {
            key: "chair".into(),
            name: "Office chair".into(),
            target_price: target,
            specs: "mesh back".into(),
            priority: 8,
        }
    }

    fn candidate(title: &str, price: f64, rating: f64, reviews: u64) -> RawCandidate {
        RawCandidate {
            id: title.to_string(),
            title: title.to_string(),
            url: Some(format!("https://shop.example/{}", title.replace(' ', "-"))),
            price: Some(price),
            currency: Some("USD".into()),
            merchant: Some("Example Store".into()),
            rating: Some(rating),
            review_count: Some(reviews),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_no_affordable_candidates_returns_none() {
        let selector = selector_with(r#"{"index": 0}"#);
        let candidates = vec![candidate("Pricey Chair", 500.0, 4.8, 2000)];
        let result = selector.select(&need(200.0), &candidates, &ctx(), &[]).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_ai_selection_respected() {
        let selector = selector_with(
            r#"{"index": 1, "rationale": "Sturdier frame", "pros": ["Sturdy"], "cons": [], "confidence": 0.85}"#,
        );
        let candidates = vec![
            candidate("Chair A", 150.0, 4.0, 100),
            candidate("Chair B", 180.0, 4.6, 900),
        ];
        let product = selector
            .select(&need(200.0), &candidates, &ctx(), &[])
            .await
            .unwrap();
        assert_eq!(product.title, "Chair B");
        assert_eq!(product.rationale, "Sturdier frame");
        assert!((product.confidence - 0.85).abs() < 1e-9);
        assert_eq!(product.search_rank, 1);
    }

    #[tokio::test]
    async fn test_out_of_range_index_falls_back_to_heuristic() {
        let selector = selector_with(r#"{"index": 99}"#);
        let candidates = vec![
            candidate("Chair A", 150.0, 4.8, 5000),
            candidate("Chair B", 180.0, 3.1, 12),
        ];
        let product = selector
            .select(&need(200.0), &candidates, &ctx(), &[])
            .await
            .unwrap();
        // Heuristic prefers the better-rated, cheaper chair.
        assert_eq!(product.title, "Chair A");
    }

    #[tokio::test]
    async fn test_garbage_response_falls_back_to_heuristic() {
        let selector = selector_with("I would pick the second one probably");
        let candidates = vec![candidate("Chair A", 150.0, 4.2, 300)];
        let product = selector
            .select(&need(200.0), &candidates, &ctx(), &[])
            .await
            .unwrap();
        assert_eq!(product.title, "Chair A");
        assert!(product.confidence >= 0.6 && product.confidence <= 0.9);
    }

    #[tokio::test]
    async fn test_never_selects_over_target() {
        let selector = selector_with(r#"{"index": 0}"#);
        let candidates = vec![
            candidate("Too Expensive", 300.0, 5.0, 9000),
            candidate("Affordable", 190.0, 4.0, 500),
        ];
        let product = selector
            .select(&need(200.0), &candidates, &ctx(), &[])
            .await
            .unwrap();
        // Index 0 of the *affordable* pool is the cheap one.
        assert_eq!(product.title, "Affordable");
        assert!(product.price <= 200.0);
    }

    #[tokio::test]
    async fn test_urlless_candidates_excluded() {
        let selector = selector_with(r#"{"index": 0}"#);
        let mut c = candidate("No Link Chair", 100.0, 4.9, 4000);
        c.url = None;
        let result = selector.select(&need(200.0), &[c], &ctx(), &[]).await;
        assert!(result.is_none());
    }

    #[test]
    fn test_parse_selection_fenced() {
        let parsed = parse_selection("```json\n{\"index\": 2}\n```").unwrap();
        assert_eq!(parsed.index, 2);
    }

    #[test]
    fn test_prompt_mentions_selected_products() {
        let selected = vec![Product {
            id: "x".into(),
            title: "Logitech Keyboard".into(),
            price: 80.0,
            currency: "USD".into(),
            merchant: "Example Store".into(),
            rating: 4.5,
            review_count: 100,
            image_url: None,
            product_url: "https://shop.example/x".into(),
            rationale: String::new(),
            category: "keyboard".into(),
            pros: vec![],
            cons: vec![],
            confidence: 0.8,
            search_rank: 1,
        }];
        let c = candidate("Chair A", 150.0, 4.0, 100);
        let prompt = selection_prompt(&need(200.0), &[&c], &ctx(), &selected);
        assert!(prompt.contains("Logitech Keyboard"));
        assert!(prompt.contains("Chair A"));
    }
}
