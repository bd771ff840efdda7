// src/selector/scoring.rs — Deterministic candidate scoring
//
// This is the heuristic fallback when the AI selection path fails, and the
// evaluation criteria the AI prompt is written around.

use crate::core::types::{Need, Product, RawCandidate};

/// Value-for-money base: rating weighted by log review volume, per unit of
/// price. A missing rating or review count contributes zero.
pub fn base_score(candidate: &RawCandidate) -> f64 {
    let rating = candidate.rating.unwrap_or(0.0);
    let reviews = candidate.review_count.unwrap_or(0) as f64;
    let price = candidate.price.unwrap_or(0.0).max(1.0);
    (rating * (reviews + 1.0).ln()) / price
}

/// Cross-item compatibility bonus against the products already selected.
pub fn compatibility_bonus(candidate: &RawCandidate, need: &Need, selected: &[Product]) -> f64 {
    let mut bonus = 0.0;

    if let Some(brand) = extract_brand(&candidate.title) {
        let brand_match = selected
            .iter()
            .filter_map(|p| extract_brand(&p.title))
            .any(|b| b.eq_ignore_ascii_case(&brand));
        if brand_match {
            bonus += 0.2;
        }
    }

    if let Some(merchant) = &candidate.merchant {
        if selected
            .iter()
            .any(|p| p.merchant.eq_ignore_ascii_case(merchant))
        {
            bonus += 0.1;
        }
    }

    if let (Some(rating), false) = (candidate.rating, selected.is_empty()) {
        let mean: f64 = selected.iter().map(|p| p.rating).sum::<f64>() / selected.len() as f64;
        if (rating - mean).abs() <= 0.5 {
            bonus += 0.15;
        }
    }

    let category_taken = selected
        .iter()
        .any(|p| p.category.eq_ignore_ascii_case(&need.key));
    bonus += if category_taken { -0.1 } else { 0.1 };

    bonus
}

pub fn score(candidate: &RawCandidate, need: &Need, selected: &[Product]) -> f64 {
    base_score(candidate) + compatibility_bonus(candidate, need, selected)
}

/// Pick the best-scoring candidate index. Ties break toward the earlier
/// candidate.
pub fn best_index(candidates: &[RawCandidate], need: &Need, selected: &[Product]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        let s = score(candidate, need, selected);
        match best {
            Some((_, best_score)) if s <= best_score => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

/// First meaningful token of a title, treated as the brand.
pub fn extract_brand(title: &str) -> Option<String> {
    title
        .split_whitespace()
        .find(|w| w.len() > 2 && w.chars().all(|c| c.is_alphanumeric()))
        .map(|w| w.to_string())
}

/// Deterministic pros/cons from rating and review-count thresholds.
pub fn derive_pros_cons(rating: Option<f64>, review_count: Option<u64>) -> (Vec<String>, Vec<String>) {
    let mut pros = Vec::new();
    let mut cons = Vec::new();

    match rating {
        Some(r) if r >= 4.5 => pros.push("Excellent rating".to_string()),
        Some(r) if r < 3.5 => cons.push("Below-average rating".to_string()),
        _ => {}
    }

    match review_count {
        Some(n) if n >= 1000 => pros.push("Well-reviewed".to_string()),
        Some(n) if n < 50 => cons.push("Few reviews".to_string()),
        None => cons.push("Few reviews".to_string()),
        _ => {}
    }

    (pros, cons)
}

/// Confidence grows with score but is capped below certainty.
pub fn confidence_from_score(score: f64) -> f64 {
    (0.6 + score * 0.1).min(0.9)
}
