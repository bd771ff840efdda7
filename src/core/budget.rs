// src/core/budget.rs — Hard budget enforcement
//
// Last gate before a build leaves the orchestrator: the products that ship
// must never total more than the user's budget.

use crate::core::types::Product;

/// Greedy single pass in input order. The input arrives sorted by need
/// priority, so a skipped expensive item never blocks a cheaper lower
/// priority item later in the list.
pub fn enforce(products: Vec<Product>, budget: f64) -> Vec<Product> {
    let total: f64 = products.iter().map(|p| p.price).sum();
    if total <= budget {
        return products;
    }

    tracing::warn!(
        total = format!("{total:.2}"),
        budget = format!("{budget:.2}"),
        "Build over budget, trimming"
    );

    let mut kept = Vec::with_capacity(products.len());
    let mut running = 0.0;
    for product in products {
        if running + product.price <= budget {
            running += product.price;
            kept.push(product);
        } else {
            tracing::debug!(
                category = %product.category,
                price = product.price,
                "Dropped to stay within budget"
            );
        }
    }
    kept
}
