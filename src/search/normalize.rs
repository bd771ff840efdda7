// src/search/normalize.rs — Candidate normalization adapter chain
//
// Marketplace payloads are heterogeneous; each adapter knows one payload
// shape and implements `normalize(raw) → Option<RawCandidate>`. Adapters are
// tried in fixed priority order so provider quirks stay isolated.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::core::types::RawCandidate;

/// One payload shape the provider can return.
pub trait CandidateAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `None` when the raw item does not match this adapter's shape
    /// or fails validation.
    fn normalize(&self, raw: &serde_json::Value, currency: &str) -> Option<RawCandidate>;
}

/// Amazon storefront domains across major locales, used for amazon-only
/// filtering and merchant inference.
pub const AMAZON_DOMAINS: [&str; 16] = [
    "amazon.com",
    "amazon.co.uk",
    "amazon.de",
    "amazon.fr",
    "amazon.it",
    "amazon.es",
    "amazon.ca",
    "amazon.com.mx",
    "amazon.com.br",
    "amazon.in",
    "amazon.co.jp",
    "amazon.com.au",
    "amazon.nl",
    "amazon.se",
    "amazon.sg",
    "amazon.ae",
];

const PLACEHOLDER_PATTERNS: [&str; 8] = [
    "no-image",
    "noimage",
    "placeholder",
    "default",
    "missing",
    "stock-photo",
    "image-unavailable",
    "spacer",
];

/// Normalize a whole raw response through the adapter chain.
///
/// Identity falls back to a positional timestamp+index id so every candidate
/// is unique within one response. Items with neither a title nor a URL are
/// dropped here; items missing only a URL survive for deferred resolution.
pub fn normalize_all(items: &[serde_json::Value], currency: &str) -> Vec<RawCandidate> {
    let adapters: [&dyn CandidateAdapter; 2] = [&ShoppingResultAdapter, &OrganicResultAdapter];
    let batch_ts = chrono::Utc::now().timestamp_millis();
    let mut out = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let Some(mut candidate) = adapters.iter().find_map(|a| a.normalize(item, currency)) else {
            continue;
        };
        if candidate.id.is_empty() {
            candidate.id = format!("cand-{}-{}", batch_ts, index);
        }
        if candidate.title.is_empty() && candidate.url.is_none() {
            continue;
        }
        out.push(candidate);
    }
    out
}

/// SerpApi `shopping_results` shape.
pub struct ShoppingResultAdapter;

impl CandidateAdapter for ShoppingResultAdapter {
    fn name(&self) -> &'static str {
        "shopping_result"
    }

    fn normalize(&self, raw: &serde_json::Value, currency: &str) -> Option<RawCandidate> {
        // ASIN-keyed items belong to the organic adapter.
        if raw["asin"].is_string() {
            return None;
        }
        // A missing title is not disqualifying on its own; `normalize_all`
        // drops the candidate only when the URL is missing too.
        let title = raw["title"].as_str().unwrap_or("").trim().to_string();

        let id = raw["product_id"]
            .as_str()
            .or_else(|| raw["offer_id"].as_str())
            .or_else(|| raw["product_link"].as_str())
            .or_else(|| raw["link"].as_str())
            .unwrap_or("")
            .to_string();

        let url = raw["product_link"]
            .as_str()
            .or_else(|| raw["link"].as_str())
            .map(str::to_string);

        let price = raw["extracted_price"]
            .as_f64()
            .filter(|p| p.is_finite() && *p > 0.0)
            .or_else(|| raw["price"].as_str().and_then(parse_price));

        let merchant = raw["source"]
            .as_str()
            .or_else(|| raw["seller"].as_str())
            .or_else(|| raw["store"].as_str())
            .map(str::to_string)
            .or_else(|| url.as_deref().and_then(merchant_from_url));

        let image = raw["thumbnail"]
            .as_str()
            .or_else(|| raw["image"].as_str())
            .filter(|u| is_usable_image(u))
            .map(str::to_string);

        Some(RawCandidate {
            id,
            title,
            url,
            price,
            currency: raw["currency"]
                .as_str()
                .map(str::to_string)
                .or_else(|| Some(currency.to_string())),
            merchant,
            rating: raw["rating"].as_f64(),
            review_count: raw["reviews"].as_u64(),
            image,
        })
    }
}

/// Amazon-engine `organic_results` shape (ASIN-keyed).
pub struct OrganicResultAdapter;

impl CandidateAdapter for OrganicResultAdapter {
    fn name(&self) -> &'static str {
        "organic_result"
    }

    fn normalize(&self, raw: &serde_json::Value, currency: &str) -> Option<RawCandidate> {
        // Distinguished from the shopping shape by the ASIN field.
        let asin = raw["asin"].as_str()?;
        let title = raw["title"].as_str().unwrap_or("").trim().to_string();

        let url = raw["link_clean"]
            .as_str()
            .or_else(|| raw["link"].as_str())
            .map(str::to_string);

        let price = raw["price"]["value"]
            .as_f64()
            .filter(|p| p.is_finite() && *p > 0.0)
            .or_else(|| raw["price"]["raw"].as_str().and_then(parse_price))
            .or_else(|| raw["price"].as_str().and_then(parse_price));

        let image = raw["image"]
            .as_str()
            .or_else(|| raw["thumbnail"].as_str())
            .filter(|u| is_usable_image(u))
            .map(str::to_string);

        Some(RawCandidate {
            id: asin.to_string(),
            title,
            url,
            price,
            currency: Some(currency.to_string()),
            merchant: Some("Amazon".into()),
            rating: raw["rating"].as_f64(),
            review_count: raw["ratings_total"].as_u64().or_else(|| raw["reviews"].as_u64()),
            image,
        })
    }
}

/// Parse a marketplace price string.
///
/// Recognizes currency-symbol prefixes, thousand separators, ranges
/// ("$19.99 - $29.99" takes the first figure), and "from $X" phrasing.
pub fn parse_price(s: &str) -> Option<f64> {
    static SYMBOL_RE: OnceLock<Regex> = OnceLock::new();
    static PLAIN_RE: OnceLock<Regex> = OnceLock::new();

    let symbol_re = SYMBOL_RE
        .get_or_init(|| Regex::new(r"[$£€₹¥]\s*([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap());
    let plain_re =
        PLAIN_RE.get_or_init(|| Regex::new(r"([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap());

    // First symbol match also covers ranges and "from $X": the leading
    // figure is the one we want.
    let captured = symbol_re
        .captures(s)
        .or_else(|| plain_re.captures(s))?
        .get(1)?
        .as_str()
        .replace(',', "");

    let value: f64 = captured.parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some(value)
}

/// Reject known placeholder/broken-image URLs and images whose query
/// parameters declare dimensions below 100px.
pub fn is_usable_image(url: &str) -> bool {
    let lower = url.to_lowercase();
    if PLACEHOLDER_PATTERNS.iter().any(|p| lower.contains(p)) {
        return false;
    }

    if let Ok(parsed) = Url::parse(url) {
        for (key, value) in parsed.query_pairs() {
            let key = key.to_lowercase();
            if matches!(key.as_str(), "w" | "h" | "width" | "height") {
                if let Ok(px) = value.parse::<u32>() {
                    if px < 100 {
                        return false;
                    }
                }
            }
        }
    }
    true
}

/// Infer a merchant name from a URL's registrable domain.
pub fn merchant_from_url(url: &str) -> Option<String> {
    let host = registrable_domain(url)?;

    if AMAZON_DOMAINS.contains(&host.as_str()) {
        return Some("Amazon".into());
    }

    // "bestbuy.com" → "Bestbuy"
    let label = host.split('.').next()?;
    let mut chars = label.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().collect::<String>() + chars.as_str())
}

fn registrable_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    // Longest-suffix match against the multi-label Amazon locales first,
    // then collapse everything else to its last two labels.
    for domain in AMAZON_DOMAINS {
        if host == domain || host.ends_with(&format!(".{domain}")) {
            return Some(domain.to_string());
        }
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() >= 2 {
        Some(labels[labels.len() - 2..].join("."))
    } else {
        Some(host.to_string())
    }
}

/// True when the candidate resolves to an Amazon storefront by merchant
/// name or URL.
pub fn is_amazon(candidate: &RawCandidate) -> bool {
    if let Some(merchant) = &candidate.merchant {
        if merchant.to_lowercase().contains("amazon") {
            return true;
        }
    }
    candidate
        .url
        .as_deref()
        .and_then(registrable_domain)
        .map(|d| AMAZON_DOMAINS.contains(&d.as_str()))
        .unwrap_or(false)
}

pub fn filter_amazon_only(candidates: Vec<RawCandidate>) -> Vec<RawCandidate> {
    candidates.into_iter().filter(is_amazon).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── parse_price ────────────────────────────────────────────

    #[test]
    fn test_price_simple() {
        assert_eq!(parse_price("$19.99"), Some(19.99));
        assert_eq!(parse_price("£150"), Some(150.0));
        assert_eq!(parse_price("€1299.00"), Some(1299.0));
    }

    #[test]
    fn test_price_thousand_separators() {
        assert_eq!(parse_price("$1,299.99"), Some(1299.99));
        assert_eq!(parse_price("₹12,34,567"), Some(1234567.0));
    }

    #[test]
    fn test_price_range_takes_first() {
        assert_eq!(parse_price("$19.99 - $29.99"), Some(19.99));
    }

    #[test]
    fn test_price_from_phrasing() {
        assert_eq!(parse_price("from $49.00"), Some(49.0));
    }

    #[test]
    fn test_price_plain_number() {
        assert_eq!(parse_price("249.50"), Some(249.5));
    }

    #[test]
    fn test_price_rejects_garbage() {
        assert_eq!(parse_price("Call for price"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("$0"), None);
        assert_eq!(parse_price("$0.00"), None);
    }

    #[test]
    fn test_price_yen() {
        assert_eq!(parse_price("¥3,980"), Some(3980.0));
    }

    // ─── image filtering ────────────────────────────────────────

    #[test]
    fn test_image_placeholder_rejected() {
        assert!(!is_usable_image("https://cdn.example.com/no-image.png"));
        assert!(!is_usable_image("https://cdn.example.com/img/placeholder.jpg"));
        assert!(!is_usable_image("https://cdn.example.com/stock-photo-generic.jpg"));
    }

    #[test]
    fn test_image_small_dimensions_rejected() {
        assert!(!is_usable_image("https://cdn.example.com/p.jpg?w=64&h=64"));
        assert!(!is_usable_image("https://cdn.example.com/p.jpg?width=50"));
    }

    #[test]
    fn test_image_normal_passes_through() {
        assert!(is_usable_image("https://cdn.example.com/p.jpg?w=500&h=500"));
        assert!(is_usable_image("https://cdn.example.com/products/widget.jpg"));
    }

    // ─── merchant inference ─────────────────────────────────────

    #[test]
    fn test_merchant_from_url() {
        assert_eq!(
            merchant_from_url("https://www.bestbuy.com/site/p/123"),
            Some("Bestbuy".into())
        );
    }

    #[test]
    fn test_merchant_amazon_locales() {
        assert_eq!(
            merchant_from_url("https://www.amazon.co.jp/dp/B0TEST"),
            Some("Amazon".into())
        );
        assert_eq!(
            merchant_from_url("https://amazon.de/dp/B0TEST"),
            Some("Amazon".into())
        );
    }

    #[test]
    fn test_is_amazon_by_merchant() {
        let c = RawCandidate {
            id: "1".into(),
            title: "Desk".into(),
            url: Some("https://shop.example/desk".into()),
            price: Some(100.0),
            currency: None,
            merchant: Some("Amazon.com".into()),
            rating: None,
            review_count: None,
            image: None,
        };
        assert!(is_amazon(&c));
    }

    #[test]
    fn test_is_amazon_by_url_subdomain() {
        let c = RawCandidate {
            id: "1".into(),
            title: "Desk".into(),
            url: Some("https://smile.amazon.com/dp/B0TEST".into()),
            price: Some(100.0),
            currency: None,
            merchant: None,
            rating: None,
            review_count: None,
            image: None,
        };
        assert!(is_amazon(&c));
    }

    // ─── adapter chain ──────────────────────────────────────────

    #[test]
    fn test_shopping_adapter_full_item() {
        let raw = serde_json::json!({
            "product_id": "p-1",
            "title": "Ergonomic Chair",
            "link": "https://shop.example/chair",
            "price": "$249.99",
            "source": "Example Store",
            "rating": 4.6,
            "reviews": 1200,
            "thumbnail": "https://cdn.example.com/chair.jpg"
        });
        let c = ShoppingResultAdapter.normalize(&raw, "USD").unwrap();
        assert_eq!(c.id, "p-1");
        assert_eq!(c.price, Some(249.99));
        assert_eq!(c.merchant.as_deref(), Some("Example Store"));
        assert_eq!(c.review_count, Some(1200));
    }

    #[test]
    fn test_shopping_adapter_prefers_extracted_price() {
        let raw = serde_json::json!({
            "title": "Chair",
            "link": "https://shop.example/chair",
            "extracted_price": 199.0,
            "price": "$249.99",
        });
        let c = ShoppingResultAdapter.normalize(&raw, "USD").unwrap();
        assert_eq!(c.price, Some(199.0));
    }

    #[test]
    fn test_shopping_adapter_merchant_from_url_fallback() {
        let raw = serde_json::json!({
            "title": "Chair",
            "link": "https://www.wayfair.com/p/chair",
        });
        let c = ShoppingResultAdapter.normalize(&raw, "USD").unwrap();
        assert_eq!(c.merchant.as_deref(), Some("Wayfair"));
    }

    #[test]
    fn test_organic_adapter_requires_asin() {
        let raw = serde_json::json!({"title": "Chair", "link": "https://x.example"});
        assert!(OrganicResultAdapter.normalize(&raw, "USD").is_none());
    }

    #[test]
    fn test_organic_adapter_amazon_shape() {
        let raw = serde_json::json!({
            "asin": "B0TEST",
            "title": "Gaming Mouse",
            "link": "https://www.amazon.com/dp/B0TEST",
            "price": {"value": 39.99, "raw": "$39.99"},
            "rating": 4.4,
            "ratings_total": 8800,
        });
        let c = OrganicResultAdapter.normalize(&raw, "USD").unwrap();
        assert_eq!(c.id, "B0TEST");
        assert_eq!(c.price, Some(39.99));
        assert_eq!(c.merchant.as_deref(), Some("Amazon"));
        assert_eq!(c.review_count, Some(8800));
    }

    #[test]
    fn test_shopping_adapter_defers_asin_items() {
        let raw = serde_json::json!({"asin": "B0TEST", "title": "Mouse"});
        assert!(ShoppingResultAdapter.normalize(&raw, "USD").is_none());
    }

    #[test]
    fn test_normalize_all_keeps_titleless_with_url() {
        let items = vec![serde_json::json!({
            "link": "https://shop.example/mystery",
            "price": "$10",
        })];
        let out = normalize_all(&items, "USD");
        assert_eq!(out.len(), 1);
        assert!(out[0].title.is_empty());
        assert_eq!(out[0].url.as_deref(), Some("https://shop.example/mystery"));
    }

    #[test]
    fn test_normalize_all_routes_asin_items_to_organic_adapter() {
        let items = vec![serde_json::json!({
            "asin": "B0TEST",
            "title": "Gaming Mouse",
            "link": "https://www.amazon.com/dp/B0TEST",
        })];
        let out = normalize_all(&items, "USD");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "B0TEST");
        assert_eq!(out[0].merchant.as_deref(), Some("Amazon"));
    }

    #[test]
    fn test_normalize_all_drops_titleless_urlless() {
        let items = vec![
            serde_json::json!({"title": "", "price": "$10"}),
            serde_json::json!({"title": "Keyboard", "link": "https://shop.example/kb"}),
        ];
        let out = normalize_all(&items, "USD");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Keyboard");
    }

    #[test]
    fn test_normalize_all_positional_ids_unique() {
        let items = vec![
            serde_json::json!({"title": "A"}),
            serde_json::json!({"title": "B"}),
        ];
        let out = normalize_all(&items, "USD");
        assert_eq!(out.len(), 2);
        assert_ne!(out[0].id, out[1].id);
        assert!(out[0].id.starts_with("cand-"));
    }

    #[test]
    fn test_normalize_all_keeps_urlless_with_title() {
        // Deferred resolution happens later; don't drop here.
        let items = vec![serde_json::json!({"title": "Mystery Widget", "product_id": "m-1"})];
        let out = normalize_all(&items, "USD");
        assert_eq!(out.len(), 1);
        assert!(out[0].url.is_none());
    }

    #[test]
    fn test_filter_amazon_only() {
        let mk = |url: &str| RawCandidate {
            id: url.into(),
            title: "x".into(),
            url: Some(url.into()),
            price: Some(10.0),
            currency: None,
            merchant: None,
            rating: None,
            review_count: None,
            image: None,
        };
        let candidates = vec![
            mk("https://www.amazon.com/dp/1"),
            mk("https://shop.example/2"),
            mk("https://amazon.co.uk/dp/3"),
        ];
        let filtered = filter_amazon_only(candidates);
        assert_eq!(filtered.len(), 2);
    }
}
