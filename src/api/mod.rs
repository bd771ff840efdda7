// src/api/mod.rs — HTTP surface

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::core::orchestrator::BuildOrchestrator;
use crate::infra::errors::KitForgeError;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BuildOrchestrator>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/build", post(handlers::build))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> Result<(), KitForgeError> {
    let router = build_router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr, "Listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::cache::MemoryCache;
    use crate::infra::config::LimitsConfig;
    use crate::planner::NeedPlanner;
    use crate::provider::retry::RetryPolicy;
    use crate::provider::{ChatRequest, ChatResponse, ModelProvider, ModelRef};
    use crate::search::{CandidateFetcher, SearchGateway, SearchResponse};
    use crate::selector::Selector;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StubProvider;

    #[async_trait]
    impl ModelProvider for StubProvider {
        fn id(&self) -> &str {
            "stub"
        }
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, KitForgeError> {
            Ok(ChatResponse {
                content: "not json".into(),
            })
        }
    }

    struct StubGateway;

    #[async_trait]
    impl SearchGateway for StubGateway {
        fn id(&self) -> &str {
            "stub"
        }
        async fn search(
            &self,
            _query: &str,
            _currency: &str,
            _amazon_mode: bool,
            _limit: usize,
        ) -> Result<SearchResponse, KitForgeError> {
            Ok(SearchResponse {
                items: vec![],
                total_results: 0,
            })
        }
        async fn lookup(&self, _product_id: &str) -> Result<Option<String>, KitForgeError> {
            Ok(None)
        }
    }

    fn test_state() -> AppState {
        let provider = Arc::new(StubProvider);
        let cache = Arc::new(MemoryCache::new());
        let planner = Arc::new(NeedPlanner::new(
            provider.clone(),
            ModelRef::new("stub", "m"),
            RetryPolicy::default(),
            Duration::from_secs(10),
        ));
        let selector = Arc::new(Selector::new(
            provider,
            ModelRef::new("stub", "m"),
            Duration::from_secs(8),
        ));
        let fetcher = Arc::new(CandidateFetcher::new(
            Arc::new(StubGateway),
            cache.clone(),
            RetryPolicy::default(),
            Duration::from_secs(15),
            600,
            3,
        ));
        AppState {
            orchestrator: Arc::new(BuildOrchestrator::new(
                planner,
                selector,
                fetcher,
                cache,
                LimitsConfig::default(),
                Duration::from_secs(3600),
            )),
        }
    }

    #[tokio::test]
    async fn test_health_ok() {
        let router = build_router(test_state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_body() {
        let router = build_router(test_state());
        let body = serde_json::json!({
            "query": "",
            "settings": {"style": "Casual", "budget": 500, "currency": "USD"}
        });
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/build")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
