//! HTTP API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{analyze, health, prometheus, ready, search, status, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Analysis endpoints
        .route("/api/v1/status", get(status))
        .route("/api/v1/analyze", post(analyze))
        .route("/api/v1/search", get(search))
        .route("/metrics", get(prometheus))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::listing::{Marketplace, RawListing};
    use crate::pipeline::AnalysisConfig;
    use crate::provider::MockListingProvider;

    fn test_state() -> AppState {
        AppState::new(
            AnalysisConfig::default(),
            Arc::new(
                MockListingProvider::new(Marketplace::Resale).with_listings(vec![RawListing::new(
                    "Apple Watch Series 9 45mm",
                    "$250.00",
                )
                .with_status("sold")]),
            ),
            Arc::new(
                MockListingProvider::new(Marketplace::Sourcing).with_listings(vec![
                    RawListing::new("Apple Watch S9 45mm Aluminum", "$90.00"),
                ]),
            ),
        )
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_503_when_not_ready() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_200_when_ready() {
        let state = test_state();
        state.set_ready(true);
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["resale_provider"], "mock");
    }

    #[tokio::test]
    async fn analyze_endpoint_prices_the_watch_pair() {
        let state = test_state();
        let app = create_router(state.clone());
        let body = json!({
            "resale": [
                {"title": "Apple Watch Series 9 45mm", "price_text": "$250.00", "status": "sold"},
                {"title": "Apple Watch band", "price_text": "Contact for price"}
            ],
            "sourcing": [
                {"title": "Apple Watch S9 45mm Aluminum", "price_text": "$90.00"}
            ],
            "options": {"fee_rate": "0.12", "fixed_fee": "0", "shipping_cost": "8"}
        });

        let response = app.oneshot(post_json("/api/v1/analyze", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["opportunities"][0]["net_margin"], "122.00");
        assert_eq!(json["opportunities"][0]["price_basis"], "achieved");
        assert_eq!(json["summary"]["dropped_count"], 1);
        assert_eq!(state.runs_completed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn analyze_endpoint_rejects_invalid_options() {
        let app = create_router(test_state());
        let body = json!({"resale": [], "sourcing": [], "options": {"threshold": 1.5}});

        let response = app.oneshot(post_json("/api/v1/analyze", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("threshold"));
    }

    #[tokio::test]
    async fn search_endpoint_uses_configured_providers() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/search?q=apple%20watch&sold_only=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["summary"]["candidate_count"], 1);
    }

    #[tokio::test]
    async fn search_endpoint_requires_keywords() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/search?q=%20")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn status_reports_last_summary() {
        let state = test_state();
        let app = create_router(state.clone());
        let body = json!({
            "resale": [{"title": "Desk Lamp", "price_text": "$40"}],
            "sourcing": [{"title": "Desk Lamp", "price_text": "$10"}]
        });
        app.clone()
            .oneshot(post_json("/api/v1/analyze", body))
            .await
            .unwrap();

        let response = app
            .oneshot(Request::builder().uri("/api/v1/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["runs_completed"], 1);
        assert_eq!(json["last_summary"]["count"], 1);
    }

    #[tokio::test]
    async fn metrics_endpoint_is_404_without_exporter() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
