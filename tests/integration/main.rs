//! End-to-end tests for the arbitrage pipeline.
//!
//! The live test needs a SERPAPI_API_KEY environment variable.
//! Run with: cargo test --test integration -- --ignored

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

use reseller_arb::api::{create_router, AppState};
use reseller_arb::arbitrage::PriceBasis;
use reseller_arb::config::Config;
use reseller_arb::listing::{Currency, Marketplace, RawListing};
use reseller_arb::pipeline::{fetch_snapshot, normalize_snapshot, run, AnalysisConfig};
use reseller_arb::provider::{
    EbayProvider, ListingProvider, MockListingProvider, SearchQuery, SerpApiClient,
};
use reseller_arb::trend::AnalysisView;

fn watch_resale() -> Vec<RawListing> {
    vec![
        RawListing::new("Apple Watch Series 9 45mm", "$250.00").with_status("sold"),
        RawListing::new("Apple Watch band", "Contact for price"),
    ]
}

fn watch_sourcing() -> Vec<RawListing> {
    vec![RawListing::new("Apple Watch S9 45mm Aluminum", "$90.00")]
}

fn watch_config() -> AnalysisConfig {
    AnalysisConfig::default()
        .with_fee_rate(dec!(0.12))
        .with_shipping_cost(dec!(8))
}

#[test]
fn watch_example_end_to_end() {
    let snapshot = normalize_snapshot(&watch_resale(), &watch_sourcing());
    let report = run(&snapshot, &watch_config());

    assert_eq!(report.results.len(), 1);
    let result = &report.results[0];
    assert_eq!(result.resale_price, dec!(250));
    assert_eq!(result.sourcing_cost, dec!(90));
    assert_eq!(result.fees, dec!(30));
    assert_eq!(result.net_margin, dec!(122));
    assert_eq!(result.price_basis, PriceBasis::Achieved);
    assert!(result.is_profitable());

    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.summary.dropped_count, 1);
    assert_eq!(report.summary.count, 1);
}

#[test]
fn one_sourcing_listing_pairs_with_many_resale_listings() {
    let resale = vec![
        RawListing::new("LED Desk Lamp Dimmable", "$39.99").with_status("sold"),
        RawListing::new("Dimmable LED Desk Lamp USB", "$44.50"),
        RawListing::new("Garden Hose 50ft", "$25.00"),
    ];
    let sourcing = vec![RawListing::new("LED Desk Lamp Dimmable Touch", "US $9.80")];
    let snapshot = normalize_snapshot(&resale, &sourcing);

    let report = run(&snapshot, &AnalysisConfig::default().with_fee_rate(dec!(0.13)));

    assert_eq!(report.summary.candidate_count, 2);
    assert_eq!(report.results.len(), 2);
    assert!(report
        .results
        .iter()
        .all(|r| r.candidate.sourcing.title == "LED Desk Lamp Dimmable Touch"));
    assert_eq!(report.summary.top_n[0].resale_price, dec!(44.50));
}

#[test]
fn mixed_currencies_are_rejected_not_converted() {
    let resale = vec![RawListing::new("Mechanical Keyboard RGB", "£59.99")];
    let sourcing = vec![RawListing::new("Mechanical Keyboard RGB Hot Swap", "$18.00")];
    let snapshot = normalize_snapshot(&resale, &sourcing);

    let report = run(&snapshot, &AnalysisConfig::default());

    assert!(report.results.is_empty());
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].error.reason(), "currency_mismatch");
    assert_eq!(report.summary.rejected_count, 1);
}

#[test]
fn european_price_formats_normalize() {
    let resale = vec![RawListing::new("Espresso Machine Steel", "1.299,00 €")];
    let sourcing = vec![RawListing::new("Espresso Machine Steel 15 bar", "EUR 310,50")];
    let snapshot = normalize_snapshot(&resale, &sourcing);

    assert_eq!(snapshot.resale[0].price, dec!(1299.00));
    assert_eq!(snapshot.resale[0].currency, Currency::Eur);
    assert_eq!(snapshot.sourcing[0].price, dec!(310.50));

    let report = run(&snapshot, &AnalysisConfig::default().with_fee_rate(dec!(0.10)));
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].currency, Currency::Eur);
}

#[tokio::test]
async fn provider_failure_becomes_empty_page() {
    let resale = MockListingProvider::new(Marketplace::Resale)
        .with_listings(watch_resale())
        .failing();
    let sourcing = MockListingProvider::new(Marketplace::Sourcing).with_listings(watch_sourcing());
    let query = SearchQuery::new("apple watch");

    let snapshot = fetch_snapshot(&resale, &sourcing, &query).await;

    assert!(snapshot.resale.is_empty());
    assert_eq!(snapshot.sourcing.len(), 1);
    assert_eq!(resale.calls(), 1);

    let report = run(&snapshot, &watch_config());
    assert!(report.results.is_empty());
    assert_eq!(report.summary.mean_margin, None);
}

#[tokio::test]
async fn fetched_snapshot_matches_static_analysis() {
    let resale = MockListingProvider::new(Marketplace::Resale).with_listings(watch_resale());
    let sourcing = MockListingProvider::new(Marketplace::Sourcing).with_listings(watch_sourcing());

    let snapshot = fetch_snapshot(&resale, &sourcing, &SearchQuery::new("apple watch")).await;
    let view = AnalysisView::from_report(&run(&snapshot, &watch_config()));

    assert_eq!(view.opportunities.len(), 1);
    assert_eq!(view.opportunities[0].net_margin, dec!(122));
    assert_eq!(view.dropped.len(), 1);
}

#[tokio::test]
async fn api_analyze_roundtrip() {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    let state = AppState::new(
        watch_config(),
        Arc::new(MockListingProvider::new(Marketplace::Resale)),
        Arc::new(MockListingProvider::new(Marketplace::Sourcing)),
    );
    let app = create_router(state);
    let body = serde_json::json!({
        "resale": watch_resale(),
        "sourcing": watch_sourcing(),
    });

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/analyze")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let view: AnalysisView = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(view.opportunities[0].net_margin, dec!(122));
    assert_eq!(view.summary.dropped_count, 1);
}

#[tokio::test]
#[ignore]
async fn live_ebay_search_returns_listings() {
    dotenvy::dotenv().ok();
    let config = Config::load().expect("config");
    if !config.has_api_key() {
        eprintln!("Skipping: SERPAPI_API_KEY not set");
        return;
    }

    let client = SerpApiClient::new(&config).expect("client");
    let provider = EbayProvider::new(client, &config.ebay_domain);
    let listings = provider
        .search(&SearchQuery::new("usb c cable").with_limit(5))
        .await
        .expect("search");

    assert!(!listings.is_empty());
}
