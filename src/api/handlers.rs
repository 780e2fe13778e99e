//! HTTP API handlers.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::arbitrage::FeeSchedule;
use crate::listing::{Currency, RawListing};
use crate::metrics;
use crate::pipeline::{fetch_snapshot, normalize_snapshot, run, AnalysisConfig, ListingSnapshot};
use crate::provider::{ListingProvider, SearchQuery};
use crate::trend::{AnalysisView, SummaryView};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Whether the service is ready to analyze.
    pub ready: Arc<AtomicBool>,
    /// Analysis settings requests start from.
    pub analysis: Arc<AnalysisConfig>,
    /// Records kept per provider call on live searches.
    pub result_limit: usize,
    /// Completed analyses.
    pub runs_completed: Arc<AtomicU64>,
    /// Summary of the most recent analysis.
    pub last_summary: Arc<RwLock<Option<SummaryView>>>,
    /// Resale-side provider for live searches.
    pub resale: Arc<dyn ListingProvider>,
    /// Sourcing-side provider for live searches.
    pub sourcing: Arc<dyn ListingProvider>,
    /// Prometheus handle, when metrics are exported.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(
        analysis: AnalysisConfig,
        resale: Arc<dyn ListingProvider>,
        sourcing: Arc<dyn ListingProvider>,
    ) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            analysis: Arc::new(analysis),
            result_limit: 50,
            runs_completed: Arc::new(AtomicU64::new(0)),
            last_summary: Arc::new(RwLock::new(None)),
            resale,
            sourcing,
            metrics: None,
        }
    }

    /// Set the live-search result limit.
    pub fn with_result_limit(mut self, result_limit: usize) -> Self {
        self.result_limit = result_limit;
        self
    }

    /// Export metrics through this handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Record a completed analysis.
    pub async fn record_run(&self, view: &AnalysisView) {
        self.runs_completed.fetch_add(1, Ordering::SeqCst);
        *self.last_summary.write().await = Some(view.summary.clone());
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("ready", &self.is_ready())
            .field("analysis", &self.analysis)
            .field("runs_completed", &self.runs_completed)
            .field("resale", &self.resale.name())
            .field("sourcing", &self.sourcing.name())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

/// Per-request changes to the analysis settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOverrides {
    /// Minimum title similarity.
    pub threshold: Option<f64>,
    /// Selling fee rate; keeps the base fixed fee unless `fixed_fee` is set.
    pub fee_rate: Option<Decimal>,
    /// Fixed selling fee per order.
    pub fixed_fee: Option<Decimal>,
    /// Outbound shipping per sale.
    pub shipping_cost: Option<Decimal>,
    /// Minimum net margin kept.
    pub min_margin_filter: Option<Decimal>,
    /// Only match sold resale listings.
    pub require_sold: Option<bool>,
    /// Maximum landed sourcing cost.
    pub max_sourcing_price: Option<Decimal>,
    /// Minimum sourcing order count.
    pub min_sourcing_orders: Option<u64>,
    /// Minimum sourcing rating.
    pub min_sourcing_rating: Option<f64>,
    /// Reporting currency.
    pub reporting_currency: Option<Currency>,
    /// Results kept in the summary.
    pub top_n: Option<usize>,
}

impl AnalysisOverrides {
    /// Apply to a base configuration.
    pub fn apply(&self, base: &AnalysisConfig) -> AnalysisConfig {
        let mut config = base.clone();
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        config.fees = FeeSchedule::new(
            self.fee_rate.unwrap_or(base.fees.rate),
            self.fixed_fee.unwrap_or(base.fees.fixed_per_order),
        );
        if let Some(shipping) = self.shipping_cost {
            config.shipping_cost = shipping;
        }
        if let Some(min_margin) = self.min_margin_filter {
            config.min_margin_filter = min_margin;
        }
        if let Some(require_sold) = self.require_sold {
            config.require_sold = require_sold;
        }
        if self.max_sourcing_price.is_some() {
            config.max_sourcing_price = self.max_sourcing_price;
        }
        if let Some(orders) = self.min_sourcing_orders {
            config.min_sourcing_orders = orders;
        }
        if self.min_sourcing_rating.is_some() {
            config.min_sourcing_rating = self.min_sourcing_rating;
        }
        if self.reporting_currency.is_some() {
            config.reporting_currency = self.reporting_currency;
        }
        if let Some(top_n) = self.top_n {
            config.top_n = top_n;
        }
        config
    }
}

/// Body of `POST /api/v1/analyze`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Raw resale-side records.
    #[serde(default)]
    pub resale: Vec<RawListing>,
    /// Raw sourcing-side records.
    #[serde(default)]
    pub sourcing: Vec<RawListing>,
    /// Setting overrides.
    #[serde(default)]
    pub options: AnalysisOverrides,
}

/// Query of `GET /api/v1/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    /// Keywords.
    pub q: String,
    /// Only completed resale sales.
    #[serde(default)]
    pub sold_only: bool,
    /// Records kept per provider.
    pub limit: Option<usize>,
    /// Minimum title similarity.
    pub threshold: Option<f64>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
    /// Resale provider name.
    pub resale_provider: &'static str,
    /// Sourcing provider name.
    pub sourcing_provider: &'static str,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Completed analyses.
    pub runs_completed: u64,
    /// Summary of the most recent analysis.
    pub last_summary: Option<SummaryView>,
}

/// Error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// What went wrong.
    pub error: String,
}

fn bad_request(error: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn analyze_snapshot(snapshot: &ListingSnapshot, config: &AnalysisConfig) -> AnalysisView {
    let report = run(snapshot, config);
    AnalysisView::from_report(&report)
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse {
        ready: is_ready,
        resale_provider: state.resale.name(),
        sourcing_provider: state.sourcing.name(),
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns run count and the last summary.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let last_summary = state.last_summary.read().await.clone();
    let status = if state.is_ready() { "running" } else { "starting" };

    Json(StatusResponse {
        status,
        runs_completed: state.runs_completed.load(Ordering::SeqCst),
        last_summary,
    })
}

/// Analyze caller-supplied raw listings.
pub async fn analyze(State(state): State<AppState>, Json(request): Json<AnalyzeRequest>) -> Response {
    let start = Instant::now();

    let config = request.options.apply(&state.analysis);
    if let Err(e) = config.validate() {
        return bad_request(e);
    }

    let snapshot = normalize_snapshot(&request.resale, &request.sourcing);
    let view = analyze_snapshot(&snapshot, &config);
    state.record_run(&view).await;

    info!(
        resale = request.resale.len(),
        sourcing = request.sourcing.len(),
        opportunities = view.opportunities.len(),
        "Analyze request served"
    );
    metrics::record_http_latency(start, "analyze");
    Json(view).into_response()
}

/// Search both marketplaces live, then analyze.
pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let start = Instant::now();

    if params.q.trim().is_empty() {
        return bad_request("query parameter q must not be empty");
    }

    let overrides = AnalysisOverrides {
        threshold: params.threshold,
        ..Default::default()
    };
    let config = overrides.apply(&state.analysis);
    if let Err(e) = config.validate() {
        return bad_request(e);
    }

    let query = SearchQuery::new(params.q.trim())
        .with_limit(params.limit.unwrap_or(state.result_limit))
        .with_sold_only(params.sold_only);
    let snapshot = fetch_snapshot(state.resale.as_ref(), state.sourcing.as_ref(), &query).await;
    let view = analyze_snapshot(&snapshot, &config);
    state.record_run(&view).await;

    info!(
        opportunities = view.opportunities.len(),
        dropped = view.dropped.len(),
        "Search analyzed"
    );
    metrics::record_http_latency(start, "search");
    Json(view).into_response()
}

/// Prometheus text exposition, or 404 when metrics are disabled.
pub async fn prometheus(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
