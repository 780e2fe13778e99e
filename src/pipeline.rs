//! Snapshot analysis: filter, match, price and summarize.
//!
//! ```text
//! providers ──fetch──▶ RawListing ──normalize──▶ ListingSnapshot
//!                                                     │
//!            Summary ◀──summarize── MarginResult ◀──match + compute
//! ```
//!
//! Only the fetch is async. [`run`] is a pure synchronous transform over an
//! immutable snapshot.

use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::arbitrage::{compute_with_schedule, match_refs, FeeSchedule, MarginResult, MatchCandidate};
use crate::error::ComputeError;
use crate::listing::{normalize_batch, Currency, DroppedListing, Listing, Marketplace, RawListing};
use crate::metrics;
use crate::provider::{fetch_or_empty, ListingProvider, SearchQuery};
use crate::trend::{summarize, Summary, SummaryOptions};

/// Settings for one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Minimum title similarity for a match (0.0 - 1.0).
    pub threshold: f64,
    /// Selling fees on the resale side.
    pub fees: FeeSchedule,
    /// Outbound shipping per sale.
    pub shipping_cost: Decimal,
    /// Results with a lower net margin are left out.
    pub min_margin_filter: Decimal,
    /// Only match resale listings that sold.
    pub require_sold: bool,
    /// Skip sourcing listings with a higher landed cost.
    pub max_sourcing_price: Option<Decimal>,
    /// Skip sourcing listings with fewer orders.
    pub min_sourcing_orders: u64,
    /// Skip sourcing listings rated lower, or not rated at all.
    pub min_sourcing_rating: Option<f64>,
    /// Reject pairs priced in any other currency.
    pub reporting_currency: Option<Currency>,
    /// Results kept in `Summary::top_n`.
    pub top_n: usize,
    /// Net-margin histogram bucket width.
    pub histogram_bucket_width: Decimal,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold: 0.40,
            fees: FeeSchedule::default(),
            shipping_cost: Decimal::ZERO,
            min_margin_filter: Decimal::ZERO,
            require_sold: false,
            max_sourcing_price: None,
            min_sourcing_orders: 0,
            min_sourcing_rating: None,
            reporting_currency: None,
            top_n: 10,
            histogram_bucket_width: Decimal::TEN,
        }
    }
}

impl AnalysisConfig {
    /// Set the similarity threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Use a percentage-only fee.
    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fees = FeeSchedule::flat(fee_rate);
        self
    }

    /// Use a full fee schedule.
    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    /// Set outbound shipping per sale.
    pub fn with_shipping_cost(mut self, shipping_cost: Decimal) -> Self {
        self.shipping_cost = shipping_cost;
        self
    }

    /// Set the minimum net margin kept.
    pub fn with_min_margin(mut self, min_margin: Decimal) -> Self {
        self.min_margin_filter = min_margin;
        self
    }

    /// Only match resale listings that sold.
    pub fn with_require_sold(mut self, require_sold: bool) -> Self {
        self.require_sold = require_sold;
        self
    }

    /// Set the reporting currency.
    pub fn with_reporting_currency(mut self, currency: Option<Currency>) -> Self {
        self.reporting_currency = currency;
        self
    }

    /// Set the number of top results.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Check the settings.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!("threshold must be between 0 and 1, got {}", self.threshold));
        }
        if self.fees.rate < Decimal::ZERO || self.fees.rate >= Decimal::ONE {
            return Err(format!("fee rate must be in [0, 1), got {}", self.fees.rate));
        }
        if self.fees.fixed_per_order < Decimal::ZERO {
            return Err("fixed fee must not be negative".to_string());
        }
        if self.shipping_cost < Decimal::ZERO {
            return Err("shipping cost must not be negative".to_string());
        }
        if self.top_n == 0 {
            return Err("top_n must be at least 1".to_string());
        }
        if self.histogram_bucket_width <= Decimal::ZERO {
            return Err("histogram bucket width must be positive".to_string());
        }
        Ok(())
    }

    /// Whether a sourcing listing passes the pre-match filters.
    pub fn admits_sourcing(&self, listing: &Listing) -> bool {
        if self
            .max_sourcing_price
            .is_some_and(|max| listing.landed_cost().map_or(true, |cost| cost > max))
        {
            return false;
        }
        if listing.orders.unwrap_or(0) < self.min_sourcing_orders {
            return false;
        }
        match self.min_sourcing_rating {
            Some(min) => listing.rating.is_some_and(|r| r >= min),
            None => true,
        }
    }

    /// Whether a resale listing passes the pre-match filters.
    pub fn admits_resale(&self, listing: &Listing) -> bool {
        !self.require_sold || listing.is_sold()
    }
}

/// Normalized listings of both marketplaces for one run.
#[derive(Debug, Clone, Default)]
pub struct ListingSnapshot {
    /// Normalized resale listings.
    pub resale: Vec<Listing>,
    /// Normalized sourcing listings.
    pub sourcing: Vec<Listing>,
    /// Raw records from either side that failed normalization.
    pub dropped: Vec<DroppedListing>,
}

impl ListingSnapshot {
    /// Total listings on both sides.
    pub fn listing_count(&self) -> usize {
        self.resale.len() + self.sourcing.len()
    }
}

/// Normalize raw pages from both marketplaces.
pub fn normalize_snapshot(resale: &[RawListing], sourcing: &[RawListing]) -> ListingSnapshot {
    let resale = normalize_batch(resale, Marketplace::Resale);
    let sourcing = normalize_batch(sourcing, Marketplace::Sourcing);

    let mut dropped = resale.dropped;
    dropped.extend(sourcing.dropped);

    ListingSnapshot {
        resale: resale.listings,
        sourcing: sourcing.listings,
        dropped,
    }
}

/// Fetch both marketplaces concurrently and normalize the results.
///
/// Sold-only applies to the resale side; sourcing is always a live search.
/// Provider failures become empty pages.
#[instrument(skip(resale, sourcing, query), fields(keywords = %query.keywords))]
pub async fn fetch_snapshot(
    resale: &dyn ListingProvider,
    sourcing: &dyn ListingProvider,
    query: &SearchQuery,
) -> ListingSnapshot {
    let sourcing_query = query.clone().with_sold_only(false);

    let (resale_raw, sourcing_raw) = tokio::join!(
        fetch_or_empty(resale, query),
        fetch_or_empty(sourcing, &sourcing_query)
    );

    normalize_snapshot(&resale_raw, &sourcing_raw)
}

/// A candidate the margin step refused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rejection<'a> {
    /// The refused pair.
    pub candidate: MatchCandidate<'a>,
    /// Why it was refused.
    pub error: ComputeError,
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct AnalysisReport<'a> {
    /// Margin results that passed the margin filter, in candidate order.
    pub results: Vec<MarginResult<'a>>,
    /// Candidates refused by the margin step.
    pub rejected: Vec<Rejection<'a>>,
    /// Raw records dropped during normalization.
    pub dropped: &'a [DroppedListing],
    /// Results computed but below `min_margin_filter`.
    pub below_min_margin: usize,
    /// Aggregate statistics.
    pub summary: Summary<'a>,
}

/// Run the analysis over a snapshot.
#[instrument(
    skip(snapshot, config),
    fields(resale = snapshot.resale.len(), sourcing = snapshot.sourcing.len())
)]
pub fn run<'a>(snapshot: &'a ListingSnapshot, config: &AnalysisConfig) -> AnalysisReport<'a> {
    let _timer = metrics::timer_pipeline();

    let resale: Vec<&Listing> = snapshot
        .resale
        .iter()
        .filter(|l| config.admits_resale(l))
        .collect();
    let sourcing: Vec<&Listing> = snapshot
        .sourcing
        .iter()
        .filter(|l| config.admits_sourcing(l))
        .collect();
    debug!(
        resale_admitted = resale.len(),
        sourcing_admitted = sourcing.len(),
        "Applied pre-match filters"
    );

    let candidates = match_refs(&resale, &sourcing, config.threshold);

    let mut results = Vec::new();
    let mut rejected = Vec::new();
    let mut below_min_margin = 0;

    for candidate in &candidates {
        let priced = compute_with_schedule(*candidate, &config.fees, config.shipping_cost)
            .and_then(|result| check_reporting_currency(result, config.reporting_currency));

        match priced {
            Ok(result) if result.net_margin >= config.min_margin_filter => results.push(result),
            Ok(_) => below_min_margin += 1,
            Err(error) => {
                debug!(
                    sourcing = %candidate.sourcing.title,
                    resale = %candidate.resale.title,
                    error = %error,
                    "Candidate rejected"
                );
                metrics::inc_margin_rejections(error.reason());
                rejected.push(Rejection {
                    candidate: *candidate,
                    error,
                });
            }
        }
    }

    let mut summary = summarize(
        &results,
        &SummaryOptions {
            top_n: config.top_n,
            bucket_width: config.histogram_bucket_width,
        },
    );
    summary.dropped_count = snapshot.dropped.len();
    summary.rejected_count = rejected.len();
    summary.candidate_count = candidates.len();

    metrics::inc_pipeline_runs();
    info!(
        candidates = candidates.len(),
        results = results.len(),
        rejected = rejected.len(),
        dropped = snapshot.dropped.len(),
        below_min_margin,
        total_margin = ?summary.total_margin,
        "Analysis complete"
    );

    AnalysisReport {
        results,
        rejected,
        dropped: &snapshot.dropped,
        below_min_margin,
        summary,
    }
}

fn check_reporting_currency<'a>(
    result: MarginResult<'a>,
    reporting: Option<Currency>,
) -> Result<MarginResult<'a>, ComputeError> {
    match reporting {
        Some(expected) if !result.currency.is_compatible(expected) => {
            Err(ComputeError::ReportingCurrencyMismatch {
                expected,
                found: result.currency,
            })
        }
        _ => Ok(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockListingProvider;
    use crate::trend::AnalysisView;
    use rust_decimal_macros::dec;

    fn watch_snapshot() -> ListingSnapshot {
        normalize_snapshot(
            &[RawListing::new("Apple Watch Series 9 45mm", "$250.00").with_status("sold")],
            &[RawListing::new("Apple Watch S9 45mm Aluminum", "$90.00")],
        )
    }

    fn flat_config() -> AnalysisConfig {
        AnalysisConfig::default()
            .with_fee_rate(dec!(0.12))
            .with_shipping_cost(dec!(8))
    }

    #[test]
    fn default_config_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
        assert!(AnalysisConfig::default().with_threshold(1.2).validate().is_err());
        assert!(AnalysisConfig::default().with_top_n(0).validate().is_err());
    }

    #[test]
    fn watch_example_nets_122() {
        let snapshot = watch_snapshot();
        let report = run(&snapshot, &flat_config());

        assert_eq!(report.summary.candidate_count, 1);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].net_margin, dec!(122));
        assert_eq!(report.summary.dropped_count, 0);
    }

    #[test]
    fn min_margin_filter_drops_results() {
        let snapshot = watch_snapshot();
        let report = run(&snapshot, &flat_config().with_min_margin(dec!(150)));

        assert!(report.results.is_empty());
        assert_eq!(report.below_min_margin, 1);
        assert_eq!(report.summary.candidate_count, 1);
        assert_eq!(report.summary.rejected_count, 0);
    }

    #[test]
    fn currency_mismatch_is_rejected_not_fatal() {
        let snapshot = normalize_snapshot(
            &[
                RawListing::new("Desk Lamp LED", "$40.00"),
                RawListing::new("Desk Lamp LED", "€40,00"),
            ],
            &[RawListing::new("Desk Lamp LED", "$10.00")],
        );
        let report = run(&snapshot, &flat_config());

        assert_eq!(report.summary.candidate_count, 2);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(
            report.rejected[0].error,
            ComputeError::CurrencyMismatch {
                resale: Currency::Eur,
                sourcing: Currency::Usd
            }
        );
    }

    #[test]
    fn reporting_currency_rejects_other_currencies() {
        let snapshot = normalize_snapshot(
            &[RawListing::new("Desk Lamp LED", "£40.00")],
            &[RawListing::new("Desk Lamp LED", "£10.00")],
        );
        let config = flat_config().with_reporting_currency(Some(Currency::Usd));
        let report = run(&snapshot, &config);

        assert!(report.results.is_empty());
        assert_eq!(
            report.rejected[0].error,
            ComputeError::ReportingCurrencyMismatch {
                expected: Currency::Usd,
                found: Currency::Gbp
            }
        );
    }

    #[test]
    fn require_sold_filters_resale() {
        let snapshot = normalize_snapshot(
            &[
                RawListing::new("Desk Lamp LED", "$40.00"),
                RawListing::new("Desk Lamp LED", "$45.00").with_status("sold"),
            ],
            &[RawListing::new("Desk Lamp LED", "$10.00")],
        );
        let report = run(&snapshot, &flat_config().with_require_sold(true));

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].resale_price, dec!(45));
    }

    #[test]
    fn sourcing_filters_apply_before_matching() {
        let snapshot = normalize_snapshot(
            &[RawListing::new("Desk Lamp LED", "$40.00")],
            &[
                RawListing::new("Desk Lamp LED", "$10.00").with_supplier_stats(5, 4.9),
                RawListing::new("Desk Lamp LED", "$12.00").with_supplier_stats(900, 4.2),
                RawListing::new("Desk Lamp LED", "$30.00").with_supplier_stats(900, 4.8),
            ],
        );
        let config = AnalysisConfig {
            min_sourcing_orders: 100,
            min_sourcing_rating: Some(4.5),
            max_sourcing_price: Some(dec!(25)),
            ..flat_config()
        };
        let report = run(&snapshot, &config);

        assert_eq!(report.summary.candidate_count, 0);
    }

    #[test]
    fn dropped_listings_are_counted() {
        let snapshot = normalize_snapshot(
            &[
                RawListing::new("Vintage lamp", "Contact for price"),
                RawListing::new("Desk Lamp LED", "$40.00"),
            ],
            &[RawListing::new("Desk Lamp LED", "$10.00")],
        );
        let report = run(&snapshot, &flat_config());

        assert_eq!(report.summary.dropped_count, 1);
        assert_eq!(report.dropped[0].title, "Vintage lamp");
        assert_eq!(report.results.len(), 1);
    }

    #[test]
    fn extreme_prices_are_rejected_without_panicking() {
        let snapshot = normalize_snapshot(
            &[
                RawListing::new("Desk Lamp LED", "$79228162514264337593543950"),
                RawListing::new("Desk Lamp LED", "$40.00"),
            ],
            &[RawListing::new("Desk Lamp LED", "$0.0000000000000000000000001")],
        );

        let report = run(&snapshot, &AnalysisConfig::default());

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].error.reason(), "overflow");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.summary.rejected_count, 1);
    }

    #[test]
    fn overflowing_totals_do_not_abort_the_summary() {
        let snapshot = normalize_snapshot(
            &[
                RawListing::new("Desk Lamp LED", "$70000000000000000000000000000"),
                RawListing::new("Desk Lamp LED", "$70000000000000000000000000000"),
            ],
            &[RawListing::new("Desk Lamp LED", "$1.00")],
        );

        let report = run(&snapshot, &AnalysisConfig::default());
        let view = AnalysisView::from_report(&report);

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.summary.total_margin, None);
        assert_eq!(report.summary.mean_margin, None);
        assert_eq!(view.summary.total_margin, None);
        assert_eq!(view.opportunities[0].roi_pct, None);
    }

    #[tokio::test]
    async fn fetch_snapshot_treats_failures_as_empty() {
        let resale = MockListingProvider::new(Marketplace::Resale)
            .with_listings(vec![RawListing::new("Desk Lamp LED", "$40.00")]);
        let sourcing = MockListingProvider::new(Marketplace::Sourcing).failing();

        let snapshot = fetch_snapshot(&resale, &sourcing, &SearchQuery::new("desk lamp")).await;

        assert_eq!(snapshot.resale.len(), 1);
        assert!(snapshot.sourcing.is_empty());
        assert_eq!(resale.calls(), 1);
        assert_eq!(sourcing.calls(), 1);
    }
}
