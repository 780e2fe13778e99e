//! Owned, serializable views of an analysis for the CLI and HTTP API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::aggregator::{HistogramBucket, Summary};
use crate::arbitrage::{score_opportunity, MarginResult, PriceBasis};
use crate::listing::{Currency, DroppedListing, ListingStatus, Marketplace};
use crate::pipeline::{AnalysisReport, Rejection};

/// Decimal places shown for money and percentages.
const DISPLAY_DP: u32 = 2;

/// One priced pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRow {
    /// Sourcing listing title.
    pub sourcing_title: String,
    /// Sourcing listing URL.
    pub sourcing_url: String,
    /// Landed sourcing cost.
    pub sourcing_cost: Decimal,
    /// Sourcing order count.
    pub sourcing_orders: Option<u64>,
    /// Sourcing rating.
    pub sourcing_rating: Option<f64>,
    /// Resale listing title.
    pub resale_title: String,
    /// Resale listing URL.
    pub resale_url: String,
    /// Resale price.
    pub resale_price: Decimal,
    /// Resale listing status.
    pub resale_status: ListingStatus,
    /// Whether the resale price was achieved or asked.
    pub price_basis: PriceBasis,
    /// Currency of every amount in the row.
    pub currency: Currency,
    /// Title similarity.
    pub similarity: f64,
    /// Selling fees.
    pub fees: Decimal,
    /// Outbound shipping.
    pub shipping: Decimal,
    /// Net margin.
    pub net_margin: Decimal,
    /// Margin as a percentage of the resale price.
    pub margin_pct: Option<Decimal>,
    /// ROI as a percentage; absent when sourcing cost is zero.
    pub roi_pct: Option<Decimal>,
    /// Composite 0-100 score.
    pub score: f64,
}

impl From<&MarginResult<'_>> for OpportunityRow {
    fn from(result: &MarginResult<'_>) -> Self {
        let sourcing = result.candidate.sourcing;
        let resale = result.candidate.resale;

        Self {
            sourcing_title: sourcing.title.clone(),
            sourcing_url: sourcing.url.clone(),
            sourcing_cost: result.sourcing_cost,
            sourcing_orders: sourcing.orders,
            sourcing_rating: sourcing.rating,
            resale_title: resale.title.clone(),
            resale_url: resale.url.clone(),
            resale_price: result.resale_price,
            resale_status: resale.status,
            price_basis: result.price_basis,
            currency: result.currency,
            similarity: (result.candidate.similarity * 10_000.0).round() / 10_000.0,
            fees: result.fees.round_dp(DISPLAY_DP),
            shipping: result.shipping,
            net_margin: result.net_margin.round_dp(DISPLAY_DP),
            margin_pct: result.margin_pct.map(|m| m.round_dp(DISPLAY_DP)),
            roi_pct: result.roi_pct().map(|r| r.round_dp(DISPLAY_DP)),
            score: score_opportunity(result),
        }
    }
}

/// Aggregate statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryView {
    /// Results summarized.
    pub count: usize,
    /// Mean net margin.
    pub mean_margin: Option<Decimal>,
    /// Mean ROI as a percentage, over results with a defined ROI.
    pub mean_roi_pct: Option<Decimal>,
    /// Sum of net margins, absent if it overflowed.
    pub total_margin: Option<Decimal>,
    /// Results with undefined ROI.
    pub undefined_roi_count: usize,
    /// Candidates produced by the matcher.
    pub candidate_count: usize,
    /// Candidates refused by the margin step.
    pub rejected_count: usize,
    /// Raw records dropped during normalization.
    pub dropped_count: usize,
    /// Best results by net margin.
    pub top: Vec<OpportunityRow>,
    /// Net-margin histogram.
    pub histogram: Vec<HistogramBucket>,
}

impl From<&Summary<'_>> for SummaryView {
    fn from(summary: &Summary<'_>) -> Self {
        Self {
            count: summary.count,
            mean_margin: summary.mean_margin.map(|m| m.round_dp(DISPLAY_DP)),
            mean_roi_pct: summary
                .mean_roi
                .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
                .map(|r| r.round_dp(DISPLAY_DP)),
            total_margin: summary.total_margin.map(|t| t.round_dp(DISPLAY_DP)),
            undefined_roi_count: summary.undefined_roi_count,
            candidate_count: summary.candidate_count,
            rejected_count: summary.rejected_count,
            dropped_count: summary.dropped_count,
            top: summary.top_n.iter().map(OpportunityRow::from).collect(),
            histogram: summary.histogram.clone(),
        }
    }
}

/// A pair the margin step refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedView {
    /// Sourcing listing title.
    pub sourcing_title: String,
    /// Resale listing title.
    pub resale_title: String,
    /// Machine-readable reason.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&Rejection<'_>> for RejectedView {
    fn from(rejection: &Rejection<'_>) -> Self {
        Self {
            sourcing_title: rejection.candidate.sourcing.title.clone(),
            resale_title: rejection.candidate.resale.title.clone(),
            reason: rejection.error.reason().to_string(),
            message: rejection.error.to_string(),
        }
    }
}

/// A raw record dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedView {
    /// Marketplace the record came from.
    pub marketplace: Marketplace,
    /// Title as received.
    pub title: String,
    /// Price text as received.
    pub price_text: Option<String>,
    /// Machine-readable reason.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&DroppedListing> for DroppedView {
    fn from(dropped: &DroppedListing) -> Self {
        Self {
            marketplace: dropped.source,
            title: dropped.title.clone(),
            price_text: dropped.price_text.clone(),
            reason: dropped.reason.reason().to_string(),
            message: dropped.reason.to_string(),
        }
    }
}

/// Full result of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisView {
    /// When the view was produced.
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Aggregate statistics.
    pub summary: SummaryView,
    /// Every priced pair, in match order.
    pub opportunities: Vec<OpportunityRow>,
    /// Pairs the margin step refused.
    pub rejected: Vec<RejectedView>,
    /// Raw records dropped during normalization.
    pub dropped: Vec<DroppedView>,
}

impl AnalysisView {
    /// Build the view of a report, stamped now.
    pub fn from_report(report: &AnalysisReport<'_>) -> Self {
        Self {
            generated_at: OffsetDateTime::now_utc(),
            summary: SummaryView::from(&report.summary),
            opportunities: report.results.iter().map(OpportunityRow::from).collect(),
            rejected: report.rejected.iter().map(RejectedView::from).collect(),
            dropped: report.dropped.iter().map(DroppedView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::RawListing;
    use crate::pipeline::{normalize_snapshot, run, AnalysisConfig};
    use rust_decimal_macros::dec;

    #[test]
    fn view_of_watch_example() {
        let snapshot = normalize_snapshot(
            &[
                RawListing::new("Apple Watch Series 9 45mm", "$250.00").with_status("sold"),
                RawListing::new("Apple Watch band", "Contact for price"),
            ],
            &[RawListing::new("Apple Watch S9 45mm Aluminum", "$90.00")],
        );
        let config = AnalysisConfig::default()
            .with_fee_rate(dec!(0.12))
            .with_shipping_cost(dec!(8));
        let report = run(&snapshot, &config);

        let view = AnalysisView::from_report(&report);

        assert_eq!(view.opportunities.len(), 1);
        let row = &view.opportunities[0];
        assert_eq!(row.net_margin, dec!(122));
        assert_eq!(row.price_basis, PriceBasis::Achieved);
        assert_eq!(row.similarity, 0.4286);
        assert_eq!(row.roi_pct, Some(dec!(135.56)));
        assert_eq!(view.summary.dropped_count, 1);
        assert_eq!(view.dropped[0].reason, "no_numeric_token");
        assert_eq!(view.summary.top.len(), 1);
    }

    #[test]
    fn view_serializes_decimals_as_strings() {
        let snapshot = normalize_snapshot(
            &[RawListing::new("Desk Lamp", "$40.00")],
            &[RawListing::new("Desk Lamp", "$10.00")],
        );
        let report = run(&snapshot, &AnalysisConfig::default().with_fee_rate(dec!(0.1)));
        let view = AnalysisView::from_report(&report);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["opportunities"][0]["net_margin"], "26.00");
        assert_eq!(json["opportunities"][0]["currency"], "USD");
        assert!(json["generated_at"].as_str().unwrap().contains('T'));
    }
}
