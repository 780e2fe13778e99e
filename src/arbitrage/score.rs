//! Composite 0-100 opportunity score for presentation.
//!
//! | factor                | weight | full marks at   |
//! |-----------------------|--------|-----------------|
//! | margin %              | 25     | 60%             |
//! | ROI %                 | 15     | 300%            |
//! | sourcing orders       | 20     | 500 orders      |
//! | sourcing rating       | 10     | 5.0             |
//! | resale sold evidence  | 20     | achieved price  |
//! | title similarity      | 10     | 1.0             |
//!
//! Missing inputs score as zero, except sold evidence which is neutral (50)
//! for asking prices. Ranking stays by net margin; this score is only shown.

use rust_decimal::prelude::ToPrimitive;

use super::calculator::{MarginResult, PriceBasis};

const MARGIN_WEIGHT: f64 = 0.25;
const ROI_WEIGHT: f64 = 0.15;
const ORDERS_WEIGHT: f64 = 0.20;
const RATING_WEIGHT: f64 = 0.10;
const SOLD_WEIGHT: f64 = 0.20;
const MATCH_WEIGHT: f64 = 0.10;

const MARGIN_CAP_PCT: f64 = 60.0;
const ROI_CAP_PCT: f64 = 300.0;
const ORDERS_CAP: f64 = 500.0;
const RATING_MAX: f64 = 5.0;

/// Score a margin result, rounded to one decimal place.
pub fn score_opportunity(result: &MarginResult<'_>) -> f64 {
    let margin_pct = result.margin_pct.and_then(|m| m.to_f64()).unwrap_or(0.0);
    let roi_pct = result.roi_pct().and_then(|r| r.to_f64()).unwrap_or(0.0);
    let orders = result.candidate.sourcing.orders.unwrap_or(0) as f64;
    let rating = result.candidate.sourcing.rating.unwrap_or(0.0);

    let margin_norm = margin_pct.clamp(0.0, MARGIN_CAP_PCT) / MARGIN_CAP_PCT * 100.0;
    let roi_norm = roi_pct.clamp(0.0, ROI_CAP_PCT) / ROI_CAP_PCT * 100.0;
    let orders_norm = (orders / ORDERS_CAP).min(1.0) * 100.0;
    let rating_norm = (rating / RATING_MAX).clamp(0.0, 1.0) * 100.0;
    let sold_norm = match result.price_basis {
        PriceBasis::Achieved => 100.0,
        PriceBasis::Asking => 50.0,
    };
    let match_norm = result.candidate.similarity.clamp(0.0, 1.0) * 100.0;

    let score = margin_norm * MARGIN_WEIGHT
        + roi_norm * ROI_WEIGHT
        + orders_norm * ORDERS_WEIGHT
        + rating_norm * RATING_WEIGHT
        + sold_norm * SOLD_WEIGHT
        + match_norm * MATCH_WEIGHT;

    (score.min(100.0) * 10.0).round() / 10.0
}
