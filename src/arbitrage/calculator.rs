//! Margin and ROI calculations for matched listings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::Display;

use super::matcher::MatchCandidate;
use crate::error::ComputeError;
use crate::listing::Currency;

/// Marketplace selling fees: a percentage of the sale plus a fixed amount per order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fraction of the resale price, e.g. 0.1615.
    pub rate: Decimal,
    /// Fixed charge per order.
    pub fixed_per_order: Decimal,
}

impl FeeSchedule {
    /// Schedule with both parts explicit.
    pub fn new(rate: Decimal, fixed_per_order: Decimal) -> Self {
        Self {
            rate,
            fixed_per_order,
        }
    }

    /// Percentage-only schedule.
    pub fn flat(rate: Decimal) -> Self {
        Self::new(rate, Decimal::ZERO)
    }

    /// eBay US: 13.25% final value + 2.9% payment processing, $0.30 per-order
    /// fee + $0.30 payment fixed. Promoted listings add 3%.
    pub fn ebay_us(promoted: bool) -> Self {
        let final_value = Decimal::new(1325, 4);
        let payment = Decimal::new(29, 3);
        let promoted_rate = if promoted {
            Decimal::new(3, 2)
        } else {
            Decimal::ZERO
        };
        Self::new(final_value + payment + promoted_rate, Decimal::new(60, 2))
    }

    /// Fees on a sale at `resale_price`. `None` if the amount overflows.
    pub fn fees(&self, resale_price: Decimal) -> Option<Decimal> {
        resale_price
            .checked_mul(self.rate)?
            .checked_add(self.fixed_per_order)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::ebay_us(false)
    }
}

/// Whether the resale price was actually achieved or is only asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PriceBasis {
    /// Price of a completed sale.
    Achieved,
    /// Asking price of an active or unclassified listing.
    Asking,
}

/// Economics of one match candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginResult<'a> {
    /// The pair this result is for.
    pub candidate: MatchCandidate<'a>,
    /// Currency every amount below is in.
    pub currency: Currency,
    /// Resale listing price.
    pub resale_price: Decimal,
    /// Landed sourcing cost (price + listing shipping).
    pub sourcing_cost: Decimal,
    /// Selling fees on the resale price.
    pub fees: Decimal,
    /// Outbound shipping to the buyer.
    pub shipping: Decimal,
    /// resale_price - sourcing_cost - fees - shipping.
    pub net_margin: Decimal,
    /// net_margin / sourcing_cost. `None` when sourcing cost is zero.
    pub roi: Option<Decimal>,
    /// net_margin / resale_price * 100. `None` when resale price is zero.
    pub margin_pct: Option<Decimal>,
    /// Whether `resale_price` is achieved or asking.
    pub price_basis: PriceBasis,
}

impl<'a> MarginResult<'a> {
    /// ROI, or `ZeroSourcingCost` when it is undefined.
    pub fn checked_roi(&self) -> Result<Decimal, ComputeError> {
        self.roi.ok_or(ComputeError::ZeroSourcingCost)
    }

    /// ROI as a percentage.
    pub fn roi_pct(&self) -> Option<Decimal> {
        self.roi.and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
    }

    /// Whether the pair makes money.
    pub fn is_profitable(&self) -> bool {
        self.net_margin > Decimal::ZERO
    }
}

/// Compute margin for a candidate with a percentage-only fee.
pub fn compute<'a>(
    candidate: MatchCandidate<'a>,
    fee_rate: Decimal,
    shipping_cost: Decimal,
) -> Result<MarginResult<'a>, ComputeError> {
    compute_with_schedule(candidate, &FeeSchedule::flat(fee_rate), shipping_cost)
}

/// Compute margin for a candidate.
///
/// Currencies must already agree; no conversion happens here. A zero
/// sourcing cost is not an error, it leaves `roi` undefined.
pub fn compute_with_schedule<'a>(
    candidate: MatchCandidate<'a>,
    schedule: &FeeSchedule,
    shipping_cost: Decimal,
) -> Result<MarginResult<'a>, ComputeError> {
    let resale = candidate.resale;
    let sourcing = candidate.sourcing;

    if !resale.currency.is_compatible(sourcing.currency) {
        return Err(ComputeError::CurrencyMismatch {
            resale: resale.currency,
            sourcing: sourcing.currency,
        });
    }

    let resale_price = resale.price;
    let sourcing_cost = sourcing
        .landed_cost()
        .ok_or(ComputeError::Overflow { step: "sourcing cost" })?;
    let fees = schedule
        .fees(resale_price)
        .ok_or(ComputeError::Overflow { step: "fees" })?;
    let net_margin = checked_net_margin(resale_price, sourcing_cost, fees, shipping_cost)?;
    let roi = checked_ratio(net_margin, sourcing_cost, Decimal::ONE, "roi")?;
    let margin_pct = checked_ratio(net_margin, resale_price, Decimal::ONE_HUNDRED, "margin")?;
    let price_basis = if resale.is_sold() {
        PriceBasis::Achieved
    } else {
        PriceBasis::Asking
    };

    Ok(MarginResult {
        candidate,
        currency: resale.currency.resolve(sourcing.currency),
        resale_price,
        sourcing_cost,
        fees,
        shipping: shipping_cost,
        net_margin,
        roi,
        margin_pct,
        price_basis,
    })
}

fn checked_net_margin(
    resale_price: Decimal,
    sourcing_cost: Decimal,
    fees: Decimal,
    shipping_cost: Decimal,
) -> Result<Decimal, ComputeError> {
    resale_price
        .checked_sub(sourcing_cost)
        .and_then(|m| m.checked_sub(fees))
        .and_then(|m| m.checked_sub(shipping_cost))
        .ok_or(ComputeError::Overflow { step: "net margin" })
}

/// `net_margin / base * scale`, `Ok(None)` for a zero base.
fn checked_ratio(
    net_margin: Decimal,
    base: Decimal,
    scale: Decimal,
    step: &'static str,
) -> Result<Option<Decimal>, ComputeError> {
    if base.is_zero() {
        return Ok(None);
    }
    net_margin
        .checked_div(base)
        .and_then(|ratio| ratio.checked_mul(scale))
        .map(Some)
        .ok_or(ComputeError::Overflow { step })
}

/// Verdict of a quick margin check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum MarginVerdict {
    /// Margin of at least 20%.
    Go,
    /// Margin of at least 10%.
    Thin,
    /// Anything lower.
    Skip,
}

impl MarginVerdict {
    /// Verdict for a margin percentage.
    pub fn from_margin_pct(margin_pct: Decimal) -> Self {
        if margin_pct >= Decimal::from(20) {
            MarginVerdict::Go
        } else if margin_pct >= Decimal::from(10) {
            MarginVerdict::Thin
        } else {
            MarginVerdict::Skip
        }
    }
}

/// Result of a quick margin check on a pair of prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickMargin {
    /// Fees on the sale.
    pub fees: Decimal,
    /// Net margin.
    pub net_margin: Decimal,
    /// Net margin as a percentage of the sell price.
    pub margin_pct: Option<Decimal>,
    /// Net margin over cost, as a percentage.
    pub roi_pct: Option<Decimal>,
    /// GO / THIN / SKIP.
    pub verdict: MarginVerdict,
}

/// Margin for a sell price and a source cost, without any listings.
pub fn quick_margin_check(
    sell_price: Decimal,
    source_cost: Decimal,
    schedule: &FeeSchedule,
    shipping_cost: Decimal,
) -> Result<QuickMargin, ComputeError> {
    let fees = schedule
        .fees(sell_price)
        .ok_or(ComputeError::Overflow { step: "fees" })?;
    let net_margin = checked_net_margin(sell_price, source_cost, fees, shipping_cost)?;
    let margin_pct = checked_ratio(net_margin, sell_price, Decimal::ONE_HUNDRED, "margin")?;
    let roi_pct = checked_ratio(net_margin, source_cost, Decimal::ONE_HUNDRED, "roi")?;
    let verdict = margin_pct.map_or(MarginVerdict::Skip, MarginVerdict::from_margin_pct);

    Ok(QuickMargin {
        fees,
        net_margin,
        margin_pct,
        roi_pct,
        verdict,
    })
}
