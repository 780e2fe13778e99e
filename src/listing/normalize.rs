//! Raw provider records to [`Listing`]s.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::price::{parse_count, parse_price_with_hint};
use super::types::{Condition, Currency, Listing, ListingStatus, Marketplace, RawListing};
use crate::error::NormalizeError;
use crate::metrics;

/// Explicit status values meaning the item sold.
const EXPLICIT_SOLD: &[&str] = &["sold", "completed", "ended", "closed"];

/// Explicit status values meaning the item is still listed.
const EXPLICIT_ACTIVE: &[&str] = &["active", "available", "in stock", "live", "open"];

static SOLD_INDICATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:sold|completed|ended|listing ended)\b|\bsold (?:on|for)\b|\bdate sold\b")
        .expect("valid regex")
});

static ACTIVE_INDICATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:buy it now|or best offer|best offer|in stock|available|bids?|time left|\d+[dhm] left)\b",
    )
    .expect("valid regex")
});

static USED_CONDITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:pre-?owned|used|refurbished|renewed|open box|for parts|parts only)\b")
        .expect("valid regex")
});

static NEW_CONDITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:brand new|new|nwt|nib|sealed)\b").expect("valid regex")
});

/// "1,234 sold", "5K+ sold", "300 orders".
static COUNT_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*[\d.,]+\s*k?\+?\s*(?:sold|orders?)\b").expect("valid regex")
});

/// Classify sold/active status.
///
/// An explicit provider status wins when it is recognized. Otherwise the
/// texts (title, extensions) are matched against a fixed lexicon; sold
/// evidence beats active evidence. Count-style text like "1,234 sold" is
/// order volume, not a completed sale.
pub fn classify_status(explicit: Option<&str>, texts: &[&str]) -> ListingStatus {
    if let Some(status) = explicit {
        let status = status.trim().to_lowercase();
        if EXPLICIT_SOLD.contains(&status.as_str()) {
            return ListingStatus::Sold;
        }
        if EXPLICIT_ACTIVE.contains(&status.as_str()) {
            return ListingStatus::Active;
        }
    }

    if texts.iter().any(|t| SOLD_INDICATOR.is_match(t)) {
        ListingStatus::Sold
    } else if texts.iter().any(|t| ACTIVE_INDICATOR.is_match(t)) {
        ListingStatus::Active
    } else {
        ListingStatus::Unknown
    }
}

/// Classify item condition from free text. Used-type wording wins, so
/// "Used - Like New" is used.
pub fn classify_condition(text: &str) -> Condition {
    if USED_CONDITION.is_match(text) {
        Condition::Used
    } else if NEW_CONDITION.is_match(text) {
        Condition::New
    } else {
        Condition::Unknown
    }
}

/// Normalize one raw record.
pub fn normalize(raw: &RawListing, source: Marketplace) -> Result<Listing, NormalizeError> {
    let title = raw.title.trim();
    if title.is_empty() {
        return Err(NormalizeError::MissingTitle);
    }

    let hint = currency_hint(raw);
    let price_text = raw.price_text.as_deref().unwrap_or_default();
    let price = parse_price_with_hint(price_text, hint)?;

    let (shipping, shipping_currency) =
        shipping_cost(raw.shipping_text.as_deref(), price.currency, hint);
    let currency = price.currency.resolve(shipping_currency);

    let condition = match raw.condition.as_deref() {
        Some(text) => classify_condition(text),
        None => classify_condition(title),
    };

    let mut texts = Vec::with_capacity(raw.extensions.len() + 1);
    texts.push(title);
    texts.extend(raw.extensions.iter().map(String::as_str));
    let status = classify_status(raw.status.as_deref(), &texts);

    let orders = raw.orders.or_else(|| {
        raw.extensions
            .iter()
            .filter(|e| COUNT_TEXT.is_match(e))
            .find_map(|e| parse_count(e))
    });

    Ok(Listing {
        title: title.to_string(),
        raw_price_text: price_text.to_string(),
        price: price.amount,
        currency,
        shipping,
        condition,
        status,
        source,
        url: raw.url.clone().unwrap_or_default(),
        orders,
        rating: raw.rating.filter(|r| r.is_finite()),
    })
}

fn currency_hint(raw: &RawListing) -> Option<Currency> {
    let hint = raw.currency_hint.as_deref()?.trim();
    match Currency::from_str(hint) {
        Ok(currency) => Some(currency),
        Err(_) => {
            debug!(hint, title = %raw.title, "Ignoring unrecognized currency hint");
            None
        }
    }
}

/// Parse listing-level shipping. Anything unusable counts as zero.
fn shipping_cost(
    text: Option<&str>,
    price_currency: Currency,
    hint: Option<Currency>,
) -> (Decimal, Currency) {
    let Some(text) = text else {
        return (Decimal::ZERO, Currency::Xxx);
    };

    let shipping_hint = match price_currency {
        Currency::Xxx => hint,
        currency => Some(currency),
    };

    match parse_price_with_hint(text, shipping_hint) {
        Ok(parsed) if parsed.currency.is_compatible(price_currency) => {
            (parsed.amount, parsed.currency)
        }
        Ok(parsed) => {
            debug!(
                shipping = text,
                shipping_currency = %parsed.currency,
                price_currency = %price_currency,
                "Shipping currency differs from price, treating shipping as zero"
            );
            (Decimal::ZERO, Currency::Xxx)
        }
        Err(e) => {
            debug!(shipping = text, error = %e, "Unparseable shipping, treating as zero");
            (Decimal::ZERO, Currency::Xxx)
        }
    }
}

/// A raw record that did not survive normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedListing {
    /// Title as received (may be empty).
    pub title: String,
    /// Price text as received.
    pub price_text: Option<String>,
    /// Marketplace the record came from.
    pub source: Marketplace,
    /// Why it was dropped.
    pub reason: NormalizeError,
}

/// Result of normalizing a page of raw records.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Records that normalized successfully, in input order.
    pub listings: Vec<Listing>,
    /// Records that were dropped, in input order.
    pub dropped: Vec<DroppedListing>,
}

impl NormalizedBatch {
    /// Number of dropped records.
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }
}

/// Normalize a page of raw records. Failures are logged, counted and
/// collected; they never fail the batch.
pub fn normalize_batch(raws: &[RawListing], source: Marketplace) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for raw in raws {
        match normalize(raw, source) {
            Ok(listing) => batch.listings.push(listing),
            Err(reason) => {
                warn!(
                    marketplace = %source,
                    title = %raw.title,
                    price = raw.price_text.as_deref().unwrap_or_default(),
                    reason = reason.reason(),
                    "Dropping listing"
                );
                metrics::inc_listings_dropped(source, reason.reason());
                batch.dropped.push(DroppedListing {
                    title: raw.title.clone(),
                    price_text: raw.price_text.clone(),
                    source,
                    reason,
                });
            }
        }
    }

    metrics::inc_listings_normalized(source, batch.listings.len() as u64);
    debug!(
        marketplace = %source,
        normalized = batch.listings.len(),
        dropped = batch.dropped.len(),
        "Normalized listing batch"
    );

    batch
}
