//! Listing types shared by the normalizer, matcher and margin calculator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Currency code attached to a parsed price.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(ascii_case_insensitive)]
pub enum Currency {
    /// US dollar.
    #[strum(to_string = "USD")]
    Usd,
    /// Euro.
    #[strum(to_string = "EUR")]
    Eur,
    /// Pound sterling.
    #[strum(to_string = "GBP")]
    Gbp,
    /// Canadian dollar.
    #[strum(to_string = "CAD")]
    Cad,
    /// Australian dollar.
    #[strum(to_string = "AUD")]
    Aud,
    /// Japanese yen.
    #[strum(to_string = "JPY")]
    Jpy,
    /// Chinese yuan.
    #[strum(to_string = "CNY", serialize = "RMB")]
    Cny,
    /// Indian rupee.
    #[strum(to_string = "INR")]
    Inr,
    /// Swiss franc.
    #[strum(to_string = "CHF")]
    Chf,
    /// ISO 4217 "no currency". Carried by free / N/A prices.
    #[strum(to_string = "XXX")]
    Xxx,
}

impl Currency {
    /// Whether two currencies can be combined without conversion.
    ///
    /// `XXX` (a zero, currency-less price) combines with anything.
    pub fn is_compatible(self, other: Currency) -> bool {
        self == other || self == Currency::Xxx || other == Currency::Xxx
    }

    /// The concrete currency of a pair, preferring the non-`XXX` side.
    pub fn resolve(self, other: Currency) -> Currency {
        if self == Currency::Xxx {
            other
        } else {
            self
        }
    }
}

/// Item condition as advertised.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Condition {
    /// Brand new / new with tags.
    New,
    /// Pre-owned, refurbished, open box.
    Used,
    /// Not stated or not recognized.
    #[default]
    Unknown,
}

/// Whether a listing is still for sale or has sold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ListingStatus {
    /// Currently listed; the price is an asking price.
    Active,
    /// Completed sale; the price was actually achieved.
    Sold,
    /// No status evidence.
    #[default]
    Unknown,
}

/// Which side of the trade a listing comes from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Marketplace {
    /// Marketplace the goods are sold on (e.g. eBay).
    Resale,
    /// Marketplace the goods are bought from (e.g. AliExpress).
    Sourcing,
}

/// Provider-neutral raw listing record, before price parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawListing {
    /// Listing title.
    pub title: String,
    /// Free-text price, e.g. "$1,299.00" or "US $3.49 - $12.00".
    pub price_text: Option<String>,
    /// Provider-declared currency code, used when the text has no marker.
    pub currency_hint: Option<String>,
    /// Free-text shipping, e.g. "Free shipping" or "+$4.99 shipping".
    pub shipping_text: Option<String>,
    /// Free-text condition, e.g. "Pre-Owned".
    pub condition: Option<String>,
    /// Explicit provider status field, if any.
    pub status: Option<String>,
    /// Extra provider snippets ("Buy It Now", "1,234 sold", ...).
    pub extensions: Vec<String>,
    /// Listing URL.
    pub url: Option<String>,
    /// Number of orders, when the provider reports it numerically.
    pub orders: Option<u64>,
    /// Seller or product rating on a 0-5 scale.
    pub rating: Option<f64>,
}

impl RawListing {
    /// Create a raw record with just a title and price text.
    pub fn new(title: impl Into<String>, price_text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price_text: Some(price_text.into()),
            ..Default::default()
        }
    }

    /// Set the explicit status field.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the shipping text.
    pub fn with_shipping(mut self, shipping: impl Into<String>) -> Self {
        self.shipping_text = Some(shipping.into());
        self
    }

    /// Set the currency hint.
    pub fn with_currency_hint(mut self, code: impl Into<String>) -> Self {
        self.currency_hint = Some(code.into());
        self
    }

    /// Set the listing URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set order count and rating.
    pub fn with_supplier_stats(mut self, orders: u64, rating: f64) -> Self {
        self.orders = Some(orders);
        self.rating = Some(rating);
        self
    }
}

/// Normalized product record from one marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing title as published.
    pub title: String,
    /// Price text the amount was parsed from.
    pub raw_price_text: String,
    /// Parsed, non-negative price.
    pub price: Decimal,
    /// Currency of `price` and `shipping`.
    pub currency: Currency,
    /// Per-listing shipping charge (0 when free or unknown).
    pub shipping: Decimal,
    /// Advertised condition.
    pub condition: Condition,
    /// Active / sold classification.
    pub status: ListingStatus,
    /// Marketplace the listing came from.
    pub source: Marketplace,
    /// Listing URL (may be empty).
    pub url: String,
    /// Order count, for sourcing listings.
    pub orders: Option<u64>,
    /// Rating on a 0-5 scale.
    pub rating: Option<f64>,
}

impl Listing {
    /// Price plus listing-level shipping. `None` if the sum overflows.
    pub fn landed_cost(&self) -> Option<Decimal> {
        self.price.checked_add(self.shipping)
    }

    /// Whether the price is a completed sale rather than an asking price.
    pub fn is_sold(&self) -> bool {
        self.status == ListingStatus::Sold
    }
}
