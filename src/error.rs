//! Unified error types for the arbitrage finder.

use strum::Display;
use thiserror::Error;

use crate::listing::Currency;

/// Unified error type for the arbitrage finder.
#[derive(Error, Debug)]
pub enum ArbError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration values failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Price parsing error.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Listing normalization error.
    #[error("normalize error: {0}")]
    Normalize(#[from] NormalizeError),

    /// Margin computation error.
    #[error("compute error: {0}")]
    Compute(#[from] ComputeError),

    /// Search provider error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a price string could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ParseErrorKind {
    /// No digit sequence and no free/N/A marker.
    #[strum(to_string = "no numeric token")]
    NoNumericToken,
    /// Digits found but no currency symbol, code, or hint.
    #[strum(to_string = "unknown currency")]
    UnknownCurrency,
    /// Digits found but they do not form a representable amount.
    #[strum(to_string = "malformed amount")]
    MalformedAmount,
}

/// Price parsing failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse price {input:?}: {kind}")]
pub struct ParseError {
    /// Failure category.
    pub kind: ParseErrorKind,
    /// The text that failed to parse.
    pub input: String,
}

impl ParseError {
    /// Create a parse error for the given input.
    pub fn new(kind: ParseErrorKind, input: impl Into<String>) -> Self {
        Self {
            kind,
            input: input.into(),
        }
    }
}

/// Raw record could not become a [`Listing`](crate::listing::Listing).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Record has an empty or missing title.
    #[error("listing has no title")]
    MissingTitle,

    /// Record price failed to parse.
    #[error(transparent)]
    Price(#[from] ParseError),
}

impl NormalizeError {
    /// Short machine-readable reason, used as a metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            NormalizeError::MissingTitle => "missing_title",
            NormalizeError::Price(e) => match e.kind {
                ParseErrorKind::NoNumericToken => "no_numeric_token",
                ParseErrorKind::UnknownCurrency => "unknown_currency",
                ParseErrorKind::MalformedAmount => "malformed_amount",
            },
        }
    }
}

/// Margin computation errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeError {
    /// Resale and sourcing listings are priced in different currencies.
    #[error("currency mismatch: resale in {resale}, sourcing in {sourcing}")]
    CurrencyMismatch {
        /// Resale listing currency.
        resale: Currency,
        /// Sourcing listing currency.
        sourcing: Currency,
    },

    /// Pair is priced in a currency other than the reporting currency.
    #[error("pair priced in {found}, reporting currency is {expected}")]
    ReportingCurrencyMismatch {
        /// Configured reporting currency.
        expected: Currency,
        /// Currency of the pair.
        found: Currency,
    },

    /// ROI is undefined because the sourcing cost is zero.
    #[error("roi undefined: sourcing cost is zero")]
    ZeroSourcingCost,

    /// An amount left the representable decimal range.
    #[error("{step} overflowed")]
    Overflow {
        /// Quantity being computed.
        step: &'static str,
    },
}

impl ComputeError {
    /// Short machine-readable reason, used as a metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            ComputeError::CurrencyMismatch { .. } => "currency_mismatch",
            ComputeError::ReportingCurrencyMismatch { .. } => "reporting_currency_mismatch",
            ComputeError::ZeroSourcingCost => "zero_sourcing_cost",
            ComputeError::Overflow { .. } => "overflow",
        }
    }
}

/// Search provider errors. Treated as an empty page at the pipeline boundary.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// No API key configured for a provider that needs one.
    #[error("api key not configured for {provider}")]
    MissingApiKey {
        /// Provider name.
        provider: &'static str,
    },

    /// Rate limited by the provider.
    #[error("rate limited by {provider}")]
    RateLimited {
        /// Provider name.
        provider: &'static str,
        /// Seconds to wait, when the provider says.
        retry_after_seconds: Option<u64>,
    },

    /// Non-success HTTP status.
    #[error("{provider} returned HTTP {status}")]
    Status {
        /// Provider name.
        provider: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// Provider reported an error in its payload.
    #[error("{provider} error: {message}")]
    Api {
        /// Provider name.
        provider: &'static str,
        /// Error message from the payload.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Invalid request URL.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP transport error.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Fixture file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ArbError>;
