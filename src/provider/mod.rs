//! Listing providers.
//!
//! This module handles:
//! - The provider trait both marketplaces are fetched through
//! - SerpApi-backed eBay and shopping-search providers
//! - Fixture and mock providers for offline runs and tests

pub mod fixture;
pub mod mock;
pub mod serpapi;

use std::time::Instant;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::ProviderError;
use crate::listing::{Marketplace, RawListing};
use crate::metrics;

pub use fixture::FixtureProvider;
pub use mock::MockListingProvider;
pub use serpapi::{EbayProvider, SerpApiClient, ShoppingProvider};

/// Search terms and filters for one provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text keywords.
    pub keywords: String,
    /// Lower price bound, when the provider supports it.
    pub min_price: Option<Decimal>,
    /// Upper price bound, when the provider supports it.
    pub max_price: Option<Decimal>,
    /// Maximum number of records to return.
    pub limit: usize,
    /// Ask for completed sales only (resale side).
    pub sold_only: bool,
}

impl SearchQuery {
    /// Query with default limit and no filters.
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            min_price: None,
            max_price: None,
            limit: 50,
            sold_only: false,
        }
    }

    /// Set the result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Restrict to completed sales.
    pub fn with_sold_only(mut self, sold_only: bool) -> Self {
        self.sold_only = sold_only;
        self
    }

    /// Set a price range.
    pub fn with_price_range(mut self, min: Option<Decimal>, max: Option<Decimal>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }
}

/// A source of raw listings for one marketplace side.
#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Short provider name, used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Which side of the trade this provider supplies.
    fn marketplace(&self) -> Marketplace;

    /// Fetch one page of raw listings.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawListing>, ProviderError>;
}

/// Fetch from a provider, treating any failure as an empty page.
#[instrument(skip(provider, query), fields(provider = provider.name(), keywords = %query.keywords))]
pub async fn fetch_or_empty(provider: &dyn ListingProvider, query: &SearchQuery) -> Vec<RawListing> {
    let start = Instant::now();
    let result = provider.search(query).await;
    metrics::record_provider_fetch_latency(start, provider.name());

    match result {
        Ok(mut records) => {
            records.truncate(query.limit);
            debug!(count = records.len(), "Fetched listings");
            records
        }
        Err(e) => {
            warn!(error = %e, "Provider failed, treating as no listings");
            metrics::inc_provider_failures(provider.name());
            Vec::new()
        }
    }
}
