//! In-memory provider for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{ListingProvider, SearchQuery};
use crate::error::ProviderError;
use crate::listing::{Marketplace, RawListing};

/// Mock provider returning fixed listings, or failing on demand.
#[derive(Debug, Clone)]
pub struct MockListingProvider {
    marketplace: Marketplace,
    listings: Vec<RawListing>,
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
    latency_ms: u64,
}

impl MockListingProvider {
    /// Empty provider for one marketplace side.
    pub fn new(marketplace: Marketplace) -> Self {
        Self {
            marketplace,
            listings: Vec::new(),
            fail: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(AtomicUsize::new(0)),
            latency_ms: 0,
        }
    }

    /// Set the listings every search returns.
    pub fn with_listings(mut self, listings: Vec<RawListing>) -> Self {
        self.listings = listings;
        self
    }

    /// Make every search fail as if rate limited.
    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    /// Simulate request latency.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Flip the failure switch on a shared provider.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of searches made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingProvider for MockListingProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<RawListing>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::RateLimited {
                provider: "mock",
                retry_after_seconds: Some(1),
            });
        }

        Ok(self.listings.clone())
    }
}
