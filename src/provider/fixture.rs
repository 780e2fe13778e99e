//! Provider backed by a JSON file of raw listings.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{ListingProvider, SearchQuery};
use crate::error::ProviderError;
use crate::listing::{Marketplace, RawListing};

/// Reads a JSON array of [`RawListing`] on every search. The query is ignored.
#[derive(Debug, Clone)]
pub struct FixtureProvider {
    path: PathBuf,
    marketplace: Marketplace,
}

impl FixtureProvider {
    /// Provider for the file at `path`.
    pub fn new(path: impl Into<PathBuf>, marketplace: Marketplace) -> Self {
        Self {
            path: path.into(),
            marketplace,
        }
    }
}

#[async_trait]
impl ListingProvider for FixtureProvider {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<RawListing>, ProviderError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let records: Vec<RawListing> =
            serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))?;
        debug!(path = %self.path.display(), count = records.len(), "Loaded fixture listings");
        Ok(records)
    }
}
