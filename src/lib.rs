//! Resale vs. wholesale marketplace arbitrage finder.
//!
//! Listings are pulled from a resale marketplace (eBay) and a sourcing
//! marketplace (AliExpress via Google Shopping), normalized into a common
//! shape, paired by title similarity and priced after fees and shipping:
//!
//! ```text
//! Resale (sold):   Apple Watch Series 9 45mm       $250.00
//! Sourcing:        Apple Watch S9 45mm Aluminum     $90.00
//! Similarity:      0.43
//! ─────────────────────────────────────────────────────────
//! Fees (12%):      $30.00
//! Shipping:         $8.00
//! Net margin:     $122.00   ROI 135.56%
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`listing`]: Price parsing and listing normalization
//! - [`arbitrage`]: Title matching, margin calculation and scoring
//! - [`trend`]: Aggregate statistics and presentation views
//! - [`provider`]: Listing sources (SerpApi, fixtures, mock)
//! - [`pipeline`]: Snapshot fetching and one analysis run
//! - [`api`]: HTTP API
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod arbitrage;
pub mod config;
pub mod error;
pub mod listing;
pub mod metrics;
pub mod pipeline;
pub mod provider;
pub mod trend;
pub mod utils;

pub use config::Config;
pub use error::{ArbError, Result};
