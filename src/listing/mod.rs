//! Listing module.
//!
//! This module handles:
//! - Listing types and data structures
//! - Free-text price parsing
//! - Normalization of raw provider records

pub mod normalize;
pub mod price;
pub mod types;

pub use normalize::{
    classify_condition, classify_status, normalize, normalize_batch, DroppedListing,
    NormalizedBatch,
};
pub use price::{parse_count, parse_price, parse_price_with_hint, ParsedPrice};
pub use types::{Condition, Currency, Listing, ListingStatus, Marketplace, RawListing};
