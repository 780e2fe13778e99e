//! Arbitrage module for matching listings and computing margins.
//!
//! This module handles:
//! - Title matching between sourcing and resale listings
//! - Fee, margin and ROI calculations
//! - Opportunity scoring for presentation

pub mod calculator;
pub mod matcher;
pub mod score;

pub use calculator::{
    compute, compute_with_schedule, quick_margin_check, FeeSchedule, MarginResult, MarginVerdict,
    PriceBasis, QuickMargin,
};
pub use matcher::{match_listings, match_refs, normalize_title, similarity, MatchCandidate, TitleTokens};
pub use score::score_opportunity;
