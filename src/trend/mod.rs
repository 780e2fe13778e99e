//! Trend module for summarizing a run.
//!
//! This module handles:
//! - Aggregate statistics, ranking and histograms
//! - Owned views for presentation

pub mod aggregator;
pub mod view;

pub use aggregator::{
    rank_by_margin, summarize, top_k_per_sourcing, HistogramBucket, Summary, SummaryOptions,
};
pub use view::{AnalysisView, DroppedView, OpportunityRow, RejectedView, SummaryView};
