//! HTTP API module for health, analysis, status and metrics endpoints.

pub mod handlers;
pub mod routes;

pub use handlers::{AnalysisOverrides, AnalyzeRequest, AppState};
pub use routes::create_router;
