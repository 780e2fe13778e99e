//! Application configuration loaded from environment variables.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::arbitrage::FeeSchedule;
use crate::listing::Currency;
use crate::pipeline::AnalysisConfig;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === SerpApi ===
    /// SerpApi key. Live searches are disabled without it.
    #[serde(default)]
    pub serpapi_api_key: Option<String>,

    /// SerpApi search endpoint.
    #[serde(default = "default_serpapi_base_url")]
    pub serpapi_base_url: String,

    /// eBay site to search (e.g. ebay.com, ebay.co.uk).
    #[serde(default = "default_ebay_domain")]
    pub ebay_domain: String,

    /// Merchant name shopping results must come from.
    #[serde(default = "default_sourcing_source_filter")]
    pub sourcing_source_filter: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Maximum records kept per provider call.
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    // === Matching ===
    /// Minimum title similarity for a match (0.0 - 1.0).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    // === Economics ===
    /// Selling fee as a fraction of the resale price.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,

    /// Fixed selling fee per order.
    #[serde(default = "default_fixed_fee")]
    pub fixed_fee: Decimal,

    /// Add the promoted-listing fee (3%).
    #[serde(default)]
    pub use_promoted: bool,

    /// Outbound shipping cost per sale.
    #[serde(default)]
    pub shipping_cost: Decimal,

    /// Results with a lower net margin are left out.
    #[serde(default)]
    pub min_margin_filter: Decimal,

    // === Filters ===
    /// Skip sourcing listings with a higher landed cost.
    #[serde(default)]
    pub max_sourcing_price: Option<Decimal>,

    /// Skip sourcing listings with fewer orders.
    #[serde(default)]
    pub min_sourcing_orders: u64,

    /// Skip sourcing listings rated lower (0.0 - 5.0).
    #[serde(default)]
    pub min_sourcing_rating: Option<f64>,

    /// Only match resale listings that sold.
    #[serde(default)]
    pub require_sold: bool,

    /// Reject pairs priced in any other currency (ISO code, uppercase).
    #[serde(default)]
    pub reporting_currency: Option<Currency>,

    // === Output ===
    /// Number of best results kept in the summary.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Width of net-margin histogram buckets.
    #[serde(default = "default_histogram_bucket_width")]
    pub histogram_bucket_width: Decimal,

    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Expose Prometheus metrics on /metrics.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_serpapi_base_url() -> String {
    "https://serpapi.com/search.json".to_string()
}

fn default_ebay_domain() -> String {
    "ebay.com".to_string()
}

fn default_sourcing_source_filter() -> String {
    "aliexpress".to_string()
}

fn default_http_timeout_ms() -> u64 {
    15_000
}

fn default_result_limit() -> usize {
    50
}

fn default_similarity_threshold() -> f64 {
    0.40
}

fn default_fee_rate() -> Decimal {
    Decimal::new(1615, 4) // 13.25% final value + 2.9% payment
}

fn default_fixed_fee() -> Decimal {
    Decimal::new(60, 2) // $0.30 order + $0.30 payment
}

fn default_top_n() -> usize {
    10
}

fn default_histogram_bucket_width() -> Decimal {
    Decimal::TEN
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serpapi_api_key: None,
            serpapi_base_url: default_serpapi_base_url(),
            ebay_domain: default_ebay_domain(),
            sourcing_source_filter: default_sourcing_source_filter(),
            http_timeout_ms: default_http_timeout_ms(),
            result_limit: default_result_limit(),
            similarity_threshold: default_similarity_threshold(),
            fee_rate: default_fee_rate(),
            fixed_fee: default_fixed_fee(),
            use_promoted: false,
            shipping_cost: Decimal::ZERO,
            min_margin_filter: Decimal::ZERO,
            max_sourcing_price: None,
            min_sourcing_orders: 0,
            min_sourcing_rating: None,
            require_sold: false,
            reporting_currency: None,
            top_n: default_top_n(),
            histogram_bucket_width: default_histogram_bucket_width(),
            port: default_port(),
            metrics_enabled: true,
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err("SIMILARITY_THRESHOLD must be between 0.0 and 1.0".to_string());
        }

        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
            return Err("FEE_RATE must be at least 0 and less than 1".to_string());
        }

        if self.fixed_fee < Decimal::ZERO {
            return Err("FIXED_FEE must not be negative".to_string());
        }

        if self.shipping_cost < Decimal::ZERO {
            return Err("SHIPPING_COST must not be negative".to_string());
        }

        if self.max_sourcing_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err("MAX_SOURCING_PRICE must not be negative".to_string());
        }

        if self
            .min_sourcing_rating
            .is_some_and(|r| !(0.0..=5.0).contains(&r))
        {
            return Err("MIN_SOURCING_RATING must be between 0.0 and 5.0".to_string());
        }

        if self.top_n == 0 {
            return Err("TOP_N must be at least 1".to_string());
        }

        if self.histogram_bucket_width <= Decimal::ZERO {
            return Err("HISTOGRAM_BUCKET_WIDTH must be positive".to_string());
        }

        if self.result_limit == 0 {
            return Err("RESULT_LIMIT must be at least 1".to_string());
        }

        if self.http_timeout_ms == 0 {
            return Err("HTTP_TIMEOUT_MS must be positive".to_string());
        }

        if url::Url::parse(&self.serpapi_base_url).is_err() {
            return Err("SERPAPI_BASE_URL must be a valid URL".to_string());
        }

        Ok(())
    }

    /// Whether live provider searches are possible.
    pub fn has_api_key(&self) -> bool {
        self.serpapi_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Fee schedule from the fee settings.
    pub fn fee_schedule(&self) -> FeeSchedule {
        let promoted = if self.use_promoted {
            Decimal::new(3, 2)
        } else {
            Decimal::ZERO
        };
        FeeSchedule::new(self.fee_rate + promoted, self.fixed_fee)
    }

    /// Analysis settings passed to the pipeline.
    pub fn analysis(&self) -> AnalysisConfig {
        AnalysisConfig {
            threshold: self.similarity_threshold,
            fees: self.fee_schedule(),
            shipping_cost: self.shipping_cost,
            min_margin_filter: self.min_margin_filter,
            require_sold: self.require_sold,
            max_sourcing_price: self.max_sourcing_price,
            min_sourcing_orders: self.min_sourcing_orders,
            min_sourcing_rating: self.min_sourcing_rating,
            reporting_currency: self.reporting_currency,
            top_n: self.top_n,
            histogram_bucket_width: self.histogram_bucket_width,
        }
    }
}
