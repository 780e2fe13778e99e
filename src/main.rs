//! Resale vs. wholesale arbitrage finder entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reseller_arb::api::{create_router, AnalysisOverrides, AppState};
use reseller_arb::arbitrage::{quick_margin_check, FeeSchedule};
use reseller_arb::config::Config;
use reseller_arb::listing::{parse_price, Marketplace};
use reseller_arb::metrics;
use reseller_arb::pipeline::{fetch_snapshot, run, AnalysisConfig};
use reseller_arb::provider::{
    EbayProvider, FixtureProvider, ListingProvider, SearchQuery, SerpApiClient, ShoppingProvider,
};
use reseller_arb::trend::AnalysisView;
use reseller_arb::utils::shutdown_signal;

const RULE: &str = "======================================================================";
const THIN_RULE: &str = "----------------------------------------------------------------------";

/// Resale vs. wholesale marketplace arbitrage finder.
#[derive(Parser, Debug)]
#[command(name = "reseller-arb")]
#[command(about = "Find products that resell on eBay for more than they cost on AliExpress")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch both marketplaces and print ranked opportunities.
    Analyze {
        /// Search keywords.
        #[arg(short, long)]
        query: String,

        /// Read resale listings from a JSON file instead of eBay.
        #[arg(long)]
        resale_file: Option<PathBuf>,

        /// Read sourcing listings from a JSON file instead of Google Shopping.
        #[arg(long)]
        sourcing_file: Option<PathBuf>,

        /// Minimum title similarity (0.0 - 1.0).
        #[arg(long)]
        threshold: Option<f64>,

        /// Selling fee rate, e.g. 0.13.
        #[arg(long)]
        fee_rate: Option<Decimal>,

        /// Outbound shipping per sale.
        #[arg(long)]
        shipping: Option<Decimal>,

        /// Minimum net margin to report.
        #[arg(long)]
        min_margin: Option<Decimal>,

        /// Number of top results to show.
        #[arg(long)]
        top: Option<usize>,

        /// Only use completed eBay sales.
        #[arg(long)]
        sold_only: bool,

        /// Print the analysis as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Quick margin check for one sell price and one cost.
    Margin {
        /// eBay sell price.
        #[arg(long)]
        sell: Decimal,

        /// Sourcing cost including inbound shipping.
        #[arg(long)]
        source: Decimal,

        /// Outbound shipping per sale.
        #[arg(long, default_value = "0")]
        shipping: Decimal,

        /// Add the promoted listings fee.
        #[arg(long)]
        promoted: bool,
    },

    /// Parse a free-text price (diagnostic).
    ParsePrice {
        /// Price text, e.g. "US $1,299.00".
        text: String,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Run the HTTP API (default).
    Serve {
        /// HTTP server port.
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("reseller_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::Analyze {
            query,
            resale_file,
            sourcing_file,
            threshold,
            fee_rate,
            shipping,
            min_margin,
            top,
            sold_only,
            json,
        }) => {
            let overrides = AnalysisOverrides {
                threshold,
                fee_rate,
                shipping_cost: shipping,
                min_margin_filter: min_margin,
                top_n: top,
                ..Default::default()
            };
            cmd_analyze(AnalyzeArgs {
                query,
                resale_file,
                sourcing_file,
                overrides,
                sold_only,
                json,
            })
            .await
        }
        Some(Command::Margin {
            sell,
            source,
            shipping,
            promoted,
        }) => cmd_margin(sell, source, shipping, promoted),
        Some(Command::ParsePrice { text }) => cmd_parse_price(&text),
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Serve { port }) => cmd_serve(port.or(args.port)).await,
        None => cmd_serve(args.port).await,
    }
}

/// Load and validate configuration, logging failures.
fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

/// Build the resale and sourcing providers, preferring fixture files.
fn build_providers(
    config: &Config,
    resale_file: Option<PathBuf>,
    sourcing_file: Option<PathBuf>,
) -> anyhow::Result<(Arc<dyn ListingProvider>, Arc<dyn ListingProvider>)> {
    if (resale_file.is_none() || sourcing_file.is_none()) && !config.has_api_key() {
        warn!("SERPAPI_API_KEY is not set; live searches will return no listings");
    }

    let resale: Arc<dyn ListingProvider> = match resale_file {
        Some(path) => Arc::new(FixtureProvider::new(path, Marketplace::Resale)),
        None => Arc::new(EbayProvider::new(SerpApiClient::new(config)?, &config.ebay_domain)),
    };
    let sourcing: Arc<dyn ListingProvider> = match sourcing_file {
        Some(path) => Arc::new(FixtureProvider::new(path, Marketplace::Sourcing)),
        None => Arc::new(ShoppingProvider::new(
            SerpApiClient::new(config)?,
            &config.sourcing_source_filter,
        )),
    };

    Ok((resale, sourcing))
}

struct AnalyzeArgs {
    query: String,
    resale_file: Option<PathBuf>,
    sourcing_file: Option<PathBuf>,
    overrides: AnalysisOverrides,
    sold_only: bool,
    json: bool,
}

/// Fetch, analyze and print one query.
async fn cmd_analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let config = load_config()?;
    metrics::init_metrics();

    let analysis: AnalysisConfig = args.overrides.apply(&config.analysis());
    analysis
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid analysis options: {}", e))?;

    let (resale, sourcing) = build_providers(&config, args.resale_file, args.sourcing_file)?;
    let query = SearchQuery::new(args.query.trim())
        .with_limit(config.result_limit)
        .with_sold_only(args.sold_only || config.require_sold);

    info!(query = %query.keywords, resale = resale.name(), sourcing = sourcing.name(), "Fetching listings");
    let snapshot = fetch_snapshot(resale.as_ref(), sourcing.as_ref(), &query).await;
    let report = run(&snapshot, &analysis);
    let view = AnalysisView::from_report(&report);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&args.query, &view);
    }

    Ok(())
}

fn print_view(query: &str, view: &AnalysisView) {
    let summary = &view.summary;

    println!("{}", RULE);
    println!("ARBITRAGE ANALYSIS - {}", query.to_uppercase());
    println!("{}", RULE);
    println!(
        "Candidates: {}  Priced: {}  Rejected: {}  Dropped: {}",
        summary.candidate_count, summary.count, summary.rejected_count, summary.dropped_count
    );
    if let (Some(mean), Some(total)) = (summary.mean_margin, summary.total_margin) {
        println!("Mean margin: {}  Total margin: {}", mean, total);
    }
    if let Some(roi) = summary.mean_roi_pct {
        println!("Mean ROI: {}%", roi);
    }
    println!("{}", THIN_RULE);

    if summary.top.is_empty() {
        println!("No opportunities found.");
    }
    for (rank, row) in summary.top.iter().enumerate() {
        println!(
            "#{:<2} {} {} margin  (score {:.1}, similarity {:.2}, {})",
            rank + 1,
            row.currency,
            row.net_margin,
            row.score,
            row.similarity,
            row.price_basis
        );
        println!("    BUY  {} @ {}", row.sourcing_title, row.sourcing_cost);
        println!("    SELL {} @ {}", row.resale_title, row.resale_price);
        match row.roi_pct {
            Some(roi) => println!("    Fees {}  Shipping {}  ROI {}%", row.fees, row.shipping, roi),
            None => println!("    Fees {}  Shipping {}  ROI n/a", row.fees, row.shipping),
        }
    }

    if !view.rejected.is_empty() {
        println!("{}", THIN_RULE);
        for rejected in &view.rejected {
            println!("Rejected: {} / {} ({})", rejected.sourcing_title, rejected.resale_title, rejected.message);
        }
    }
    println!("{}", RULE);
}

/// Quick margin check.
fn cmd_margin(sell: Decimal, source: Decimal, shipping: Decimal, promoted: bool) -> anyhow::Result<()> {
    let schedule = FeeSchedule::ebay_us(promoted);
    let result = quick_margin_check(sell, source, &schedule, shipping)?;

    println!("{}", RULE);
    println!("MARGIN CHECK");
    println!("{}", RULE);
    println!("  Sell price:   ${}", sell);
    println!("  Source cost:  ${}", source);
    println!("  eBay fees:    ${} ({})", result.fees.round_dp(2), if promoted { "promoted" } else { "standard" });
    println!("  Shipping:     ${}", shipping);
    println!("{}", THIN_RULE);
    println!("  Net margin:   ${}", result.net_margin.round_dp(2));
    match result.margin_pct {
        Some(pct) => println!("  Margin:       {}%", pct.round_dp(1)),
        None => println!("  Margin:       n/a"),
    }
    match result.roi_pct {
        Some(pct) => println!("  ROI:          {}%", pct.round_dp(1)),
        None => println!("  ROI:          n/a"),
    }
    println!("  Verdict:      {}", result.verdict);
    println!("{}", RULE);

    Ok(())
}

/// Parse one price string and print the result.
fn cmd_parse_price(text: &str) -> anyhow::Result<()> {
    match parse_price(text) {
        Ok(parsed) => {
            println!("Input:    {:?}", text);
            println!("Amount:   {}", parsed.amount);
            println!("Currency: {}", parsed.currency);
            println!("Parsed:   {}", parsed);
            Ok(())
        }
        Err(e) => {
            println!("Input:    {:?}", text);
            println!("FAILED:   {}", e);
            Err(anyhow::anyhow!("Price could not be parsed"))
        }
    }
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("{}", RULE);
    println!("RESELLER ARB - CONFIGURATION CHECK");
    println!("{}", RULE);

    // Load configuration
    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    // Check API key
    print!("Checking SerpApi key... ");
    if config.has_api_key() {
        println!("OK");
    } else {
        println!("MISSING");
        println!("  WARNING: live searches need SERPAPI_API_KEY; fixture files still work");
    }

    // Show configuration summary
    let fees = config.fee_schedule();
    println!("{}", THIN_RULE);
    println!("Configuration Summary:");
    println!("  eBay Domain: {}", config.ebay_domain);
    println!("  Sourcing Filter: {}", config.sourcing_source_filter);
    println!("  Similarity Threshold: {}", config.similarity_threshold);
    println!(
        "  Fees: {}% + ${}{}",
        fees.rate * Decimal::ONE_HUNDRED,
        fees.fixed_per_order,
        if config.use_promoted { " (promoted)" } else { "" }
    );
    println!("  Shipping: ${}", config.shipping_cost);
    println!("  Min Margin: ${}", config.min_margin_filter);
    println!("  Require Sold: {}", config.require_sold);
    match config.reporting_currency {
        Some(currency) => println!("  Reporting Currency: {}", currency),
        None => println!("  Reporting Currency: any"),
    }
    println!("  Result Limit: {}", config.result_limit);
    println!("  Metrics: {}", if config.metrics_enabled { "Enabled" } else { "Disabled" });
    println!("{}", RULE);
    println!("CONFIGURATION CHECK PASSED");
    println!("{}", RULE);

    Ok(())
}

/// Run the HTTP API until shutdown.
async fn cmd_serve(port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let config = load_config()?;
    info!("Configuration loaded successfully");

    let (resale, sourcing) = build_providers(&config, None, None)?;
    let mut app_state =
        AppState::new(config.analysis(), resale, sourcing).with_result_limit(config.result_limit);

    if config.metrics_enabled {
        let handle = PrometheusBuilder::new().install_recorder()?;
        app_state = app_state.with_metrics(handle);
    }
    metrics::init_metrics();

    let port = port_override.unwrap_or(config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());
    app_state.set_ready(true);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
