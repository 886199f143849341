//! # Eco News Scraper
//!
//! Crawls a paginated news listing, extracts each article's title, subtitle,
//! author, publication date and body text, and saves them as CSV rows for
//! downstream analysis.
//!
//! ## Usage
//!
//! ```sh
//! eco_news_scraper --pages 3 --workers 5 --chunks 2
//! ```
//!
//! ## Architecture
//!
//! 1. **Indexing**: walk the listing page by page, following the "next" control
//! 2. **Extraction**: fetch every article concurrently, in ordered chunks
//! 3. **Output**: write the successful records to CSV, in listing order

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod coordinator;
mod error;
mod extractor;
mod models;
mod navigator;
mod pipeline;
mod session;
mod sink;
mod utils;

use cli::Cli;
use config::CrawlConfig;
use session::HttpFetcher;
use sink::PersistOutcome;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("eco_news_scraper starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");
    let config = CrawlConfig::from_cli(&args)?;

    let fetcher = HttpFetcher::new(&config.user_agent, config.request_timeout)?;
    let summary = pipeline::run(&config, Arc::new(fetcher)).await?;

    match summary.persisted {
        PersistOutcome::Written { rows } => {
            println!("Results saved to {} ({rows} articles)", config.output.display());
        }
        PersistOutcome::Empty => println!("No results to save."),
    }
    if summary.failures > 0 {
        warn!(failed = summary.failures, "Some articles could not be extracted");
        println!("{} of {} articles failed", summary.failures, summary.urls);
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        urls = summary.urls,
        records = summary.records,
        failed = summary.failures,
        "Execution complete"
    );

    if summary.is_total_failure() {
        error!(urls = summary.urls, "No article could be extracted");
        return Err(format!("no records extracted from {} URLs", summary.urls).into());
    }
    Ok(())
}
