//! Command-line interface definitions.
//!
//! Every option can be given as a flag or through an `ECO_NEWS_*` environment
//! variable. The parsed [`Cli`] is turned into a
//! [`CrawlConfig`](crate::config::CrawlConfig) before the crawl starts.

use std::path::PathBuf;

use clap::Parser;

/// Crawl a paginated news listing and save every article as a CSV row.
///
/// # Examples
///
/// ```sh
/// # Crawl the first listing page with the defaults
/// eco_news_scraper
///
/// # Three listing pages, 8 workers per chunk, 2 chunks
/// eco_news_scraper --pages 3 --workers 8 --chunks 2
///
/// # Another site, with its own selectors
/// eco_news_scraper https://example.org/news/ --profile site.yaml -o out.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Listing page to start from
    #[arg(
        env = "ECO_NEWS_SEED_URL",
        default_value = "https://oeco.org.br/category/noticias/"
    )]
    pub seed_url: String,

    /// Maximum number of listing pages to visit
    #[arg(short, long, env = "ECO_NEWS_PAGES", default_value_t = 1)]
    pub pages: usize,

    /// Concurrent article extractions inside each chunk
    #[arg(short, long, env = "ECO_NEWS_WORKERS", default_value_t = 5)]
    pub workers: usize,

    /// Number of contiguous chunks the URL list is split into
    #[arg(short, long, env = "ECO_NEWS_CHUNKS", default_value_t = 1)]
    pub chunks: usize,

    /// Cap on article extractions in flight across all chunks
    #[arg(long, env = "ECO_NEWS_MAX_IN_FLIGHT", default_value_t = 8)]
    pub max_in_flight: usize,

    /// Pause after each listing page navigation, in milliseconds
    #[arg(long, env = "ECO_NEWS_PAGE_DELAY_MS", default_value_t = 2000)]
    pub page_delay_ms: u64,

    /// Per-request HTTP timeout, in seconds
    #[arg(long, env = "ECO_NEWS_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Upper bound on a whole article extraction, in seconds
    #[arg(long, env = "ECO_NEWS_EXTRACT_TIMEOUT_SECS", default_value_t = 60)]
    pub extract_timeout_secs: u64,

    /// User-Agent header sent with every request
    #[arg(
        long,
        env = "ECO_NEWS_USER_AGENT",
        default_value = concat!("eco_news_scraper/", env!("CARGO_PKG_VERSION"))
    )]
    pub user_agent: String,

    /// CSV file to write
    #[arg(
        short,
        long,
        env = "ECO_NEWS_OUTPUT",
        default_value = "Sample_Data/Processed/news_results.csv"
    )]
    pub output: PathBuf,

    /// YAML file overriding the site's structural selectors
    #[arg(long, env = "ECO_NEWS_PROFILE")]
    pub profile: Option<PathBuf>,
}
