//! The end-to-end crawl: listing traversal, concurrent extraction, CSV output.

use std::error::Error;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::CrawlConfig;
use crate::coordinator::ConcurrencyCoordinator;
use crate::extractor::ArticleExtractor;
use crate::navigator::PageNavigator;
use crate::session::SessionOpener;
use crate::sink::{self, PersistOutcome};

/// Counts from one run, for console reporting and the exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub urls: usize,
    pub records: usize,
    pub failures: usize,
    pub persisted: PersistOutcome,
}

impl RunSummary {
    /// Links were found but not a single article could be extracted.
    pub fn is_total_failure(&self) -> bool {
        self.urls > 0 && self.records == 0
    }
}

#[instrument(level = "info", skip_all, fields(seed = %config.seed_url))]
pub async fn run(
    config: &CrawlConfig,
    opener: Arc<dyn SessionOpener>,
) -> Result<RunSummary, Box<dyn Error>> {
    let navigator = PageNavigator::new(Arc::clone(&opener), &config.profile, config.page_delay);
    let urls = navigator.traverse(&config.seed_url, config.max_pages).await?;
    info!(count = urls.len(), "Indexed article URLs");

    let extractor = Arc::new(ArticleExtractor::new(opener, config.profile.clone()));
    let coordinator =
        ConcurrencyCoordinator::new(extractor, config.max_in_flight, config.extract_timeout);
    let report = coordinator
        .dispatch(&urls, config.inner_workers, config.outer_chunks)
        .await;
    for failure in &report.failures {
        warn!(
            index = failure.index,
            url = %failure.url,
            error = %failure.fault,
            "Skipping article"
        );
    }

    let persisted = sink::persist(&report.records, &config.output)?;

    Ok(RunSummary {
        urls: urls.len(),
        records: report.records.len(),
        failures: report.failures.len(),
        persisted,
    })
}
