//! Two-tier concurrent dispatch of article extraction.
//!
//! The URL list is split into contiguous chunks. Each chunk runs as its own
//! spawned task (outer tier), and inside it an ordered, bounded stream runs up
//! to `inner_workers` extractions at once (inner tier). `buffered` yields
//! results in input order whatever the completion order, and chunks are
//! joined in chunk order, so the final sequence follows the URL list.
//!
//! Every extraction is reduced to an outcome at its own task boundary:
//! errors, timeouts and panics become a [`DispatchFailure`] for that URL and
//! never abort the rest of the batch.

use std::any::Any;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use itertools::{Either, Itertools};
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{info, instrument, warn};

use crate::error::DispatchFault;
use crate::extractor::ArticleExtractor;
use crate::models::{ArticleLink, ArticleRecord};

type Outcome = Result<ArticleRecord, DispatchFault>;

/// A URL whose extraction produced no record.
#[derive(Debug)]
pub struct DispatchFailure {
    /// Position of the URL in the dispatched list.
    pub index: usize,
    pub url: ArticleLink,
    pub fault: DispatchFault,
}

/// Result of a dispatch: ordered records plus the URLs that failed.
///
/// Every dispatched URL appears exactly once, either as a record or as a
/// failure.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Successful records in URL-list order; failed positions are omitted.
    pub records: Vec<ArticleRecord>,
    /// Failures in URL-list order.
    pub failures: Vec<DispatchFailure>,
}

/// Runs article extraction over a URL list with bounded, two-tier concurrency.
///
/// One coordinator can serve many dispatches; the in-flight cap is shared by
/// all of them.
pub struct ConcurrencyCoordinator {
    extractor: Arc<ArticleExtractor>,
    in_flight: Arc<Semaphore>,
    extract_timeout: Duration,
}

impl ConcurrencyCoordinator {
    /// `max_in_flight` caps extractions running at once across all chunks.
    pub fn new(extractor: Arc<ArticleExtractor>, max_in_flight: usize, extract_timeout: Duration) -> Self {
        Self {
            extractor,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
            extract_timeout,
        }
    }

    /// Extract every URL and collect the outcomes in URL-list order.
    ///
    /// # Arguments
    ///
    /// * `urls` - Article URLs, in the order the listing yielded them
    /// * `inner_workers` - Extractions run concurrently inside one chunk (min 1)
    /// * `outer_chunks` - Number of contiguous chunks run as separate tasks,
    ///   clamped to `1..=urls.len()`
    ///
    /// # Returns
    ///
    /// A [`DispatchReport`] in which every URL appears exactly once, either
    /// as a record or as a [`DispatchFailure`]. This never fails as a whole:
    /// errors, timeouts, panics and dead chunk tasks are all reported per URL.
    #[instrument(level = "info", skip_all, fields(urls = urls.len(), inner_workers = inner_workers, outer_chunks = outer_chunks))]
    pub async fn dispatch(
        &self,
        urls: &[ArticleLink],
        inner_workers: usize,
        outer_chunks: usize,
    ) -> DispatchReport {
        let ranges = partition(urls.len(), outer_chunks);
        info!(chunks = ranges.len(), "Dispatching article extraction");

        let handles = ranges.iter().map(|range| {
            tokio::spawn(run_chunk(
                Arc::clone(&self.extractor),
                Arc::clone(&self.in_flight),
                self.extract_timeout,
                urls[range.clone()].to_vec(),
                inner_workers.max(1),
            ))
        });
        let joined = join_all(handles).await;

        let outcomes = ranges
            .into_iter()
            .zip(joined)
            .flat_map(|(range, chunk)| chunk_outcomes(range, chunk));

        let (records, failures): (Vec<_>, Vec<_>) = urls
            .iter()
            .zip(outcomes)
            .enumerate()
            .partition_map(|(index, (url, outcome))| match outcome {
                Ok(record) => Either::Left(record),
                Err(fault) => Either::Right(DispatchFailure {
                    index,
                    url: url.clone(),
                    fault,
                }),
            });

        info!(
            total = urls.len(),
            successful = records.len(),
            failed = failures.len(),
            "Completed article dispatch"
        );
        DispatchReport { records, failures }
    }
}

/// Map extraction over one chunk, keeping input order.
async fn run_chunk(
    extractor: Arc<ArticleExtractor>,
    in_flight: Arc<Semaphore>,
    extract_timeout: Duration,
    chunk: Vec<ArticleLink>,
    inner_workers: usize,
) -> Vec<Outcome> {
    stream::iter(chunk)
        .map(|url| {
            let extractor = Arc::clone(&extractor);
            let in_flight = Arc::clone(&in_flight);
            async move {
                let Ok(_permit) = in_flight.acquire_owned().await else {
                    return Err(DispatchFault::Aborted {
                        reason: "in-flight limiter closed".to_string(),
                    });
                };
                let attempt = tokio::time::timeout(extract_timeout, extractor.extract(&url));
                match AssertUnwindSafe(attempt).catch_unwind().await {
                    Ok(Ok(Ok(record))) => Ok(record),
                    Ok(Ok(Err(e))) => Err(DispatchFault::Extract(e)),
                    Ok(Err(_elapsed)) => Err(DispatchFault::TimedOut {
                        after: extract_timeout,
                    }),
                    Err(panic) => Err(DispatchFault::Aborted {
                        reason: panic_message(panic.as_ref()),
                    }),
                }
            }
        })
        .buffered(inner_workers)
        .collect()
        .await
}

/// Outcomes of one joined chunk task. A task that died without returning
/// yields one `Aborted` fault per URL of its range.
fn chunk_outcomes(range: Range<usize>, joined: Result<Vec<Outcome>, JoinError>) -> Vec<Outcome> {
    match joined {
        Ok(outcomes) => outcomes,
        Err(e) => {
            warn!(chunk = ?range, error = %e, "Chunk task died");
            range
                .map(|_| {
                    Err(DispatchFault::Aborted {
                        reason: e.to_string(),
                    })
                })
                .collect()
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "worker panicked".to_string())
}

/// Split `len` items into at most `chunks` contiguous, non-empty ranges.
///
/// Sizes differ by at most one, larger ranges first. `chunks` is clamped to
/// `1..=len`; an empty input gives no ranges.
pub fn partition(len: usize, chunks: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let chunks = chunks.clamp(1, len);
    let base = len / chunks;
    let extra = len % chunks;

    let mut start = 0;
    (0..chunks)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;
    use crate::error::ExtractError;
    use crate::session::testing::StaticSite;

    fn article_url(i: usize) -> String {
        format!("https://site.example/artigo-{i}/")
    }

    fn article(i: usize) -> String {
        format!(r#"<h1>Artigo {i}</h1><div class="article"><p>Corpo {i}.</p></div>"#)
    }

    /// `n` articles; earlier ones load slower so they finish last.
    fn site_with(n: usize) -> StaticSite {
        (0..n).fold(StaticSite::new(), |site, i| {
            site.page(&article_url(i), &article(i))
                .slow(&article_url(i), Duration::from_millis(((n - i) * 5) as u64))
        })
    }

    fn coordinator(site: &Arc<StaticSite>, timeout: Duration) -> ConcurrencyCoordinator {
        let extractor = ArticleExtractor::new(Arc::new(Arc::clone(site)), SiteProfile::default());
        ConcurrencyCoordinator::new(Arc::new(extractor), 8, timeout)
    }

    #[test]
    fn test_partition_is_contiguous_and_balanced() {
        assert_eq!(partition(7, 3), vec![0..3, 3..5, 5..7]);
        assert_eq!(partition(4, 1), vec![0..4]);
        assert_eq!(partition(2, 5), vec![0..1, 1..2]);
        assert_eq!(partition(3, 0), vec![0..3]);
        assert!(partition(0, 4).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_order_preserved_for_every_configuration() {
        let urls: Vec<String> = (0..9).map(article_url).collect();

        for (workers, chunks) in [(1, 1), (3, 1), (2, 3), (5, 9), (4, 20)] {
            let site = site_with(9).into_opener();
            let report = coordinator(&site, Duration::from_secs(5))
                .dispatch(&urls, workers, chunks)
                .await;

            let titles: Vec<_> = report.records.iter().map(|r| r.title.clone()).collect();
            let expected: Vec<_> = (0..9).map(|i| format!("Artigo {i}")).collect();
            assert_eq!(titles, expected, "workers={workers} chunks={chunks}");
            assert!(report.failures.is_empty());

            let mut visits = site.visits();
            visits.sort();
            let mut sorted_urls = urls.clone();
            sorted_urls.sort();
            assert_eq!(visits, sorted_urls, "each URL opened exactly once");
            assert_eq!(site.closed(), 9);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_required_field_fault_does_not_sink_the_batch() {
        let urls: Vec<String> = (0..5).map(article_url).collect();
        let site = site_with(5)
            .page(&article_url(2), "<p>Sem título</p>")
            .into_opener();

        let report = coordinator(&site, Duration::from_secs(5))
            .dispatch(&urls, 5, 2)
            .await;

        let titles: Vec<_> = report.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Artigo 0", "Artigo 1", "Artigo 3", "Artigo 4"]);
        assert_eq!(report.failures.len(), 1);

        let failure = &report.failures[0];
        assert_eq!(failure.index, 2);
        assert_eq!(failure.url, article_url(2));
        assert!(matches!(
            failure.fault,
            DispatchFault::Extract(ExtractError::RequiredField { field: "title", .. })
        ));
    }

    #[tokio::test]
    async fn test_slow_extraction_times_out_alone() {
        let urls: Vec<String> = (0..3).map(article_url).collect();
        let site = site_with(3)
            .slow(&article_url(1), Duration::from_secs(30))
            .into_opener();

        let report = coordinator(&site, Duration::from_millis(200))
            .dispatch(&urls, 3, 1)
            .await;

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert!(matches!(
            report.failures[0].fault,
            DispatchFault::TimedOut { .. }
        ));
    }

    #[tokio::test]
    async fn test_panicking_extraction_is_reported_not_propagated() {
        let urls: Vec<String> = (0..3).map(article_url).collect();
        let site = site_with(3).panicking(&article_url(0)).into_opener();

        let report = coordinator(&site, Duration::from_secs(5))
            .dispatch(&urls, 2, 1)
            .await;

        let titles: Vec<_> = report.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Artigo 1", "Artigo 2"]);
        assert_eq!(report.failures.len(), 1);
        match &report.failures[0].fault {
            DispatchFault::Aborted { reason } => assert!(reason.contains("simulated crash")),
            other => panic!("unexpected fault: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dead_chunk_task_aborts_each_of_its_urls() {
        let handle = tokio::spawn(std::future::pending::<Vec<Outcome>>());
        handle.abort();
        let join_error = handle.await.unwrap_err();

        let outcomes = chunk_outcomes(3..6, Err(join_error));

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, Err(DispatchFault::Aborted { .. }))));
    }

    #[test]
    fn test_live_chunk_outcomes_pass_through() {
        let outcomes = chunk_outcomes(
            0..1,
            Ok(vec![Err(DispatchFault::TimedOut {
                after: Duration::from_secs(1),
            })]),
        );
        assert!(matches!(outcomes[..], [Err(DispatchFault::TimedOut { .. })]));
    }

    #[tokio::test]
    async fn test_empty_url_list() {
        let site = StaticSite::new().into_opener();
        let report = coordinator(&site, Duration::from_secs(5))
            .dispatch(&[], 5, 3)
            .await;

        assert!(report.records.is_empty());
        assert!(report.failures.is_empty());
        assert_eq!(site.opened(), 0);
    }
}
