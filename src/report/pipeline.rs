//! Report run orchestration: fetch, extract, normalize, dedupe, aggregate.
//!
//! Pages are fetched through a bounded pool, but products are merged in page
//! order afterwards, so fetch completion order never changes the report.

use crate::config::Config;
use crate::daraz::{extract, fetch_with_retry, Normalizer, PageFetcher, Product, RetryPolicy};
use crate::error::{PageFailure, ReportError};
use crate::report::builder::{build, Report};
use crate::report::dedupe::dedupe;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Stage of a report run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching,
    Normalizing,
    Deduping,
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Fetching => "fetching",
            RunPhase::Normalizing => "normalizing",
            RunPhase::Deduping => "deduping",
            RunPhase::Aggregating => "aggregating",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Successful run: the report plus every soft failure met on the way.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    /// Pages that contributed nothing, in page order
    pub failures: Vec<PageFailure>,
    /// Listings rejected by the normalizer
    pub dropped_listings: usize,
}

/// Products normalized from one page.
#[derive(Debug, Default)]
struct PageListings {
    products: Vec<Product>,
    dropped: usize,
}

/// Pages gathered before deduplication.
#[derive(Debug, Default)]
struct Collected {
    pages: BTreeMap<u32, PageListings>,
    failures: Vec<PageFailure>,
}

/// Drives one report run against a [`PageFetcher`].
pub struct ReportPipeline {
    max_pages: u32,
    concurrency: usize,
    deadline: Option<Duration>,
    policy: RetryPolicy,
    normalizer: Normalizer,
    phase: RunPhase,
}

impl ReportPipeline {
    /// Creates a pipeline, rejecting configurations it cannot run.
    pub fn new(config: &Config) -> Result<Self, ReportError> {
        config.validate()?;
        Ok(Self {
            max_pages: config.max_pages,
            concurrency: config.concurrency,
            deadline: config.deadline(),
            policy: RetryPolicy::from_config(config),
            normalizer: Normalizer::new(config.base_url.clone()),
            phase: RunPhase::Idle,
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Runs the pipeline, stamping the report with the time it was built.
    pub async fn run<F>(&mut self, fetcher: &F) -> Result<RunOutcome, ReportError>
    where
        F: PageFetcher + ?Sized,
    {
        let collected = self.collect(fetcher).await;
        self.finish(collected, Utc::now())
    }

    /// Runs the pipeline with a fixed report timestamp.
    pub async fn run_at<F>(
        &mut self,
        fetcher: &F,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, ReportError>
    where
        F: PageFetcher + ?Sized,
    {
        let collected = self.collect(fetcher).await;
        self.finish(collected, now)
    }

    fn enter(&mut self, next: RunPhase) {
        debug!("Report run: {} -> {}", self.phase, next);
        self.phase = next;
    }

    async fn collect<F>(&mut self, fetcher: &F) -> Collected
    where
        F: PageFetcher + ?Sized,
    {
        self.enter(RunPhase::Fetching);
        info!("Inspecting up to {} pages ({} at a time)", self.max_pages, self.concurrency);

        let deadline = self.deadline.map(|d| Instant::now() + d);
        let this = &*self;
        let mut pending = stream::iter(1..=this.max_pages)
            .map(|page| this.process_page(fetcher, page))
            .buffer_unordered(this.concurrency);

        let mut collected = Collected::default();
        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!("Run deadline reached, abandoning in-flight pages");
                        break;
                    }
                },
                None => pending.next().await,
            };

            match next {
                Some((page, Ok(listings))) => {
                    collected.pages.insert(page, listings);
                }
                Some((_, Err(failure))) => {
                    warn!("Skipping {}", failure);
                    collected.failures.push(failure);
                }
                None => break,
            }
        }
        drop(pending);

        for page in 1..=self.max_pages {
            let settled = collected.pages.contains_key(&page)
                || collected.failures.iter().any(|f| f.page() == page);
            if !settled {
                collected.failures.push(PageFailure::DeadlineExceeded { page });
            }
        }
        collected.failures.sort_by_key(PageFailure::page);

        collected
    }

    /// Fetches, extracts and normalizes a single page.
    async fn process_page<F>(
        &self,
        fetcher: &F,
        page: u32,
    ) -> (u32, Result<PageListings, PageFailure>)
    where
        F: PageFetcher + ?Sized,
    {
        let raw = match fetch_with_retry(fetcher, page, &self.policy).await {
            Ok(raw) => raw,
            Err(e) => return (page, Err(e.into())),
        };

        let listings = match extract(&raw) {
            Ok(listings) => listings,
            Err(error) => return (page, Err(PageFailure::Extract { page, error })),
        };

        let total = listings.len();
        let products: Vec<Product> =
            listings.into_iter().filter_map(|raw| self.normalizer.normalize(raw)).collect();
        let dropped = total - products.len();

        debug!("Page {}: {} listings, {} kept, {} dropped", page, total, products.len(), dropped);
        (page, Ok(PageListings { products, dropped }))
    }

    fn finish(
        &mut self,
        collected: Collected,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, ReportError> {
        self.enter(RunPhase::Normalizing);
        let inspected = collected.pages.len() as u32;
        let dropped_listings: usize = collected.pages.values().map(|p| p.dropped).sum();
        let products: Vec<Product> =
            collected.pages.into_values().flat_map(|p| p.products).collect();

        self.enter(RunPhase::Deduping);
        let products = dedupe(products);

        if products.is_empty() {
            self.enter(RunPhase::Failed);
            return Err(ReportError::EmptyResult { attempted: self.max_pages, inspected });
        }

        self.enter(RunPhase::Aggregating);
        let report = build(products, inspected, now);

        self.enter(RunPhase::Done);
        info!(
            "Report built from {} listings across {} pages ({} pages skipped, {} listings dropped)",
            report.stats.count,
            inspected,
            collected.failures.len(),
            dropped_listings
        );

        Ok(RunOutcome { report, failures: collected.failures, dropped_listings })
    }
}

/// Generates a report for the configured query using `fetcher`.
///
/// Only [`ReportError`] fails the call; skipped pages and dropped listings
/// are soft failures. Use [`ReportPipeline`] to inspect them.
pub async fn generate_report<F>(config: &Config, fetcher: &F) -> Result<Report, ReportError>
where
    F: PageFetcher + ?Sized,
{
    let mut pipeline = ReportPipeline::new(config)?;
    pipeline.run(fetcher).await.map(|outcome| outcome.report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, FetchCause, FetchError};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves canned pages, optionally after a delay.
    #[derive(Default)]
    struct MockFetcher {
        pages: HashMap<u32, Result<String, FetchCause>>,
        delays: HashMap<u32, Duration>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockFetcher {
        fn page(mut self, page: u32, body: String) -> Self {
            self.pages.insert(page, Ok(body));
            self
        }

        fn failing(mut self, page: u32, cause: FetchCause) -> Self {
            self.pages.insert(page, Err(cause));
            self
        }

        fn delayed(mut self, page: u32, delay: Duration) -> Self {
            self.delays.insert(page, delay);
            self
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch(&self, page: u32) -> Result<String, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays.get(&page).copied().unwrap_or(Duration::from_millis(5));
            tokio::time::sleep(delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match self.pages.get(&page) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(cause)) => Err(FetchError::new(page, cause.clone())),
                None => Err(FetchError::new(page, FetchCause::Status(404))),
            }
        }
    }

    fn page_json(items: &[(&str, f64)]) -> String {
        let items: Vec<String> = items
            .iter()
            .map(|(id, price)| {
                format!(r#"{{"itemId":"{}","name":"Item {}","price":"{}"}}"#, id, id, price)
            })
            .collect();
        format!(r#"{{"mods":{{"listItems":[{}]}}}}"#, items.join(","))
    }

    fn test_config(max_pages: u32) -> Config {
        Config { max_pages, retry_backoff_ms: 0, delay_ms: 0, ..Config::default() }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 6, 0, 0).unwrap()
    }

    fn ids(report: &Report) -> Vec<&str> {
        report.products.iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_two_page_example() {
        let fetcher = MockFetcher::default()
            .page(1, page_json(&[("a", 500.0), ("b", 300.0)]))
            .page(2, page_json(&[("b", 300.0), ("c", 100.0)]));

        let mut pipeline = ReportPipeline::new(&test_config(2)).unwrap();
        let outcome = pipeline.run_at(&fetcher, now()).await.unwrap();
        let report = outcome.report;

        assert_eq!(report.stats.count, 3);
        assert_eq!(ids(&report), vec!["c", "b", "a"]);
        assert_eq!(report.cheapest.as_ref().unwrap().id, "c");
        assert_eq!(report.stats.min, Some(100.0));
        assert_eq!(report.stats.max, Some(500.0));
        assert_eq!(report.stats.median, Some(300.0));
        assert_eq!(report.inspected_pages, 2);
        assert_eq!(report.generated_at, now());
        assert!(outcome.failures.is_empty());
        assert_eq!(pipeline.phase(), RunPhase::Done);
    }

    #[tokio::test]
    async fn test_failed_page_is_soft() {
        let fetcher = MockFetcher::default()
            .page(1, page_json(&[("a", 500.0)]))
            .failing(2, FetchCause::Status(503))
            .page(3, page_json(&[("c", 100.0)]));

        let mut pipeline = ReportPipeline::new(&test_config(3)).unwrap();
        let outcome = pipeline.run_at(&fetcher, now()).await.unwrap();

        assert_eq!(outcome.report.inspected_pages, 2);
        assert_eq!(ids(&outcome.report), vec!["c", "a"]);
        assert_eq!(
            outcome.failures,
            vec![PageFailure::Fetch(FetchError::new(2, FetchCause::Status(503)))]
        );
    }

    #[tokio::test]
    async fn test_broken_page_is_skipped() {
        let fetcher = MockFetcher::default()
            .page(1, "<html><body>maintenance</body></html>".to_string())
            .page(2, page_json(&[("b", 250.0)]));

        let mut pipeline = ReportPipeline::new(&test_config(2)).unwrap();
        let outcome = pipeline.run_at(&fetcher, now()).await.unwrap();

        assert_eq!(outcome.report.inspected_pages, 1);
        assert_eq!(
            outcome.failures,
            vec![PageFailure::Extract { page: 1, error: ExtractError::MissingContainer }]
        );
    }

    #[tokio::test]
    async fn test_all_pages_failing_is_fatal() {
        let fetcher = MockFetcher::default()
            .failing(1, FetchCause::Status(500))
            .failing(2, FetchCause::Status(403));

        let mut pipeline = ReportPipeline::new(&test_config(2)).unwrap();
        let err = pipeline.run_at(&fetcher, now()).await.unwrap_err();

        assert!(matches!(err, ReportError::EmptyResult { attempted: 2, inspected: 0 }));
        assert_eq!(pipeline.phase(), RunPhase::Failed);
    }

    #[tokio::test]
    async fn test_empty_pages_are_fatal() {
        let fetcher = MockFetcher::default()
            .page(1, page_json(&[]))
            .page(2, r#"{"mods":{"listItems":[{"itemId":"x","price":"free"}]}}"#.to_string());

        let err = generate_report(&test_config(2), &fetcher).await.unwrap_err();
        assert!(matches!(err, ReportError::EmptyResult { attempted: 2, inspected: 2 }));
    }

    #[tokio::test]
    async fn test_dropped_listings_counted() {
        let body = r#"{"mods":{"listItems":[
            {"itemId":"1","price":"৳ 120"},
            {"price":"80"},
            {"itemId":"3"}
        ]}}"#;
        let fetcher = MockFetcher::default().page(1, body.to_string());

        let mut pipeline = ReportPipeline::new(&test_config(1)).unwrap();
        let outcome = pipeline.run_at(&fetcher, now()).await.unwrap();

        assert_eq!(outcome.report.stats.count, 1);
        assert_eq!(outcome.dropped_listings, 2);
    }

    #[tokio::test]
    async fn test_order_independent_of_completion() {
        // Page 1 finishes last but its copy of "x" still wins
        let fetcher = MockFetcher::default()
            .page(1, page_json(&[("x", 100.0), ("tie-1", 50.0)]))
            .page(2, page_json(&[("x", 10.0), ("tie-2", 50.0)]))
            .delayed(1, Duration::from_millis(150));

        let mut pipeline = ReportPipeline::new(&test_config(2)).unwrap();
        let report = pipeline.run_at(&fetcher, now()).await.unwrap().report;

        assert_eq!(ids(&report), vec!["tie-1", "tie-2", "x"]);
        assert_eq!(report.products[2].price, 100.0);
    }

    #[tokio::test]
    async fn test_deadline_keeps_completed_pages() {
        let fetcher = MockFetcher::default()
            .page(1, page_json(&[("a", 200.0)]))
            .page(2, page_json(&[("b", 100.0)]))
            .delayed(2, Duration::from_secs(5));

        let config = Config { deadline_ms: Some(300), ..test_config(2) };
        let mut pipeline = ReportPipeline::new(&config).unwrap();
        let outcome = pipeline.run_at(&fetcher, now()).await.unwrap();

        assert_eq!(outcome.report.inspected_pages, 1);
        assert_eq!(ids(&outcome.report), vec!["a"]);
        assert_eq!(outcome.failures, vec![PageFailure::DeadlineExceeded { page: 2 }]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut fetcher = MockFetcher::default();
        for page in 1..=6 {
            let id = format!("p{}", page);
            fetcher = fetcher
                .page(page, page_json(&[(id.as_str(), page as f64)]))
                .delayed(page, Duration::from_millis(30));
        }

        let config = Config { concurrency: 2, ..test_config(6) };
        let mut pipeline = ReportPipeline::new(&config).unwrap();
        let report = pipeline.run_at(&fetcher, now()).await.unwrap().report;

        assert_eq!(report.inspected_pages, 6);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_sequential_matches_parallel() {
        let setup = |concurrency| {
            let fetcher = MockFetcher::default()
                .page(1, page_json(&[("a", 30.0), ("b", 10.0)]))
                .page(2, page_json(&[("c", 10.0), ("a", 5.0)]))
                .page(3, page_json(&[("d", 20.0)]))
                .delayed(1, Duration::from_millis(40));
            (fetcher, Config { concurrency, ..test_config(3) })
        };

        let (fetcher, config) = setup(1);
        let sequential = generate_report(&config, &fetcher).await.unwrap();
        let (fetcher, config) = setup(3);
        let parallel = generate_report(&config, &fetcher).await.unwrap();

        assert_eq!(sequential.products, parallel.products);
        assert_eq!(ids(&parallel), vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config { concurrency: 0, ..Config::default() };
        assert!(matches!(ReportPipeline::new(&config), Err(ReportError::InvalidConfig(_))));
    }
}
