//! Walks an identifier range and gathers the records that exist.
//!
//! With one worker the range is scraped in order. With more, the range is cut
//! into contiguous chunks that a fixed number of tokio tasks pull from a shared
//! queue. Either way the results are folded into the title map on the calling
//! task once every identifier is done, in ascending id order.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use crawl::{CrawlError, PageSource};
use scraper::Html;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::extract::{extract, initiative_url, DEFAULT_URL_TEMPLATE};
use crate::locator::FieldLocator;
use crate::model::Initiative;

pub const DEFAULT_CHUNK_SIZE: usize = 4;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid identifier range {start}..{end}")]
    InvalidRange { start: u32, end: u32 },

    #[error("scrape cancelled, results discarded")]
    Cancelled,

    /// Local storage failed; unlike a failed download this affects every id.
    #[error("page cache failed on {url}: {source}")]
    Cache { url: String, source: CrawlError },

    #[error("title \"{title}\" is used by initiatives {first} and {second}")]
    Collision { title: String, first: u32, second: u32 },

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// What to do when two identifiers produce the same title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CollisionPolicy {
    /// The higher identifier replaces the earlier record.
    #[default]
    Overwrite,
    /// The first record seen is kept.
    KeepFirst,
    /// Abort the run.
    Fail,
}

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Half-open range of identifiers to try.
    pub ids: Range<u32>,
    /// Concurrent tasks; 0 or 1 scrapes sequentially.
    pub workers: usize,
    pub chunk_size: usize,
    /// Page URL with an `{id}` placeholder.
    pub url_template: String,
    pub on_collision: CollisionPolicy,
    /// Stamp each record with the time of the run.
    pub timestamp: bool,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            ids: 0..5000,
            workers: 2,
            chunk_size: DEFAULT_CHUNK_SIZE,
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            on_collision: CollisionPolicy::default(),
            timestamp: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedId {
    pub id: u32,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// Records keyed by title.
    pub records: BTreeMap<String, Initiative>,
    pub attempted: usize,
    pub not_found: usize,
    pub failed: Vec<FailedId>,
}

#[derive(Debug)]
enum Outcome {
    Found(Initiative),
    NotFound,
    Failed(String),
}

pub async fn scrape<S>(
    source: Arc<S>,
    options: &ScrapeOptions,
    cancel: CancellationToken,
) -> Result<ScrapeReport, ScrapeError>
where
    S: PageSource + 'static,
{
    let ids = options.ids.clone();
    if ids.start > ids.end {
        return Err(ScrapeError::InvalidRange {
            start: ids.start,
            end: ids.end,
        });
    }

    let locator = Arc::new(FieldLocator::new());
    let outcomes = if options.workers <= 1 {
        scrape_sequential(&*source, &locator, options, &cancel).await?
    } else {
        scrape_pool(source, locator, options, &cancel).await?
    };

    aggregate(outcomes, options)
}

async fn scrape_sequential<S>(
    source: &S,
    locator: &FieldLocator,
    options: &ScrapeOptions,
    cancel: &CancellationToken,
) -> Result<Vec<(u32, Outcome)>, ScrapeError>
where
    S: PageSource + ?Sized,
{
    let mut outcomes = Vec::with_capacity(options.ids.len());
    for id in options.ids.clone() {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            outcome = scrape_one(source, locator, &options.url_template, id) => outcome?,
        };
        outcomes.push((id, outcome));
    }
    Ok(outcomes)
}

async fn scrape_pool<S>(
    source: Arc<S>,
    locator: Arc<FieldLocator>,
    options: &ScrapeOptions,
    cancel: &CancellationToken,
) -> Result<Vec<(u32, Outcome)>, ScrapeError>
where
    S: PageSource + 'static,
{
    let queue = Arc::new(Mutex::new(chunk_range(
        options.ids.clone(),
        options.chunk_size,
    )));
    info!(
        workers = options.workers,
        chunks = queue.lock().map(|q| q.len()).unwrap_or_default(),
        "starting worker pool"
    );

    let mut workers = JoinSet::new();
    for worker in 0..options.workers {
        let source = Arc::clone(&source);
        let locator = Arc::clone(&locator);
        let queue = Arc::clone(&queue);
        let cancel = cancel.clone();
        let template = options.url_template.clone();

        workers.spawn(async move {
            let mut done = Vec::new();
            while let Some(chunk) = next_chunk(&queue) {
                debug!(worker, start = chunk.start, end = chunk.end, "took chunk");
                for id in chunk {
                    if cancel.is_cancelled() {
                        return Ok(done);
                    }
                    done.push((id, scrape_one(&*source, &locator, &template, id).await?));
                }
            }
            Ok::<_, ScrapeError>(done)
        });
    }

    let mut outcomes = Vec::with_capacity(options.ids.len());
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                workers.abort_all();
                return Err(ScrapeError::Cancelled);
            }
            joined = workers.join_next() => match joined {
                Some(done) => match done? {
                    Ok(done) => outcomes.extend(done),
                    Err(e) => {
                        workers.abort_all();
                        return Err(e);
                    }
                },
                None => break,
            },
        }
    }

    if cancel.is_cancelled() {
        return Err(ScrapeError::Cancelled);
    }
    Ok(outcomes)
}

/// Splits `ids` into contiguous chunks of at most `size` identifiers.
fn chunk_range(ids: Range<u32>, size: usize) -> VecDeque<Range<u32>> {
    let size = u32::try_from(size.max(1)).unwrap_or(u32::MAX);
    let mut chunks = VecDeque::new();
    let mut start = ids.start;
    while start < ids.end {
        let end = start.saturating_add(size).min(ids.end);
        chunks.push_back(start..end);
        start = end;
    }
    chunks
}

fn next_chunk(queue: &Mutex<VecDeque<Range<u32>>>) -> Option<Range<u32>> {
    // Popping a range cannot leave the queue half-updated, so a poisoned lock
    // still holds a valid queue.
    queue
        .lock()
        .unwrap_or_else(|poisoned| {
            warn!("chunk queue lock poisoned, continuing with its contents");
            PoisonError::into_inner(poisoned)
        })
        .pop_front()
}

/// Download failures only cost this id; cache I/O errors end the run.
async fn scrape_one<S>(
    source: &S,
    locator: &FieldLocator,
    template: &str,
    id: u32,
) -> Result<Outcome, ScrapeError>
where
    S: PageSource + ?Sized,
{
    debug!(id, "trying id");
    let url = initiative_url(template, id);
    let page = match source.fetch(&url).await {
        Ok(page) => page,
        Err(source @ CrawlError::Io(_)) => return Err(ScrapeError::Cache { url, source }),
        Err(e) => {
            warn!(id, url = %url, error = %e, "failed to fetch initiative page");
            return Ok(Outcome::Failed(e.to_string()));
        }
    };

    Ok(match extract_page(locator, id, &url, &page) {
        Some(initiative) => Outcome::Found(initiative),
        None => Outcome::NotFound,
    })
}

// Kept apart from `scrape_one` so the parsed document never lives across an await.
fn extract_page(locator: &FieldLocator, id: u32, url: &str, page: &str) -> Option<Initiative> {
    let document = Html::parse_document(page);
    extract(locator, id, url, &document)
}

fn aggregate(
    mut outcomes: Vec<(u32, Outcome)>,
    options: &ScrapeOptions,
) -> Result<ScrapeReport, ScrapeError> {
    outcomes.sort_by_key(|(id, _)| *id);

    let scrape_date = options
        .timestamp
        .then(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));

    let mut report = ScrapeReport {
        attempted: outcomes.len(),
        ..ScrapeReport::default()
    };

    for (id, outcome) in outcomes {
        let mut initiative = match outcome {
            Outcome::Found(initiative) => initiative,
            Outcome::NotFound => {
                report.not_found += 1;
                continue;
            }
            Outcome::Failed(error) => {
                report.failed.push(FailedId { id, error });
                continue;
            }
        };
        initiative.scrape_date = scrape_date.clone();

        let existing = report.records.get(&initiative.title).map(|r| r.id);
        match (existing, options.on_collision) {
            (None, _) | (Some(_), CollisionPolicy::Overwrite) => {
                if let Some(replaced) = existing {
                    warn!(title = %initiative.title, replaced, by = id, "duplicate title, overwriting");
                }
                report.records.insert(initiative.title.clone(), initiative);
            }
            (Some(kept), CollisionPolicy::KeepFirst) => {
                warn!(title = %initiative.title, kept, skipped = id, "duplicate title, keeping first");
            }
            (Some(first), CollisionPolicy::Fail) => {
                return Err(ScrapeError::Collision {
                    title: initiative.title,
                    first,
                    second: id,
                });
            }
        }
    }

    info!(
        attempted = report.attempted,
        found = report.records.len(),
        not_found = report.not_found,
        failed = report.failed.len(),
        "scrape finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use crawl::{CachedSource, PageCache};
    use tokio::sync::mpsc;

    use super::*;

    /// Serves canned pages; ids without a page get an empty document.
    struct FakeSite {
        pages: HashMap<String, String>,
        broken: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeSite {
        fn new(titles: &[(u32, &str)]) -> Self {
            let pages = titles
                .iter()
                .map(|(id, title)| {
                    (
                        initiative_url(DEFAULT_URL_TEMPLATE, *id),
                        format!(r#"<span id="ctl00_lblTitulo">{title}</span>"#),
                    )
                })
                .collect();
            FakeSite {
                pages,
                broken: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource for FakeSite {
        async fn fetch(&self, url: &str) -> Result<String, CrawlError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.broken.iter().any(|b| b == url) {
                return Err(CrawlError::Status {
                    url: url.to_string(),
                    status: 500,
                });
            }
            Ok(self.pages.get(url).cloned().unwrap_or_default())
        }
    }

    fn options(ids: Range<u32>, workers: usize) -> ScrapeOptions {
        ScrapeOptions {
            ids,
            workers,
            timestamp: false,
            ..ScrapeOptions::default()
        }
    }

    #[test]
    fn chunks_cover_the_range_contiguously() {
        let chunks: Vec<_> = chunk_range(3..13, 4).into_iter().collect();
        assert_eq!(chunks, [3..7, 7..11, 11..13]);
        assert!(chunk_range(5..5, 4).is_empty());
        assert_eq!(chunk_range(0..2, 0).len(), 2);
    }

    #[tokio::test]
    async fn sequential_and_pool_agree() {
        let titles = [(1, "Um"), (4, "Quatro"), (9, "Nove"), (10, "Dez")];
        let sequential = scrape(
            Arc::new(FakeSite::new(&titles)),
            &options(0..12, 1),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let pooled = scrape(
            Arc::new(FakeSite::new(&titles)),
            &options(0..12, 3),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(sequential.records, pooled.records);
        assert_eq!(pooled.attempted, 12);
        assert_eq!(pooled.not_found, 8);
        let ids: Vec<u32> = pooled.records.values().map(|r| r.id).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(pooled.records["Nove"].id, 9);
    }

    #[tokio::test]
    async fn fetch_failures_only_lose_that_id() {
        let mut site = FakeSite::new(&[(1, "Um"), (2, "Dois")]);
        site.broken.push(initiative_url(DEFAULT_URL_TEMPLATE, 1));

        let report = scrape(Arc::new(site), &options(0..4, 2), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.records.len(), 1);
        assert!(report.records.contains_key("Dois"));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, 1);
    }

    #[tokio::test]
    async fn title_collisions_follow_the_policy() {
        let titles = [(2, "Igual"), (5, "Igual")];

        let overwrite = scrape(
            Arc::new(FakeSite::new(&titles)),
            &options(0..8, 1),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(overwrite.records["Igual"].id, 5);

        let keep_first = scrape(
            Arc::new(FakeSite::new(&titles)),
            &ScrapeOptions {
                on_collision: CollisionPolicy::KeepFirst,
                ..options(0..8, 2)
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(keep_first.records["Igual"].id, 2);

        let fail = scrape(
            Arc::new(FakeSite::new(&titles)),
            &ScrapeOptions {
                on_collision: CollisionPolicy::Fail,
                ..options(0..8, 1)
            },
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            fail,
            Err(ScrapeError::Collision { first: 2, second: 5, .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_run_returns_nothing() {
        let site = Arc::new(FakeSite::new(&[(1, "Um")]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        for workers in [1, 4] {
            let result = scrape(Arc::clone(&site), &options(0..100, workers), cancel.clone()).await;
            assert!(matches!(result, Err(ScrapeError::Cancelled)));
        }
    }

    /// Answers from `inner` until it reaches a stalled url, then reports the
    /// stall and never returns.
    struct StallingSite {
        inner: FakeSite,
        stall_at: Vec<String>,
        stalled: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl PageSource for StallingSite {
        async fn fetch(&self, url: &str) -> Result<String, CrawlError> {
            if self.stall_at.iter().any(|s| s == url) {
                let _ = self.stalled.send(url.to_string());
                return std::future::pending().await;
            }
            self.inner.fetch(url).await
        }
    }

    #[tokio::test]
    async fn cancelling_mid_run_discards_finished_ids() {
        for (workers, stalls) in [(1, 1), (2, 2)] {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let site = Arc::new(StallingSite {
                inner: FakeSite::new(&[(0, "Zero"), (1, "Um"), (5, "Cinco")]),
                stall_at: [3, 7]
                    .iter()
                    .map(|id| initiative_url(DEFAULT_URL_TEMPLATE, *id))
                    .collect(),
                stalled: tx,
            });
            let cancel = CancellationToken::new();

            let run = tokio::spawn({
                let site = Arc::clone(&site);
                let cancel = cancel.clone();
                async move { scrape(site, &options(0..8, workers), cancel).await }
            });

            for _ in 0..stalls {
                rx.recv().await.unwrap();
            }
            // Chunks are 0..4 and 4..8, so every id before a stall is done.
            assert_eq!(site.inner.calls.load(Ordering::SeqCst), 3 * stalls);

            cancel.cancel();
            let result = run.await.unwrap();
            assert!(matches!(result, Err(ScrapeError::Cancelled)));
        }
    }

    #[tokio::test]
    async fn cache_failure_ends_the_run() {
        // The cache directory would have to live inside a regular file.
        let file = tempfile::NamedTempFile::new().unwrap();

        for workers in [1, 2] {
            let result = scrape(
                Arc::new(CachedSource::new(
                    FakeSite::new(&[(1, "Um")]),
                    PageCache::new(file.path().join("cache")),
                )),
                &options(1..5, workers),
                CancellationToken::new(),
            )
            .await;
            assert!(matches!(result, Err(ScrapeError::Cache { .. })));
        }
    }

    #[test]
    fn poisoned_queue_still_hands_out_chunks() {
        let queue = Arc::new(Mutex::new(chunk_range(0..8, 4)));
        let held = Arc::clone(&queue);
        let _ = std::thread::spawn(move || {
            let _guard = held.lock().unwrap();
            panic!("worker died holding the queue");
        })
        .join();

        assert!(queue.is_poisoned());
        assert_eq!(next_chunk(&queue), Some(0..4));
        assert_eq!(next_chunk(&queue), Some(4..8));
        assert_eq!(next_chunk(&queue), None);
    }

    #[tokio::test]
    async fn timestamp_is_stamped_when_enabled() {
        let report = scrape(
            Arc::new(FakeSite::new(&[(1, "Um")])),
            &ScrapeOptions {
                timestamp: true,
                ..options(0..2, 1)
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let stamp = report.records["Um"].scrape_date.as_deref().unwrap();
        assert!(stamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[tokio::test]
    async fn reversed_range_is_rejected() {
        let site = Arc::new(FakeSite::new(&[]));
        let result = scrape(site, &options(5..2, 1), CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(ScrapeError::InvalidRange { start: 5, end: 2 })
        ));
    }
}
