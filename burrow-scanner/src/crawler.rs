use crate::corpus::Corpus;
use crate::error::{Result, ScanError};
use crate::extract::LinkExtractor;
use crate::frontier::{Frontier, FrontierEntry, FrontierError};
use crate::normalize::{UrlKey, normalize, normalize_absolute};
use crate::trap::{Classification, RejectReason, TrapDetector, VisitLog};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;
pub type EventCallback = Arc<dyn Fn(CrawlEvent) + Send + Sync>;

/// Bounds on how long an idle worker sleeps before polling the frontier
const MIN_IDLE_WAIT: Duration = Duration::from_millis(5);
const MAX_IDLE_WAIT: Duration = Duration::from_millis(250);

/// A successfully fetched and parsed page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: UrlKey,
    pub source: Option<UrlKey>,
    /// Visible text of the page, for tokenization
    pub text: String,
    /// Extracted links that normalized cleanly and passed the trap detector
    pub valid_outlinks: usize,
    pub response_time: Duration,
}

#[derive(Debug, Clone)]
pub enum CrawlEvent {
    Fetched(FetchedPage),
    /// Fetched but unusable: transport error, non-2xx, non-HTML or
    /// malformed markup.
    Failed { url: UrlKey, error: String },
    Rejected { url: UrlKey, reason: RejectReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Drained,
    PageBudget,
    TimeBudget,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub fetched: usize,
    pub failed: usize,
    pub rejected: usize,
    pub seen: usize,
    pub pending: usize,
    /// Fetches still marked in flight when the crawl ended. Zero unless a
    /// worker died mid-fetch.
    pub in_flight: usize,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
}

/// Everything a worker needs to mutate, behind one lock.
struct CrawlState {
    frontier: Frontier,
    visits: VisitLog,
    started: usize,
    stop: Option<StopReason>,
}

struct WorkerContext<C: Corpus> {
    corpus: Arc<C>,
    detector: Arc<TrapDetector>,
    extractor: LinkExtractor,
    state: Mutex<CrawlState>,
    cancel: CancellationToken,
    max_pages: Option<usize>,
    deadline: Option<Instant>,
    fetched: AtomicUsize,
    failed: AtomicUsize,
    rejected: AtomicUsize,
    event_callback: Option<EventCallback>,
    progress_callback: Option<ProgressCallback>,
}

enum Work {
    Fetch(FrontierEntry),
    Skip(UrlKey, RejectReason),
    Wait(Duration),
    Stop,
}

pub struct Crawler<C: Corpus> {
    corpus: Arc<C>,
    detector: Arc<TrapDetector>,
    politeness: Duration,
    max_pages: Option<usize>,
    max_duration: Option<Duration>,
    cancel: CancellationToken,
    event_callback: Option<EventCallback>,
    progress_callback: Option<ProgressCallback>,
}

impl<C: Corpus> Crawler<C> {
    pub fn new(corpus: C, detector: TrapDetector) -> Self {
        Self {
            corpus: Arc::new(corpus),
            detector: Arc::new(detector),
            politeness: Duration::from_millis(500),
            max_pages: None,
            max_duration: None,
            cancel: CancellationToken::new(),
            event_callback: None,
            progress_callback: None,
        }
    }

    pub fn with_politeness(mut self, delay: Duration) -> Self {
        self.politeness = delay;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub async fn crawl(&self, seeds: &[String], workers: usize) -> Result<CrawlSummary> {
        let workers = workers.max(1);
        info!("Starting crawl of {} seed(s) with {} workers", seeds.len(), workers);
        let started_at = Instant::now();

        let mut state = CrawlState {
            frontier: Frontier::new(self.politeness),
            visits: VisitLog::new(),
            started: 0,
            stop: None,
        };
        let mut seed_rejections = Vec::new();
        for raw in seeds {
            let key = match normalize_absolute(raw) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Skipping seed: {}", e);
                    continue;
                }
            };
            match classify_discovery(&self.detector, &mut state.visits, &key) {
                Classification::Admit => {
                    state.frontier.seed(key);
                }
                Classification::Reject(reason) => seed_rejections.push((key, reason)),
            }
        }

        let ctx = Arc::new(WorkerContext {
            corpus: self.corpus.clone(),
            detector: self.detector.clone(),
            extractor: LinkExtractor::new(),
            state: Mutex::new(state),
            cancel: self.cancel.clone(),
            max_pages: self.max_pages,
            deadline: self.max_duration.map(|d| started_at + d),
            fetched: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
            event_callback: self.event_callback.clone(),
            progress_callback: self.progress_callback.clone(),
        });
        for (key, reason) in seed_rejections {
            ctx.reject(key, reason);
        }

        let queued = ctx.state.lock().await.frontier.pending_count();
        if queued == 0 {
            return Err(ScanError::NoSeeds(seeds.len()));
        }

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let ctx = ctx.clone();
                tokio::spawn(async move { ctx.run_worker(worker_id).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            result?;
        }

        let state = ctx.state.lock().await;
        let summary = CrawlSummary {
            fetched: ctx.fetched.load(Ordering::Relaxed),
            failed: ctx.failed.load(Ordering::Relaxed),
            rejected: ctx.rejected.load(Ordering::Relaxed),
            seen: state.frontier.seen_count(),
            pending: state.frontier.pending_count(),
            in_flight: state.frontier.in_flight_count(),
            elapsed: started_at.elapsed(),
            stop_reason: state.stop.unwrap_or(StopReason::Drained),
        };
        info!(
            "Crawl complete ({:?}). Fetched {} pages, {} failed, {} rejected links",
            summary.stop_reason, summary.fetched, summary.failed, summary.rejected
        );
        Ok(summary)
    }
}

/// Count a discovery of `key` and classify it against its updated history.
fn classify_discovery(detector: &TrapDetector, visits: &mut VisitLog, key: &UrlKey) -> Classification {
    let outcome = detector.classify(key, visits.touch(key));
    visits.settle(key, outcome, detector.config().revisit_threshold);
    outcome
}

impl<C: Corpus> WorkerContext<C> {
    async fn run_worker(&self, worker_id: usize) {
        debug!("Worker {} started", worker_id);

        loop {
            match self.next_work().await {
                Work::Stop => break,
                Work::Wait(wait) => {
                    let wait = wait.clamp(MIN_IDLE_WAIT, MAX_IDLE_WAIT);
                    tokio::select! {
                        _ = self.cancel.cancelled() => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                Work::Skip(key, reason) => self.reject(key, reason),
                Work::Fetch(entry) => {
                    if let Some(ref callback) = self.progress_callback {
                        callback(worker_id, entry.key.to_string());
                    }
                    self.process(entry).await;
                }
            }
        }

        debug!("Worker {} finished", worker_id);
    }

    /// Decide what this worker does next. One short critical section.
    async fn next_work(&self) -> Work {
        let mut state = self.state.lock().await;

        if state.stop.is_none() {
            if self.cancel.is_cancelled() {
                state.stop = Some(StopReason::Cancelled);
            } else if self.max_pages.is_some_and(|max| state.started >= max) {
                state.stop = Some(StopReason::PageBudget);
            } else if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                state.stop = Some(StopReason::TimeBudget);
            }
        }
        if state.stop.is_some() {
            return Work::Stop;
        }
        if state.frontier.is_drained() {
            state.stop = Some(StopReason::Drained);
            return Work::Stop;
        }

        match state.frontier.next() {
            Ok(entry) => {
                let threshold = self.detector.config().revisit_threshold;
                let outcome = self.detector.classify(&entry.key, state.visits.record(&entry.key));
                state.visits.settle(&entry.key, outcome, threshold);
                match outcome {
                    Classification::Admit => {
                        state.started += 1;
                        Work::Fetch(entry)
                    }
                    Classification::Reject(reason) => {
                        state.frontier.release(&entry.key);
                        Work::Skip(entry.key, reason)
                    }
                }
            }
            Err(FrontierError::CoolingDown { retry_in }) => Work::Wait(retry_in),
            // Other workers still have fetches in flight that may add links.
            Err(FrontierError::Empty) => Work::Wait(MIN_IDLE_WAIT),
        }
    }

    async fn process(&self, entry: FrontierEntry) {
        let FrontierEntry { key, source, .. } = entry;

        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("Abandoning in-flight fetch of {}", key);
                self.state.lock().await.frontier.release(&key);
                return;
            }
            result = self.corpus.fetch(&key) => result,
        };

        let result = match fetched {
            Ok(result) => result,
            Err(e) => return self.fail(&key, e.to_string()).await,
        };
        if let Some(reason) = result.rejection() {
            return self.fail(&key, reason).await;
        }
        let page = match self.extractor.extract_page(&result.final_url, &result.content) {
            Ok(page) => page,
            Err(e) => return self.fail(&key, e.to_string()).await,
        };

        let mut candidates = Vec::with_capacity(page.links.len());
        for raw in &page.links {
            match normalize(raw, &result.final_url) {
                Ok(link) => candidates.push(link),
                Err(e) => debug!("Discarding link on {}: {}", key, e),
            }
        }

        let mut valid_outlinks = 0;
        let mut rejections = Vec::new();
        {
            let mut state = self.state.lock().await;
            state.frontier.complete(&key);
            // One discovery per linking page, however often the page repeats it.
            let mut outcomes: HashMap<UrlKey, Classification> = HashMap::new();
            for link in candidates {
                let outcome = match outcomes.get(&link) {
                    Some(outcome) => *outcome,
                    None => {
                        let outcome = classify_discovery(&self.detector, &mut state.visits, &link);
                        if let Classification::Reject(reason) = outcome {
                            rejections.push((link.clone(), reason));
                        }
                        outcomes.insert(link.clone(), outcome);
                        outcome
                    }
                };
                if outcome == Classification::Admit {
                    valid_outlinks += 1;
                    if state.frontier.add(link.clone(), &key) {
                        debug!("Queued {} (from {})", link, key);
                    }
                }
            }
        }

        for (link, reason) in rejections {
            self.reject(link, reason);
        }

        self.persist(&key, &result.content).await;

        self.fetched.fetch_add(1, Ordering::Relaxed);
        self.emit(CrawlEvent::Fetched(FetchedPage {
            url: key,
            source,
            text: page.text,
            valid_outlinks,
            response_time: result.response_time,
        }));
    }

    async fn fail(&self, key: &UrlKey, error: String) {
        self.state.lock().await.frontier.complete(key);
        warn!(url = %key, error = %error, "Fetch failed");
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.emit(CrawlEvent::Failed {
            url: key.clone(),
            error,
        });
    }

    fn reject(&self, key: UrlKey, reason: RejectReason) {
        match reason {
            RejectReason::OutOfScope => debug!(url = %key, reason = %reason, "Rejected link"),
            _ => warn!(url = %key, reason = %reason, "Rejected link"),
        }
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.emit(CrawlEvent::Rejected { url: key, reason });
    }

    /// Store page content where the corpus wants it, unless already there.
    async fn persist(&self, key: &UrlKey, content: &[u8]) {
        let Some(path) = self.corpus.resolve_storage(key) else {
            return;
        };
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("{} already stored at {}", key, path.display());
            return;
        }
        if let Some(parent) = path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            warn!("Cannot create {}: {}", parent.display(), e);
            return;
        }
        if let Err(e) = tokio::fs::write(&path, content).await {
            warn!("Cannot store {} at {}: {}", key, path.display(), e);
        }
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}
