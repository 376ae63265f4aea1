use crate::analytics::{AnalyticsAggregator, PageStats};
use crate::error::{CrawlError, Result};
use crate::report::{ReportFormat, ReportMetadata, render_report, save_report};
use burrow_scanner::{
    Corpus, CrawlEvent, CrawlSummary, Crawler, EventCallback, HttpCorpus, ProgressCallback,
    TrapConfig, TrapDetector,
};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub seeds: Vec<String>,
    pub trap: TrapConfig,
    pub workers: usize,
    pub politeness: Duration,
    pub max_pages: Option<usize>,
    pub max_duration: Option<Duration>,
    pub timeout_secs: u64,
    pub cache_dir: Option<PathBuf>,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(seeds: Vec<String>, trap: TrapConfig) -> Self {
        Self {
            seeds,
            trap,
            workers: 4,
            politeness: Duration::from_millis(500),
            max_pages: None,
            max_duration: None,
            timeout_secs: 10,
            cache_dir: None,
            show_progress_bars: false,
        }
    }

    /// Reject settings the crawl cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(CrawlError::Config("at least one worker is required".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(CrawlError::Config(
                "request timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

/// A finished (or interrupted) crawl and the statistics it gathered.
pub struct CrawlOutcome {
    pub metadata: ReportMetadata,
    pub analytics: AnalyticsAggregator,
}

impl CrawlOutcome {
    pub fn summary(&self) -> &CrawlSummary {
        &self.metadata.summary
    }

    pub fn render(&self, stopwords: &HashSet<String>, format: ReportFormat) -> Result<String> {
        render_report(&self.analytics.report(stopwords), &self.metadata, format)
    }

    pub fn write_report(
        &self,
        stopwords: &HashSet<String>,
        format: ReportFormat,
        path: &Path,
    ) -> Result<()> {
        let content = self.render(stopwords, format)?;
        save_report(&content, path)?;
        info!("Report written to {}", path.display());
        Ok(())
    }
}

/// Crawl over HTTP with the given options.
pub async fn execute_crawl(
    options: CrawlOptions,
    cancel: CancellationToken,
) -> Result<CrawlOutcome> {
    let mut corpus = HttpCorpus::with_timeout(options.timeout_secs)?;
    if let Some(ref dir) = options.cache_dir {
        corpus = corpus.with_cache_dir(dir);
    }
    run_crawl(corpus, options, cancel).await
}

/// Crawl any corpus, folding every fetched page into a fresh aggregate.
pub async fn run_crawl<C: Corpus>(
    corpus: C,
    options: CrawlOptions,
    cancel: CancellationToken,
) -> Result<CrawlOutcome> {
    options.validate()?;
    let CrawlOptions {
        seeds,
        trap,
        workers,
        politeness,
        max_pages,
        max_duration,
        show_progress_bars,
        ..
    } = options;

    let detector = TrapDetector::new(trap)?;
    let analytics = AnalyticsAggregator::new();
    let session_id = Uuid::new_v4();
    let started_at = Utc::now();

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Starting crawl...");
        Some(pb)
    } else {
        None
    };

    let event_sink = analytics.clone();
    let event_callback: EventCallback = Arc::new(move |event: CrawlEvent| match event {
        CrawlEvent::Fetched(page) => event_sink.record(PageStats::from_page(&page)),
        CrawlEvent::Failed { url, error } => event_sink.record_failure(url, error),
        CrawlEvent::Rejected { url, reason } => event_sink.record_trap(url, reason),
    });

    let mut crawler = Crawler::new(corpus, detector)
        .with_politeness(politeness)
        .with_cancellation(cancel)
        .with_event_callback(event_callback);
    if let Some(max) = max_pages {
        crawler = crawler.with_max_pages(max);
    }
    if let Some(max) = max_duration {
        crawler = crawler.with_max_duration(max);
    }

    let processed_count = Arc::new(AtomicUsize::new(0));
    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let count_clone = processed_count.clone();
        let progress_callback: ProgressCallback = Arc::new(move |_worker_id: usize, url: String| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            pb_clone.set_message(format!("Crawling... {} URLs processed ({})", count, url));
            pb_clone.tick();
        });
        crawler = crawler.with_progress_callback(progress_callback);
    }

    let summary = match crawler.crawl(&seeds, workers).await {
        Ok(summary) => summary,
        Err(e) => {
            if let Some(ref pb) = progress_bar {
                pb.finish_and_clear();
            }
            return Err(e.into());
        }
    };

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Crawl complete! {} URLs processed",
            processed_count.load(Ordering::Relaxed)
        ));
    }

    Ok(CrawlOutcome {
        metadata: ReportMetadata {
            session_id,
            started_at,
            finished_at: Utc::now(),
            seeds,
            summary,
        },
        analytics,
    })
}
