pub mod analytics;
pub mod crawl;
pub mod error;
pub mod report;
pub mod text;

pub use analytics::{AnalyticsAggregator, LedgerEntry, PageRecord, PageStats, Report};
pub use crawl::{CrawlOptions, CrawlOutcome, execute_crawl, run_crawl};
pub use error::{CrawlError, Result};
pub use report::{ReportFormat, ReportMetadata};
