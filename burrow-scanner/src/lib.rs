pub mod corpus;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod frontier;
pub mod normalize;
pub mod result;
pub mod trap;

pub use corpus::{Corpus, HttpCorpus};
pub use crawler::{
    CrawlEvent, CrawlSummary, Crawler, EventCallback, FetchedPage, ProgressCallback, StopReason,
};
pub use error::ScanError;
pub use extract::{ExtractError, ExtractedPage, LinkExtractor};
pub use frontier::{Frontier, FrontierEntry, FrontierError};
pub use normalize::{NormalizeError, UrlKey, normalize, normalize_absolute};
pub use result::FetchResult;
pub use trap::{Classification, RejectReason, TrapConfig, TrapDetector, VisitLog, VisitRecord};
