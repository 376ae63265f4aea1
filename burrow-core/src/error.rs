use burrow_scanner::ScanError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
