//! The fetch boundary of the crawler.
//!
//! The crawl loop only talks to a [`Corpus`]: something that can fetch a
//! page and, optionally, say where a copy of it should live on disk.
//! [`HttpCorpus`] is the stock implementation over `reqwest`.

use crate::error::Result;
use crate::normalize::UrlKey;
use crate::result::FetchResult;
use reqwest::Client;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest readable prefix of a cache file name
const MAX_FILE_STEM: usize = 100;

pub trait Corpus: Send + Sync + 'static {
    fn fetch(&self, url: &UrlKey) -> impl Future<Output = Result<FetchResult>> + Send;

    /// Where the content of `url` is persisted, if this corpus keeps pages.
    fn resolve_storage(&self, url: &UrlKey) -> Option<PathBuf>;
}

pub struct HttpCorpus {
    client: Client,
    cache_dir: Option<PathBuf>,
}

impl HttpCorpus {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("burrow/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            cache_dir: None,
        })
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

impl Corpus for HttpCorpus {
    async fn fetch(&self, url: &UrlKey) -> Result<FetchResult> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self.client.get(url.as_str()).send().await?;

        let mut result = FetchResult::new(url.clone());
        result.final_url = response.url().clone();
        result.status = response.status().as_u16();
        result.content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        result.content = response.bytes().await?.to_vec();
        result.response_time = start.elapsed();

        Ok(result)
    }

    fn resolve_storage(&self, url: &UrlKey) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        Some(dir.join(cache_host_dir(url)).join(cache_file_name(url)))
    }
}

fn cache_host_dir(url: &UrlKey) -> String {
    match url.port() {
        Some(port) => format!("{}_{}", url.host(), port),
        None => url.host().to_string(),
    }
}

/// Flatten path and query into a readable file name. The stem is lossy, so
/// a hash of the whole key keeps distinct URLs in distinct files.
fn cache_file_name(url: &UrlKey) -> String {
    let mut raw = url.path().trim_matches('/').to_string();
    if let Some(query) = url.query() {
        raw.push('?');
        raw.push_str(query);
    }

    let mut name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_STEM)
        .collect();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        name = "index".to_string();
    }
    let hash = xxhash_rust::xxh3::xxh3_64(url.as_str().as_bytes());
    format!("{}-{:016x}.html", name, hash)
}
