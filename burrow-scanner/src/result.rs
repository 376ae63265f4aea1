use crate::normalize::UrlKey;
use std::time::Duration;
use url::Url;

/// What a [`Corpus`](crate::corpus::Corpus) hands back for one URL.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: UrlKey,
    /// Address the content was served from after redirects. Relative links
    /// on the page resolve against this.
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
    pub response_time: Duration,
}

impl FetchResult {
    pub fn new(url: UrlKey) -> Self {
        Self {
            final_url: url.as_url().clone(),
            url,
            status: 0,
            content_type: None,
            content: Vec::new(),
            response_time: Duration::from_secs(0),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }

    /// Reason this response is not worth parsing, if any.
    pub fn rejection(&self) -> Option<String> {
        if !self.is_success() {
            Some(format!("HTTP status {}", self.status))
        } else if !self.is_html() {
            Some(format!(
                "non-HTML content type {}",
                self.content_type.as_deref().unwrap_or("(none)")
            ))
        } else {
            None
        }
    }
}
