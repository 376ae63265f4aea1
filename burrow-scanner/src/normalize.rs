//! URL canonicalization.
//!
//! Every URL that enters the frontier, the trap detector or the analytics
//! ledger goes through [`normalize`] first, so two spellings of the same
//! resource always compare equal as [`UrlKey`]s.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Unparseable URL '{url}': {reason}")]
    Unparseable { url: String, reason: String },

    #[error("Unsupported scheme '{scheme}' in '{url}'")]
    UnsupportedScheme { url: String, scheme: String },
}

/// The normalized form of a URL.
///
/// Equality, hashing and ordering all go through the serialized string, so
/// a `UrlKey` can be used directly as a set or map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlKey(Url);

impl UrlKey {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Lowercased host name. Always present since only http(s) URLs
    /// survive normalization.
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Explicit port. Default ports are dropped during normalization.
    pub fn port(&self) -> Option<u16> {
        self.0.port()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.0.query()
    }

    /// Subdomain label used by the analytics table: the host with a
    /// leading `www.` removed.
    pub fn subdomain(&self) -> &str {
        let host = self.host();
        host.strip_prefix("www.").unwrap_or(host)
    }
}

impl fmt::Display for UrlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for UrlKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Resolve `raw` against `base` and normalize the result.
///
/// `base` is the URL a page was served from, not its key: keys drop the
/// trailing slash, which changes how relative paths resolve.
pub fn normalize(raw: &str, base: &Url) -> Result<UrlKey, NormalizeError> {
    let joined = base.join(raw.trim()).map_err(|e| NormalizeError::Unparseable {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    canonicalize(raw, joined)
}

/// Normalize an absolute URL, e.g. a seed from the command line.
pub fn normalize_absolute(raw: &str) -> Result<UrlKey, NormalizeError> {
    let parsed = Url::parse(raw.trim()).map_err(|e| NormalizeError::Unparseable {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    canonicalize(raw, parsed)
}

fn canonicalize(raw: &str, mut url: Url) -> Result<UrlKey, NormalizeError> {
    // Scheme and host are lowercased and default ports dropped by the parser
    // itself for the special schemes, so only http(s) needs to be enforced.
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(NormalizeError::UnsupportedScheme {
                url: raw.to_string(),
                scheme: other.to_string(),
            });
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(NormalizeError::Unparseable {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    url.set_fragment(None);

    let sorted = url.query().and_then(sorted_query);
    url.set_query(sorted.as_deref());

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&trimmed);
    }

    Ok(UrlKey(url))
}

/// Sort `k=v` pieces by key then value. Repeated keys are kept: the trap
/// detector relies on seeing them.
fn sorted_query(query: &str) -> Option<String> {
    let mut pieces: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    if pieces.is_empty() {
        return None;
    }
    pieces.sort_by(|a, b| split_pair(a).cmp(&split_pair(b)));
    Some(pieces.join("&"))
}

fn split_pair(piece: &str) -> (&str, &str) {
    piece.split_once('=').unwrap_or((piece, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> UrlKey {
        normalize_absolute(raw).unwrap()
    }

    #[test]
    fn test_equivalent_urls_share_a_key() {
        let a = key("https://Example.com:443/a?x=1&y=2#frag");
        let b = key("https://example.com/a?y=2&x=1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://example.com/a?x=1&y=2");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            "HTTP://WWW.Example.COM:80/Path/To/?b=2&a=1&a=0#top",
            "https://example.com",
            "https://example.com/",
            "https://example.com/dir///",
            "http://example.com/a%20b?q=hello+world&&z=",
            "https://sub.example.com:8443/x?flag",
            "http://example.com/?",
        ];
        for raw in inputs {
            let once = key(raw);
            let twice = key(once.as_str());
            assert_eq!(once, twice, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn test_relative_links_resolve_against_base() {
        let base = Url::parse("https://example.com/docs/guide/").unwrap();
        let resolved = normalize("../api?b=1&a=2", &base).unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/docs/api?a=2&b=1");

        let resolved = normalize("intro", &base).unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/docs/guide/intro");
    }

    #[test]
    fn test_trailing_slash_collapses_except_at_root() {
        assert_eq!(key("https://example.com/a/b/").as_str(), "https://example.com/a/b");
        assert_eq!(key("https://example.com").as_str(), "https://example.com/");
        assert_eq!(key("https://example.com/").as_str(), "https://example.com/");
    }

    #[test]
    fn test_default_ports_dropped_but_custom_kept() {
        assert_eq!(key("http://example.com:80/").as_str(), "http://example.com/");
        assert_eq!(
            key("http://example.com:8080/").as_str(),
            "http://example.com:8080/"
        );
    }

    #[test]
    fn test_duplicate_query_keys_are_preserved() {
        let k = key("https://example.com/cal?filter=red&filter=red");
        assert_eq!(k.query(), Some("filter=red&filter=red"));
    }

    #[test]
    fn test_unsupported_scheme() {
        let base = Url::parse("https://example.com/").unwrap();
        let err = normalize("mailto:someone@example.com", &base).unwrap_err();
        assert!(matches!(err, NormalizeError::UnsupportedScheme { ref scheme, .. } if scheme == "mailto"));
        assert!(matches!(
            normalize_absolute("ftp://example.com/file"),
            Err(NormalizeError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_unparseable() {
        assert!(matches!(
            normalize_absolute("not a url"),
            Err(NormalizeError::Unparseable { .. })
        ));
        assert!(matches!(
            normalize_absolute("http://[::1"),
            Err(NormalizeError::Unparseable { .. })
        ));
    }

    #[test]
    fn test_subdomain_label_strips_www() {
        assert_eq!(key("https://www.ics.uci.edu/").subdomain(), "ics.uci.edu");
        assert_eq!(
            key("https://vision.ics.uci.edu/x").subdomain(),
            "vision.ics.uci.edu"
        );
    }
}
