//! Crawl trap detection
//!
//! Classifies candidate URLs before they reach the frontier. Checks run in a
//! fixed order and the first one that matches decides the outcome:
//! - Out-of-scope hosts
//! - Non-HTML file extensions
//! - Overlong paths
//! - Repeating path segments (e.g. /a/b/a/b/a/b)
//! - Query keys repeated with the same value
//! - Calendar paths (optional, e.g. /2024/01/15)
//! - Revisit cycles, using the per-URL discovery count kept in [`VisitLog`]

use crate::error::{Result, ScanError};
use crate::normalize::UrlKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Extensions of resources the crawler never fetches.
pub const DEFAULT_BLOCKED_EXTENSIONS: &[&str] = &[
    "css", "js", "bmp", "gif", "jpg", "jpeg", "ico", "png", "tif", "tiff", "mid", "mp2", "mp3",
    "mp4", "wav", "avi", "mov", "mpeg", "ram", "m4v", "mkv", "ogg", "ogv", "pdf", "ps", "eps",
    "tex", "ppt", "pptx", "doc", "docx", "xls", "xlsx", "names", "data", "dat", "exe", "bz2",
    "tar", "msi", "bin", "7z", "psd", "dmg", "iso", "epub", "dll", "cnf", "tgz", "sha1", "thmx",
    "mso", "arff", "rtf", "jar", "csv", "rm", "smil", "wmv", "swf", "wma", "zip", "rar", "gz",
];

/// Configuration for crawl trap detection
#[derive(Debug, Clone)]
pub struct TrapConfig {
    /// Domains the crawl is restricted to. A host matches a domain when it
    /// equals it or is one of its subdomains.
    pub scope: Vec<String>,
    /// Lowercase file extensions that are never fetched
    pub blocked_extensions: HashSet<String>,
    /// Maximum path length in characters
    pub max_path_length: usize,
    /// A path segment seen this many times marks a recursion trap
    pub max_segment_repeats: usize,
    /// A query key repeated this many times with one value marks a trap
    pub max_query_repeats: usize,
    /// Discoveries of one URL at which it is treated as a cycle
    pub revisit_threshold: u32,
    /// Consecutive numeric path segments that mark a calendar trap
    pub calendar_depth: Option<usize>,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            scope: Vec::new(),
            blocked_extensions: DEFAULT_BLOCKED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            max_path_length: 100,
            max_segment_repeats: 3,
            max_query_repeats: 2,
            revisit_threshold: 50,
            calendar_depth: None,
        }
    }
}

impl TrapConfig {
    pub fn with_scope<I, S>(scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope: scope.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    OutOfScope,
    NonHtmlExtension,
    PathTooLong,
    RepeatingSegment,
    RepeatedQueryParam,
    CalendarPath,
    RevisitCycle,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::OutOfScope => "out_of_scope",
            RejectReason::NonHtmlExtension => "non_html_extension",
            RejectReason::PathTooLong => "path_too_long",
            RejectReason::RepeatingSegment => "repeating_segment",
            RejectReason::RepeatedQueryParam => "repeated_query_param",
            RejectReason::CalendarPath => "calendar_path",
            RejectReason::RevisitCycle => "revisit_cycle",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Admit,
    Reject(RejectReason),
}

impl Classification {
    pub fn is_admit(&self) -> bool {
        matches!(self, Classification::Admit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitClass {
    Normal,
    Suspicious,
    Trap,
}

/// Discovery history of a single URL
#[derive(Debug, Clone)]
pub struct VisitRecord {
    pub key: UrlKey,
    pub visits: u32,
    pub first_seen: DateTime<Utc>,
    pub classification: VisitClass,
}

impl VisitRecord {
    pub fn new(key: UrlKey) -> Self {
        Self {
            key,
            visits: 0,
            first_seen: Utc::now(),
            classification: VisitClass::Normal,
        }
    }

    pub fn with_visits(key: UrlKey, visits: u32) -> Self {
        Self {
            visits,
            ..Self::new(key)
        }
    }
}

/// Per-URL visit history for the lifetime of a crawl. Unlike the
/// frontier's seen set this keeps counting after a URL has been queued.
#[derive(Debug, Default)]
pub struct VisitLog {
    records: HashMap<UrlKey, VisitRecord>,
}

impl VisitLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more discovery of `key` and return its record.
    pub fn touch(&mut self, key: &UrlKey) -> &VisitRecord {
        let record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| VisitRecord::new(key.clone()));
        record.visits = record.visits.saturating_add(1);
        record
    }

    /// Current record for `key`, without counting a visit.
    pub fn record(&mut self, key: &UrlKey) -> &VisitRecord {
        self.records
            .entry(key.clone())
            .or_insert_with(|| VisitRecord::new(key.clone()))
    }

    /// Store the outcome of the latest classification of `key`.
    pub fn settle(&mut self, key: &UrlKey, outcome: Classification, revisit_threshold: u32) {
        if let Some(record) = self.records.get_mut(key) {
            record.classification = match outcome {
                Classification::Reject(_) => VisitClass::Trap,
                Classification::Admit if record.visits.saturating_mul(2) >= revisit_threshold => {
                    VisitClass::Suspicious
                }
                Classification::Admit => VisitClass::Normal,
            };
        }
    }

    pub fn get(&self, key: &UrlKey) -> Option<&VisitRecord> {
        self.records.get(key)
    }
}

#[derive(Debug, Clone)]
pub struct TrapDetector {
    config: TrapConfig,
    scope: Vec<String>,
}

impl TrapDetector {
    pub fn new(config: TrapConfig) -> Result<Self> {
        let scope: Vec<String> = config
            .scope
            .iter()
            .map(|domain| domain.trim().trim_start_matches('.').to_lowercase())
            .filter(|domain| !domain.is_empty())
            .collect();
        if scope.is_empty() {
            return Err(ScanError::NoScope);
        }
        Ok(Self { config, scope })
    }

    pub fn config(&self) -> &TrapConfig {
        &self.config
    }

    pub fn classify(&self, key: &UrlKey, history: &VisitRecord) -> Classification {
        match self.first_trap(key, history) {
            Some(reason) => Classification::Reject(reason),
            None => Classification::Admit,
        }
    }

    fn first_trap(&self, key: &UrlKey, history: &VisitRecord) -> Option<RejectReason> {
        if !self.in_scope(key.host()) {
            return Some(RejectReason::OutOfScope);
        }

        let path = key.path();
        if self.has_blocked_extension(path) {
            return Some(RejectReason::NonHtmlExtension);
        }
        if path.len() > self.config.max_path_length {
            return Some(RejectReason::PathTooLong);
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if has_repeating_segment(&segments, self.config.max_segment_repeats) {
            return Some(RejectReason::RepeatingSegment);
        }
        if has_repeated_query_param(key, self.config.max_query_repeats) {
            return Some(RejectReason::RepeatedQueryParam);
        }
        if let Some(depth) = self.config.calendar_depth
            && is_calendar_path(&segments, depth)
        {
            return Some(RejectReason::CalendarPath);
        }
        if history.visits >= self.config.revisit_threshold {
            return Some(RejectReason::RevisitCycle);
        }

        None
    }

    pub fn in_scope(&self, host: &str) -> bool {
        self.scope.iter().any(|domain| {
            host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    fn has_blocked_extension(&self, path: &str) -> bool {
        let last = path.rsplit('/').next().unwrap_or_default();
        match last.rsplit_once('.') {
            Some((_, ext)) => self.config.blocked_extensions.contains(&ext.to_lowercase()),
            None => false,
        }
    }
}

fn has_repeating_segment(segments: &[&str], max_repeats: usize) -> bool {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for segment in segments {
        let count = counts.entry(segment).or_insert(0);
        *count += 1;
        if *count >= max_repeats {
            return true;
        }
    }
    false
}

fn has_repeated_query_param(key: &UrlKey, max_repeats: usize) -> bool {
    if key.query().is_none() {
        return false;
    }
    let mut counts: HashMap<(String, String), usize> = HashMap::new();
    for (name, value) in key.as_url().query_pairs() {
        let count = counts
            .entry((name.into_owned(), value.trim().to_lowercase()))
            .or_insert(0);
        *count += 1;
        if *count >= max_repeats {
            return true;
        }
    }
    false
}

fn is_calendar_path(segments: &[&str], depth: usize) -> bool {
    let mut consecutive = 0;
    for segment in segments {
        if segment.parse::<u32>().is_ok() {
            consecutive += 1;
            if consecutive >= depth {
                return true;
            }
        } else {
            consecutive = 0;
        }
    }
    false
}
