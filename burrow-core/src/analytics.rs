//! Corpus-wide statistics
//!
//! [`AnalyticsAggregator`] is a cheap, cloneable handle shared by every crawl
//! worker. All mutation goes through [`AnalyticsAggregator::record`] and the
//! ledger methods; [`AnalyticsAggregator::report`] only reads.

use crate::text::{tokenize, word_frequencies};
use burrow_scanner::{FetchedPage, RejectReason, UrlKey};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const TOP_WORDS: usize = 50;

/// Statistics derived from one fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStats {
    pub url: UrlKey,
    pub subdomain: String,
    pub token_count: usize,
    pub outlink_count: usize,
    pub frequencies: HashMap<String, u64>,
}

impl PageStats {
    pub fn from_page(page: &FetchedPage) -> Self {
        let tokens = tokenize(&page.text);
        Self {
            url: page.url.clone(),
            subdomain: page.url.subdomain().to_string(),
            token_count: tokens.len(),
            outlink_count: page.valid_outlinks,
            frequencies: word_frequencies(&tokens),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRecord {
    pub url: UrlKey,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LedgerEntry {
    Downloaded,
    Failed { error: String },
    Trap { reason: RejectReason },
}

#[derive(Debug, Default)]
struct AnalyticsState {
    subdomains: BTreeMap<String, u64>,
    longest_page: Option<PageRecord>,
    most_outlinks: Option<PageRecord>,
    word_frequencies: HashMap<String, u64>,
    ledger: BTreeMap<UrlKey, LedgerEntry>,
}

impl AnalyticsState {
    fn fold(&mut self, stats: PageStats) {
        let PageStats {
            url,
            subdomain,
            token_count,
            outlink_count,
            frequencies,
        } = stats;

        let count = self.subdomains.entry(subdomain).or_insert(0);
        *count = count.saturating_add(1);

        if self
            .longest_page
            .as_ref()
            .is_none_or(|record| token_count > record.count)
        {
            self.longest_page = Some(PageRecord {
                url: url.clone(),
                count: token_count,
            });
        }
        if self
            .most_outlinks
            .as_ref()
            .is_none_or(|record| outlink_count > record.count)
        {
            self.most_outlinks = Some(PageRecord {
                url: url.clone(),
                count: outlink_count,
            });
        }

        for (token, frequency) in frequencies {
            let total = self.word_frequencies.entry(token).or_insert(0);
            *total = total.saturating_add(frequency);
        }

        self.ledger.insert(url, LedgerEntry::Downloaded);
    }
}

/// A read-only projection of the aggregate, with stop words removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub subdomains: Vec<(String, u64)>,
    pub most_outlinks: Option<PageRecord>,
    pub longest_page: Option<PageRecord>,
    pub ledger: Vec<(UrlKey, LedgerEntry)>,
    pub top_words: Vec<(String, u64)>,
}

#[derive(Clone, Default)]
pub struct AnalyticsAggregator {
    state: Arc<Mutex<AnalyticsState>>,
}

impl AnalyticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    // Every update applied under the lock is infallible, so a poisoned
    // lock cannot hide a half-applied fold.
    fn state(&self) -> MutexGuard<'_, AnalyticsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold one page into the aggregate. Never rejects input.
    pub fn record(&self, stats: PageStats) {
        self.state().fold(stats);
    }

    /// Note a URL that was dequeued but yielded no usable page.
    pub fn record_failure(&self, url: UrlKey, error: impl Into<String>) {
        self.state()
            .ledger
            .entry(url)
            .or_insert_with(|| LedgerEntry::Failed {
                error: error.into(),
            });
    }

    /// Note a URL the trap detector turned away. A page that was already
    /// downloaded stays recorded as downloaded.
    pub fn record_trap(&self, url: UrlKey, reason: RejectReason) {
        self.state()
            .ledger
            .entry(url)
            .or_insert(LedgerEntry::Trap { reason });
    }

    pub fn pages_recorded(&self) -> u64 {
        self.state().subdomains.values().sum()
    }

    pub fn report(&self, stopwords: &HashSet<String>) -> Report {
        let (subdomains, most_outlinks, longest_page, ledger, mut top_words) = {
            let state = self.state();
            let filtered: Vec<(String, u64)> = state
                .word_frequencies
                .iter()
                .filter(|(token, _)| !stopwords.contains(token.as_str()))
                .map(|(token, count)| (token.clone(), *count))
                .collect();
            (
                state
                    .subdomains
                    .iter()
                    .map(|(name, count)| (name.clone(), *count))
                    .collect::<Vec<_>>(),
                state.most_outlinks.clone(),
                state.longest_page.clone(),
                state
                    .ledger
                    .iter()
                    .map(|(url, entry)| (url.clone(), entry.clone()))
                    .collect::<Vec<_>>(),
                filtered,
            )
        };

        top_words.sort_by(|(a_token, a_count), (b_token, b_count)| {
            b_count.cmp(a_count).then_with(|| a_token.cmp(b_token))
        });
        top_words.truncate(TOP_WORDS);

        Report {
            subdomains,
            most_outlinks,
            longest_page,
            ledger,
            top_words,
        }
    }
}
