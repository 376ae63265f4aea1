//! URL frontier with per-host politeness
//!
//! Pending URLs live in one FIFO bucket per host. Hosts are served
//! round-robin, and a host is only eligible once its previous fetch has
//! completed and the politeness delay has elapsed since. A host that is
//! cooling down never holds up the others.
//!
//! The frontier itself is a plain single-owner structure; the crawler
//! shares it between workers behind one mutex and only holds that lock for
//! the duration of a single call.

use crate::normalize::UrlKey;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrontierError {
    #[error("Frontier is empty")]
    Empty,

    #[error("All pending hosts are cooling down (next ready in {retry_in:?})")]
    CoolingDown { retry_in: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub key: UrlKey,
    pub discovered_at: DateTime<Utc>,
    /// Page the link was found on; `None` for seeds
    pub source: Option<UrlKey>,
}

#[derive(Debug, Default)]
struct HostState {
    pending: VecDeque<FrontierEntry>,
    in_flight: bool,
    last_completed: Option<Instant>,
}

impl HostState {
    /// Time left before this host may be fetched again, `None` while a
    /// fetch is in flight.
    fn cooldown(&self, now: Instant, delay: Duration) -> Option<Duration> {
        if self.in_flight {
            return None;
        }
        Some(match self.last_completed {
            Some(done) => delay.saturating_sub(now.saturating_duration_since(done)),
            None => Duration::ZERO,
        })
    }
}

pub struct Frontier {
    hosts: HashMap<String, HostState>,
    /// Round-robin order over hosts that have pending entries
    rotation: VecDeque<String>,
    seen: HashSet<UrlKey>,
    pending: usize,
    in_flight: usize,
    politeness: Duration,
}

impl Frontier {
    pub fn new(politeness: Duration) -> Self {
        Self {
            hosts: HashMap::new(),
            rotation: VecDeque::new(),
            seen: HashSet::new(),
            pending: 0,
            in_flight: 0,
            politeness,
        }
    }

    /// Queue a link found on `source`. Returns false if the key was seen
    /// before, in which case nothing changes.
    pub fn add(&mut self, key: UrlKey, source: &UrlKey) -> bool {
        self.push(key, Some(source.clone()))
    }

    /// Queue a seed URL.
    pub fn seed(&mut self, key: UrlKey) -> bool {
        self.push(key, None)
    }

    fn push(&mut self, key: UrlKey, source: Option<UrlKey>) -> bool {
        if !self.seen.insert(key.clone()) {
            return false;
        }

        let host = key.host().to_string();
        let state = self.hosts.entry(host.clone()).or_default();
        if state.pending.is_empty() {
            self.rotation.push_back(host);
        }
        state.pending.push_back(FrontierEntry {
            key,
            discovered_at: Utc::now(),
            source,
        });
        self.pending += 1;
        true
    }

    pub fn has_next(&self) -> bool {
        self.pending > 0
    }

    /// Dequeue the next URL whose host is ready.
    ///
    /// The returned entry's host counts as in flight until [`complete`] is
    /// called for it.
    ///
    /// [`complete`]: Frontier::complete
    pub fn next(&mut self) -> Result<FrontierEntry, FrontierError> {
        self.next_at(Instant::now())
    }

    pub fn next_at(&mut self, now: Instant) -> Result<FrontierEntry, FrontierError> {
        if self.pending == 0 {
            return Err(FrontierError::Empty);
        }

        let mut retry_in: Option<Duration> = None;
        for _ in 0..self.rotation.len() {
            let Some(host) = self.rotation.pop_front() else {
                break;
            };
            let Some(state) = self.hosts.get_mut(&host) else {
                continue;
            };

            match state.cooldown(now, self.politeness) {
                Some(wait) if wait.is_zero() => {
                    let Some(entry) = state.pending.pop_front() else {
                        continue;
                    };
                    state.in_flight = true;
                    if !state.pending.is_empty() {
                        self.rotation.push_back(host);
                    }
                    self.pending -= 1;
                    self.in_flight += 1;
                    return Ok(entry);
                }
                Some(wait) => {
                    retry_in = Some(retry_in.map_or(wait, |r| r.min(wait)));
                    self.rotation.push_back(host);
                }
                None => self.rotation.push_back(host),
            }
        }

        // Only in-flight hosts left: poll again after one politeness delay.
        Err(FrontierError::CoolingDown {
            retry_in: retry_in.unwrap_or(self.politeness),
        })
    }

    /// Mark the fetch of `key` as finished, successful or not, starting
    /// its host's politeness delay.
    pub fn complete(&mut self, key: &UrlKey) {
        self.complete_at(key, Instant::now());
    }

    pub fn complete_at(&mut self, key: &UrlKey, now: Instant) {
        if let Some(state) = self.hosts.get_mut(key.host())
            && state.in_flight
        {
            state.in_flight = false;
            state.last_completed = Some(now);
            self.in_flight -= 1;
        }
    }

    /// Give back a dequeued entry that was never fetched. The host becomes
    /// ready again without starting a politeness delay.
    pub fn release(&mut self, key: &UrlKey) {
        if let Some(state) = self.hosts.get_mut(key.host())
            && state.in_flight
        {
            state.in_flight = false;
            self.in_flight -= 1;
        }
    }

    /// Nothing pending and nothing being fetched.
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.in_flight == 0
    }

    pub fn pending_count(&self) -> usize {
        self.pending
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_absolute;

    fn key(raw: &str) -> UrlKey {
        normalize_absolute(raw).unwrap()
    }

    #[test]
    fn test_dedup() {
        let mut frontier = Frontier::new(Duration::ZERO);
        let source = key("https://example.com/");

        assert!(frontier.add(key("https://example.com/page"), &source));
        assert!(!frontier.add(key("https://example.com/page#again"), &source));
        assert_eq!(frontier.pending_count(), 1);
        assert_eq!(frontier.seen_count(), 1);
    }

    #[test]
    fn test_seen_keys_are_never_requeued() {
        let mut frontier = Frontier::new(Duration::ZERO);
        let page = key("https://example.com/page");
        frontier.seed(page.clone());

        let entry = frontier.next().unwrap();
        frontier.complete(&entry.key);

        assert!(!frontier.add(page, &key("https://example.com/other")));
        assert!(!frontier.has_next());
        assert!(frontier.is_drained());
    }

    #[test]
    fn test_next_on_empty_frontier_fails() {
        let mut frontier = Frontier::new(Duration::ZERO);
        assert!(!frontier.has_next());
        assert_eq!(frontier.next(), Err(FrontierError::Empty));
    }

    #[test]
    fn test_fifo_within_host_and_source_tracking() {
        let mut frontier = Frontier::new(Duration::ZERO);
        let source = key("https://example.com/");
        frontier.add(key("https://example.com/1"), &source);
        frontier.add(key("https://example.com/2"), &source);

        let first = frontier.next().unwrap();
        assert_eq!(first.key, key("https://example.com/1"));
        assert_eq!(first.source, Some(source.clone()));
        frontier.complete(&first.key);

        let second = frontier.next().unwrap();
        assert_eq!(second.key, key("https://example.com/2"));
    }

    #[test]
    fn test_cooling_host_does_not_block_others() {
        let mut frontier = Frontier::new(Duration::from_secs(10));
        let start = Instant::now();
        frontier.seed(key("https://a.example.com/1"));
        frontier.seed(key("https://a.example.com/2"));
        frontier.seed(key("https://b.example.com/1"));

        let first = frontier.next_at(start).unwrap();
        assert_eq!(first.key.host(), "a.example.com");
        frontier.complete_at(&first.key, start);

        // a.example.com is cooling down; b.example.com is served instead.
        let second = frontier.next_at(start).unwrap();
        assert_eq!(second.key.host(), "b.example.com");
        frontier.complete_at(&second.key, start);

        match frontier.next_at(start + Duration::from_secs(4)) {
            Err(FrontierError::CoolingDown { retry_in }) => {
                assert_eq!(retry_in, Duration::from_secs(6));
            }
            other => panic!("expected cool-down, got {:?}", other),
        }

        let third = frontier.next_at(start + Duration::from_secs(10)).unwrap();
        assert_eq!(third.key, key("https://a.example.com/2"));
    }

    #[test]
    fn test_host_with_fetch_in_flight_is_not_served() {
        let mut frontier = Frontier::new(Duration::ZERO);
        frontier.seed(key("https://a.example.com/1"));
        frontier.seed(key("https://a.example.com/2"));

        let first = frontier.next().unwrap();
        assert!(matches!(
            frontier.next(),
            Err(FrontierError::CoolingDown { .. })
        ));
        assert!(!frontier.is_drained());

        frontier.complete(&first.key);
        assert!(frontier.next().is_ok());
    }

    #[test]
    fn test_release_skips_politeness_delay() {
        let mut frontier = Frontier::new(Duration::from_secs(60));
        frontier.seed(key("https://a.example.com/1"));
        frontier.seed(key("https://a.example.com/2"));

        let first = frontier.next().unwrap();
        frontier.release(&first.key);
        assert_eq!(frontier.in_flight_count(), 0);

        let second = frontier.next().unwrap();
        assert_eq!(second.key, key("https://a.example.com/2"));
    }

    #[test]
    fn test_round_robin_across_hosts() {
        let mut frontier = Frontier::new(Duration::ZERO);
        for host in ["a", "b", "c"] {
            for page in 1..=2 {
                frontier.seed(key(&format!("https://{}.example.com/{}", host, page)));
            }
        }

        let mut order = Vec::new();
        while let Ok(entry) = frontier.next() {
            order.push(entry.key.host().chars().next().unwrap_or_default());
            frontier.complete(&entry.key);
        }
        assert_eq!(order, vec!['a', 'b', 'c', 'a', 'b', 'c']);
        assert!(frontier.is_drained());
    }
}
