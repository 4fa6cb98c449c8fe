//! Metrics collection module
//!
//! Tracks provider performance, error rates and cache effectiveness for the
//! `stats` command.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Response times kept per provider
const RESPONSE_WINDOW: usize = 100;

/// Session metrics collector
pub struct Metrics {
    /// Dispatches started
    total_searches: AtomicU64,
    /// Dispatches answered from cache
    cache_hits: AtomicU64,
    /// Dispatches where every provider failed
    failed_searches: AtomicU64,
    providers: RwLock<HashMap<String, ProviderCounters>>,
}

#[derive(Debug, Default)]
struct ProviderCounters {
    successes: u64,
    errors: u64,
    response_times: Vec<u64>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_searches: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            failed_searches: AtomicU64::new(0),
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Increment total search count
    pub fn inc_search(&self) {
        self.total_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed_search(&self) {
        self.failed_searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record provider response time
    pub fn record_response_time(&self, provider: &str, time_ms: u64) {
        let mut providers = self.write();
        let times = &mut providers.entry(provider.to_string()).or_default().response_times;
        if times.len() >= RESPONSE_WINDOW {
            times.remove(0);
        }
        times.push(time_ms);
    }

    /// Record provider error
    pub fn record_error(&self, provider: &str) {
        self.write().entry(provider.to_string()).or_default().errors += 1;
    }

    /// Record provider success
    pub fn record_success(&self, provider: &str) {
        self.write().entry(provider.to_string()).or_default().successes += 1;
    }

    /// Get total searches
    pub fn total_searches(&self) -> u64 {
        self.total_searches.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn failed_searches(&self) -> u64 {
        self.failed_searches.load(Ordering::Relaxed)
    }

    /// Share of searches answered from cache, in percent
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.total_searches();
        if total == 0 {
            0.0
        } else {
            self.cache_hits() as f64 / total as f64 * 100.0
        }
    }

    /// Get average response time for a provider
    pub fn avg_response_time(&self, provider: &str) -> Option<u64> {
        self.read().get(provider).and_then(|c| average(&c.response_times))
    }

    /// Get reliability percentage for a provider
    pub fn reliability(&self, provider: &str) -> f64 {
        self.read()
            .get(provider)
            .map(reliability)
            .unwrap_or(100.0)
    }

    /// Snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        let providers = self
            .read()
            .iter()
            .map(|(name, c)| {
                (
                    name.clone(),
                    ProviderStats {
                        successes: c.successes,
                        errors: c.errors,
                        avg_response_time: average(&c.response_times),
                        reliability: reliability(c),
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            total_searches: self.total_searches(),
            cache_hits: self.cache_hits(),
            failed_searches: self.failed_searches(),
            cache_hit_rate: self.cache_hit_rate(),
            providers,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProviderCounters>> {
        self.providers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProviderCounters>> {
        self.providers.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn average(times: &[u64]) -> Option<u64> {
    if times.is_empty() {
        None
    } else {
        Some(times.iter().sum::<u64>() / times.len() as u64)
    }
}

fn reliability(counters: &ProviderCounters) -> f64 {
    let total = counters.successes + counters.errors;
    if total == 0 {
        100.0
    } else {
        counters.successes as f64 / total as f64 * 100.0
    }
}

/// Statistics for a single provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStats {
    pub successes: u64,
    pub errors: u64,
    pub avg_response_time: Option<u64>,
    pub reliability: f64,
}

/// Point-in-time copy of all metrics, providers sorted by name
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub total_searches: u64,
    pub cache_hits: u64,
    pub failed_searches: u64,
    pub cache_hit_rate: f64,
    pub providers: BTreeMap<String, ProviderStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.inc_search();
        metrics.record_response_time("duckduckgo", 100);
        metrics.record_success("duckduckgo");

        assert_eq!(metrics.total_searches(), 1);
        assert_eq!(metrics.avg_response_time("duckduckgo"), Some(100));
        assert_eq!(metrics.reliability("duckduckgo"), 100.0);
        assert_eq!(metrics.reliability("unknown"), 100.0);
    }

    #[test]
    fn test_reliability_and_cache_rate() {
        let metrics = Metrics::new();
        for _ in 0..4 {
            metrics.inc_search();
        }
        metrics.inc_cache_hit();
        metrics.record_success("wikipedia");
        metrics.record_success("wikipedia");
        metrics.record_success("wikipedia");
        metrics.record_error("wikipedia");

        assert_eq!(metrics.reliability("wikipedia"), 75.0);
        assert_eq!(metrics.cache_hit_rate(), 25.0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.providers["wikipedia"].errors, 1);
        assert!(snapshot.providers["wikipedia"].avg_response_time.is_none());
    }

    #[test]
    fn test_response_window() {
        let metrics = Metrics::new();
        for _ in 0..RESPONSE_WINDOW {
            metrics.record_response_time("p", 1000);
        }
        for _ in 0..RESPONSE_WINDOW {
            metrics.record_response_time("p", 10);
        }
        assert_eq!(metrics.avg_response_time("p"), Some(10));
    }
}
