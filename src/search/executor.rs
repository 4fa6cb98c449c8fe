//! Search dispatch and orchestration

use super::models::Filters;
use crate::cache::{CacheKey, ResultCache};
use crate::config::Settings;
use crate::error::{ProviderError, ProviderFailure, SearchError};
use crate::metrics::Metrics;
use crate::providers::{ProviderRegistry, ProviderSlot};
use crate::query::Query;
use crate::results::{MergeContainer, ResultPage};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Timing knobs for a dispatcher
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Default per provider timeout
    pub provider_timeout: Duration,
    /// Deadline for the whole fan-out
    pub dispatch_timeout: Duration,
    /// Lifetime of cached pages
    pub cache_ttl: Duration,
    /// Delay before retrying a timed out provider
    pub retry_backoff: Duration,
    /// How long a rate limited provider is skipped
    pub rate_limit_cooldown: Duration,
}

impl DispatchOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            provider_timeout: settings.provider_timeout(),
            dispatch_timeout: settings.dispatch_timeout(),
            cache_ttl: settings.cache_ttl(),
            retry_backoff: Duration::from_millis(settings.search.retry_backoff_ms),
            rate_limit_cooldown: Duration::from_secs(settings.search.rate_limit_cooldown),
        }
    }
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Outcome of a dispatch that produced a page
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub page: Arc<ResultPage>,
    /// Providers that answered, in configured order
    pub succeeded: Vec<String>,
    /// Providers that failed; empty for cache hits
    pub failed: Vec<ProviderFailure>,
    pub from_cache: bool,
}

impl Dispatch {
    /// Some providers failed but the page is still usable
    pub fn is_degraded(&self) -> bool {
        !self.failed.is_empty()
    }
}

struct ProviderOutcome {
    order: usize,
    id: String,
    result: Result<ResultPage, ProviderError>,
    elapsed: Duration,
}

/// Fans a query out to providers, merges their pages and caches the result
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    cache: Arc<ResultCache>,
    metrics: Arc<Metrics>,
    options: DispatchOptions,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<ResultCache>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            cache,
            metrics,
            options: DispatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Fetch one page for a query, from cache or from the providers
    pub async fn search(
        &self,
        query: &Query,
        filters: &Filters,
        page: u32,
    ) -> Result<Dispatch, SearchError> {
        self.search_with_cancel(query, filters, page, &CancellationToken::new())
            .await
    }

    /// Like [`search`](Self::search), giving up as soon as `cancel` fires.
    ///
    /// A cancelled dispatch never writes to the cache.
    pub async fn search_with_cancel(
        &self,
        query: &Query,
        filters: &Filters,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<Dispatch, SearchError> {
        if page < 1 {
            return Err(SearchError::invalid_page(page as i64, "pages start at 1"));
        }
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        self.metrics.inc_search();
        let key = CacheKey::new(query, filters, page);

        if let Some(cached) = self.cache.get(&key).await {
            debug!("Cache hit for '{}' page {} ({})", query, page, key.digest());
            self.metrics.inc_cache_hit();
            return Ok(Dispatch {
                page: cached,
                succeeded: Vec::new(),
                failed: Vec::new(),
                from_cache: true,
            });
        }

        let slots = self.registry.available_for(filters.content_type);
        if slots.is_empty() {
            return Err(SearchError::NoProviders(filters.content_type));
        }

        info!(
            "Dispatching '{}' page {} to {} providers",
            query,
            page,
            slots.len()
        );

        let deadline = Instant::now() + self.options.dispatch_timeout;
        let mut pending: FuturesUnordered<_> = slots
            .iter()
            .map(|slot| self.fetch_provider(slot, query, filters, page))
            .collect();

        let mut container = MergeContainer::new();
        let mut finished = HashSet::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Dispatch for '{}' cancelled", query);
                    return Err(SearchError::Cancelled);
                }
                _ = sleep_until(deadline) => {
                    warn!(
                        "Dispatch deadline reached with {} providers pending",
                        slots.len() - finished.len()
                    );
                    break;
                }
                next = pending.next() => match next {
                    Some(outcome) => {
                        finished.insert(outcome.order);
                        self.record(&mut container, outcome);
                    }
                    None => break,
                },
            }
        }
        drop(pending);

        for slot in slots.iter().filter(|s| !finished.contains(&s.order)) {
            self.metrics.record_error(slot.id());
            container.add_failure(ProviderFailure::new(slot.id(), ProviderError::Timeout));
        }

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        if !container.has_success() {
            self.metrics.inc_failed_search();
            return Err(SearchError::AllProvidersFailed(container.failures().to_vec()));
        }

        let merged = Arc::new(container.merge(query, page));
        let failed = container.failures().to_vec();
        if !failed.is_empty() {
            warn!(
                "Partial results for '{}': {}",
                query,
                failed
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            );
        }

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        self.cache
            .put(key, Arc::clone(&merged), self.options.cache_ttl)
            .await;

        info!(
            "'{}' page {}: {} results from {} providers",
            query,
            page,
            merged.len(),
            container.succeeded().len()
        );

        Ok(Dispatch {
            page: merged,
            succeeded: container.succeeded(),
            failed,
            from_cache: false,
        })
    }

    /// Fetch from one provider, retrying once after a timeout
    async fn fetch_provider(
        &self,
        slot: &ProviderSlot,
        query: &Query,
        filters: &Filters,
        page: u32,
    ) -> ProviderOutcome {
        let provider_timeout = slot.timeout.unwrap_or(self.options.provider_timeout);
        let start = Instant::now();

        let mut result = Self::fetch_once(slot, query, filters, page, provider_timeout).await;
        if matches!(result, Err(ref e) if e.is_retryable()) {
            debug!("Retrying {} after {:?}", slot.id(), self.options.retry_backoff);
            tokio::time::sleep(self.options.retry_backoff).await;
            result = Self::fetch_once(slot, query, filters, page, provider_timeout).await;
        }

        ProviderOutcome {
            order: slot.order,
            id: slot.id().to_string(),
            result,
            elapsed: start.elapsed(),
        }
    }

    async fn fetch_once(
        slot: &ProviderSlot,
        query: &Query,
        filters: &Filters,
        page: u32,
        provider_timeout: Duration,
    ) -> Result<ResultPage, ProviderError> {
        match timeout(
            provider_timeout,
            slot.provider.fetch(query, filters, page, provider_timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        }
    }

    fn record(&self, container: &mut MergeContainer, outcome: ProviderOutcome) {
        match outcome.result {
            Ok(page) => {
                debug!(
                    "Provider {} returned {} results in {:?}",
                    outcome.id,
                    page.len(),
                    outcome.elapsed
                );
                self.metrics.record_success(&outcome.id);
                self.metrics
                    .record_response_time(&outcome.id, outcome.elapsed.as_millis() as u64);
                container.add_page(outcome.order, &outcome.id, page);
            }
            Err(error) => {
                warn!("Provider {} failed: {}", outcome.id, error);
                self.metrics.record_error(&outcome.id);
                if error == ProviderError::RateLimited {
                    self.registry
                        .mark_rate_limited(&outcome.id, self.options.rate_limit_cooldown);
                }
                container.add_failure(ProviderFailure::new(outcome.id, error));
            }
        }
    }
}
