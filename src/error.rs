//! Error types for termsearch
//!
//! `ProviderError` describes why a single provider could not answer a
//! request; it never escapes the dispatcher on its own. `SearchError` is
//! what the pipeline and the session surface to callers.

use crate::search::ContentType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of one provider for one fetch
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderError {
    /// The provider did not answer within its timeout
    #[error("request timed out")]
    Timeout,
    /// The provider refused the request or our local quota is spent
    #[error("rate limited")]
    RateLimited,
    /// The provider answered but the payload could not be understood
    #[error("failed to parse response: {0}")]
    Parse(String),
    /// Transport level failure (DNS, TLS, HTTP 5xx, ...)
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether a dispatch may retry the provider after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// A provider failure tagged with the provider that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

impl ProviderFailure {
    pub fn new(provider: impl Into<String>, error: ProviderError) -> Self {
        Self {
            provider: provider.into(),
            error,
        }
    }
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

/// Errors surfaced by the dispatcher and the session state machine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// Every provider asked for this page failed
    #[error("all providers failed: {}", format_failures(.0))]
    AllProvidersFailed(Vec<ProviderFailure>),

    /// No enabled provider serves the requested content type
    #[error("no provider available for {0} results")]
    NoProviders(ContentType),

    /// Navigation target rejected before any dispatch
    #[error("invalid page {requested}: {reason}")]
    InvalidPageRequest { requested: i64, reason: String },

    /// The query has nothing to search for after parsing
    #[error("query must contain at least one search term")]
    EmptyQuery,

    /// Navigation requested without a query on screen
    #[error("no active search")]
    NoActiveQuery,

    /// Navigation requested while another dispatch is still running
    #[error("a search is already in progress")]
    Busy,

    /// The dispatch was superseded by a newer request
    #[error("search cancelled")]
    Cancelled,

    /// Broken invariant; never recovered from silently
    #[error("internal error: {0}")]
    Internal(String),
}

impl SearchError {
    pub fn invalid_page(requested: i64, reason: impl Into<String>) -> Self {
        Self::InvalidPageRequest {
            requested,
            reason: reason.into(),
        }
    }

    /// Errors that leave the session exactly as it was
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidPageRequest { .. } | Self::EmptyQuery | Self::NoActiveQuery | Self::Busy
        )
    }
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no provider responded".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_failed_lists_causes() {
        let err = SearchError::AllProvidersFailed(vec![
            ProviderFailure::new("duckduckgo", ProviderError::Timeout),
            ProviderFailure::new("wikipedia", ProviderError::RateLimited),
        ]);
        assert_eq!(
            err.to_string(),
            "all providers failed: duckduckgo: request timed out; wikipedia: rate limited"
        );
    }

    #[test]
    fn test_invalid_page_message() {
        let err = SearchError::invalid_page(0, "pages start at 1");
        assert_eq!(err.to_string(), "invalid page 0: pages start at 1");
        assert!(err.is_rejection());
    }

    #[test]
    fn test_only_timeouts_retry() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(!ProviderError::RateLimited.is_retryable());
        assert!(!ProviderError::Parse("bad".into()).is_retryable());
    }
}
