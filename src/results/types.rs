//! Result type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A single search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The title of the result
    pub title: String,
    /// The URL of the result
    pub url: String,
    /// Content snippet/description
    pub snippet: String,
    /// Host the result lives on, without a leading `www.`
    pub source_domain: String,
    /// Provider that returned this result
    pub provider_id: String,
    /// 1-based position. Providers report their own order here; the
    /// dispatcher overwrites it with the merged rank.
    pub rank: u32,
}

impl SearchResult {
    /// Create a new result, deriving the domain from the URL
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        let url = url.into();
        let source_domain = domain_of(&url).unwrap_or_default();
        Self {
            title: title.into().trim().to_string(),
            url,
            snippet: String::new(),
            source_domain,
            provider_id: provider_id.into(),
            rank: 0,
        }
    }

    /// Add content to the result
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into().trim().to_string();
        self
    }

    /// Set the provider-reported position
    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }

    /// Text the query operators are checked against
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.snippet)
    }

    /// Key used for de-duplication across providers
    pub fn dedup_key(&self) -> String {
        normalize_url(&self.url)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPage {
    pub items: Vec<SearchResult>,
    /// 1-based page number
    pub page_number: u32,
    /// Total result count reported upstream, if any
    pub estimated_total: Option<u64>,
    pub fetched_at: DateTime<Utc>,
}

impl ResultPage {
    pub fn new(items: Vec<SearchResult>, page_number: u32) -> Self {
        Self {
            items,
            page_number: page_number.max(1),
            estimated_total: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_estimated_total(mut self, total: Option<u64>) -> Self {
        self.estimated_total = total;
        self
    }

    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Result by 1-based index on this page
    pub fn get(&self, index: usize) -> Option<&SearchResult> {
        index.checked_sub(1).and_then(|i| self.items.get(i))
    }
}

/// Host of a URL without the `www.` prefix
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.trim_start_matches("www.").to_string())
}

/// Normalize a URL for de-duplication.
///
/// Two URLs are the same result when scheme, host and path match
/// case-insensitively; a trailing slash on the path is ignored. Query and
/// fragment do not take part. Unparseable input is only lower-cased.
pub fn normalize_url(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw.trim()) else {
        return raw.trim().trim_end_matches('/').to_lowercase();
    };
    let host = parsed.host_str().unwrap_or_default();
    let path = parsed.path().trim_end_matches('/');
    format!("{}://{}{}", parsed.scheme(), host, path).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_domain() {
        let r = SearchResult::new("https://www.Rust-Lang.org/learn", " Learn Rust ", "ddg");
        assert_eq!(r.source_domain, "rust-lang.org");
        assert_eq!(r.title, "Learn Rust");
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("HTTPS://Example.COM/Path/"),
            normalize_url("https://example.com/path")
        );
        assert_eq!(
            normalize_url("https://example.com/a?x=1#frag"),
            "https://example.com/a"
        );
        assert_ne!(
            normalize_url("http://example.com/a"),
            normalize_url("https://example.com/a")
        );
        assert_eq!(normalize_url("not a url/"), "not a url");
    }

    #[test]
    fn test_page_lookup_is_one_based() {
        let page = ResultPage::new(
            vec![
                SearchResult::new("https://a.com", "A", "p"),
                SearchResult::new("https://b.com", "B", "p"),
            ],
            0,
        );
        assert_eq!(page.page_number, 1);
        assert!(page.get(0).is_none());
        assert_eq!(page.get(2).map(|r| r.title.as_str()), Some("B"));
        assert!(page.get(3).is_none());
    }
}
