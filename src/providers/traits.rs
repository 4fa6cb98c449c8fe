//! Provider traits and types

use crate::error::ProviderError;
use crate::query::Query;
use crate::results::ResultPage;
use crate::search::{ContentType, Filters};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// A search backend able to fetch one page of results
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider id, unique within a registry
    fn id(&self) -> &str;

    /// Content types this provider serves
    fn content_types(&self) -> Vec<ContentType>;

    /// Fetch one page of results.
    ///
    /// Implementations must give up after `timeout`. Items carry their
    /// provider-reported position in `rank`.
    async fn fetch(
        &self,
        query: &Query,
        filters: &Filters,
        page: u32,
        timeout: Duration,
    ) -> Result<ResultPage, ProviderError>;
}

/// Parameters for building an upstream request
#[derive(Debug, Clone)]
pub struct RequestParams {
    /// Query rendered in operator syntax
    pub query: String,
    /// Query without operators
    pub keywords: String,
    /// Page number (1-indexed)
    pub pageno: u32,
    /// Items wanted per page
    pub page_size: u32,
    pub filters: Filters,
}

impl RequestParams {
    pub fn new(query: &Query, filters: &Filters, pageno: u32, page_size: u32) -> Self {
        Self {
            query: query.to_query_string(),
            keywords: query.keywords(),
            pageno: pageno.max(1),
            page_size,
            filters: filters.clone(),
        }
    }

    /// Zero-based offset of the first item on this page
    pub fn offset(&self) -> u32 {
        (self.pageno - 1) * self.page_size
    }

    /// Language code, `None` when unrestricted
    pub fn lang(&self) -> Option<&str> {
        self.filters.language.as_deref()
    }
}

/// HTTP request to be made for a provider
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// URL to request
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Query parameters, in order
    pub params: Vec<(String, String)>,
    /// Form body for POST requests
    pub form: Option<Vec<(String, String)>>,
}

impl HttpRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            params: Vec::new(),
            form: None,
        }
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(url)
        }
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add a form field (sends the body form-urlencoded)
    pub fn form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .chain(self.form.iter().flatten())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// HTTP response from a provider request
#[derive(Debug)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body as text
    pub text: String,
    /// Response URL (after redirects)
    pub url: String,
}

impl HttpResponse {
    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProviderError> {
        serde_json::from_str(&self.text).map_err(|e| ProviderError::Parse(e.to_string()))
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response indicates rate limiting
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Check if response indicates CAPTCHA
    pub fn is_captcha(&self) -> bool {
        self.text.contains("captcha")
            || self.text.contains("CAPTCHA")
            || self.text.contains("unusual traffic")
            || self.text.contains("automated requests")
    }

    /// Map non-success statuses and bot walls to provider errors
    pub fn check(&self) -> Result<(), ProviderError> {
        if self.is_rate_limited() || (self.is_success() && self.is_captcha()) {
            return Err(ProviderError::RateLimited);
        }
        if !self.is_success() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", self.status)));
        }
        Ok(())
    }
}

/// Request/response half of an HTTP provider.
///
/// [`HttpProvider`](super::HttpProvider) turns a backend into a
/// [`Provider`] by adding transport, timeout and throttling.
pub trait HttpBackend: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Content types the backend can serve
    fn content_types(&self) -> Vec<ContentType> {
        vec![ContentType::Web]
    }

    /// Build the HTTP request for a search
    fn request(&self, params: &RequestParams) -> Result<HttpRequest, ProviderError>;

    /// Parse the HTTP response into a page
    fn response(
        &self,
        response: HttpResponse,
        params: &RequestParams,
    ) -> Result<ResultPage, ProviderError>;
}
