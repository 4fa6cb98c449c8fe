//! Generic provider over an HTTP backend

use super::throttle::Throttle;
use super::traits::*;
use crate::error::ProviderError;
use crate::network::HttpClient;
use crate::query::Query;
use crate::results::ResultPage;
use crate::search::{ContentType, Filters};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Adds transport, per-request timeout and client-side quota to an
/// [`HttpBackend`]
pub struct HttpProvider<B> {
    id: String,
    backend: B,
    client: Arc<HttpClient>,
    content_types: Vec<ContentType>,
    throttle: Option<Throttle>,
    page_size: u32,
}

impl<B: HttpBackend> HttpProvider<B> {
    pub fn new(backend: B, client: Arc<HttpClient>) -> Self {
        Self {
            id: backend.name().to_string(),
            content_types: backend.content_types(),
            backend,
            client,
            throttle: None,
            page_size: 10,
        }
    }

    /// Use a configured name instead of the backend name
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Restrict the content types this provider is asked for
    pub fn with_content_types(mut self, types: Vec<ContentType>) -> Self {
        let supported = self.backend.content_types();
        self.content_types = types
            .into_iter()
            .filter(|t| supported.contains(t))
            .collect();
        self
    }

    pub fn with_throttle(mut self, throttle: Option<Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl<B: HttpBackend> Provider for HttpProvider<B> {
    fn id(&self) -> &str {
        &self.id
    }

    fn content_types(&self) -> Vec<ContentType> {
        self.content_types.clone()
    }

    async fn fetch(
        &self,
        query: &Query,
        filters: &Filters,
        page: u32,
        timeout: Duration,
    ) -> Result<ResultPage, ProviderError> {
        if let Some(ref throttle) = self.throttle {
            throttle.acquire()?;
        }

        let params = RequestParams::new(query, filters, page, self.page_size);
        let request = self.backend.request(&params)?;
        let response = self.client.execute_with_timeout(request, timeout).await?;
        response.check()?;

        let mut page = self.backend.response(response, &params)?;
        for item in &mut page.items {
            item.provider_id = self.id.clone();
        }
        debug!("{} returned {} items for page {}", self.id, page.len(), page.page_number);
        Ok(page)
    }
}
