//! HTTP client for making requests to search providers

use super::user_agent::{accept_html, accept_language, generate_user_agent};
use crate::config::{seconds, OutgoingSettings};
use crate::error::ProviderError;
use crate::providers::{HttpMethod, HttpRequest, HttpResponse};
use anyhow::Result;
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// HTTP client wrapper shared by all HTTP providers
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
    user_agent: String,
    extra_headers: HashMap<String, String>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> Result<Self> {
        let request_timeout = seconds("outgoing.request_timeout", settings.request_timeout)?;
        let mut builder = Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(settings.pool_maxsize)
            .cookie_store(true)
            .gzip(true)
            .brotli(true);

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref proxy_url) = settings.proxies.all {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        } else {
            if let Some(ref http) = settings.proxies.http {
                builder = builder.proxy(reqwest::Proxy::http(http)?);
            }
            if let Some(ref https) = settings.proxies.https {
                builder = builder.proxy(reqwest::Proxy::https(https)?);
            }
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            default_timeout: request_timeout,
            user_agent: settings
                .user_agent
                .clone()
                .unwrap_or_else(generate_user_agent),
            extra_headers: settings
                .extra_headers
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
        })
    }

    /// Execute a provider request with the default timeout
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ProviderError> {
        self.execute_with_timeout(request, self.default_timeout)
            .await
    }

    /// Execute a provider request with a custom timeout.
    ///
    /// Only transport failures are errors here; status codes are left to
    /// [`HttpResponse::check`].
    pub async fn execute_with_timeout(
        &self,
        request: HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, ProviderError> {
        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        req_builder = req_builder.timeout(timeout);

        let lang = request
            .headers
            .get("accept-language")
            .cloned()
            .unwrap_or_else(|| accept_language("en"));
        let mut headers: HashMap<String, String> = [
            ("user-agent", self.user_agent.clone()),
            ("accept", accept_html().to_string()),
            ("accept-language", lang),
            ("dnt", "1".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        headers.extend(self.extra_headers.clone());
        for (key, value) in &request.headers {
            headers.insert(key.to_lowercase(), value.clone());
        }
        for (key, value) in &headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        if !request.params.is_empty() {
            req_builder = req_builder.query(&request.params);
        }

        if let Some(ref form) = request.form {
            req_builder = req_builder.form(form);
        }

        debug!("{:?} {}", request.method, request.url);
        let response = req_builder.send().await.map_err(map_transport_error)?;

        Self::parse_response(response).await
    }

    /// Simple GET request
    pub async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
        self.execute(HttpRequest::get(url)).await
    }

    async fn parse_response(response: Response) -> Result<HttpResponse, ProviderError> {
        let status = response.status().as_u16();
        let url = response.url().to_string();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string(), v.to_string());
            }
        }

        let text = response.text().await.map_err(map_transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            text,
            url,
        })
    }

    /// Pick a new random user agent
    pub fn rotate_user_agent(&mut self) {
        self.user_agent = generate_user_agent();
    }

    /// Get current user agent
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else if err.status().map(|s| s.as_u16()) == Some(429) {
        ProviderError::RateLimited
    } else if err.is_decode() {
        ProviderError::Parse(err.to_string())
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}
