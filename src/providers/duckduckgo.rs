//! DuckDuckGo HTML provider

use super::traits::*;
use crate::error::ProviderError;
use crate::results::{ResultPage, SearchResult};
use crate::search::{ContentType, SafeSearch};
use scraper::{ElementRef, Html, Selector};

const HTML_URL: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo web search through the no-JavaScript HTML endpoint
pub struct DuckDuckGo {
    html_url: String,
}

impl DuckDuckGo {
    pub fn new() -> Self {
        Self {
            html_url: HTML_URL.to_string(),
        }
    }

    /// Point the backend at another endpoint
    pub fn with_base_url(url: impl Into<String>) -> Self {
        Self {
            html_url: url.into(),
        }
    }

    fn parse_html_results(
        &self,
        html: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let document = Html::parse_document(html);

        let result_selector = selector("div.result")?;
        let title_selector = selector("a.result__a")?;
        let snippet_selector = selector(".result__snippet")?;

        let mut results = Vec::new();
        let mut position = 1u32;

        for element in document.select(&result_selector) {
            if is_ad(&element) {
                continue;
            }

            let Some(title_elem) = element.select(&title_selector).next() else {
                continue;
            };

            let title = title_elem.text().collect::<String>();
            if title.trim().is_empty() {
                continue;
            }

            let Some(url) = title_elem.value().attr("href").and_then(resolve_link) else {
                continue;
            };

            let snippet = element
                .select(&snippet_selector)
                .next()
                .map(|s| s.text().collect::<String>())
                .unwrap_or_default();

            results.push(
                SearchResult::new(url, title, self.name())
                    .with_snippet(snippet)
                    .with_rank(position),
            );
            position += 1;

            if results.len() >= limit {
                break;
            }
        }

        Ok(results)
    }
}

impl Default for DuckDuckGo {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpBackend for DuckDuckGo {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn content_types(&self) -> Vec<ContentType> {
        vec![ContentType::Web, ContentType::News]
    }

    fn request(&self, params: &RequestParams) -> Result<HttpRequest, ProviderError> {
        let filters = &params.filters;
        let mut request = HttpRequest::post(&self.html_url)
            .form_field("q", &params.query)
            .form_field("b", "");

        // kl is "<region>-<lang>", "wt-wt" means no region
        let region = filters.region.as_deref().unwrap_or("wt").to_lowercase();
        let lang = filters.language.as_deref().unwrap_or("wt").to_lowercase();
        request = request.form_field("kl", format!("{}-{}", region, lang));

        if params.pageno > 1 {
            request = request
                .form_field("s", params.offset().to_string())
                .form_field("dc", (params.offset() + 1).to_string());
        }

        let kp = match filters.safe_search {
            SafeSearch::Strict => "1",
            SafeSearch::Moderate => "-1",
            SafeSearch::Off => "-2",
        };
        request = request.form_field("kp", kp);

        if let Some(range) = filters.date_range {
            let df = &range.as_time_range().as_str()[..1];
            request = request.form_field("df", df);
        }

        if filters.content_type == ContentType::News {
            request = request.form_field("iar", "news");
        }

        if let Some(lang) = filters.language.as_deref() {
            request = request.header("accept-language", crate::network::accept_language(lang));
        }

        Ok(request)
    }

    fn response(
        &self,
        response: HttpResponse,
        params: &RequestParams,
    ) -> Result<ResultPage, ProviderError> {
        let items = self.parse_html_results(&response.text, params.page_size as usize)?;
        Ok(ResultPage::new(items, params.pageno))
    }
}

fn selector(css: &str) -> Result<Selector, ProviderError> {
    Selector::parse(css).map_err(|e| ProviderError::Parse(format!("selector {}: {:?}", css, e)))
}

fn is_ad(element: &ElementRef) -> bool {
    element
        .value()
        .attr("class")
        .map(|c| c.contains("result--ad"))
        .unwrap_or(false)
}

/// Unwrap DuckDuckGo redirect links (`//duckduckgo.com/l/?uddg=...`) and
/// drop other internal links
fn resolve_link(href: &str) -> Option<String> {
    if let Some(start) = href.find("uddg=") {
        let encoded = href[start + 5..].split('&').next().unwrap_or_default();
        let decoded = urlencoding::decode(encoded).ok()?.into_owned();
        return Some(decoded).filter(|u| !u.is_empty());
    }
    if href.is_empty() || href.contains("duckduckgo.com") {
        return None;
    }
    Some(href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::HttpClient;
    use crate::providers::{HttpProvider, Provider};
    use crate::query::Query;
    use crate::search::Filters;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
<html><body>
  <div class="result results_links result--ad">
    <a class="result__a" href="https://ads.example.com">Sponsored</a>
  </div>
  <div class="result results_links">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">Rust Programming Language</a>
    <a class="result__snippet">A language empowering everyone.</a>
  </div>
  <div class="result results_links">
    <a class="result__a" href="https://doc.rust-lang.org/book/">The Rust Book</a>
    <a class="result__snippet">Learn Rust.</a>
  </div>
  <div class="result results_links">
    <a class="result__a" href="">No link</a>
  </div>
</body></html>
"#;

    #[test]
    fn test_request() {
        let ddg = DuckDuckGo::new();
        let filters = Filters::default()
            .with_safe_search(SafeSearch::Strict)
            .with_region("de")
            .with_language("de");
        let params = RequestParams::new(&Query::parse("rust -java"), &filters, 2, 10);
        let request = ddg.request(&params).unwrap();

        assert!(request.url.contains("duckduckgo.com"));
        assert_eq!(request.get_param("q"), Some("rust -java"));
        assert_eq!(request.get_param("kp"), Some("1"));
        assert_eq!(request.get_param("kl"), Some("de-de"));
        assert_eq!(request.get_param("s"), Some("10"));
    }

    #[test]
    fn test_parse_results() {
        let ddg = DuckDuckGo::new();
        let results = ddg.parse_html_results(PAGE, 10).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.rust-lang.org/");
        assert_eq!(results[0].source_domain, "rust-lang.org");
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].title, "The Rust Book");
        assert_eq!(results[1].snippet, "Learn Rust.");

        assert_eq!(ddg.parse_html_results(PAGE, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(
            resolve_link("//duckduckgo.com/l/?uddg=https%3A%2F%2Fa.com%2Fx&rut=1"),
            Some("https://a.com/x".to_string())
        );
        assert_eq!(resolve_link("https://duckduckgo.com/about"), None);
        assert_eq!(resolve_link(""), None);
    }

    #[tokio::test]
    async fn test_fetch_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("q=rust"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let client = Arc::new(HttpClient::new().unwrap());
        let provider = HttpProvider::new(DuckDuckGo::with_base_url(server.uri()), client)
            .with_id("ddg");
        let page = provider
            .fetch(&Query::parse("rust"), &Filters::default(), 1, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(page.len(), 2);
        assert!(page.items.iter().all(|r| r.provider_id == "ddg"));
        assert!(page.estimated_total.is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = Arc::new(HttpClient::new().unwrap());
        let provider = HttpProvider::new(DuckDuckGo::with_base_url(server.uri()), client);
        let result = provider
            .fetch(&Query::parse("rust"), &Filters::default(), 1, Duration::from_secs(5))
            .await;

        assert_eq!(result.unwrap_err(), ProviderError::RateLimited);
    }
}
