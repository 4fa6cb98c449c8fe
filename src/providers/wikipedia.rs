//! Wikipedia search provider

use super::traits::*;
use crate::error::ProviderError;
use crate::network::accept_json;
use crate::results::{ResultPage, SearchResult};
use crate::search::ContentType;
use scraper::Html;
use serde::Deserialize;

/// Wikipedia full text search through the MediaWiki API
pub struct Wikipedia {
    api_url: String,
    article_url: String,
    default_lang: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    query: Option<ApiQuery>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    searchinfo: Option<SearchInfo>,
    #[serde(default)]
    search: Vec<ApiHit>,
}

#[derive(Debug, Deserialize)]
struct SearchInfo {
    totalhits: u64,
}

#[derive(Debug, Deserialize)]
struct ApiHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

impl Wikipedia {
    pub fn new() -> Self {
        Self {
            api_url: "https://{lang}.wikipedia.org/w/api.php".to_string(),
            article_url: "https://{lang}.wikipedia.org/wiki/".to_string(),
            default_lang: "en".to_string(),
        }
    }

    /// Send API calls to another endpoint; article links still point at
    /// wikipedia.org
    pub fn with_base_url(url: impl Into<String>) -> Self {
        Self {
            api_url: url.into(),
            ..Self::new()
        }
    }

    fn lang<'a>(&'a self, lang: Option<&'a str>) -> &'a str {
        match lang {
            // Base language code ("en" from "en-US")
            Some(lang) if !lang.is_empty() => lang.split('-').next().unwrap_or(lang),
            _ => &self.default_lang,
        }
    }

    fn api_url(&self, lang: Option<&str>) -> String {
        self.api_url.replace("{lang}", self.lang(lang))
    }

    fn article_url(&self, lang: Option<&str>, title: &str) -> String {
        let slug = urlencoding::encode(&title.replace(' ', "_")).into_owned();
        format!(
            "{}{}",
            self.article_url.replace("{lang}", self.lang(lang)),
            slug
        )
    }
}

impl Default for Wikipedia {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpBackend for Wikipedia {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn content_types(&self) -> Vec<ContentType> {
        vec![ContentType::Web, ContentType::Academic]
    }

    fn request(&self, params: &RequestParams) -> Result<HttpRequest, ProviderError> {
        let mut request = HttpRequest::get(self.api_url(params.lang()))
            .header("accept", accept_json())
            .param("action", "query")
            .param("format", "json")
            .param("list", "search")
            .param("srsearch", &params.keywords)
            .param("srlimit", params.page_size.to_string())
            .param("srprop", "snippet");

        if params.pageno > 1 {
            request = request.param("sroffset", params.offset().to_string());
        }

        Ok(request)
    }

    fn response(
        &self,
        response: HttpResponse,
        params: &RequestParams,
    ) -> Result<ResultPage, ProviderError> {
        let body: ApiResponse = response.json()?;
        let query = body
            .query
            .ok_or_else(|| ProviderError::Parse("missing query object".to_string()))?;

        let lang = params.lang();
        let items = query
            .search
            .iter()
            .filter(|hit| !hit.title.is_empty())
            .enumerate()
            .map(|(i, hit)| {
                SearchResult::new(self.article_url(lang, &hit.title), &hit.title, self.name())
                    .with_snippet(strip_markup(&hit.snippet))
                    .with_rank(i as u32 + 1)
            })
            .collect();

        Ok(ResultPage::new(items, params.pageno)
            .with_estimated_total(query.searchinfo.map(|s| s.totalhits)))
    }
}

/// Search snippets carry `<span class="searchmatch">` highlights
fn strip_markup(snippet: &str) -> String {
    Html::parse_fragment(snippet)
        .root_element()
        .text()
        .collect::<String>()
}
