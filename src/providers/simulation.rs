//! Offline provider producing deterministic results

use super::traits::Provider;
use crate::error::ProviderError;
use crate::query::Query;
use crate::results::{ResultPage, SearchResult};
use crate::search::{ContentType, Filters};
use async_trait::async_trait;
use std::time::Duration;

/// Generates plausible results without touching the network
pub struct SimulationProvider {
    id: String,
    page_size: u32,
    total: u64,
    delay: Duration,
}

impl SimulationProvider {
    pub fn new() -> Self {
        Self {
            id: "simulation".to_string(),
            page_size: 10,
            total: 50,
            delay: Duration::from_millis(200),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Size of the simulated result set
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    /// Artificial latency per fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn featured(&self, query: &Query) -> Vec<SearchResult> {
        let text = query.keywords().to_lowercase();
        if text.contains("python") {
            vec![
                SearchResult::new("https://www.python.org/", "Python.org - Welcome to Python.org", &self.id)
                    .with_snippet("The official home of the Python Programming Language."),
                SearchResult::new("https://docs.python.org/3/tutorial/", "The Python Tutorial", &self.id)
                    .with_snippet("An informal introduction to Python programming."),
                SearchResult::new("https://en.wikipedia.org/wiki/Python_(genus)", "Python (genus)", &self.id)
                    .with_snippet("Python is a genus of constricting snakes."),
            ]
        } else if text.contains("rust") {
            vec![
                SearchResult::new("https://www.rust-lang.org/", "Rust Programming Language", &self.id)
                    .with_snippet("A language empowering everyone to build reliable software."),
                SearchResult::new("https://doc.rust-lang.org/book/", "The Rust Programming Language book", &self.id)
                    .with_snippet("An introductory book about Rust."),
            ]
        } else if text.contains("news") {
            vec![SearchResult::new("https://www.bbc.com/news", format!("Latest news: {}", query), &self.id)
                .with_snippet("Breaking news, analysis and features.")]
        } else {
            Vec::new()
        }
    }

    fn generic(&self, query: &Query, index: u64) -> SearchResult {
        let keywords = query.keywords();
        let slug = keywords.replace(' ', "-");
        SearchResult::new(
            format!("https://www.example{}.com/{}", index, slug),
            format!("{} - Resource #{}", keywords, index),
            &self.id,
        )
        .with_snippet(format!(
            "Additional information and resources about {} with detailed coverage.",
            keywords
        ))
    }
}

impl Default for SimulationProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for SimulationProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn content_types(&self) -> Vec<ContentType> {
        ContentType::ALL.to_vec()
    }

    async fn fetch(
        &self,
        query: &Query,
        _filters: &Filters,
        page: u32,
        timeout: Duration,
    ) -> Result<ResultPage, ProviderError> {
        if self.delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(ProviderError::Timeout);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let page = page.max(1);
        let start = (page as u64 - 1) * self.page_size as u64;
        let end = (start + self.page_size as u64).min(self.total);

        let mut items: Vec<SearchResult> = if page == 1 {
            self.featured(query)
        } else {
            Vec::new()
        };
        let mut index = start + items.len() as u64;
        while index < end {
            index += 1;
            items.push(self.generic(query, index));
        }
        items.truncate(end.saturating_sub(start) as usize);

        let items = items
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.with_rank(i as u32 + 1))
            .collect();

        Ok(ResultPage::new(items, page).with_estimated_total(Some(self.total)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SimulationProvider {
        SimulationProvider::new().with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_pages_are_full_until_the_end() {
        let sim = provider().with_total(25);
        let timeout = Duration::from_secs(1);
        let query = Query::parse("weather");

        let first = sim.fetch(&query, &Filters::default(), 1, timeout).await.unwrap();
        let last = sim.fetch(&query, &Filters::default(), 3, timeout).await.unwrap();
        let beyond = sim.fetch(&query, &Filters::default(), 4, timeout).await.unwrap();

        assert_eq!(first.len(), 10);
        assert_eq!(last.len(), 5);
        assert!(beyond.is_empty());
        assert_eq!(first.estimated_total, Some(25));
        assert_eq!(last.items[0].title, "weather - Resource #21");
    }

    #[tokio::test]
    async fn test_featured_results() {
        let page = provider()
            .fetch(&Query::parse("python"), &Filters::default(), 1, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(page.items[0].source_domain, "python.org");
        assert!(page.items.iter().any(|r| r.snippet.contains("snakes")));
        assert_eq!(page.len(), 10);
        let ranks: Vec<u32> = page.items.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        let sim = SimulationProvider::new().with_delay(Duration::from_millis(200));
        let result = sim
            .fetch(&Query::parse("x"), &Filters::default(), 1, Duration::from_millis(10))
            .await;
        assert_eq!(result.unwrap_err(), ProviderError::Timeout);
    }
}
