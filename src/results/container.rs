//! Merge container for combining provider pages into one ranked page

use super::types::*;
use crate::error::ProviderFailure;
use crate::query::Query;
use std::collections::HashSet;

/// Collects the outcome of every provider asked during one dispatch
#[derive(Debug, Default)]
pub struct MergeContainer {
    /// (configured provider order, provider id, page)
    pages: Vec<(usize, String, ResultPage)>,
    failures: Vec<ProviderFailure>,
}

impl MergeContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful provider page.
    ///
    /// `order` is the provider's position in the configured provider list
    /// and breaks ties between equal provider-reported positions.
    pub fn add_page(&mut self, order: usize, provider: &str, page: ResultPage) {
        self.pages.push((order, provider.to_string(), page));
    }

    /// Record a failed provider
    pub fn add_failure(&mut self, failure: ProviderFailure) {
        self.failures.push(failure);
    }

    pub fn has_success(&self) -> bool {
        !self.pages.is_empty()
    }

    /// Providers that answered, in configured order
    pub fn succeeded(&self) -> Vec<String> {
        let mut ordered: Vec<&(usize, String, ResultPage)> = self.pages.iter().collect();
        ordered.sort_by_key(|(order, _, _)| *order);
        ordered.into_iter().map(|(_, id, _)| id.clone()).collect()
    }

    pub fn failures(&self) -> &[ProviderFailure] {
        &self.failures
    }

    /// Merge all provider pages into one page.
    ///
    /// Results are filtered by the query's `+`, `-` and `site:` operators,
    /// ordered by provider-reported position (configured provider order
    /// breaks ties), de-duplicated by normalized URL keeping the first
    /// occurrence, and ranked 1..N.
    pub fn merge(&self, query: &Query, page_number: u32) -> ResultPage {
        let mut candidates: Vec<(u32, usize, usize, &SearchResult)> = Vec::new();
        for (order, _, page) in &self.pages {
            for (index, result) in page.items.iter().enumerate() {
                let position = if result.rank > 0 {
                    result.rank
                } else {
                    index as u32 + 1
                };
                candidates.push((position, *order, index, result));
            }
        }
        candidates.sort_by_key(|(position, order, index, _)| (*position, *order, *index));

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for (_, _, _, result) in candidates {
            if !Self::admits(query, result) {
                continue;
            }
            if !seen.insert(result.dedup_key()) {
                continue;
            }
            let mut result = result.clone();
            result.rank = items.len() as u32 + 1;
            items.push(result);
        }

        let estimated_total = self
            .pages
            .iter()
            .filter_map(|(_, _, page)| page.estimated_total)
            .max();

        ResultPage::new(items, page_number).with_estimated_total(estimated_total)
    }

    fn admits(query: &Query, result: &SearchResult) -> bool {
        let domain = if result.source_domain.is_empty() {
            domain_of(&result.url).unwrap_or_default()
        } else {
            result.source_domain.clone()
        };
        query.matches_text(&result.searchable_text()) && query.matches_domain(&domain)
    }
}
