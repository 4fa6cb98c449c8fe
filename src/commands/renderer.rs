//! Console output

use super::bookmarks::Bookmark;
use super::HELP;
use crate::config::{DisplaySettings, Settings};
use crate::metrics::MetricsSnapshot;
use crate::search::Filters;
use crate::session::{HistoryEntry, View};
use std::io::{self, Write};

/// Presents session output to the user
pub trait Renderer: Send {
    /// A dispatch is about to start
    fn searching(&mut self, query: &str, page: u32) -> io::Result<()>;

    /// The page now on screen
    fn page(&mut self, view: &View, last_page: Option<u32>) -> io::Result<()>;

    fn filters(&mut self, filters: &Filters) -> io::Result<()>;

    /// History entries, newest first
    fn history(&mut self, entries: &[&HistoryEntry]) -> io::Result<()>;

    fn bookmarks(&mut self, bookmarks: &[Bookmark]) -> io::Result<()>;

    fn stats(&mut self, stats: &MetricsSnapshot) -> io::Result<()>;

    /// Effective configuration after files, environment and flags
    fn settings(&mut self, settings: &Settings) -> io::Result<()>;

    fn help(&mut self) -> io::Result<()>;

    /// Informational one-liner
    fn notice(&mut self, message: &str) -> io::Result<()>;

    fn error(&mut self, message: &str) -> io::Result<()>;

    fn prompt(&mut self) -> io::Result<()>;
}

/// Plain text renderer over any writer
pub struct PlainRenderer<W> {
    out: W,
    display: DisplaySettings,
}

impl PlainRenderer<io::Stdout> {
    pub fn stdout(display: DisplaySettings) -> Self {
        Self::new(io::stdout(), display)
    }
}

impl<W: Write> PlainRenderer<W> {
    pub fn new(out: W, display: DisplaySettings) -> Self {
        Self { out, display }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for PlainRenderer<W> {
    fn searching(&mut self, query: &str, page: u32) -> io::Result<()> {
        if page > 1 {
            writeln!(self.out, "Searching '{}' (page {})...", query, page)
        } else {
            writeln!(self.out, "Searching '{}'...", query)
        }
    }

    fn page(&mut self, view: &View, last_page: Option<u32>) -> io::Result<()> {
        let page = &view.page;
        if page.is_empty() {
            writeln!(self.out, "No results for '{}'", view.query)?;
            return self.out.flush();
        }

        let total = match page.estimated_total {
            Some(total) => format!("about {} results", total),
            None => "unknown number of results".to_string(),
        };
        let pages = match last_page {
            Some(last) => format!("page {} of {}", view.page_number, last),
            None => format!("page {}", view.page_number),
        };
        let cached = if view.from_cache { ", cached" } else { "" };
        writeln!(self.out, "\n{} ({}, {}{})", view.query, total, pages, cached)?;

        for (i, result) in page.items.iter().enumerate() {
            writeln!(self.out, "\n{:>2}. {}", i + 1, result.title)?;
            if self.display.show_urls {
                writeln!(self.out, "    {}", result.url)?;
            }
            let snippet = truncate(&result.snippet, self.display.max_snippet_length);
            if !snippet.is_empty() {
                writeln!(self.out, "    {}", snippet)?;
            }
            if self.display.show_provider {
                writeln!(self.out, "    [{}]", result.provider_id)?;
            }
        }

        if !view.failed.is_empty() {
            let names: Vec<&str> = view.failed.iter().map(|f| f.provider.as_str()).collect();
            writeln!(self.out, "\n(no answer from: {})", names.join(", "))?;
        }
        writeln!(self.out)?;
        self.out.flush()
    }

    fn filters(&mut self, filters: &Filters) -> io::Result<()> {
        writeln!(self.out, "Filters: {}", filters.summary())?;
        writeln!(self.out, "Presets: {}", Filters::preset_names().join(", "))
    }

    fn history(&mut self, entries: &[&HistoryEntry]) -> io::Result<()> {
        if entries.is_empty() {
            return writeln!(self.out, "No searches yet");
        }
        for (i, entry) in entries.iter().enumerate() {
            let filters = if entry.filters.is_active() {
                format!(" [{}]", entry.filters.summary())
            } else {
                String::new()
            };
            writeln!(
                self.out,
                "{:>2}. {}  {} ({} results){}",
                i + 1,
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.query,
                entry.result_count,
                filters
            )?;
        }
        Ok(())
    }

    fn bookmarks(&mut self, bookmarks: &[Bookmark]) -> io::Result<()> {
        if bookmarks.is_empty() {
            return writeln!(self.out, "No bookmarks");
        }
        for (i, bookmark) in bookmarks.iter().enumerate() {
            writeln!(self.out, "{:>2}. {}\n    {}", i + 1, bookmark.title, bookmark.url)?;
        }
        Ok(())
    }

    fn stats(&mut self, stats: &MetricsSnapshot) -> io::Result<()> {
        writeln!(self.out, "Searches:   {}", stats.total_searches)?;
        writeln!(
            self.out,
            "Cache hits: {} ({:.1}%)",
            stats.cache_hits, stats.cache_hit_rate
        )?;
        writeln!(self.out, "Failed:     {}", stats.failed_searches)?;
        for (name, provider) in &stats.providers {
            let avg = provider
                .avg_response_time
                .map(|ms| format!("{} ms", ms))
                .unwrap_or_else(|| "n/a".to_string());
            writeln!(
                self.out,
                "  {:<12} ok {:<4} errors {:<4} avg {:<8} reliability {:.0}%",
                name, provider.successes, provider.errors, avg, provider.reliability
            )?;
        }
        Ok(())
    }

    fn settings(&mut self, settings: &Settings) -> io::Result<()> {
        let providers: Vec<&str> = settings
            .enabled_providers()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        let history = match settings.history_path() {
            Some(path) => format!("saved to {}", path.display()),
            None => "not saved".to_string(),
        };

        writeln!(self.out, "Results per page: {}", settings.search.results_per_page)?;
        writeln!(self.out, "Provider timeout: {:?}", settings.provider_timeout())?;
        writeln!(self.out, "Dispatch timeout: {:?}", settings.dispatch_timeout())?;
        writeln!(
            self.out,
            "Cache:            {} pages, ttl {:?}",
            settings.cache.max_entries,
            settings.cache_ttl()
        )?;
        writeln!(
            self.out,
            "History:          {} entries, {}",
            settings.history.max_entries, history
        )?;
        writeln!(
            self.out,
            "Default filters:  {}",
            settings.search.default_filters.summary()
        )?;
        writeln!(self.out, "Providers:        {}", providers.join(", "))
    }

    fn help(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", HELP)
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{}", message)
    }

    fn error(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "error: {}", message)
    }

    fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "search> ")?;
        self.out.flush()
    }
}

/// Cut `text` to at most `max` characters, marking the cut with "..."
fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}
