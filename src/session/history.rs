//! Bounded search history

use crate::query::Query;
use crate::search::Filters;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// One submitted search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Query as typed, with its parsed operators
    pub query: Query,
    pub filters: Filters,
    pub timestamp: DateTime<Utc>,
    /// Items on the first page
    #[serde(default)]
    pub result_count: usize,
}

impl HistoryEntry {
    pub fn new(query: Query, filters: Filters, result_count: usize) -> Self {
        Self {
            query,
            filters,
            timestamp: Utc::now(),
            result_count,
        }
    }
}

/// Append-only history holding at most `max_entries`, oldest evicted first
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    max_entries: usize,
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    /// Entries, oldest first
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Most recent entries, newest first
    pub fn recent(&self, n: usize) -> Vec<&HistoryEntry> {
        self.entries.iter().rev().take(n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Load history from a JSON file; a missing file is an empty history
    pub fn load_from(path: &Path, max_entries: usize) -> Result<Self> {
        let mut history = Self::new(max_entries);
        if !path.exists() {
            return Ok(history);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let entries: Vec<HistoryEntry> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        for entry in entries {
            history.push(entry);
        }
        Ok(history)
    }

    /// Write history as JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entries: Vec<&HistoryEntry> = self.entries.iter().collect();
        let content = serde_json::to_string_pretty(&entries)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
