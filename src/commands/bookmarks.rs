//! Saved results

use crate::results::SearchResult;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A saved result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub title: String,
    pub url: String,
    /// Query that found it
    #[serde(default)]
    pub query: String,
    pub saved_at: DateTime<Utc>,
}

impl Bookmark {
    pub fn from_result(result: &SearchResult, query: impl Into<String>) -> Self {
        Self {
            title: result.title.clone(),
            url: result.url.clone(),
            query: query.into(),
            saved_at: Utc::now(),
        }
    }
}

/// Bookmark storage keyed by URL
pub trait BookmarkStore: Send {
    /// Save a bookmark; returns `false` when the URL is already saved
    fn save(&mut self, bookmark: Bookmark) -> Result<bool>;

    /// All bookmarks, oldest first
    fn list(&self) -> &[Bookmark];
}

/// Bookmarks kept only for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryBookmarkStore {
    bookmarks: Vec<Bookmark>,
}

impl MemoryBookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BookmarkStore for MemoryBookmarkStore {
    fn save(&mut self, bookmark: Bookmark) -> Result<bool> {
        Ok(insert(&mut self.bookmarks, bookmark))
    }

    fn list(&self) -> &[Bookmark] {
        &self.bookmarks
    }
}

/// Bookmarks persisted as a JSON array, rewritten on every save
#[derive(Debug)]
pub struct JsonBookmarkStore {
    path: PathBuf,
    bookmarks: Vec<Bookmark>,
}

impl JsonBookmarkStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bookmarks = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Vec::new()
        };
        Ok(Self { path, bookmarks })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.bookmarks)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

impl BookmarkStore for JsonBookmarkStore {
    fn save(&mut self, bookmark: Bookmark) -> Result<bool> {
        if !insert(&mut self.bookmarks, bookmark) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn list(&self) -> &[Bookmark] {
        &self.bookmarks
    }
}

fn insert(bookmarks: &mut Vec<Bookmark>, bookmark: Bookmark) -> bool {
    if bookmarks.iter().any(|b| b.url == bookmark.url) {
        return false;
    }
    bookmarks.push(bookmark);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmark(url: &str) -> Bookmark {
        Bookmark::from_result(&SearchResult::new(url, "Title", "sim"), "rust")
    }

    #[test]
    fn test_same_url_saved_once() {
        let mut store = MemoryBookmarkStore::new();
        assert!(store.save(bookmark("https://a.com")).unwrap());
        assert!(!store.save(bookmark("https://a.com")).unwrap());
        assert!(store.save(bookmark("https://b.com")).unwrap());
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_json_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("termsearch").join("bookmarks.json");

        let mut store = JsonBookmarkStore::open(&path).unwrap();
        assert!(store.list().is_empty());
        store.save(bookmark("https://a.com")).unwrap();
        store.save(bookmark("https://a.com")).unwrap();

        let reopened = JsonBookmarkStore::open(&path).unwrap();
        assert_eq!(reopened.list().len(), 1);
        assert_eq!(reopened.list()[0].query, "rust");
    }
}
