// src/ingest/store.rs
//! Persistence interface consumed by the pipeline, plus an in-memory store.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ingest::types::{DedupKey, Keyword, NewNewsItem, NewsItem, Source, SourceType};

#[async_trait]
pub trait NewsStore: Send + Sync {
    async fn enabled_sources(&self) -> Result<Vec<Source>>;
    async fn keywords(&self) -> Result<Vec<Keyword>>;
    /// Exact-triple lookup used by the deduplication gate.
    async fn find_news_item(&self, key: &DedupKey) -> Result<Option<NewsItem>>;
    async fn insert_news_item(&self, item: NewNewsItem) -> Result<NewsItem>;
    /// Items with `published_at >= since`, newest first.
    async fn news_since(&self, since: DateTime<Utc>) -> Result<Vec<NewsItem>>;
}

/// Query for listing stored news.
#[derive(Debug, Clone, Default)]
pub struct NewsQuery {
    /// Case-insensitive substring over title, summary, subject and position.
    pub text: Option<String>,
    pub source_name: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default)]
struct Inner {
    sources: Vec<Source>,
    keywords: Vec<Keyword>,
    news: Vec<NewsItem>,
    next_id: u64,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store. Lookups and inserts are separate lock scopes, so
/// check-then-insert is not atomic across concurrent runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source; `url` must be unique.
    pub fn add_source(
        &self,
        name: &str,
        url: &str,
        source_type: SourceType,
        is_enabled: bool,
    ) -> Result<Source> {
        let mut g = self.inner.write().expect("store lock poisoned");
        if g.sources.iter().any(|s| s.url == url) {
            bail!("source with url {url} already exists");
        }
        let source = Source {
            id: g.next_id(),
            name: name.trim().to_string(),
            url: url.trim().to_string(),
            source_type,
            is_enabled,
        };
        g.sources.push(source.clone());
        Ok(source)
    }

    pub fn set_source_enabled(&self, id: u64, enabled: bool) -> Result<Source> {
        let mut g = self.inner.write().expect("store lock poisoned");
        match g.sources.iter_mut().find(|s| s.id == id) {
            Some(s) => {
                s.is_enabled = enabled;
                Ok(s.clone())
            }
            None => bail!("source {id} not found"),
        }
    }

    /// Bulk toggle; returns how many sources changed state.
    pub fn set_all_sources_enabled(&self, enabled: bool) -> usize {
        let mut g = self.inner.write().expect("store lock poisoned");
        let mut changed = 0;
        for s in g.sources.iter_mut().filter(|s| s.is_enabled != enabled) {
            s.is_enabled = enabled;
            changed += 1;
        }
        changed
    }

    /// Removes the source and clears the back-reference on its news items.
    pub fn delete_source(&self, id: u64) -> Result<Source> {
        let mut g = self.inner.write().expect("store lock poisoned");
        let Some(pos) = g.sources.iter().position(|s| s.id == id) else {
            bail!("source {id} not found");
        };
        let removed = g.sources.remove(pos);
        for item in g.news.iter_mut().filter(|n| n.source_id == Some(id)) {
            item.source_id = None;
        }
        Ok(removed)
    }

    pub fn sources(&self) -> Vec<Source> {
        self.inner.read().expect("store lock poisoned").sources.clone()
    }

    /// Adds a keyword unless the same text (case-insensitive) already exists.
    pub fn add_keyword(&self, text: &str) -> Option<Keyword> {
        let t = text.trim();
        if t.is_empty() {
            return None;
        }
        let mut g = self.inner.write().expect("store lock poisoned");
        let lowered = t.to_lowercase();
        if let Some(existing) = g.keywords.iter().find(|k| k.text.to_lowercase() == lowered) {
            return Some(existing.clone());
        }
        let kw = Keyword {
            id: g.next_id(),
            text: t.to_string(),
        };
        g.keywords.push(kw.clone());
        Some(kw)
    }

    pub fn list_news(&self, q: &NewsQuery) -> Vec<NewsItem> {
        let g = self.inner.read().expect("store lock poisoned");
        let needle = q.text.as_ref().map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
        let mut out: Vec<NewsItem> = g
            .news
            .iter()
            .filter(|n| {
                q.source_name
                    .as_ref()
                    .map_or(true, |s| n.source_name.to_lowercase() == s.trim().to_lowercase())
            })
            .filter(|n| {
                needle
                    .as_ref()
                    .map_or(true, |k| news_text(n).contains(k.as_str()))
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        if let Some(limit) = q.limit {
            out.truncate(limit);
        }
        out
    }

    pub fn news_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").news.len()
    }
}

fn news_text(n: &NewsItem) -> String {
    format!(
        "{} {} {} {}",
        n.title,
        n.summary,
        n.subject.as_deref().unwrap_or_default(),
        n.position.as_deref().unwrap_or_default()
    )
    .to_lowercase()
}

#[async_trait]
impl NewsStore for InMemoryStore {
    async fn enabled_sources(&self) -> Result<Vec<Source>> {
        let g = self.inner.read().expect("store lock poisoned");
        Ok(g.sources.iter().filter(|s| s.is_enabled).cloned().collect())
    }

    async fn keywords(&self) -> Result<Vec<Keyword>> {
        Ok(self.inner.read().expect("store lock poisoned").keywords.clone())
    }

    async fn find_news_item(&self, key: &DedupKey) -> Result<Option<NewsItem>> {
        let g = self.inner.read().expect("store lock poisoned");
        Ok(g.news.iter().find(|n| n.dedup_key() == *key).cloned())
    }

    async fn insert_news_item(&self, item: NewNewsItem) -> Result<NewsItem> {
        let mut g = self.inner.write().expect("store lock poisoned");
        let stored = NewsItem {
            id: g.next_id(),
            title: item.title,
            content: item.content,
            summary: item.summary,
            source_url: item.source_url,
            source_name: item.source_name,
            source_id: item.source_id,
            document_ref: item.document_ref,
            tax_type: item.tax_type,
            subject: item.subject,
            position: item.position,
            published_at: item.published_at,
        };
        g.news.push(stored.clone());
        Ok(stored)
    }

    async fn news_since(&self, since: DateTime<Utc>) -> Result<Vec<NewsItem>> {
        let g = self.inner.read().expect("store lock poisoned");
        let mut out: Vec<NewsItem> = g
            .news
            .iter()
            .filter(|n| n.published_at >= since)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(out)
    }
}
