// src/ingest/dedup.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::ingest::parsers::html::truncate_chars;
use crate::ingest::store::NewsStore;
use crate::ingest::types::{CandidateArticle, DedupKey, NewNewsItem, NewsItem, Source};

/// Stored summaries are capped; the full text stays in `content`.
pub const SUMMARY_MAX_CHARS: usize = 300;

/// Dedup key a candidate would be stored under.
pub fn candidate_key(article: &CandidateArticle, source: &Source) -> DedupKey {
    DedupKey {
        title: article.title.clone(),
        source_url: source_url_for(article, source),
        source_name: source.name.clone(),
    }
}

fn source_url_for(article: &CandidateArticle, source: &Source) -> String {
    if article.url.trim().is_empty() {
        source.url.clone()
    } else {
        article.url.clone()
    }
}

/// Inserts the candidate unless an item with the same
/// `(title, source_url, source_name)` already exists.
///
/// Returns `Ok(None)` for a duplicate. An unknown publish date is stored as `now`.
pub async fn persist_if_new(
    store: &dyn NewsStore,
    article: &CandidateArticle,
    source: &Source,
    now: DateTime<Utc>,
) -> Result<Option<NewsItem>> {
    let key = candidate_key(article, source);
    let existing = store
        .find_news_item(&key)
        .await
        .with_context(|| format!("dedup lookup for {:?}", key.title))?;
    if existing.is_some() {
        tracing::debug!(target: "ingest", source = %source.name, title = %key.title, "duplicate skipped");
        return Ok(None);
    }

    let item = NewNewsItem {
        title: key.title,
        content: article.summary.clone(),
        summary: truncate_chars(&article.summary, SUMMARY_MAX_CHARS),
        source_url: key.source_url,
        source_name: key.source_name,
        source_id: Some(source.id),
        document_ref: article.document_ref.clone(),
        tax_type: article.tax_type.clone(),
        subject: article.subject.clone(),
        position: article.position.clone(),
        published_at: article.published_date.instant().unwrap_or(now),
    };
    let stored = store
        .insert_news_item(item)
        .await
        .context("insert news item")?;
    Ok(Some(stored))
}
