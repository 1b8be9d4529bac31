// src/ingest/parsers/mod.rs
//! Extraction parsers: fetched document -> candidate articles.
//!
//! Every parser returns `Result<Vec<CandidateArticle>, ExtractionError>`; nothing
//! escapes the parser boundary any other way. The orchestrator turns an `Err`
//! into a per-source error string and zero articles.

pub mod channel;
pub mod descriptors;
pub mod dispatch;
pub mod feed;
pub mod html;
pub mod site;
pub mod universal;

use std::collections::HashSet;

use async_trait::async_trait;
use url::Url;

use crate::ingest::classify;
use crate::ingest::fetch::{FetchError, ResilientFetcher};
use crate::ingest::filter::filter_by_keywords;
use crate::ingest::types::{CandidateArticle, Source};

pub use dispatch::ParserDispatcher;

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid page url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
    #[error("cannot resolve channel id from {0:?}")]
    ChannelId(String),
    #[error("feed parse error: {0}")]
    Feed(String),
    #[error("model extraction failed: {0}")]
    Model(String),
}

/// What to do with a candidate whose date text cannot be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePolicy {
    /// Drop it. Archive-like sites must not get a fabricated date.
    Require,
    /// Use the current instant. Channel-style feeds are assumed recent.
    AssumeNow,
    /// Keep `"unknown"`; persistence coerces it to now.
    Unknown,
}

#[async_trait]
pub trait ExtractionParser: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(
        &self,
        source: &Source,
        keywords: &[String],
    ) -> Result<Vec<CandidateArticle>, ExtractionError>;
}

/// Fetch every page and run `extract` on each body. A failing page is logged and
/// skipped; the error is returned only when no page succeeded. Unreachable pages
/// (`Ok(None)` from the fetcher) count as empty, not failed.
pub(crate) async fn collect_from_pages<F>(
    fetcher: &ResilientFetcher,
    parser: &str,
    pages: &[String],
    extract: F,
) -> Result<Vec<CandidateArticle>, ExtractionError>
where
    F: Fn(&str, &Url) -> Result<Vec<CandidateArticle>, ExtractionError> + Sync,
{
    let mut out = Vec::new();
    let mut last_err = None;
    let mut any_ok = false;

    for page in pages {
        match fetch_and_extract(fetcher, page, &extract).await {
            Ok(found) => {
                any_ok = true;
                tracing::debug!(target: "ingest", parser, %page, found = found.len(), "page extracted");
                out.extend(found);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", parser, %page, error = %e, "page extraction failed");
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) if !any_ok => Err(e),
        _ => Ok(dedup_by_link(out)),
    }
}

async fn fetch_and_extract<F>(
    fetcher: &ResilientFetcher,
    page: &str,
    extract: &F,
) -> Result<Vec<CandidateArticle>, ExtractionError>
where
    F: Fn(&str, &Url) -> Result<Vec<CandidateArticle>, ExtractionError> + Sync,
{
    let page_url = Url::parse(page)?;
    match fetcher.fetch_with_retry(page).await? {
        Some(body) => extract(&body, &page_url),
        None => Ok(Vec::new()),
    }
}

/// Auxiliary pages often overlap; keep the first `(title, url)` occurrence.
fn dedup_by_link(articles: Vec<CandidateArticle>) -> Vec<CandidateArticle> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert((a.title.clone(), a.url.clone())))
        .collect()
}

/// Shared tail of every parser: descriptor fallbacks, enrichment, keyword filter.
pub(crate) fn finalize(
    mut articles: Vec<CandidateArticle>,
    keywords: &[String],
    fallback_subject: Option<&str>,
    fallback_position: Option<&str>,
) -> Vec<CandidateArticle> {
    for a in articles.iter_mut() {
        if a.subject.is_none() {
            a.subject = fallback_subject.map(str::to_string);
        }
        if a.position.is_none() {
            a.position = fallback_position.map(str::to_string);
        }
        classify::enrich(a);
    }
    filter_by_keywords(articles, keywords)
}
