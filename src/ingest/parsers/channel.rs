// src/ingest/parsers/channel.rs
//! Messaging channels, read through their public web mirror (`t.me/s/<id>`).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use url::Url;

use super::html::{
    compile, first_attr, first_date_text, resolve_date, resolve_link, scan_text_blocks,
    split_title_summary, text_chunks,
};
use super::{collect_from_pages, finalize, DatePolicy, ExtractionError, ExtractionParser};
use crate::ingest::fetch::ResilientFetcher;
use crate::ingest::types::{CandidateArticle, Source};


/// Channel posts carry no trustworthy "archive" semantics; a post without a
/// readable timestamp is treated as fresh.
pub const CHANNEL_DATE_POLICY: DatePolicy = DatePolicy::AssumeNow;

const MIRROR_BASE: &str = "https://t.me/s/";

static RE_CHANNEL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{3,}$").expect("channel id regex"));

pub struct ChannelParser {
    fetcher: Arc<ResilientFetcher>,
}

impl ChannelParser {
    pub fn new(fetcher: Arc<ResilientFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ExtractionParser for ChannelParser {
    fn name(&self) -> &str {
        "channel"
    }

    async fn extract(
        &self,
        source: &Source,
        keywords: &[String],
    ) -> Result<Vec<CandidateArticle>, ExtractionError> {
        let mirror = channel_mirror_url(&source.url)
            .ok_or_else(|| ExtractionError::ChannelId(source.url.clone()))?;
        let now = Utc::now();
        let found = collect_from_pages(&self.fetcher, "channel", &[mirror], |body, page_url| {
            extract_channel_posts(body, page_url, now)
        })
        .await?;
        Ok(finalize(found, keywords, Some(source.name.as_str()), None))
    }
}

/// Canonical public mirror for a channel reference: `https://t.me/name`,
/// `t.me/s/name`, `@name`, `tg://resolve?domain=name` or a bare `name`.
pub fn channel_mirror_url(reference: &str) -> Option<String> {
    let r = reference.trim();
    let id = if let Some(rest) = r.strip_prefix('@') {
        rest.to_string()
    } else if r.starts_with("tg://") {
        let parsed = Url::parse(r).ok()?;
        parsed
            .query_pairs()
            .find(|(k, _)| k == "domain")
            .map(|(_, v)| v.into_owned())?
    } else if r.contains("t.me/") || r.contains("telegram.me/") {
        let with_scheme = if r.starts_with("http") {
            r.to_string()
        } else {
            format!("https://{r}")
        };
        let parsed = Url::parse(&with_scheme).ok()?;
        let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
        match segments.next()? {
            "s" => segments.next()?.to_string(),
            first => first.to_string(),
        }
    } else {
        r.to_string()
    };

    RE_CHANNEL_ID
        .is_match(&id)
        .then(|| format!("{MIRROR_BASE}{id}"))
}

/// True when `url` names a channel: `t.me`/`telegram.me` links, `tg://resolve`,
/// `@id` or a bare id.
pub fn is_channel_reference(url: &str) -> bool {
    channel_mirror_url(url).is_some()
}

/// Posts from a mirror page: text, timestamp and permalink per message. Falls
/// back to block scanning when the post structure is missing.
pub fn extract_channel_posts(
    html: &str,
    page_url: &Url,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateArticle>, ExtractionError> {
    let doc = Html::parse_document(html);
    let message = compile(".tgme_widget_message")?;
    let text = compile(".tgme_widget_message_text")?;
    let time = compile(".tgme_widget_message_date time, time[datetime]")?;
    let permalink = compile("a.tgme_widget_message_date")?;

    let mut out = Vec::new();
    for post in doc.select(&message) {
        let Some(body) = post.select(&text).next() else {
            continue;
        };
        let chunks = text_chunks(&body);
        if chunks.is_empty() {
            continue;
        }
        let (title, summary) = split_title_summary(&chunks);

        let url = first_attr(&post, std::slice::from_ref(&permalink), "href")
            .and_then(|h| resolve_link(page_url, &h))
            .or_else(|| {
                post.value()
                    .attr("data-post")
                    .map(|p| format!("https://t.me/{p}"))
            })
            .unwrap_or_else(|| page_url.to_string());

        let date_text = first_date_text(&post, std::slice::from_ref(&time));
        let Some(published) = resolve_date(date_text.as_deref(), CHANNEL_DATE_POLICY, now) else {
            continue;
        };

        let mut a = CandidateArticle::new(title, summary, url);
        a.published_date = published;
        out.push(a);
    }

    if out.is_empty() {
        tracing::info!(target: "ingest", page = %page_url, "no channel posts found, scanning text blocks");
        return scan_text_blocks(&doc, page_url, CHANNEL_DATE_POLICY, now);
    }
    Ok(out)
}
