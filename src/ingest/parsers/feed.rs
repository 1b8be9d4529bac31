// src/ingest/parsers/feed.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use url::Url;

use super::descriptors::FeedDescriptor;
use super::html::{resolve_date, resolve_link, truncate_chars, SUMMARY_MAX_CHARS};
use super::{collect_from_pages, finalize, DatePolicy, ExtractionError, ExtractionParser};
use crate::ingest::fetch::ResilientFetcher;
use crate::ingest::normalize_text;
use crate::ingest::types::{CandidateArticle, PublishedDate, Source};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(default)]
    category: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(default)]
    link: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Syndication feeds: RSS 2.0, with Atom as a second attempt.
pub struct FeedParser {
    descriptor: &'static FeedDescriptor,
    fetcher: Arc<ResilientFetcher>,
}

impl FeedParser {
    pub fn new(descriptor: &'static FeedDescriptor, fetcher: Arc<ResilientFetcher>) -> Self {
        Self { descriptor, fetcher }
    }
}

#[async_trait]
impl ExtractionParser for FeedParser {
    fn name(&self) -> &str {
        self.descriptor.name
    }

    async fn extract(
        &self,
        source: &Source,
        keywords: &[String],
    ) -> Result<Vec<CandidateArticle>, ExtractionError> {
        let d = self.descriptor;
        let now = Utc::now();
        let pages: Vec<String> = if d.feed_urls.is_empty() {
            vec![source.url.clone()]
        } else {
            d.feed_urls.iter().map(|u| u.to_string()).collect()
        };
        let found = collect_from_pages(&self.fetcher, d.name, &pages, |body, page_url| {
            parse_feed(body, page_url, d.date_policy, now)
        })
        .await?;
        Ok(finalize(found, keywords, d.fallback_subject, None))
    }
}

/// Parse a feed document into candidates. The keyword filter is not applied here.
pub fn parse_feed(
    xml: &str,
    page_url: &Url,
    policy: DatePolicy,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateArticle>, ExtractionError> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);

    let out = match from_str::<Rss>(&xml_clean) {
        Ok(rss) => rss
            .channel
            .item
            .into_iter()
            .filter_map(|it| {
                let categories = it.category;
                build_candidate(
                    it.title,
                    it.description,
                    it.link,
                    it.pub_date,
                    page_url,
                    policy,
                    now,
                )
                .map(|mut a| {
                    a.subject = categories.into_iter().map(|c| normalize_text(&c)).find(|c| !c.is_empty());
                    a
                })
            })
            .collect::<Vec<_>>(),
        Err(rss_err) => {
            if !xml_clean.contains("<feed") {
                return Err(ExtractionError::Feed(format!("not RSS ({rss_err}) nor Atom")));
            }
            let atom: AtomFeed = from_str(&xml_clean).map_err(|atom_err| {
                ExtractionError::Feed(format!("not RSS ({rss_err}) nor Atom ({atom_err})"))
            })?;
            atom.entry
                .into_iter()
                .filter_map(|e| {
                    let link = e
                        .link
                        .into_iter()
                        .find(|l| l.rel.as_deref().unwrap_or("alternate") == "alternate")
                        .and_then(|l| l.href);
                    build_candidate(
                        e.title,
                        e.summary,
                        link,
                        e.published.or(e.updated),
                        page_url,
                        policy,
                        now,
                    )
                })
                .collect()
        }
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    Ok(out)
}

fn build_candidate(
    title: Option<String>,
    description: Option<String>,
    link: Option<String>,
    date: Option<String>,
    page_url: &Url,
    policy: DatePolicy,
    now: DateTime<Utc>,
) -> Option<CandidateArticle> {
    let title = normalize_text(title.as_deref().unwrap_or_default());
    if title.is_empty() {
        return None;
    }
    let summary = normalize_text(description.as_deref().unwrap_or_default());

    let published = match date.as_deref().and_then(parse_rfc2822) {
        Some(ts) => PublishedDate::At(ts),
        None => resolve_date(date.as_deref(), policy, now)?,
    };

    let url = link
        .and_then(|l| resolve_link(page_url, &l))
        .unwrap_or_else(|| page_url.to_string());

    let mut a = CandidateArticle::new(title, truncate_chars(&summary, SUMMARY_MAX_CHARS), url);
    a.published_date = published;
    Some(a)
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond()))
}

/// XML has no named entities beyond the basic five; feeds still ship HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&laquo;", "«")
        .replace("&raquo;", "»")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "…")
}
