// src/ingest/parsers/html.rs
//! Generic, selector-driven extraction engine plus the text-block fallback.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{DatePolicy, ExtractionError};
use crate::ingest::dates;
use crate::ingest::types::{CandidateArticle, PublishedDate};

/// Rendered-text band for the fallback scan, in characters.
pub const BLOCK_MIN_CHARS: usize = 100;
pub const BLOCK_MAX_CHARS: usize = 2_000;

pub const TITLE_MAX_CHARS: usize = 200;
/// Summary cap shared by the selector path and the block fallback.
pub const SUMMARY_MAX_CHARS: usize = 500;
const BLOCK_SELECTOR: &str = "p, div, article, section, li, blockquote, td";
const SKIP_TEXT_IN: &[&str] = &["script", "style", "noscript", "template"];

/// One candidate layout: container element plus per-field fallback selectors
/// (relative to the container, first non-empty match wins).
#[derive(Debug)]
pub struct SelectorGroup {
    pub container: &'static str,
    pub title: &'static [&'static str],
    pub summary: &'static [&'static str],
    pub link: &'static [&'static str],
    pub date: &'static [&'static str],
}

/// Try `groups` in order and stop at the first one yielding anything; if none
/// does, fall back to [`scan_text_blocks`].
pub fn extract_with_groups(
    html: &str,
    page_url: &Url,
    groups: &[SelectorGroup],
    policy: DatePolicy,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateArticle>, ExtractionError> {
    let doc = Html::parse_document(html);
    for group in groups {
        let found = extract_group(&doc, page_url, group, policy, now)?;
        if !found.is_empty() {
            tracing::debug!(target: "ingest", container = group.container, found = found.len(), "selector group matched");
            return Ok(found);
        }
    }
    tracing::info!(target: "ingest", page = %page_url, "no selector group matched, scanning text blocks");
    scan_text_blocks(&doc, page_url, policy, now)
}

fn extract_group(
    doc: &Html,
    page_url: &Url,
    group: &SelectorGroup,
    policy: DatePolicy,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateArticle>, ExtractionError> {
    let container = compile(group.container)?;
    let title_sels = compile_all(group.title)?;
    let summary_sels = compile_all(group.summary)?;
    let link_sels = compile_all(group.link)?;
    let date_sels = compile_all(group.date)?;

    let mut out = Vec::new();
    for el in doc.select(&container) {
        let Some(title) = first_text(&el, &title_sels) else {
            continue;
        };
        let summary = first_text(&el, &summary_sels).unwrap_or_default();
        let href = first_attr(&el, &link_sels, "href").or_else(|| {
            (el.value().name() == "a")
                .then(|| el.value().attr("href").map(str::to_string))
                .flatten()
        });
        let url = href
            .and_then(|h| resolve_link(page_url, &h))
            .unwrap_or_else(|| page_url.to_string());
        let date_text = first_date_text(&el, &date_sels);
        let Some(published) = resolve_date(date_text.as_deref(), policy, now) else {
            tracing::debug!(target: "ingest", %title, "dropping candidate without a parseable date");
            continue;
        };

        let mut art = CandidateArticle::new(
            truncate_chars(&title, TITLE_MAX_CHARS),
            truncate_chars(&summary, SUMMARY_MAX_CHARS),
            url,
        );
        art.published_date = published;
        out.push(art);
    }
    Ok(out)
}

/// Fallback for unexpected markup: every block element whose rendered text is
/// within the band becomes a candidate. Nested blocks are reported once, at the
/// innermost level that is still within the band.
pub fn scan_text_blocks(
    doc: &Html,
    page_url: &Url,
    policy: DatePolicy,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateArticle>, ExtractionError> {
    let blocks = compile(BLOCK_SELECTOR)?;
    let links = compile("a[href]")?;
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for el in doc.select(&blocks) {
        let chunks = text_chunks(&el);
        let rendered = chunks.join(" ");
        if !in_band(&rendered) {
            continue;
        }
        let has_inner_block = el
            .select(&blocks)
            .any(|inner| inner.id() != el.id() && in_band(&text_chunks(&inner).join(" ")));
        if has_inner_block || !seen.insert(rendered.clone()) {
            continue;
        }

        let Some(published) = resolve_date(Some(rendered.as_str()), policy, now) else {
            continue;
        };
        let (title, summary) = split_title_summary(&chunks);
        let url = el
            .select(&links)
            .find_map(|a| a.value().attr("href"))
            .and_then(|h| resolve_link(page_url, h))
            .unwrap_or_else(|| page_url.to_string());

        let mut art = CandidateArticle::new(title, summary, url);
        art.published_date = published;
        out.push(art);
    }
    Ok(out)
}

/// Visible text of a whole page (scripts and styles skipped), whitespace-collapsed.
pub fn page_text(html: &str, max_chars: usize) -> String {
    let doc = Html::parse_document(html);
    let text = text_chunks(&doc.root_element()).join("\n");
    truncate_chars(&text, max_chars)
}

pub fn compile(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector).map_err(|e| ExtractionError::Selector {
        selector: selector.to_string(),
        message: format!("{e:?}"),
    })
}

fn compile_all(selectors: &[&str]) -> Result<Vec<Selector>, ExtractionError> {
    selectors.iter().map(|s| compile(s)).collect()
}

pub(crate) fn first_text(el: &ElementRef<'_>, sels: &[Selector]) -> Option<String> {
    sels.iter()
        .flat_map(|s| el.select(s))
        .map(|m| collapse_ws(&m.text().collect::<Vec<_>>().join(" ")))
        .find(|t| !t.is_empty())
}

pub(crate) fn first_attr(el: &ElementRef<'_>, sels: &[Selector], attr: &str) -> Option<String> {
    sels.iter()
        .flat_map(|s| el.select(s))
        .filter_map(|m| m.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Machine-readable attributes first (`datetime`, `content`, `data-date`), then text.
pub(crate) fn first_date_text(el: &ElementRef<'_>, sels: &[Selector]) -> Option<String> {
    sels.iter().flat_map(|s| el.select(s)).find_map(|m| {
        let v = m.value();
        v.attr("datetime")
            .or_else(|| v.attr("content"))
            .or_else(|| v.attr("data-date"))
            .map(str::to_string)
            .or_else(|| Some(collapse_ws(&m.text().collect::<Vec<_>>().join(" "))))
            .filter(|t| !t.trim().is_empty())
    })
}

pub(crate) fn resolve_date(
    text: Option<&str>,
    policy: DatePolicy,
    now: DateTime<Utc>,
) -> Option<PublishedDate> {
    match text.and_then(|t| dates::parse_date_at(t, now)) {
        Some(ts) => Some(PublishedDate::At(ts)),
        None => match policy {
            DatePolicy::Require => None,
            DatePolicy::AssumeNow => Some(PublishedDate::At(now)),
            DatePolicy::Unknown => Some(PublishedDate::Unknown),
        },
    }
}

/// Absolute link for `href`, or `None` for anchors, scripts and mail links.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let h = href.trim();
    if h.is_empty() || h.starts_with('#') || h.starts_with("javascript:") || h.starts_with("mailto:") {
        return None;
    }
    base.join(h).ok().map(|u| u.to_string())
}

/// Trimmed, non-empty text nodes under `el`, skipping script-like containers.
pub(crate) fn text_chunks(el: &ElementRef<'_>) -> Vec<String> {
    el.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent_name = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name().to_string()));
            if parent_name.is_some_and(|n| SKIP_TEXT_IN.contains(&n.as_str())) {
                return None;
            }
            let s: &str = text;
            let collapsed = collapse_ws(s);
            (!collapsed.is_empty()).then_some(collapsed)
        })
        .collect()
}

fn in_band(text: &str) -> bool {
    let n = text.chars().count();
    (BLOCK_MIN_CHARS..=BLOCK_MAX_CHARS).contains(&n)
}

/// First line becomes the title (cut at a sentence end if it is long), the rest
/// becomes the summary.
pub(crate) fn split_title_summary(chunks: &[String]) -> (String, String) {
    let first = chunks.first().cloned().unwrap_or_default();
    let (title, first_rest) = if first.chars().count() > TITLE_MAX_CHARS {
        match first.find(". ") {
            Some(i) if first[..i].chars().count() <= TITLE_MAX_CHARS => {
                (first[..i].to_string(), first[i + 2..].to_string())
            }
            _ => (truncate_chars(&first, TITLE_MAX_CHARS), first.clone()),
        }
    } else {
        (first.clone(), String::new())
    };

    let mut rest: Vec<&str> = Vec::new();
    if !first_rest.is_empty() {
        rest.push(&first_rest);
    }
    rest.extend(chunks.iter().skip(1).map(String::as_str));
    let summary = if rest.is_empty() {
        first
    } else {
        rest.join(" ")
    };
    (title, truncate_chars(&summary, SUMMARY_MAX_CHARS))
}

pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_and_skips_anchors() {
        let base = Url::parse("https://www.nalog.gov.ru/rn77/news/").unwrap();
        assert_eq!(
            resolve_link(&base, "/rn77/news/activities_fts/1.html").as_deref(),
            Some("https://www.nalog.gov.ru/rn77/news/activities_fts/1.html")
        );
        assert!(resolve_link(&base, "#top").is_none());
        assert!(resolve_link(&base, "javascript:void(0)").is_none());
    }

    #[test]
    fn long_first_line_is_cut_at_sentence() {
        let first = format!("{}. {}", "а".repeat(50), "б".repeat(300));
        let (title, summary) = split_title_summary(&[first]);
        assert_eq!(title.chars().count(), 50);
        assert!(summary.starts_with('б'));
    }

    #[test]
    fn selector_and_fallback_summaries_share_one_cap() {
        static GROUPS: &[SelectorGroup] = &[SelectorGroup {
            container: "div.item",
            title: &["h2"],
            summary: &["p"],
            link: &["a"],
            date: &["time"],
        }];
        let long = "н".repeat(SUMMARY_MAX_CHARS * 3);
        let html = format!(
            r#"<div class="item"><h2>Заголовок</h2><p>{long}</p><a href="/n/1">x</a><time>01.02.2024</time></div>"#
        );
        let base = Url::parse("https://example.ru/news/").unwrap();
        let found = extract_with_groups(&html, &base, GROUPS, DatePolicy::Require, Utc::now()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].summary.chars().count(), SUMMARY_MAX_CHARS);

        let (_, fallback) = split_title_summary(&["Заголовок".to_string(), long]);
        assert_eq!(fallback.chars().count(), SUMMARY_MAX_CHARS);
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate_chars("абвгд", 3), "аб…");
        assert_eq!(truncate_chars("аб", 3), "аб");
    }
}
