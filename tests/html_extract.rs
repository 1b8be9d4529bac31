// tests/html_extract.rs
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tax_news_aggregator::ingest::fetch::{ResilientFetcher, RetryPolicy, StaticTransport};
use tax_news_aggregator::ingest::parsers::descriptors::{FNS, GENERIC_GROUPS};
use tax_news_aggregator::ingest::parsers::html::{extract_with_groups, page_text};
use tax_news_aggregator::ingest::parsers::site::SiteParser;
use tax_news_aggregator::ingest::parsers::{DatePolicy, ExtractionParser};
use tax_news_aggregator::ingest::types::{PublishedDate, Source, SourceType};
use url::Url;

const FNS_HTML: &str = include_str!("fixtures/fns_news.html");
const UNKNOWN_HTML: &str = include_str!("fixtures/unknown_layout.html");

fn fns_page() -> Url {
    Url::parse(FNS.auxiliary_urls[0]).unwrap()
}

#[test]
fn selector_group_extracts_fields_and_drops_undated() {
    let now = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
    let out = extract_with_groups(FNS_HTML, &fns_page(), FNS.selector_groups, DatePolicy::Require, now)
        .unwrap();

    assert_eq!(out.len(), 2, "undated item must be dropped under Require");
    let first = &out[0];
    assert_eq!(first.title, "ФНС разъяснила порядок уплаты НДС при экспорте");
    assert_eq!(
        first.url,
        "https://www.nalog.gov.ru/rn77/news/activities_fts/15001/"
    );
    assert_eq!(
        first.published_date,
        PublishedDate::At(Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap())
    );
    // machine-readable attribute wins over the visible text
    assert_eq!(
        out[1].published_date,
        PublishedDate::At(Utc.with_ymd_and_hms(2025, 3, 5, 6, 30, 0).unwrap())
    );
}

#[test]
fn undated_item_kept_as_unknown_when_policy_allows() {
    let now = Utc::now();
    let out = extract_with_groups(FNS_HTML, &fns_page(), FNS.selector_groups, DatePolicy::Unknown, now)
        .unwrap();
    assert_eq!(out.len(), 3);
    assert!(out[2].published_date.is_unknown());

    let out = extract_with_groups(FNS_HTML, &fns_page(), FNS.selector_groups, DatePolicy::AssumeNow, now)
        .unwrap();
    assert_eq!(out[2].published_date, PublishedDate::At(now));
}

#[test]
fn unknown_markup_falls_back_to_text_blocks() {
    let page = Url::parse("https://example.ru/news/").unwrap();
    let now = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
    let out = extract_with_groups(UNKNOWN_HTML, &page, GENERIC_GROUPS, DatePolicy::Unknown, now).unwrap();

    assert_eq!(out.len(), 2, "short paragraph and wrappers are not reported");
    assert_eq!(out[0].title, "Продление сроков отчетности для малого бизнеса");
    assert!(out[0].summary.contains("упрощенной системе"));
    assert_eq!(out[0].url, "https://example.ru/news/prolongation");
    assert_eq!(
        out[0].published_date,
        PublishedDate::At(Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap())
    );
    // no date in the block, no link: unknown date, page url
    assert!(out[1].published_date.is_unknown());
    assert_eq!(out[1].url, "https://example.ru/news/");
}

#[test]
fn fallback_under_require_drops_undated_blocks() {
    let page = Url::parse("https://example.ru/news/").unwrap();
    let out = extract_with_groups(UNKNOWN_HTML, &page, &[], DatePolicy::Require, Utc::now()).unwrap();
    assert_eq!(out.len(), 1);
}

#[test]
fn page_text_skips_scripts() {
    let text = page_text(FNS_HTML, 10_000);
    assert!(text.contains("ФНС разъяснила"));
    assert!(!text.contains("скрипт не должен"));
    assert!(page_text(FNS_HTML, 20).chars().count() <= 20);
}

#[tokio::test]
async fn site_parser_reads_all_pages_enriches_and_filters() {
    let transport = Arc::new(
        StaticTransport::new()
            .with_body(FNS.auxiliary_urls[0], FNS_HTML)
            .with_body(FNS.auxiliary_urls[1], "<html><body></body></html>"),
    );
    let fetcher = Arc::new(ResilientFetcher::new(transport.clone(), RetryPolicy::immediate(1)));
    let parser = SiteParser::new(&FNS, fetcher);
    let source = Source {
        id: 1,
        name: "ФНС".into(),
        url: "https://www.nalog.gov.ru/".into(),
        source_type: SourceType::Website,
        is_enabled: true,
    };

    let out = parser.extract(&source, &["ндс".to_string()]).await.unwrap();
    assert_eq!(transport.calls(), 2, "both auxiliary pages fetched, source url not");
    assert_eq!(out.len(), 1);
    let a = &out[0];
    assert_eq!(a.document_ref.as_deref(), Some("СД-4-3/1234@"));
    assert_eq!(a.tax_type.as_deref(), Some("НДС"));
    assert_eq!(a.subject.as_deref(), Some("ФНС России"));
}

#[tokio::test]
async fn site_parser_errors_only_when_every_page_fails() {
    // no routes: every page is a 404
    let fetcher = Arc::new(ResilientFetcher::new(
        Arc::new(StaticTransport::new()),
        RetryPolicy::immediate(1),
    ));
    let parser = SiteParser::new(&FNS, fetcher);
    let source = Source {
        id: 1,
        name: "ФНС".into(),
        url: "https://www.nalog.gov.ru/".into(),
        source_type: SourceType::Website,
        is_enabled: true,
    };
    assert!(parser.extract(&source, &[]).await.is_err());
}
