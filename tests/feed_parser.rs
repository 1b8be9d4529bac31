// tests/feed_parser.rs
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tax_news_aggregator::ingest::fetch::{ResilientFetcher, RetryPolicy, StaticTransport};
use tax_news_aggregator::ingest::parsers::descriptors::GENERIC_FEED;
use tax_news_aggregator::ingest::parsers::feed::{parse_feed, FeedParser};
use tax_news_aggregator::ingest::parsers::{DatePolicy, ExtractionError, ExtractionParser};
use tax_news_aggregator::ingest::types::{PublishedDate, Source, SourceType};
use url::Url;

const RSS: &str = include_str!("fixtures/tax_feed.rss");
const ATOM: &str = include_str!("fixtures/tax_feed.atom");

fn page() -> Url {
    Url::parse("https://news.example.ru/rss").unwrap()
}

#[test]
fn rss_items_are_normalized_and_undated_ones_dropped() {
    let now = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
    let items = parse_feed(RSS, &page(), DatePolicy::Require, now).unwrap();
    assert_eq!(items.len(), 2, "{items:#?}");

    let first = &items[0];
    assert_eq!(first.title, "Госдума приняла поправки в НК РФ о НДС");
    assert_eq!(first.summary, "Закон вводит пониженную ставку НДС для гостиниц.");
    assert_eq!(first.subject.as_deref(), Some("Законодательство"));
    assert_eq!(
        first.published_date,
        PublishedDate::At(Utc.with_ymd_and_hms(2025, 3, 12, 6, 30, 0).unwrap())
    );

    // non-RFC 2822 date falls through to the general date parser
    let second = &items[1];
    assert_eq!(second.url, "https://news.example.ru/articles/2");
    assert_eq!(
        second.published_date,
        PublishedDate::At(Utc.with_ymd_and_hms(2025, 3, 13, 0, 0, 0).unwrap())
    );
}

#[test]
fn undated_rss_item_kept_as_unknown_under_lenient_policy() {
    let now = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
    let items = parse_feed(RSS, &page(), DatePolicy::Unknown, now).unwrap();
    assert_eq!(items.len(), 3);
    assert!(items[2].published_date.is_unknown());
}

#[test]
fn atom_entries_prefer_alternate_link_and_published_date() {
    let now = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
    let entries = parse_feed(ATOM, &page(), DatePolicy::Require, now).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].url, "https://blog.example.ru/posts/ndfl");
    assert_eq!(
        entries[0].published_date,
        PublishedDate::At(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap())
    );
    assert_eq!(
        entries[1].published_date,
        PublishedDate::At(Utc.with_ymd_and_hms(2025, 3, 11, 5, 0, 0).unwrap())
    );
}

#[test]
fn non_feed_document_is_a_feed_error() {
    let err = parse_feed("<html><body>nope</body></html>", &page(), DatePolicy::Require, Utc::now())
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Feed(_)));
}

#[tokio::test]
async fn generic_feed_reads_the_source_url_and_filters_keywords() {
    let transport = Arc::new(StaticTransport::new().with_body("https://news.example.ru/rss", RSS));
    let fetcher = Arc::new(ResilientFetcher::new(transport.clone(), RetryPolicy::immediate(1)));
    let parser = FeedParser::new(&GENERIC_FEED, fetcher);
    let source = Source {
        id: 1,
        name: "Новости".into(),
        url: "https://news.example.ru/rss".into(),
        source_type: SourceType::Website,
        is_enabled: true,
    };

    let out = parser.extract(&source, &["усн".to_string()]).await.unwrap();
    assert_eq!(transport.calls(), 1);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].title, "ФНС обновила форму декларации по УСН");
    assert_eq!(out[0].tax_type.as_deref(), Some("УСН"));
}
