// tests/channel_parser.rs
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tax_news_aggregator::ingest::fetch::{ResilientFetcher, RetryPolicy, StaticTransport};
use tax_news_aggregator::ingest::parsers::channel::{
    channel_mirror_url, extract_channel_posts, ChannelParser,
};
use tax_news_aggregator::ingest::parsers::{ExtractionError, ExtractionParser};
use tax_news_aggregator::ingest::types::{PublishedDate, Source, SourceType};
use url::Url;

const MIRROR_HTML: &str = include_str!("fixtures/channel_mirror.html");

fn channel_source(url: &str) -> Source {
    Source {
        id: 7,
        name: "Налоговый канал".into(),
        url: url.into(),
        source_type: SourceType::Channel,
        is_enabled: true,
    }
}

#[test]
fn posts_carry_text_timestamp_and_permalink() {
    let page = Url::parse("https://t.me/s/nalog_channel").unwrap();
    let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
    let posts = extract_channel_posts(MIRROR_HTML, &page, now).unwrap();

    assert_eq!(posts.len(), 2, "post without text is skipped");
    assert_eq!(posts[0].title, "Минфин предложил изменить порядок уплаты НДФЛ");
    assert_eq!(posts[0].summary, "Законопроект внесен в Госдуму.");
    assert_eq!(posts[0].url, "https://t.me/nalog_channel/101");
    assert_eq!(
        posts[0].published_date,
        PublishedDate::At(Utc.with_ymd_and_hms(2025, 3, 12, 8, 15, 0).unwrap())
    );

    // no timestamp: channel posts are assumed fresh; permalink from data-post
    assert_eq!(posts[1].published_date, PublishedDate::At(now));
    assert_eq!(posts[1].url, "https://t.me/nalog_channel/102");
}

#[tokio::test]
async fn parser_fetches_the_public_mirror() {
    let transport = Arc::new(
        StaticTransport::new().with_body("https://t.me/s/nalog_channel", MIRROR_HTML),
    );
    let fetcher = Arc::new(ResilientFetcher::new(transport.clone(), RetryPolicy::immediate(1)));
    let parser = ChannelParser::new(fetcher);

    let out = parser
        .extract(&channel_source("@nalog_channel"), &["усн".to_string()])
        .await
        .unwrap();
    assert_eq!(transport.calls(), 1);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].tax_type.as_deref(), Some("УСН"));
    // source name is the fallback subject
    assert_eq!(out[0].subject.as_deref(), Some("Налоговый канал"));
}

#[tokio::test]
async fn unresolvable_channel_reference_is_an_error() {
    let fetcher = Arc::new(ResilientFetcher::new(
        Arc::new(StaticTransport::new()),
        RetryPolicy::immediate(1),
    ));
    let err = ChannelParser::new(fetcher)
        .extract(&channel_source("https://t.me/"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::ChannelId(_)));
}

#[test]
fn mirror_url_normalization() {
    assert_eq!(
        channel_mirror_url("https://t.me/s/nalog_channel").as_deref(),
        Some("https://t.me/s/nalog_channel")
    );
    assert_eq!(
        channel_mirror_url("t.me/nalog_channel").as_deref(),
        Some("https://t.me/s/nalog_channel")
    );
}
