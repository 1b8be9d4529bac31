// tests/orchestrator.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tax_news_aggregator::ingest::fetch::{ResilientFetcher, RetryPolicy, StaticTransport};
use tax_news_aggregator::ingest::orchestrator::{IngestOrchestrator, Pipeline, RunStart};
use tax_news_aggregator::ingest::parsers::descriptors::FNS;
use tax_news_aggregator::ingest::parsers::{ExtractionError, ExtractionParser, ParserDispatcher};
use tax_news_aggregator::ingest::store::{InMemoryStore, NewsQuery};
use tax_news_aggregator::ingest::tasks::{ProcessingStatus, TaskOutcome, TaskState};
use tax_news_aggregator::ingest::types::{CandidateArticle, PublishedDate, Source, SourceType};
use tax_news_aggregator::notify::{DigestOutcome, DigestTrigger};

const FNS_HTML: &str = include_str!("fixtures/fns_news.html");
const CHANNEL_HTML: &str = include_str!("fixtures/channel_mirror.html");

#[derive(Default)]
struct CountingDigest(AtomicUsize);

#[async_trait]
impl DigestTrigger for CountingDigest {
    async fn evaluate(&self) -> anyhow::Result<DigestOutcome> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(DigestOutcome::NothingNew)
    }
}

/// Returns the same two articles on every call.
struct Fixed;

#[async_trait]
impl ExtractionParser for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn extract(
        &self,
        source: &Source,
        _keywords: &[String],
    ) -> Result<Vec<CandidateArticle>, ExtractionError> {
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        Ok(["Ставка НДС для гостиниц", "Уведомление об исчисленных налогах"]
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut a = CandidateArticle::new(*t, "Описание", format!("{}/{i}", source.url));
                a.published_date = PublishedDate::At(at);
                a
            })
            .collect())
    }
}

struct Broken;

#[async_trait]
impl ExtractionParser for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn extract(
        &self,
        _source: &Source,
        _keywords: &[String],
    ) -> Result<Vec<CandidateArticle>, ExtractionError> {
        Err(ExtractionError::Feed("unexpected root".into()))
    }
}

struct Fixture {
    store: Arc<InMemoryStore>,
    transport: Arc<StaticTransport>,
    digest: Arc<CountingDigest>,
    orchestrator: IngestOrchestrator,
}

fn fixture(transport: StaticTransport, stubbed: bool) -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(transport);
    let fetcher = Arc::new(ResilientFetcher::new(transport.clone(), RetryPolicy::immediate(1)));
    let dispatcher = if stubbed {
        let mut d = ParserDispatcher::new(fetcher);
        d.register(&["good.example"], Arc::new(Fixed));
        d.register(&["broken.example"], Arc::new(Broken));
        d
    } else {
        ParserDispatcher::with_builtin(fetcher)
    };
    let digest = Arc::new(CountingDigest::default());
    let pipeline = Pipeline::new(store.clone(), dispatcher, digest.clone());
    Fixture {
        store,
        transport,
        digest,
        orchestrator: IngestOrchestrator::new(pipeline),
    }
}

async fn finish(o: &IngestOrchestrator, start: RunStart) -> TaskState {
    let RunStart::Started(id) = start else {
        panic!("run was not started: {start:?}");
    };
    o.runner()
        .wait_done(&id, Duration::from_secs(5))
        .await
        .expect("task registered")
}

#[tokio::test]
async fn no_keywords_short_circuits_without_fetching() {
    let f = fixture(StaticTransport::new(), false);
    f.store
        .add_source("ФНС", "https://www.nalog.gov.ru/", SourceType::Website, true)
        .unwrap();
    f.store
        .add_source("Канал", "@nalog_gov", SourceType::Channel, true)
        .unwrap();

    let resp = f.orchestrator.fetch_and_process_news().await.unwrap();
    assert_eq!(resp.task_id, None);
    assert_eq!(resp.status, ProcessingStatus::Completed);
    assert_eq!(resp.message, "no keywords defined");
    assert_eq!(f.transport.calls(), 0);
    assert_eq!(f.digest.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_enabled_sources_short_circuits() {
    let f = fixture(StaticTransport::new(), true);
    f.store.add_keyword("НДС");
    f.store
        .add_source("Выключен", "https://good.example/", SourceType::Website, false)
        .unwrap();

    let start = f.orchestrator.start_run().await.unwrap();
    assert_eq!(
        start,
        RunStart::NoRunNeeded {
            reason: "no enabled sources".into()
        }
    );
}

#[tokio::test]
async fn failing_source_does_not_stop_the_run() {
    let f = fixture(StaticTransport::new(), true);
    f.store.add_keyword("налог");
    f.store
        .add_source("Сломанный", "https://broken.example/", SourceType::Website, true)
        .unwrap();
    f.store
        .add_source("Рабочий", "https://good.example/", SourceType::Website, true)
        .unwrap();
    f.store
        .add_source("Выключен", "https://good.example/off", SourceType::Website, false)
        .unwrap();

    let resp = f.orchestrator.fetch_and_process_news().await.unwrap();
    assert_eq!(resp.status, ProcessingStatus::Running);
    let id = resp.task_id.clone().unwrap();
    let state = finish(&f.orchestrator, RunStart::Started(id.clone())).await;
    assert_eq!(state, TaskState::Done(TaskOutcome::Succeeded));
    assert_eq!(
        f.orchestrator.news_processing_status(&id),
        Some(ProcessingStatus::Completed)
    );

    let report = f.orchestrator.last_report().unwrap();
    assert_eq!(report.sources.len(), 2, "disabled source is not visited");
    assert_eq!(report.sources[0].parser, "broken");
    assert!(report.sources[0].error.as_deref().unwrap().contains("unexpected root"));
    assert_eq!(report.sources[1].persisted, 2);
    assert_eq!(report.persisted(), 2);
    assert_eq!(report.failed_sources(), 1);
    assert_eq!(f.digest.0.load(Ordering::SeqCst), 1, "digest once per run");

    let items = f.store.list_news(&NewsQuery::default());
    assert!(items.iter().all(|n| n.source_name == "Рабочий"));
}

#[tokio::test]
async fn repeated_runs_only_count_duplicates() {
    let f = fixture(StaticTransport::new(), true);
    f.store.add_keyword("НДС");
    f.store
        .add_source("Рабочий", "https://good.example/", SourceType::Website, true)
        .unwrap();

    let pipeline = f.orchestrator.pipeline();
    let first = pipeline.run_once().await.unwrap();
    let second = pipeline.run_once().await.unwrap();
    assert_eq!(first.persisted(), 2);
    assert_eq!(second.persisted(), 0);
    assert_eq!(second.sources[0].duplicates, 2);
    assert_eq!(f.store.news_count(), 2);
    assert_eq!(f.digest.0.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn builtin_site_parser_end_to_end() {
    let transport = FNS
        .auxiliary_urls
        .iter()
        .fold(StaticTransport::new(), |t, url| t.with_body(url, FNS_HTML));
    let f = fixture(transport, false);
    f.store.add_keyword("НДС");
    f.store
        .add_source("ФНС", "https://www.nalog.gov.ru/", SourceType::Website, true)
        .unwrap();

    let start = f.orchestrator.start_run().await.unwrap();
    finish(&f.orchestrator, start).await;

    let report = f.orchestrator.last_report().unwrap();
    assert_eq!(report.sources[0].parser, "ФНС России");
    // both auxiliary pages carry the same article; page-level dedup keeps one
    assert_eq!(report.sources[0].extracted, 1);
    assert_eq!(report.persisted(), 1);

    let stored = f.store.list_news(&NewsQuery {
        text: Some("ндс".into()),
        ..NewsQuery::default()
    });
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].document_ref.as_deref(), Some("СД-4-3/1234@"));
    assert_eq!(stored[0].subject.as_deref(), Some("ФНС России"));
}

#[tokio::test]
async fn source_disabled_between_runs_is_skipped() {
    let f = fixture(StaticTransport::new(), true);
    f.store.add_keyword("НДС");
    let good = f
        .store
        .add_source("Рабочий", "https://good.example/", SourceType::Website, true)
        .unwrap();
    f.store
        .add_source("Сломанный", "https://broken.example/", SourceType::Website, true)
        .unwrap();

    f.store.set_source_enabled(good.id, false).unwrap();
    let start = f.orchestrator.start_run().await.unwrap();
    finish(&f.orchestrator, start).await;

    let report = f.orchestrator.last_report().unwrap();
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].parser, "broken");
    assert_eq!(report.persisted(), 0);
    assert_eq!(f.store.news_count(), 0);
}

#[tokio::test]
async fn channel_handle_seed_is_ingested_through_the_mirror() {
    let transport = StaticTransport::new().with_body("https://t.me/s/nalog_gov", CHANNEL_HTML);
    let f = fixture(transport, false);
    f.store.add_keyword("УСН");
    f.store
        .add_source("Налоговый канал", "@nalog_gov", SourceType::Channel, true)
        .unwrap();

    let start = f.orchestrator.start_run().await.unwrap();
    finish(&f.orchestrator, start).await;

    let report = f.orchestrator.last_report().unwrap();
    assert_eq!(report.sources[0].parser, "channel");
    assert!(report.sources[0].error.is_none());
    assert_eq!(report.persisted(), 1);
    assert_eq!(f.transport.calls(), 1);

    let stored = f.store.list_news(&NewsQuery::default());
    assert_eq!(stored[0].tax_type.as_deref(), Some("УСН"));
    assert_eq!(stored[0].source_name, "Налоговый канал");
}
