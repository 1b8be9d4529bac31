// tests/model_ingest.rs
use std::sync::Arc;

use serde_json::json;
use tax_news_aggregator::analyze::{DynModel, MockModel, ModelExtractor};
use tax_news_aggregator::ingest::fetch::{ResilientFetcher, RetryPolicy, StaticTransport};
use tax_news_aggregator::ingest::orchestrator::{IngestMode, Pipeline};
use tax_news_aggregator::ingest::parsers::ParserDispatcher;
use tax_news_aggregator::ingest::store::{InMemoryStore, NewsQuery};
use tax_news_aggregator::ingest::types::SourceType;
use tax_news_aggregator::notify::NoopDigest;

const PAGE: &str = "<html><body><h1>Новости Минфина</h1>\
<p>Минфин разъяснил порядок вычета НДС для налоговых агентов.</p>\
<script>track()</script></body></html>";

fn pipeline_with(mock: Arc<MockModel>) -> (Arc<InMemoryStore>, Pipeline) {
    let store = Arc::new(InMemoryStore::new());
    store.add_keyword("НДС");
    store
        .add_source("Минфин", "https://minfin.example/news", SourceType::Website, true)
        .unwrap();

    let transport = Arc::new(StaticTransport::new().with_body("https://minfin.example/news", PAGE));
    let fetcher = Arc::new(ResilientFetcher::new(transport, RetryPolicy::immediate(1)));
    let model: DynModel = mock;
    let pipeline = Pipeline::new(
        store.clone(),
        ParserDispatcher::with_builtin(fetcher.clone()),
        Arc::new(NoopDigest),
    )
    .with_model(Arc::new(ModelExtractor::new(model, fetcher, 4_000)));
    (store, pipeline)
}

#[tokio::test]
async fn english_output_is_rejected_and_russian_persisted() {
    let mock = Arc::new(MockModel::new(json!({
        "articles": [
            {
                "title": "Минфин разъяснил порядок вычета НДС",
                "summary": "Письмо касается налоговых агентов.",
                "published_date": "2025-03-05",
                "url": "https://minfin.example/doc/1",
                "document_ref": "03-07-11/12345",
                "tax_type": "НДС",
                "subject": null,
                "position": null
            },
            {
                "title": "Ministry clarifies VAT deduction rules",
                "summary": "The letter covers tax agents.",
                "published_date": "unknown",
                "url": null,
                "document_ref": null,
                "tax_type": null,
                "subject": null,
                "position": null
            }
        ]
    })));
    let (store, pipeline) = pipeline_with(mock.clone());
    assert_eq!(pipeline.mode(), IngestMode::Model);

    let report = pipeline.run_once().await.unwrap();
    assert_eq!(mock.calls(), 1);
    let prompt = &mock.prompts()[0];
    assert!(prompt.contains("Ключевые слова: НДС"));
    assert!(prompt.contains("порядок вычета НДС"));
    assert!(!prompt.contains("track()"));

    let src = &report.sources[0];
    assert_eq!(src.parser, "model");
    assert_eq!(src.extracted, 1);
    assert_eq!(src.persisted, 1);
    assert!(src.error.is_none());

    let items = store.list_news(&NewsQuery::default());
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].document_ref.as_deref(), Some("03-07-11/12345"));
    assert_eq!(items[0].source_url, "https://minfin.example/doc/1");
}

#[tokio::test]
async fn shape_mismatch_becomes_a_source_error() {
    let mock = Arc::new(MockModel::new(json!({ "items": [] })));
    let (store, pipeline) = pipeline_with(mock);

    let report = pipeline.run_once().await.unwrap();
    let err = report.sources[0].error.as_deref().unwrap();
    assert!(err.contains("model extraction failed"), "{err}");
    assert_eq!(store.news_count(), 0);
}
