//! Tax news aggregator: binary entrypoint.
//! Loads config, seeds the store, wires the ingestion pipeline and boots the Axum server.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tax_news_aggregator::analyze::{build_model, ModelExtractor};
use tax_news_aggregator::config::ai::{AiConfig, DEFAULT_AI_CONFIG_PATH};
use tax_news_aggregator::config::load_pipeline_config;
use tax_news_aggregator::ingest::fetch::{ReqwestTransport, ResilientFetcher};
use tax_news_aggregator::ingest::orchestrator::IngestMode;
use tax_news_aggregator::ingest::parsers::ParserDispatcher;
use tax_news_aggregator::ingest::store::{InMemoryStore, NewsStore};
use tax_news_aggregator::metrics::Metrics;
use tax_news_aggregator::notify::{
    DigestTrigger, EmailDigestScheduler, LogMailer, MailSender, NoopDigest, SmtpMailer,
};
use tax_news_aggregator::{create_router, AppState, IngestOrchestrator, Pipeline};

/// `RUST_LOG` filter (default: info for pipeline targets); JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ingest=info,fetch=info,notify=info,api=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    // The runtime may already have installed a subscriber; keep it then.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = load_pipeline_config().context("load pipeline config")?;

    let store = Arc::new(InMemoryStore::new());
    let seeded = cfg.seed_store(&store);
    tracing::info!(sources = seeded, keywords = cfg.keywords.len(), mode = ?cfg.mode, "store seeded");

    let metrics = Metrics::init(&cfg.fetch)?;

    let transport = Arc::new(ReqwestTransport::new()?);
    let fetcher = Arc::new(ResilientFetcher::new(transport, cfg.fetch));
    let dispatcher = ParserDispatcher::with_builtin(fetcher.clone());

    let news_store: Arc<dyn NewsStore> = store.clone();
    let digest: Arc<dyn DigestTrigger> = if cfg.digest.enabled {
        let mailer: Arc<dyn MailSender> = match SmtpMailer::from_env() {
            Ok(m) => Arc::new(m),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "SMTP not configured, digests will only be logged");
                Arc::new(LogMailer)
            }
        };
        Arc::new(EmailDigestScheduler::new(
            news_store.clone(),
            mailer,
            cfg.digest.clone(),
        ))
    } else {
        Arc::new(NoopDigest)
    };

    let mut pipeline = Pipeline::new(news_store, dispatcher, digest);
    if cfg.mode == IngestMode::Model {
        let ai = AiConfig::load_or_default(DEFAULT_AI_CONFIG_PATH)?;
        let model = build_model(&ai)?;
        tracing::info!(provider = model.provider_name(), model = %ai.model, "model ingestion enabled");
        pipeline = pipeline.with_model(Arc::new(ModelExtractor::new(
            model,
            fetcher.clone(),
            ai.max_page_chars,
        )));
    }

    let state = AppState {
        orchestrator: IngestOrchestrator::new(pipeline),
        store,
    };
    let router = create_router(state).merge(metrics.router());

    Ok(router.into())
}
