// src/ingest/orchestrator.rs
//! One ingestion run: enabled sources, sequentially, through
//! dispatch -> extract -> (authenticity) -> dedup/persist, then the digest.

use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};

use crate::analyze::authenticity::{check_article, STORAGE_THRESHOLD};
use crate::ingest::dedup::persist_if_new;
use crate::ingest::ensure_metrics_described;
use crate::ingest::parsers::{ExtractionParser, ParserDispatcher};
use crate::ingest::store::NewsStore;
use crate::ingest::tasks::{ProcessingStatus, TaskId, TaskRunner};
use crate::ingest::types::Source;
use crate::notify::digest::DigestTrigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Site, channel and feed parsers.
    #[default]
    Scrape,
    /// Page text goes through the structured-output model.
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStart {
    NoRunNeeded { reason: String },
    Started(TaskId),
}

/// Caller-facing answer of `fetch_and_process_news`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchNewsResponse {
    pub task_id: Option<TaskId>,
    pub message: String,
    pub status: ProcessingStatus,
}

impl From<RunStart> for FetchNewsResponse {
    fn from(start: RunStart) -> Self {
        match start {
            RunStart::NoRunNeeded { reason } => Self {
                task_id: None,
                message: reason,
                status: ProcessingStatus::Completed,
            },
            RunStart::Started(id) => Self {
                task_id: Some(id),
                message: "news processing started".to_string(),
                status: ProcessingStatus::Running,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub parser: String,
    pub extracted: usize,
    pub persisted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    /// Digest outcome, or the digest error.
    pub digest: String,
}

impl RunReport {
    pub fn persisted(&self) -> usize {
        self.sources.iter().map(|s| s.persisted).sum()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Everything a run needs.
pub struct Pipeline {
    store: Arc<dyn NewsStore>,
    dispatcher: ParserDispatcher,
    digest: Arc<dyn DigestTrigger>,
    model: Option<Arc<dyn ExtractionParser>>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn NewsStore>,
        dispatcher: ParserDispatcher,
        digest: Arc<dyn DigestTrigger>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            digest,
            model: None,
        }
    }

    /// Switch to model mode: every source goes through `extractor`.
    pub fn with_model(mut self, extractor: Arc<dyn ExtractionParser>) -> Self {
        self.model = Some(extractor);
        self
    }

    pub fn mode(&self) -> IngestMode {
        if self.model.is_some() {
            IngestMode::Model
        } else {
            IngestMode::Scrape
        }
    }

    pub fn store(&self) -> &Arc<dyn NewsStore> {
        &self.store
    }

    /// Why a run would do nothing, if it would.
    pub async fn skip_reason(&self) -> Result<Option<String>> {
        if self.store.enabled_sources().await?.is_empty() {
            return Ok(Some("no enabled sources".to_string()));
        }
        if self.keyword_texts().await?.is_empty() {
            return Ok(Some("no keywords defined".to_string()));
        }
        Ok(None)
    }

    async fn keyword_texts(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .keywords()
            .await?
            .into_iter()
            .map(|k| k.text.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect())
    }

    fn parser_for(&self, source: &Source) -> Arc<dyn ExtractionParser> {
        match &self.model {
            Some(model) => model.clone(),
            None => self.dispatcher.select_parser(&source.name, &source.url),
        }
    }

    /// Runs every enabled source to the end. Per-source failures land in the
    /// report; only store failures while listing sources abort the run.
    pub async fn run_once(&self) -> Result<RunReport> {
        ensure_metrics_described();
        counter!("ingest_runs_total").increment(1);
        let started_at = Utc::now();

        let sources = self
            .store
            .enabled_sources()
            .await
            .context("list enabled sources")?;
        let keywords = self.keyword_texts().await.context("list keywords")?;
        tracing::info!(target: "ingest", sources = sources.len(), keywords = keywords.len(), mode = ?self.mode(), "ingest run started");

        let mut reports = Vec::with_capacity(sources.len());
        for source in &sources {
            reports.push(self.process_source(source, &keywords).await);
        }

        let digest = match self.digest.evaluate().await {
            Ok(outcome) => format!("{outcome:?}"),
            Err(e) => {
                tracing::error!(target: "ingest", error = %format!("{e:#}"), "digest evaluation failed");
                format!("error: {e:#}")
            }
        };

        let finished_at = Utc::now();
        gauge!("ingest_pipeline_last_run_ts").set(finished_at.timestamp() as f64);
        let report = RunReport {
            started_at,
            finished_at,
            sources: reports,
            digest,
        };
        tracing::info!(
            target: "ingest",
            persisted = report.persisted(),
            failed_sources = report.failed_sources(),
            "ingest run finished"
        );
        Ok(report)
    }

    async fn process_source(&self, source: &Source, keywords: &[String]) -> SourceReport {
        let parser = self.parser_for(source);
        let mut report = SourceReport {
            source: source.name.clone(),
            parser: parser.name().to_string(),
            ..SourceReport::default()
        };

        let articles = match parser.extract(source, keywords).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::warn!(target: "ingest", source = %source.name, parser = %report.parser, error = %e, "source extraction failed");
                counter!("ingest_source_errors_total").increment(1);
                report.error = Some(e.to_string());
                return report;
            }
        };
        report.extracted = articles.len();
        counter!("ingest_candidates_total").increment(articles.len() as u64);

        let check_language = self.mode() == IngestMode::Model;
        for article in &articles {
            if check_language {
                if let Err(reason) = check_article(article, STORAGE_THRESHOLD) {
                    tracing::debug!(target: "ingest", source = %source.name, title = %article.title, %reason, "article rejected before storage");
                    counter!("ingest_rejected_total", "stage" => "storage").increment(1);
                    report.rejected += 1;
                    continue;
                }
            }
            match persist_if_new(self.store.as_ref(), article, source, Utc::now()).await {
                Ok(Some(_)) => report.persisted += 1,
                Ok(None) => report.duplicates += 1,
                Err(e) => {
                    tracing::error!(target: "ingest", source = %source.name, error = %format!("{e:#}"), "persisting failed");
                    report.error = Some(format!("{e:#}"));
                    break;
                }
            }
        }
        counter!("ingest_persisted_total").increment(report.persisted as u64);
        counter!("ingest_duplicates_total").increment(report.duplicates as u64);

        tracing::info!(
            target: "ingest",
            source = %source.name,
            parser = %report.parser,
            extracted = report.extracted,
            persisted = report.persisted,
            duplicates = report.duplicates,
            rejected = report.rejected,
            "source processed"
        );
        report
    }
}

/// Caller-facing entry: starts runs in the background and answers status polls.
#[derive(Clone)]
pub struct IngestOrchestrator {
    pipeline: Arc<Pipeline>,
    runner: TaskRunner,
    last_report: Arc<RwLock<Option<RunReport>>>,
}

impl IngestOrchestrator {
    pub fn new(pipeline: Pipeline) -> Self {
        Self::with_runner(pipeline, TaskRunner::new())
    }

    pub fn with_runner(pipeline: Pipeline, runner: TaskRunner) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            runner,
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Short-circuits without scheduling when there is nothing to constrain a run.
    pub async fn start_run(&self) -> Result<RunStart> {
        if let Some(reason) = self.pipeline.skip_reason().await? {
            tracing::info!(target: "ingest", %reason, "ingest run not needed");
            return Ok(RunStart::NoRunNeeded { reason });
        }

        let pipeline = self.pipeline.clone();
        let last_report = self.last_report.clone();
        let id = self.runner.queue_task(async move {
            let report = pipeline.run_once().await?;
            *last_report.write().expect("last report poisoned") = Some(report);
            Ok(())
        });
        tracing::info!(target: "ingest", task_id = %id, "ingest run queued");
        Ok(RunStart::Started(id))
    }

    pub async fn fetch_and_process_news(&self) -> Result<FetchNewsResponse> {
        Ok(self.start_run().await?.into())
    }

    pub fn news_processing_status(&self, task_id: &str) -> Option<ProcessingStatus> {
        self.runner
            .status(task_id)
            .map(|state| state.processing_status())
    }

    pub fn last_report(&self) -> Option<RunReport> {
        self.last_report
            .read()
            .expect("last report poisoned")
            .clone()
    }
}
