use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::ingest::orchestrator::{FetchNewsResponse, IngestOrchestrator, RunReport};
use crate::ingest::store::{InMemoryStore, NewsQuery};
use crate::ingest::tasks::ProcessingStatus;
use crate::ingest::types::NewsItem;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: IngestOrchestrator,
    pub store: Arc<InMemoryStore>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/news", get(list_news))
        .route("/news/fetch", post(fetch_news))
        .route("/news/status/{task_id}", get(news_status))
        .route("/news/last-run", get(last_run))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

async fn fetch_news(State(state): State<AppState>) -> Result<Json<FetchNewsResponse>, ApiError> {
    state
        .orchestrator
        .fetch_and_process_news()
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(target: "api", error = %format!("{e:#}"), "fetch_and_process_news failed");
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        })
}

#[derive(Serialize)]
struct StatusOut {
    task_id: String,
    status: ProcessingStatus,
}

async fn news_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<StatusOut>, ApiError> {
    match state.orchestrator.news_processing_status(&task_id) {
        Some(status) => Ok(Json(StatusOut { task_id, status })),
        None => Err(ApiError(
            StatusCode::NOT_FOUND,
            format!("unknown task {task_id}"),
        )),
    }
}

#[derive(Deserialize)]
struct ListParams {
    q: Option<String>,
    source: Option<String>,
    limit: Option<usize>,
}

async fn list_news(
    State(state): State<AppState>,
    Query(p): Query<ListParams>,
) -> Json<Vec<NewsItem>> {
    let query = NewsQuery {
        text: p.q,
        source_name: p.source.filter(|s| !s.trim().is_empty()),
        limit: Some(p.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT)),
    };
    Json(state.store.list_news(&query))
}

async fn last_run(State(state): State<AppState>) -> Json<Option<RunReport>> {
    Json(state.orchestrator.last_report())
}
