// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod metrics;

// Source dispatch, fetching, extraction, dedup and the run orchestrator
pub mod ingest;

// Model-driven ingestion and the content-authenticity validator
pub mod analyze;

// Email digest and outbound mail
pub mod notify;

pub use crate::api::{create_router, AppState};
pub use crate::ingest::orchestrator::{IngestOrchestrator, Pipeline};
