// src/config/mod.rs
pub mod ai;

pub use crate::ingest::config::{load_default as load_pipeline_config, PipelineConfig};
