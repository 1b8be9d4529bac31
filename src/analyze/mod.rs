// src/analyze/mod.rs
//! Model-driven ingestion path: structured-output model client, intake
//! extractor and the language-purity validator both boundaries share.

pub mod ai_adapter;
pub mod authenticity;
pub mod model_extract;

pub use ai_adapter::{build_model, DynModel, MockModel, StructuredModel};
pub use authenticity::{is_authentic, is_authentic_with, INTAKE_THRESHOLD, STORAGE_THRESHOLD};
pub use model_extract::ModelExtractor;
