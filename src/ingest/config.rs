// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::fetch::RetryPolicy;
use crate::ingest::orchestrator::IngestMode;
use crate::ingest::store::InMemoryStore;
use crate::ingest::types::SourceType;
use crate::notify::digest::EmailSettings;

pub const ENV_PATH: &str = "NEWS_PIPELINE_CONFIG";

fn yes() -> bool {
    true
}

/// Source registered at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSeed {
    pub name: String,
    pub url: String,
    /// Inferred from the url when absent.
    #[serde(rename = "type", default)]
    pub source_type: Option<SourceType>,
    #[serde(default = "yes")]
    pub enabled: bool,
}

impl SourceSeed {
    pub fn resolved_type(&self) -> SourceType {
        self.source_type.unwrap_or_else(|| infer_source_type(&self.url))
    }
}

pub fn infer_source_type(url: &str) -> SourceType {
    let u = url.trim().to_lowercase();
    if u.starts_with('@') || u.starts_with("tg://") || u.contains("t.me/") || u.contains("telegram.me/") {
        SourceType::Channel
    } else {
        SourceType::Website
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: IngestMode,
    #[serde(default)]
    pub fetch: RetryPolicy,
    #[serde(default)]
    pub sources: Vec<SourceSeed>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub digest: EmailSettings,
}

impl PipelineConfig {
    /// Registers seed sources and keywords; returns how many sources were added.
    /// A seed whose url is already registered is skipped.
    pub fn seed_store(&self, store: &InMemoryStore) -> usize {
        let mut added = 0;
        for seed in &self.sources {
            match store.add_source(&seed.name, &seed.url, seed.resolved_type(), seed.enabled) {
                Ok(_) => added += 1,
                Err(e) => tracing::debug!(target: "config", url = %seed.url, error = %e, "seed source skipped"),
            }
        }
        for kw in &self.keywords {
            store.add_keyword(kw);
        }
        added
    }

    fn cleaned(mut self) -> Self {
        self.keywords = clean_list(self.keywords);
        let mut seen = std::collections::HashSet::new();
        self.sources = self
            .sources
            .into_iter()
            .filter_map(|mut s| {
                s.name = s.name.trim().to_string();
                s.url = s.url.trim().to_string();
                if s.url.is_empty() || !seen.insert(s.url.clone()) {
                    return None;
                }
                if s.name.is_empty() {
                    s.name = s.url.clone();
                }
                Some(s)
            })
            .collect();
        self.digest.recipients = clean_list(self.digest.recipients);
        self
    }
}

/// Load from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading pipeline config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse(&content, ext.as_str()).with_context(|| format!("parsing {}", path.display()))
}

/// Load using env var + fallbacks:
/// 1) $NEWS_PIPELINE_CONFIG
/// 2) config/pipeline.toml
/// 3) config/pipeline.json
/// 4) built-in defaults
pub fn load_default() -> Result<PipelineConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_PATH} points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/pipeline.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/pipeline.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    Ok(PipelineConfig::default())
}

pub fn parse(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    let parsed = if hint_ext == "json" {
        serde_json::from_str::<PipelineConfig>(s).map_err(anyhow::Error::from)
    } else {
        toml::from_str::<PipelineConfig>(s)
            .map_err(anyhow::Error::from)
            .or_else(|toml_err| {
                serde_json::from_str::<PipelineConfig>(s)
                    .map_err(|_| toml_err.context("neither TOML nor JSON"))
            })
    };
    Ok(parsed?.cleaned())
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    use std::collections::BTreeSet;
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() {
            set.insert(t.to_string());
        }
    }
    set.into_iter().collect()
}
