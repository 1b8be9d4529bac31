// src/ingest/parsers/universal.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::descriptors::GENERIC_GROUPS;
use super::html::extract_with_groups;
use super::{collect_from_pages, finalize, DatePolicy, ExtractionError, ExtractionParser};
use crate::ingest::fetch::ResilientFetcher;
use crate::ingest::types::{CandidateArticle, Source};

/// Catch-all parser for sources no family claims. Bound to the source's display
/// name for logging; dates it cannot read stay `"unknown"`.
pub struct UniversalParser {
    display_name: String,
    fetcher: Arc<ResilientFetcher>,
}

impl UniversalParser {
    pub const DATE_POLICY: DatePolicy = DatePolicy::Unknown;

    pub fn new(display_name: impl Into<String>, fetcher: Arc<ResilientFetcher>) -> Self {
        Self {
            display_name: display_name.into(),
            fetcher,
        }
    }
}

#[async_trait]
impl ExtractionParser for UniversalParser {
    fn name(&self) -> &str {
        "universal"
    }

    async fn extract(
        &self,
        source: &Source,
        keywords: &[String],
    ) -> Result<Vec<CandidateArticle>, ExtractionError> {
        let now = Utc::now();
        let pages = [source.url.clone()];
        let found = collect_from_pages(&self.fetcher, &self.display_name, &pages, |body, page_url| {
            extract_with_groups(body, page_url, GENERIC_GROUPS, Self::DATE_POLICY, now)
        })
        .await?;
        Ok(finalize(found, keywords, None, None))
    }
}
