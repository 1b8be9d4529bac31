// src/ingest/parsers/site.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::descriptors::SiteDescriptor;
use super::html::extract_with_groups;
use super::{collect_from_pages, finalize, ExtractionError, ExtractionParser};
use crate::ingest::fetch::ResilientFetcher;
use crate::ingest::types::{CandidateArticle, Source};

/// Runs one [`SiteDescriptor`] through the generic engine.
pub struct SiteParser {
    descriptor: &'static SiteDescriptor,
    fetcher: Arc<ResilientFetcher>,
}

impl SiteParser {
    pub fn new(descriptor: &'static SiteDescriptor, fetcher: Arc<ResilientFetcher>) -> Self {
        Self { descriptor, fetcher }
    }

    /// The source URL, or the descriptor's fixed pages when it has any.
    fn pages(&self, source: &Source) -> Vec<String> {
        if self.descriptor.auxiliary_urls.is_empty() {
            vec![source.url.clone()]
        } else {
            self.descriptor
                .auxiliary_urls
                .iter()
                .map(|u| u.to_string())
                .collect()
        }
    }
}

#[async_trait]
impl ExtractionParser for SiteParser {
    fn name(&self) -> &str {
        self.descriptor.name
    }

    async fn extract(
        &self,
        source: &Source,
        keywords: &[String],
    ) -> Result<Vec<CandidateArticle>, ExtractionError> {
        let d = self.descriptor;
        let now = Utc::now();
        let pages = self.pages(source);
        let found = collect_from_pages(&self.fetcher, d.name, &pages, |body, page_url| {
            extract_with_groups(body, page_url, d.selector_groups, d.date_policy, now)
        })
        .await?;
        Ok(finalize(found, keywords, d.fallback_subject, d.fallback_position))
    }
}
