//! Model-driven extraction: visible page text -> structured articles.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;

use crate::analyze::ai_adapter::{request_typed, DynModel, ResponseShape};
use crate::analyze::authenticity::{check_article, INTAKE_THRESHOLD};
use crate::ingest::dates::parse_date;
use crate::ingest::fetch::ResilientFetcher;
use crate::ingest::normalize_text;
use crate::ingest::parsers::html::page_text;
use crate::ingest::parsers::{finalize, ExtractionError, ExtractionParser};
use crate::ingest::types::{CandidateArticle, PublishedDate, Source};

const SYSTEM_PROMPT: &str = "Ты извлекаешь налоговые новости из текста веб-страницы. \
Верни только статьи, которые явно присутствуют в тексте. Пиши заголовок и краткое \
содержание только на русском языке, без английских слов. Дату публикации верни в \
формате ISO 8601 или \"unknown\", если её нет. Не придумывай ссылки.";

/// `{articles: [...]}` with every field present; optional ones may be null.
pub static ARTICLES_SHAPE: Lazy<ResponseShape> = Lazy::new(|| {
    let nullable = json!({ "type": ["string", "null"] });
    ResponseShape {
        name: "tax_news_articles",
        schema: json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["articles"],
            "properties": {
                "articles": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": [
                            "title", "summary", "published_date", "url",
                            "document_ref", "tax_type", "subject", "position"
                        ],
                        "properties": {
                            "title": { "type": "string" },
                            "summary": { "type": "string" },
                            "published_date": { "type": "string" },
                            "url": nullable,
                            "document_ref": nullable,
                            "tax_type": nullable,
                            "subject": nullable,
                            "position": nullable
                        }
                    }
                }
            }
        }),
    }
});

#[derive(Debug, Deserialize)]
struct ModelArticles {
    articles: Vec<ModelArticle>,
}

#[derive(Debug, Deserialize)]
struct ModelArticle {
    title: String,
    summary: String,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    document_ref: Option<String>,
    #[serde(default)]
    tax_type: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    position: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| normalize_text(&s)).filter(|s| !s.is_empty())
}

fn model_date(raw: Option<&str>) -> PublishedDate {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return PublishedDate::Unknown;
    };
    PublishedDate::try_from(raw.to_string())
        .ok()
        .or_else(|| parse_date(raw).map(PublishedDate::At))
        .unwrap_or(PublishedDate::Unknown)
}

impl From<ModelArticle> for CandidateArticle {
    fn from(m: ModelArticle) -> Self {
        let published_date = model_date(m.published_date.as_deref());
        let mut a = CandidateArticle::new(
            normalize_text(&m.title),
            normalize_text(&m.summary),
            non_blank(m.url).unwrap_or_default(),
        );
        a.published_date = published_date;
        a.document_ref = non_blank(m.document_ref);
        a.tax_type = non_blank(m.tax_type);
        a.subject = non_blank(m.subject);
        a.position = non_blank(m.position);
        a
    }
}

pub struct ModelExtractor {
    model: DynModel,
    fetcher: Arc<ResilientFetcher>,
    max_page_chars: usize,
}

impl ModelExtractor {
    pub fn new(model: DynModel, fetcher: Arc<ResilientFetcher>, max_page_chars: usize) -> Self {
        Self {
            model,
            fetcher,
            max_page_chars,
        }
    }

    fn user_prompt(&self, source: &Source, keywords: &[String], text: &str) -> String {
        format!(
            "Источник: {} ({})\nКлючевые слова: {}\n\nТекст страницы:\n{}",
            source.name,
            source.url,
            keywords.join(", "),
            text
        )
    }
}

#[async_trait]
impl ExtractionParser for ModelExtractor {
    fn name(&self) -> &str {
        "model"
    }

    async fn extract(
        &self,
        source: &Source,
        keywords: &[String],
    ) -> Result<Vec<CandidateArticle>, ExtractionError> {
        let Some(body) = self.fetcher.fetch_with_retry(&source.url).await? else {
            return Ok(Vec::new());
        };
        let text = page_text(&body, self.max_page_chars);
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = self.user_prompt(source, keywords, &text);
        let parsed: ModelArticles =
            request_typed(self.model.as_ref(), SYSTEM_PROMPT, &prompt, &ARTICLES_SHAPE)
                .await
                .map_err(|e| ExtractionError::Model(format!("{e:#}")))?;

        let total = parsed.articles.len();
        let accepted: Vec<CandidateArticle> = parsed
            .articles
            .into_iter()
            .map(CandidateArticle::from)
            .filter(|a| match check_article(a, INTAKE_THRESHOLD) {
                Ok(()) => true,
                Err(reason) => {
                    tracing::debug!(target: "ingest", source = %source.name, title = %a.title, %reason, "model article rejected at intake");
                    counter!("ingest_rejected_total", "stage" => "intake").increment(1);
                    false
                }
            })
            .collect();

        tracing::info!(
            target: "ingest",
            source = %source.name,
            provider = self.model.provider_name(),
            total,
            accepted = accepted.len(),
            "model extraction"
        );
        Ok(finalize(accepted, keywords, None, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_dates_accept_iso_and_russian() {
        assert!(matches!(
            model_date(Some("2025-03-01T10:00:00Z")),
            PublishedDate::At(_)
        ));
        assert!(matches!(model_date(Some("1 марта 2025")), PublishedDate::At(_)));
        assert!(model_date(Some("unknown")).is_unknown());
        assert!(model_date(None).is_unknown());
    }
}
