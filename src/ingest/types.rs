// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Website,
    Channel,
}

/// A configured origin the pipeline may fetch from. `url` is unique per store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: u64,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: u64,
    pub text: String,
}

/// Publish date of a candidate: an absolute instant or `"unknown"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PublishedDate {
    At(DateTime<Utc>),
    Unknown,
}

impl PublishedDate {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            PublishedDate::At(ts) => Some(*ts),
            PublishedDate::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, PublishedDate::Unknown)
    }
}

impl From<Option<DateTime<Utc>>> for PublishedDate {
    fn from(v: Option<DateTime<Utc>>) -> Self {
        v.map(PublishedDate::At).unwrap_or(PublishedDate::Unknown)
    }
}

impl From<PublishedDate> for String {
    fn from(d: PublishedDate) -> Self {
        match d {
            PublishedDate::At(ts) => ts.to_rfc3339(),
            PublishedDate::Unknown => "unknown".to_string(),
        }
    }
}

impl TryFrom<String> for PublishedDate {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.trim().eq_ignore_ascii_case("unknown") {
            return Ok(PublishedDate::Unknown);
        }
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| PublishedDate::At(dt.with_timezone(&Utc)))
            .map_err(|e| format!("invalid published date {s:?}: {e}"))
    }
}

/// Transient, parser-produced article. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateArticle {
    pub title: String,
    pub summary: String,
    pub published_date: PublishedDate,
    pub url: String,
    #[serde(default)]
    pub document_ref: Option<String>,
    #[serde(default)]
    pub tax_type: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl CandidateArticle {
    pub fn new(title: impl Into<String>, summary: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            published_date: PublishedDate::Unknown,
            url: url.into(),
            document_ref: None,
            tax_type: None,
            subject: None,
            position: None,
        }
    }
}

/// Persisted news record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub source_url: String,
    pub source_name: String,
    /// Back-reference only; cleared when the source is deleted.
    pub source_id: Option<u64>,
    pub document_ref: Option<String>,
    pub tax_type: Option<String>,
    pub subject: Option<String>,
    pub position: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// Insert payload; the store assigns `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNewsItem {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub source_url: String,
    pub source_name: String,
    pub source_id: Option<u64>,
    pub document_ref: Option<String>,
    pub tax_type: Option<String>,
    pub subject: Option<String>,
    pub position: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl NewNewsItem {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            title: self.title.clone(),
            source_url: self.source_url.clone(),
            source_name: self.source_name.clone(),
        }
    }
}

/// `(title, source_url, source_name)`: two items with the same key are the same article.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub title: String,
    pub source_url: String,
    pub source_name: String,
}

impl NewsItem {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            title: self.title.clone(),
            source_url: self.source_url.clone(),
            source_name: self.source_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn published_date_wire_format() {
        let at = PublishedDate::At(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
        let json = serde_json::to_string(&at).unwrap();
        assert_eq!(json, r#""2025-03-01T09:00:00+00:00""#);
        let unknown = serde_json::to_string(&PublishedDate::Unknown).unwrap();
        assert_eq!(unknown, r#""unknown""#);

        let back: PublishedDate = serde_json::from_str(r#""unknown""#).unwrap();
        assert!(back.is_unknown());
        assert!(serde_json::from_str::<PublishedDate>(r#""вчера""#).is_err());
    }
}
