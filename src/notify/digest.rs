//! Email digest scheduling, evaluated once after every ingestion run.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Months, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::ingest::store::NewsStore;
use crate::ingest::types::NewsItem;
use crate::notify::email::MailSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DigestFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl DigestFrequency {
    /// Instant after which the next digest is due.
    pub fn next_after(self, last: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            DigestFrequency::Daily => last.checked_add_signed(Duration::days(1)),
            DigestFrequency::Weekly => last.checked_add_signed(Duration::days(7)),
            DigestFrequency::Monthly => last.checked_add_months(Months::new(1)),
        }
    }

    /// Window used for the very first digest.
    fn first_window_start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DigestFrequency::Daily => now - Duration::days(1),
            DigestFrequency::Weekly => now - Duration::days(7),
            DigestFrequency::Monthly => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(now - Duration::days(30)),
        }
    }
}

/// Digest preferences owned by the surrounding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EmailSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub frequency: DigestFrequency,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub last_summary_date: Option<DateTime<Utc>>,
}

pub fn is_due(frequency: DigestFrequency, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last {
        None => true,
        Some(last) => frequency.next_after(last).is_some_and(|next| now >= next),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestOutcome {
    Disabled,
    NotDue,
    NothingNew,
    Sent { items: usize, recipients: usize },
}

#[async_trait]
pub trait DigestTrigger: Send + Sync {
    async fn evaluate(&self) -> Result<DigestOutcome>;
}

/// Does nothing; for deployments without digests.
pub struct NoopDigest;

#[async_trait]
impl DigestTrigger for NoopDigest {
    async fn evaluate(&self) -> Result<DigestOutcome> {
        Ok(DigestOutcome::Disabled)
    }
}

pub struct EmailDigestScheduler {
    store: Arc<dyn NewsStore>,
    mailer: Arc<dyn MailSender>,
    settings: Mutex<EmailSettings>,
}

impl EmailDigestScheduler {
    pub fn new(store: Arc<dyn NewsStore>, mailer: Arc<dyn MailSender>, settings: EmailSettings) -> Self {
        Self {
            store,
            mailer,
            settings: Mutex::new(settings),
        }
    }

    pub fn settings(&self) -> EmailSettings {
        self.settings.lock().expect("digest settings poisoned").clone()
    }

    pub async fn evaluate_at(&self, now: DateTime<Utc>) -> Result<DigestOutcome> {
        let settings = self.settings();
        if !settings.enabled || settings.recipients.is_empty() {
            return Ok(DigestOutcome::Disabled);
        }
        if !is_due(settings.frequency, settings.last_summary_date, now) {
            return Ok(DigestOutcome::NotDue);
        }

        let since = settings
            .last_summary_date
            .unwrap_or_else(|| settings.frequency.first_window_start(now));
        let items = self
            .store
            .news_since(since)
            .await
            .context("load news for digest")?;
        if items.is_empty() {
            tracing::info!(target: "notify", %since, "digest due but nothing new, skipping");
            return Ok(DigestOutcome::NothingNew);
        }

        let subject = format!("Дайджест налоговых новостей: {} шт.", items.len());
        let body = render_digest(&items, since, now);
        for to in &settings.recipients {
            self.mailer
                .send_email(to, &subject, &body)
                .await
                .with_context(|| format!("send digest to {to}"))?;
        }

        self.settings
            .lock()
            .expect("digest settings poisoned")
            .last_summary_date = Some(now);
        counter!("digest_sent_total").increment(1);
        tracing::info!(target: "notify", items = items.len(), recipients = settings.recipients.len(), "digest sent");
        Ok(DigestOutcome::Sent {
            items: items.len(),
            recipients: settings.recipients.len(),
        })
    }
}

#[async_trait]
impl DigestTrigger for EmailDigestScheduler {
    async fn evaluate(&self) -> Result<DigestOutcome> {
        self.evaluate_at(Utc::now()).await
    }
}

/// Plain markdown body, newest first.
pub fn render_digest(items: &[NewsItem], since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let mut out = format!(
        "# Налоговые новости\n\nПериод: {} - {}\n\n",
        since.format("%d.%m.%Y"),
        now.format("%d.%m.%Y")
    );
    for item in items {
        out.push_str(&format!(
            "- **{}** ({}, {})\n",
            item.title,
            item.source_name,
            item.published_at.format("%d.%m.%Y")
        ));
        if let Some(tax) = &item.tax_type {
            out.push_str(&format!("  Налог: {tax}\n"));
        }
        if let Some(doc) = &item.document_ref {
            out.push_str(&format!("  Документ: {doc}\n"));
        }
        if !item.summary.is_empty() {
            out.push_str(&format!("  {}\n", item.summary));
        }
        out.push_str(&format!("  {}\n", item.source_url));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 8, 0, 0).unwrap()
    }

    #[test]
    fn cadence() {
        let last = at(2025, 1, 31);
        assert!(is_due(DigestFrequency::Daily, None, last));
        assert!(!is_due(DigestFrequency::Daily, Some(last), at(2025, 1, 31)));
        assert!(is_due(DigestFrequency::Daily, Some(last), at(2025, 2, 1)));
        assert!(!is_due(DigestFrequency::Weekly, Some(last), at(2025, 2, 6)));
        assert!(is_due(DigestFrequency::Weekly, Some(last), at(2025, 2, 7)));
        // Jan 31 + 1 month clamps to Feb 28
        assert!(!is_due(DigestFrequency::Monthly, Some(last), at(2025, 2, 27)));
        assert!(is_due(DigestFrequency::Monthly, Some(last), at(2025, 2, 28)));
    }

    #[test]
    fn frequency_wire_format() {
        let f: DigestFrequency = serde_json::from_str("\"WEEKLY\"").unwrap();
        assert_eq!(f, DigestFrequency::Weekly);
    }
}
