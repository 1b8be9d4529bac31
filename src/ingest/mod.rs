// src/ingest/mod.rs
pub mod classify;
pub mod config;
pub mod dates;
pub mod dedup;
pub mod fetch;
pub mod filter;
pub mod orchestrator;
pub mod parsers;
pub mod store;
pub mod tasks;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Ingestion runs started.");
        describe_counter!(
            "ingest_candidates_total",
            "Candidate articles returned by parsers (after keyword filter)."
        );
        describe_counter!("ingest_persisted_total", "New news items stored.");
        describe_counter!(
            "ingest_duplicates_total",
            "Candidates discarded by the deduplication gate."
        );
        describe_counter!(
            "ingest_rejected_total",
            "Candidates rejected by the content-authenticity check."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Sources whose extraction failed."
        );
        describe_counter!("fetch_transient_errors_total", "Transient fetch failures.");
        describe_counter!("fetch_errors_total", "Non-transient fetch failures.");
        describe_counter!("digest_sent_total", "Email digests sent.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the ingest pipeline last finished."
        );
    });
}

/// Normalize feed/markup text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Non-breaking and zero-width spaces
    out = out.replace(['\u{00A0}', '\u{202F}'], " ").replace('\u{200B}', "");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Length cap: 5000 chars
    if out.chars().count() > 5_000 {
        out = out.chars().take(5_000).collect();
    }

    out
}
