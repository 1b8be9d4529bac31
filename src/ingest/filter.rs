// src/ingest/filter.rs
use crate::ingest::types::CandidateArticle;

/// Keep articles mentioning at least one keyword (case-insensitive substring over
/// title, summary, subject and position). No keywords means no filtering.
pub fn filter_by_keywords(
    articles: Vec<CandidateArticle>,
    keywords: &[String],
) -> Vec<CandidateArticle> {
    let needles = lowered_keywords(keywords);
    if needles.is_empty() {
        return articles;
    }
    articles
        .into_iter()
        .filter(|a| matches_any(a, &needles))
        .collect()
}

/// Trimmed, lowercased, blank entries removed.
pub fn lowered_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

pub fn matches_any(article: &CandidateArticle, lowered: &[String]) -> bool {
    let haystack = searchable_text(article);
    lowered.iter().any(|k| haystack.contains(k.as_str()))
}

fn searchable_text(a: &CandidateArticle) -> String {
    let mut s = String::with_capacity(a.title.len() + a.summary.len() + 32);
    for part in [
        Some(a.title.as_str()),
        Some(a.summary.as_str()),
        a.subject.as_deref(),
        a.position.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        s.push_str(part);
        s.push(' ');
    }
    s.to_lowercase()
}
