//! Content-authenticity validator for model-produced articles.
//!
//! A text is authentic when all three checks pass:
//! - Cyrillic characters make up more than `threshold` of the non-whitespace characters
//! - there is no run of 4+ consecutive Latin letters
//! - none of the English tax/news lexemes occurs as a substring (case-insensitive)
//!
//! Intake (model response) is stricter than storage: 0.9 vs 0.8.

use crate::ingest::types::CandidateArticle;

pub const INTAKE_THRESHOLD: f32 = 0.9;
pub const STORAGE_THRESHOLD: f32 = 0.8;

const MAX_LATIN_RUN: usize = 3;

/// Common English words a model tends to leak into "translated" output.
/// Short ones matter most: anything of 4+ letters is already caught by the run check.
const ENGLISH_LEXEMES: &[&str] = &[
    "tax", "vat", "law", "act", "fee", "fine", "duty", "levy", "bill", "rate", "fund", "loan",
    "debt", "cash", "bank", "firm", "deal", "news", "new", "update", "report", "draft",
    "order", "letter", "decree", "ruling", "court", "case", "audit", "claim", "refund", "credit",
    "income", "profit", "payroll", "salary", "wage", "asset", "budget", "finance", "ministry",
    "federal", "service", "agency", "company", "business", "entity", "person", "citizen",
    "return", "filing", "deadline", "penalty", "regime", "simplified", "property", "land",
    "transport", "excise", "customs", "insurance", "pension", "the", "and", "for", "of",
];

/// Which check failed, for logging.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    LowCyrillic { ratio: f32, threshold: f32 },
    LatinRun(String),
    EnglishLexeme(&'static str),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::LowCyrillic { ratio, threshold } => {
                write!(f, "cyrillic ratio {ratio:.2} <= {threshold:.2}")
            }
            Rejection::LatinRun(run) => write!(f, "latin run {run:?}"),
            Rejection::EnglishLexeme(w) => write!(f, "english lexeme {w:?}"),
        }
    }
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}' | '\u{0500}'..='\u{052F}')
}

/// Cyrillic share of non-whitespace characters; 0.0 for blank text.
pub fn cyrillic_ratio(text: &str) -> f32 {
    let (mut cyr, mut total) = (0usize, 0usize);
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if is_cyrillic(c) {
            cyr += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        cyr as f32 / total as f32
    }
}

fn longest_latin_run(text: &str) -> Option<String> {
    let mut best = String::new();
    let mut cur = String::new();
    for c in text.chars() {
        if c.is_ascii_alphabetic() {
            cur.push(c);
            if cur.len() > best.len() {
                best = cur.clone();
            }
        } else {
            cur.clear();
        }
    }
    (best.len() > MAX_LATIN_RUN).then_some(best)
}

fn english_lexeme(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    ENGLISH_LEXEMES.iter().copied().find(|w| lower.contains(w))
}

/// Runs all checks; blank text passes (there is nothing foreign in it).
pub fn check(text: &str, threshold: f32) -> Result<(), Rejection> {
    if text.trim().is_empty() {
        return Ok(());
    }
    let ratio = cyrillic_ratio(text);
    if ratio <= threshold {
        return Err(Rejection::LowCyrillic { ratio, threshold });
    }
    if let Some(run) = longest_latin_run(text) {
        return Err(Rejection::LatinRun(run));
    }
    if let Some(w) = english_lexeme(text) {
        return Err(Rejection::EnglishLexeme(w));
    }
    Ok(())
}

/// Storage-boundary check (0.8).
pub fn is_authentic(text: &str) -> bool {
    is_authentic_with(text, STORAGE_THRESHOLD)
}

pub fn is_authentic_with(text: &str, threshold: f32) -> bool {
    check(text, threshold).is_ok()
}

/// Title and summary must both pass; one failing field rejects the article.
/// A blank title is always rejected.
pub fn check_article(article: &CandidateArticle, threshold: f32) -> Result<(), Rejection> {
    if article.title.trim().is_empty() {
        return Err(Rejection::LowCyrillic {
            ratio: 0.0,
            threshold,
        });
    }
    check(&article.title, threshold)?;
    check(&article.summary, threshold)
}
