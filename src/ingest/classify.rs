// src/ingest/classify.rs
//! Light enrichment for candidates: regulatory document numbers and tax type.
//! Regexes must be compatible with the `regex` crate (no lookarounds).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::types::CandidateArticle;

// "№ БС-4-11/123@", "№ 03-07-11/5521", "№ 117-ФЗ"
static RE_DOC_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"№\s?([0-9A-Za-zА-Яа-яЁё][0-9A-Za-zА-Яа-яЁё\-/.@]*[0-9A-Za-zА-Яа-яЁё@])")
        .expect("doc ref regex")
});

/// (lowercase lexeme, canonical tax type). Order matters: the first hit wins.
const TAX_TYPES: &[(&str, &str)] = &[
    ("ндфл", "НДФЛ"),
    ("налог на доходы физических лиц", "НДФЛ"),
    ("ндс", "НДС"),
    ("налог на добавленную стоимость", "НДС"),
    ("налог на прибыль", "Налог на прибыль"),
    ("усн", "УСН"),
    ("упрощенн", "УСН"),
    ("упрощённ", "УСН"),
    ("патент", "ПСН"),
    ("самозанят", "НПД"),
    ("нпд", "НПД"),
    ("страховые взносы", "Страховые взносы"),
    ("страховых взносов", "Страховые взносы"),
    ("акциз", "Акцизы"),
    ("ндпи", "НДПИ"),
    ("транспортный налог", "Транспортный налог"),
    ("земельный налог", "Земельный налог"),
    ("налог на имущество", "Налог на имущество"),
    ("госпошлин", "Госпошлина"),
];

pub fn extract_document_ref(text: &str) -> Option<String> {
    RE_DOC_REF
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn detect_tax_type(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    TAX_TYPES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, canonical)| *canonical)
}

/// Fill `document_ref` and `tax_type` when the parser did not set them.
pub fn enrich(article: &mut CandidateArticle) {
    let joined = format!("{} {}", article.title, article.summary);
    if article.document_ref.is_none() {
        article.document_ref = extract_document_ref(&joined);
    }
    if article.tax_type.is_none() {
        article.tax_type = detect_tax_type(&joined).map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_fns_letter_number() {
        let t = "Письмо ФНС России от 10.01.2025 № БС-4-11/123@ о вычетах";
        assert_eq!(extract_document_ref(t).as_deref(), Some("БС-4-11/123@"));
    }

    #[test]
    fn finds_federal_law_number() {
        assert_eq!(
            extract_document_ref("Федеральный закон № 176-ФЗ").as_deref(),
            Some("176-ФЗ")
        );
    }

    #[test]
    fn ndfl_wins_over_nds_prefix() {
        assert_eq!(detect_tax_type("Ставки НДФЛ выросли"), Some("НДФЛ"));
        assert_eq!(detect_tax_type("Ставка НДС 22%"), Some("НДС"));
        assert_eq!(detect_tax_type("Курс валют"), None);
    }
}
