// tests/keyword_filter.rs
use tax_news_aggregator::ingest::filter::filter_by_keywords;
use tax_news_aggregator::ingest::types::CandidateArticle;

fn art(title: &str, summary: &str) -> CandidateArticle {
    CandidateArticle::new(title, summary, "https://example.ru/a")
}

fn sample() -> Vec<CandidateArticle> {
    let mut with_subject = art("Разъяснения ведомства", "Порядок заполнения формы");
    with_subject.subject = Some("Налоговый контроль".into());
    let mut with_position = art("Позиция суда", "Кассация поддержала компанию");
    with_position.position = Some("НДС при экспорте".into());
    vec![
        art("Налог на прибыль: новые ставки", "С 2025 года"),
        art("Курс валют", "Биржевые новости дня"),
        with_subject,
        with_position,
    ]
}

#[test]
fn no_keywords_is_identity() {
    let input = sample();
    assert_eq!(filter_by_keywords(input.clone(), &[]), input);
    // blank keywords count as none
    let blanks = vec!["  ".to_string(), String::new()];
    assert_eq!(filter_by_keywords(input.clone(), &blanks), input);
}

#[test]
fn kept_articles_always_contain_a_keyword() {
    let kws = vec!["налог".to_string()];
    let out = filter_by_keywords(sample(), &kws);
    assert_eq!(out.len(), 2);
    for a in &out {
        let hay = format!(
            "{} {} {} {}",
            a.title,
            a.summary,
            a.subject.as_deref().unwrap_or_default(),
            a.position.as_deref().unwrap_or_default()
        )
        .to_lowercase();
        assert!(hay.contains("налог"), "unexpected article {:?}", a.title);
    }
}

#[test]
fn keywords_are_or_and_case_insensitive() {
    let kws = vec!["ндс".to_string(), "КУРС".to_string()];
    let titles: Vec<String> = filter_by_keywords(sample(), &kws)
        .into_iter()
        .map(|a| a.title)
        .collect();
    assert_eq!(titles, vec!["Курс валют".to_string(), "Позиция суда".to_string()]);
}
