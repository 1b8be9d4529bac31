// src/ingest/dates.rs
//! Free-form Russian date expressions -> absolute UTC instants.
//!
//! Strategies, first hit wins:
//! 1) relative words (`сегодня`, `вчера`, `позавчера`) against `now`
//! 2) numeric `D.M.Y` / `D/M/Y` / `D-M-Y` (two-digit year means 20YY)
//! 3) `D <month name>[,] [Y]`, year defaults to the year of `now`
//! 4) machine formats: RFC 3339, RFC 2822, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%d`
//!
//! Calendar dates without a time are read as UTC midnight.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\d])(\d{1,2})[./-](\d{1,2})[./-](\d{4}|\d{2})(?:[^\d]|$)")
        .expect("numeric date regex")
});

/// Closed list of month forms: genitive, nominative and the usual abbreviations.
/// A word only counts as a month when it is one of these in full.
const MONTH_FORMS: &str = "января|январь|янв|февраля|февраль|февр|фев|марта|март|мар|\
апреля|апрель|апр|мая|май|июня|июнь|июн|июля|июль|июл|августа|август|авг|\
сентября|сентябрь|сент|сен|октября|октябрь|окт|ноября|ноябрь|нояб|ноя|декабря|декабрь|дек";

static RE_MONTH_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:^|[^\d])(\d{{1,2}})\s+({MONTH_FORMS})\b\.?(?:\s*,?\s*(\d{{4}}))?"
    ))
    .expect("month date regex")
});

static RE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d])(\d{1,2}):(\d{2})(?:[^\d]|$)").expect("time regex"));

// Every entry of MONTH_FORMS starts with exactly one of these stems.
const MONTH_STEMS: &[(&str, u32)] = &[
    ("янв", 1),
    ("фев", 2),
    ("мар", 3),
    ("апр", 4),
    ("мая", 5),
    ("май", 5),
    ("июн", 6),
    ("июл", 7),
    ("авг", 8),
    ("сен", 9),
    ("окт", 10),
    ("ноя", 11),
    ("дек", 12),
];

/// Parse against the wall clock.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    parse_date_at(text, Utc::now())
}

/// Deterministic variant: relative words and missing years resolve against `now`.
pub fn parse_date_at(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let t = text.trim().to_lowercase();
    if t.is_empty() {
        return None;
    }

    parse_relative(&t, now)
        .or_else(|| parse_numeric(&t))
        .or_else(|| parse_month_name(&t, now))
        .or_else(|| parse_machine(text.trim()))
}

fn parse_relative(t: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    // "позавчера" contains "вчера", so it goes first.
    if t.contains("позавчера") {
        return Some(now - Duration::hours(48));
    }
    if t.contains("вчера") {
        return Some(now - Duration::hours(24));
    }
    if t.contains("сегодня") {
        return Some(now);
    }
    None
}

fn parse_numeric(t: &str) -> Option<DateTime<Utc>> {
    let caps = RE_NUMERIC.captures(t)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year_raw = &caps[3];
    let mut year: i32 = year_raw.parse().ok()?;
    if year_raw.len() == 2 {
        year += 2000;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(at_time_of_day(date, t))
}

fn parse_month_name(t: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    for caps in RE_MONTH_NAME.captures_iter(t) {
        let Some(month) = month_from_word(&caps[2]) else {
            continue;
        };
        let day: u32 = caps[1].parse().ok()?;
        let year = match caps.get(3) {
            Some(y) => y.as_str().parse().ok()?,
            None => now.year(),
        };
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return Some(at_time_of_day(date, t));
    }
    None
}

fn month_from_word(word: &str) -> Option<u32> {
    MONTH_STEMS
        .iter()
        .find(|(stem, _)| word.starts_with(stem))
        .map(|(_, m)| *m)
}

/// Applies the first `HH:MM` found in `t`, else midnight.
fn at_time_of_day(date: NaiveDate, t: &str) -> DateTime<Utc> {
    let time = RE_TIME
        .captures(t)
        .and_then(|c| {
            let h: u32 = c[1].parse().ok()?;
            let m: u32 = c[2].parse().ok()?;
            NaiveTime::from_hms_opt(h, m, 0)
        })
        .unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(time))
}

fn parse_machine(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&ndt));
    }
    if let Ok(nd) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&nd.and_time(NaiveTime::MIN)));
    }
    None
}
