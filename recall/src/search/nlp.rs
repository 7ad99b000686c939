//! NLP-mode lexical pre-parser (§4.5). This is a heuristic regex sweep, not
//! an LLM planner: it strips temporal expressions, hashtags/`tag:` markers,
//! content-type hints, and a person-like capitalized bigram out of the raw
//! query text, leaving a residual keyword/semantic query behind.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use regex::Regex;

use crate::models::NlpExtraction;

const CONTENT_TYPES: &[&str] = &["note", "task", "idea", "meeting", "code"];

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "in", "on", "at", "for", "to", "and", "or", "is", "are", "was", "were",
    "be", "with", "about", "from", "my", "me", "i",
];

/// Extracts temporal/tag/type/entity hints from `query`, given the instant
/// "now" is resolved to (passed in rather than read from the clock so the
/// extraction stays deterministic and testable).
pub fn extract(query: &str, now: DateTime<Utc>) -> NlpExtraction {
    let mut remaining = query.to_string();
    let mut extraction = NlpExtraction::default();

    extract_hashtags(&mut remaining, &mut extraction.tags);
    extract_tag_markers(&mut remaining, &mut extraction.tags);
    extraction.type_hint = extract_type_hint(&mut remaining);
    extract_temporal(&mut remaining, now, &mut extraction.date_from, &mut extraction.date_to);
    extraction.entity_hint = extract_person_bigram(&mut remaining);
    extraction.residual_query = strip_stopwords(&remaining);

    extraction
}

fn extract_hashtags(text: &mut String, tags: &mut Vec<String>) {
    let re = Regex::new(r"#(\w+)").expect("valid hashtag regex");
    for cap in re.captures_iter(&text.clone()) {
        tags.push(cap[1].to_lowercase());
    }
    *text = re.replace_all(text, " ").to_string();
}

fn extract_tag_markers(text: &mut String, tags: &mut Vec<String>) {
    let re = Regex::new(r"(?i)tag:(\S+)").expect("valid tag marker regex");
    for cap in re.captures_iter(&text.clone()) {
        tags.push(cap[1].to_lowercase());
    }
    *text = re.replace_all(text, " ").to_string();
}

fn extract_type_hint(text: &mut String) -> Option<String> {
    let pattern = format!(r"(?i)\b({})\b", CONTENT_TYPES.join("|"));
    let re = Regex::new(&pattern).expect("valid type hint regex");
    let found = re.captures(text).map(|cap| cap[1].to_lowercase());
    if found.is_some() {
        *text = re.replacen(text, 1, " ").to_string();
    }
    found
}

fn day_bounds(day: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time");
    let start = Utc.from_utc_datetime(&start);
    (start, start + Duration::days(1))
}

fn extract_temporal(
    text: &mut String,
    now: DateTime<Utc>,
    date_from: &mut Option<DateTime<Utc>>,
    date_to: &mut Option<DateTime<Utc>>,
) {
    // `on YYYY-MM-DD`
    if let Some(re_match) = Regex::new(r"(?i)\bon\s+(\d{4}-\d{2}-\d{2})\b")
        .expect("valid iso date regex")
        .captures(&text.clone())
    {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(&re_match[1], "%Y-%m-%d") {
            let day = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
            let (from, to) = day_bounds(day);
            *date_from = Some(from);
            *date_to = Some(to);
            *text = text.replacen(&re_match[0], " ", 1);
            return;
        }
    }

    // `MM/DD/YYYY`
    if let Some(re_match) = Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b")
        .expect("valid slash date regex")
        .captures(&text.clone())
    {
        let (month, day_of_month, year) = (
            re_match[1].parse::<u32>().unwrap_or(1),
            re_match[2].parse::<u32>().unwrap_or(1),
            re_match[3].parse::<i32>().unwrap_or(now.year()),
        );
        if let Some(date) = chrono::NaiveDate::from_ymd_opt(year, month, day_of_month) {
            let day = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
            let (from, to) = day_bounds(day);
            *date_from = Some(from);
            *date_to = Some(to);
            *text = text.replacen(&re_match[0], " ", 1);
            return;
        }
    }

    // `N days ago`
    if let Some(re_match) = Regex::new(r"(?i)\b(\d+)\s+days?\s+ago\b")
        .expect("valid days-ago regex")
        .captures(&text.clone())
    {
        let n: i64 = re_match[1].parse().unwrap_or(0);
        let (from, to) = day_bounds(now - Duration::days(n));
        *date_from = Some(from);
        *date_to = Some(to);
        *text = text.replacen(&re_match[0], " ", 1);
        return;
    }

    // `last N days` / `last N hours`
    if let Some(re_match) = Regex::new(r"(?i)\blast\s+(\d+)\s+(days?|hours?)\b")
        .expect("valid last-N regex")
        .captures(&text.clone())
    {
        let n: i64 = re_match[1].parse().unwrap_or(0);
        let span = if re_match[2].to_lowercase().starts_with("hour") {
            Duration::hours(n)
        } else {
            Duration::days(n)
        };
        *date_from = Some(now - span);
        *date_to = Some(now);
        *text = text.replacen(&re_match[0], " ", 1);
        return;
    }

    let simple_spans: &[(&str, Duration)] = &[
        ("today", Duration::zero()),
        ("last week", Duration::days(7)),
        ("last month", Duration::days(30)),
        ("this week", Duration::days(7)),
        ("this month", Duration::days(30)),
    ];

    for (phrase, span) in simple_spans {
        let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase))).expect("valid phrase regex");
        if re.is_match(text) {
            if *phrase == "today" {
                let (from, to) = day_bounds(now);
                *date_from = Some(from);
                *date_to = Some(to);
            } else {
                *date_from = Some(now - *span);
                *date_to = Some(now);
            }
            *text = re.replacen(text, 1, " ").to_string();
            return;
        }
    }

    if let Some(re_match) = Regex::new(r"(?i)\byesterday\b").expect("valid yesterday regex").find(&text.clone()) {
        let (from, to) = day_bounds(now - Duration::days(1));
        *date_from = Some(from);
        *date_to = Some(to);
        let matched = re_match.as_str().to_string();
        *text = text.replacen(&matched, " ", 1);
    }
}

fn extract_person_bigram(text: &mut String) -> Option<String> {
    let re = Regex::new(r"\b([A-Z][a-z]+)\s+([A-Z][a-z]+)\b").expect("valid bigram regex");
    let found = re.captures(text).map(|cap| format!("{} {}", &cap[1], &cap[2]));
    if let Some(ref name) = found {
        *text = text.replacen(name.as_str(), " ", 1);
    }
    found
}

fn strip_stopwords(text: &str) -> String {
    text.split_whitespace()
        .filter(|word| {
            let lower = word.to_lowercase();
            !STOPWORDS.contains(&lower.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn extracts_hashtags_and_tag_markers() {
        let extraction = extract("deploy notes #release tag:urgent", fixed_now());
        assert!(extraction.tags.contains(&"release".to_string()));
        assert!(extraction.tags.contains(&"urgent".to_string()));
    }

    #[test]
    fn extracts_content_type_hint() {
        let extraction = extract("meeting notes from yesterday", fixed_now());
        assert_eq!(extraction.type_hint.as_deref(), Some("meeting"));
    }

    #[test]
    fn extracts_yesterday_as_a_day_bound() {
        let extraction = extract("meeting notes from yesterday", fixed_now());
        assert!(extraction.date_from.is_some());
        assert!(extraction.date_to.is_some());
        assert!(extraction.date_from.unwrap() < fixed_now());
    }

    #[test]
    fn extracts_last_n_days() {
        let extraction = extract("standup notes last 3 days", fixed_now());
        let from = extraction.date_from.expect("date_from set");
        assert_eq!((fixed_now() - from).num_days(), 3);
    }

    #[test]
    fn extracts_person_like_bigram_as_entity_hint() {
        let extraction = extract("lunch with John Smith", fixed_now());
        assert_eq!(extraction.entity_hint.as_deref(), Some("John Smith"));
    }

    #[test]
    fn strips_stopwords_from_residual_query() {
        let extraction = extract("the meeting about the roadmap", fixed_now());
        assert!(!extraction.residual_query.contains("the"));
        assert!(extraction.residual_query.contains("roadmap"));
    }
}
