//! KB identifier and answer-literal helpers: entity/predicate ids, years,
//! timestamps, dates and ConvQuestions answer URLs.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static ENTITY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Q[0-9]+$").expect("Invalid regex pattern"));
static PREDICATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^P[0-9]+$").expect("Invalid regex pattern"));
static NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("Invalid regex pattern"));
static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}$").expect("Invalid regex pattern"));
static DMY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+ [A-Za-z]+ [0-9]{4}$").expect("Invalid regex pattern"));
static MDY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z][a-z]* [0-9]+, [0-9]{4}").expect("Invalid regex pattern"));
static TIMESTAMP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^"?[0-9]{4}-[0-9]{2}-[0-9]{2}T00:00:00Z"#).expect("Invalid regex pattern")
});

pub fn is_entity(value: &str) -> bool {
    ENTITY_PATTERN.is_match(value.trim())
}

pub fn is_predicate(value: &str) -> bool {
    PREDICATE_PATTERN.is_match(value.trim())
}

/// `YYYY`
pub fn is_year(value: &str) -> bool {
    YEAR_PATTERN.is_match(value.trim())
}

/// Unsigned integer, ignoring quotes and `+` signs.
pub fn is_number(value: &str) -> bool {
    NUMBER_PATTERN.is_match(strip_literal(value).trim())
}

/// `YYYY-MM-DDT00:00:00Z`, optionally opened by a quote.
pub fn is_timestamp(value: &str) -> bool {
    TIMESTAMP_PATTERN.is_match(value.trim())
}

pub fn is_existential(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("yes") || value.eq_ignore_ascii_case("no")
}

/// Remove quotes and `+` signs the KB wraps literals in.
pub fn strip_literal(value: &str) -> String {
    value.replace(['"', '+'], "")
}

pub fn year_to_timestamp(year: &str) -> String {
    format!("{}-01-01T00:00:00Z", year)
}

/// Outcome of reading a value as a KB timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampParse<'a> {
    /// A timestamp; carries its year component.
    Year(&'a str),
    /// Not a timestamp; compare the value literally.
    Literal,
}

pub fn parse_timestamp(value: &str) -> TimestampParse<'_> {
    if !is_timestamp(value) {
        return TimestampParse::Literal;
    }
    let year = value
        .trim()
        .trim_start_matches('"')
        .split('-')
        .next()
        .unwrap_or_default();
    TimestampParse::Year(year)
}

/// Outcome of converting a human-readable date into a KB timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateParse {
    Parsed(String),
    Unparsed,
}

impl DateParse {
    /// Timestamp if parsed, otherwise the original text.
    pub fn or_literal(self, original: &str) -> String {
        match self {
            DateParse::Parsed(timestamp) => timestamp,
            DateParse::Unparsed => original.to_string(),
        }
    }
}

/// `7 May 1990`
pub fn is_dmy_date(value: &str) -> bool {
    DMY_PATTERN.is_match(value.trim())
}

/// `May 7, 1990`
pub fn is_mdy_date(value: &str) -> bool {
    MDY_PATTERN.is_match(value.trim())
}

pub fn dmy_to_timestamp(date: &str) -> DateParse {
    parse_date(date.trim(), "%d %B %Y")
}

pub fn mdy_to_timestamp(date: &str) -> DateParse {
    parse_date(date.trim(), "%B %d, %Y")
}

fn parse_date(date: &str, format: &str) -> DateParse {
    match NaiveDate::parse_from_str(date, format) {
        Ok(date) => DateParse::Parsed(format!("{}T00:00:00Z", date.format("%Y-%m-%d"))),
        Err(e) => {
            log::debug!("Could not parse date '{}' ({}): {}", date, format, e);
            DateParse::Unparsed
        }
    }
}

/// Human-readable label for a timestamp: `7 May 1990`, or the bare year for January 1st.
pub fn timestamp_to_label(timestamp: &str) -> String {
    let trimmed = timestamp.trim().trim_matches('"');
    let day_part = trimmed.split('T').next().unwrap_or(trimmed);
    match NaiveDate::parse_from_str(day_part, "%Y-%m-%d") {
        Ok(date) if date.month() == 1 && date.day() == 1 => date.year().to_string(),
        Ok(date) => format!("{} {} {}", date.day(), date.format("%B"), date.year()),
        Err(_) => timestamp.to_string(),
    }
}

/// Convert one ConvQuestions answer (Wikidata URL, typed literal, year, date,
/// yes/no, plain constant) into a KB answer id.
pub fn answer_url_to_id(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    // typed xsd literal: "1990-05-07T00:00:00Z"^^<...XMLSchema#dateTime>
    if url.contains("XMLSchema#dateTime") || url.contains("XMLSchema#decimal") {
        let value = url.split('"').nth(1).unwrap_or(url);
        return Some(value.replace('+', ""));
    }
    if !url.contains("wikidata.org") {
        let id = if is_year(url) {
            year_to_timestamp(url.trim())
        } else if is_dmy_date(url) {
            dmy_to_timestamp(url).or_literal(url)
        } else if is_mdy_date(url) {
            mdy_to_timestamp(url).or_literal(url)
        } else if is_existential(url) {
            let answer = if url.trim().eq_ignore_ascii_case("yes") { "Yes" } else { "No" };
            answer.to_string()
        } else {
            url.replace('"', "")
        };
        return Some(id);
    }
    url.rsplit('/').next().map(str::to_string)
}

/// Split a `;`-separated ConvQuestions answer string into answer ids.
pub fn parse_answer_urls(answer_urls: &str) -> Vec<String> {
    answer_urls
        .split(';')
        .filter(|url| !url.trim().is_empty())
        .filter_map(answer_url_to_id)
        .collect()
}

/// Coarse classification of a gold-answer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    Entity,
    Predicate,
    Existential,
    Timestamp,
    Year,
    Number,
    Text,
}

impl AnswerKind {
    pub fn of(answer_id: &str) -> Self {
        if is_entity(answer_id) {
            AnswerKind::Entity
        } else if is_predicate(answer_id) {
            AnswerKind::Predicate
        } else if answer_id == "Yes" || answer_id == "No" {
            AnswerKind::Existential
        } else if is_timestamp(answer_id) {
            AnswerKind::Timestamp
        } else if is_year(answer_id) {
            AnswerKind::Year
        } else if is_number(answer_id) {
            AnswerKind::Number
        } else {
            AnswerKind::Text
        }
    }
}
