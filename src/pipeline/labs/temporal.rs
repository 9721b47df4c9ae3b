//! Date and date-time parsing for the formats lab documents actually use.
//!
//! Layouts are tried in a fixed order and the first success wins. Anything
//! without an explicit offset is read as UTC.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized date format: {input:?}")]
pub struct DateFormatError {
    pub input: String,
}

/// "10/03/2024 às 08:15", "10/03/2024 as 08:15"
static AT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:às|as)\s+").unwrap());

/// "08h15", "8h", "08 h 15"
static HOUR_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*h(?:\s*(\d{2}))?\b").unwrap());

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

const NAIVE_DATE_TIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const OFFSET_DATE_TIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%d/%m/%Y %H:%M:%S %z",
    "%d/%m/%Y %H:%M %z",
];

/// Parse a calendar date. Result is midnight UTC.
pub fn parse_date(raw: &str) -> Result<DateTime<FixedOffset>, DateFormatError> {
    let input = raw.trim();
    parse_date_only(input).ok_or_else(|| DateFormatError {
        input: raw.to_string(),
    })
}

/// Parse a date with an optional time of day, falling back to `parse_date`
/// when no date-time layout matches.
pub fn parse_date_time(raw: &str) -> Result<DateTime<FixedOffset>, DateFormatError> {
    let input = canonicalize(raw);
    if input.is_empty() {
        return Err(DateFormatError {
            input: raw.to_string(),
        });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&input) {
        return Ok(dt);
    }
    for layout in NAIVE_DATE_TIME_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&input, layout) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    for layout in OFFSET_DATE_TIME_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(&input, layout) {
            return Ok(dt);
        }
    }

    parse_date_only(&input).ok_or_else(|| DateFormatError {
        input: raw.to_string(),
    })
}

fn parse_date_only(input: &str) -> Option<DateTime<FixedOffset>> {
    DATE_LAYOUTS.iter().find_map(|layout| {
        NaiveDate::parse_from_str(input, layout)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

/// Rewrite locale artifacts into the separators the layouts expect and
/// collapse runs of whitespace.
fn canonicalize(raw: &str) -> String {
    let text = AT_WORD.replace_all(raw.trim(), " ");
    let text = HOUR_MARK.replace_all(&text, |caps: &regex::Captures<'_>| {
        let minutes = caps.get(2).map_or("00", |m| m.as_str());
        format!("{}:{}", &caps[1], minutes)
    });
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
