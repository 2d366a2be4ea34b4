//! Scalar cell values and the token parsers shared by schema inference,
//! value transforms, and the expression evaluator.

use std::{cmp::Ordering, fmt, sync::OnceLock};

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Value {
    /// Wraps a raw table cell; absent cells become [`Value::Null`].
    pub fn from_cell(cell: Option<&str>) -> Self {
        match cell {
            Some(raw) => Value::String(raw.to_string()),
            None => Value::Null,
        }
    }

    /// True for null and for the empty string.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the value. Strings are parsed with [`parse_number`].
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
        }
    }

    /// Orders numerically when both sides are numeric, otherwise by display
    /// text. Missing values sort last.
    pub fn loose_cmp(&self, other: &Self) -> Ordering {
        match (self.is_missing(), other.is_missing()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }
        match (self.as_number(), other.as_number()) {
            (Some(left), Some(right)) => left.total_cmp(&right),
            _ => self.as_display().cmp(&other.as_display()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

pub fn parse_boolean_token(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "y" => Some(true),
        "false" | "no" | "0" | "n" => Some(false),
        _ => None,
    }
}

/// Parses a number after removing currency symbols, thousands separators,
/// and inner whitespace. Rejects `inf`/`nan` spellings.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed
        .chars()
        .filter(|ch| !CURRENCY_SYMBOLS.contains(ch) && !matches!(ch, ',' | '_' | ' '))
        .collect();
    if !cleaned.chars().any(|ch| ch.is_ascii_digit()) {
        return None;
    }
    if cleaned
        .chars()
        .any(|ch| !(ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E')))
    {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Optional `HH:MM[:SS[.fff]]` after a date, with an optional UTC offset.
const TIME_SUFFIX: &str = r"(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?$";

fn date_like_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"^\d{4}-\d{2}-\d{2}", r"^\d{2}/\d{2}/\d{4}", r"^\d{2}-\d{2}-\d{4}"]
            .iter()
            .filter_map(|pattern| Regex::new(&format!("{pattern}{TIME_SUFFIX}")).ok())
            .collect()
    })
}

fn time_suffix() -> Option<&'static Regex> {
    static SUFFIX: OnceLock<Option<Regex>> = OnceLock::new();
    SUFFIX
        .get_or_init(|| Regex::new(&format!("^{TIME_SUFFIX}")).ok())
        .as_ref()
}

/// Matches `YYYY-MM-DD`, `DD/MM/YYYY`, or `DD-MM-YYYY`, optionally followed
/// by a time of day. Anything else after the date rejects the value.
pub fn is_date_like(value: &str) -> bool {
    let trimmed = value.trim();
    date_like_patterns()
        .iter()
        .any(|pattern| pattern.is_match(trimmed))
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    let (date_part, rest) = trimmed
        .get(..10)
        .zip(trimmed.get(10..))
        .unwrap_or((trimmed, ""));
    if !rest.is_empty() && !time_suffix().is_some_and(|suffix| suffix.is_match(rest)) {
        return Err(anyhow!("Unexpected trailing text in date '{value}'"));
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(date_part, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn is_date_value(value: &str) -> bool {
    is_date_like(value) && parse_naive_date(value).is_ok()
}
