//! Column profiling and type inference over a [`ParsedTable`].
//!
//! Each column is classified from its non-null values in strict precedence:
//! boolean (every value is a boolean token), date (at least 80% date-like and
//! parseable), number (at least 80% numeric once currency symbols and
//! thousands separators are removed), and string otherwise. A column without
//! any value is typed `null`.
//!
//! Analysis is read-only and deterministic: profiling the same table twice
//! yields equal schemas.

use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    data::{is_date_value, parse_boolean_token, parse_number},
    parser::{ParsedTable, SYNTHETIC_HEADER_PREFIX},
};

const DATE_THRESHOLD_PERCENT: usize = 80;
const NUMBER_THRESHOLD_PERCENT: usize = 80;
const SAMPLE_VALUE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Date,
    Null,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Null => "null",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["string", "number", "boolean", "date", "null"]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" | "text" => Ok(ColumnType::String),
            "number" | "numeric" | "float" | "integer" => Ok(ColumnType::Number),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "null" | "empty" => Ok(ColumnType::Null),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub index: usize,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    pub sample_values: Vec<String>,
    pub null_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnProfile>,
    pub delimiter: char,
    pub has_header: bool,
    pub row_count: usize,
}

impl Schema {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing schema to YAML string")
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing schema to JSON string")
    }
}

/// Whether `name` looks like a header generated by the table builder.
pub fn is_synthetic_header(name: &str) -> bool {
    name.strip_prefix(SYNTHETIC_HEADER_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

#[derive(Debug, Clone, Default)]
struct TypeCandidate {
    non_null: usize,
    boolean_matches: usize,
    date_matches: usize,
    number_matches: usize,
}

impl TypeCandidate {
    fn update(&mut self, value: &str) {
        self.non_null += 1;
        if parse_boolean_token(value).is_some() {
            self.boolean_matches += 1;
        }
        if is_date_value(value) {
            self.date_matches += 1;
        }
        if parse_number(value).is_some() {
            self.number_matches += 1;
        }
    }

    fn meets(&self, matches: usize, percent: usize) -> bool {
        matches.saturating_mul(100) >= self.non_null.saturating_mul(percent)
    }

    fn decide(&self) -> ColumnType {
        if self.non_null == 0 {
            ColumnType::Null
        } else if self.boolean_matches == self.non_null {
            ColumnType::Boolean
        } else if self.meets(self.date_matches, DATE_THRESHOLD_PERCENT) {
            ColumnType::Date
        } else if self.meets(self.number_matches, NUMBER_THRESHOLD_PERCENT) {
            ColumnType::Number
        } else {
            ColumnType::String
        }
    }
}

#[derive(Debug, Default)]
struct ProfileAccumulator {
    candidate: TypeCandidate,
    null_count: usize,
    distinct: HashSet<String>,
    samples: Vec<String>,
}

impl ProfileAccumulator {
    fn record(&mut self, cell: Option<&str>) {
        let Some(value) = cell else {
            self.null_count += 1;
            return;
        };
        self.candidate.update(value);
        if self.distinct.insert(value.to_string()) && self.samples.len() < SAMPLE_VALUE_LIMIT {
            self.samples.push(value.to_string());
        }
    }

    fn finalize(self, name: &str, index: usize) -> ColumnProfile {
        ColumnProfile {
            name: name.to_string(),
            index,
            column_type: self.candidate.decide(),
            nullable: self.null_count > 0,
            unique: self.distinct.len() == self.candidate.non_null,
            sample_values: self.samples,
            null_count: self.null_count,
        }
    }
}

pub fn analyze_schema(table: &ParsedTable) -> Schema {
    let columns = table
        .headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let mut acc = ProfileAccumulator::default();
            for cell in table.column_values(idx) {
                acc.record(cell);
            }
            acc.finalize(header, idx)
        })
        .collect();

    Schema {
        columns,
        delimiter: table.delimiter,
        has_header: !table.headers.iter().all(|h| is_synthetic_header(h)),
        row_count: table.row_count,
    }
}

/// Short description of the value format behind an inferred type, for schema
/// listings.
pub fn format_hint_for(profile: &ColumnProfile) -> Option<String> {
    let sample = profile.sample_values.first()?;
    match profile.column_type {
        ColumnType::Date => {
            if sample.contains('T') || sample.contains(' ') {
                Some("Date with time component".to_string())
            } else if sample.contains('/') {
                Some("Slash-separated date".to_string())
            } else {
                Some("Hyphen-separated date".to_string())
            }
        }
        ColumnType::Boolean => {
            let normalized = sample.trim().to_ascii_lowercase();
            if matches!(normalized.as_str(), "true" | "false") {
                Some("Boolean (true/false tokens)".to_string())
            } else if matches!(normalized.as_str(), "yes" | "no" | "y" | "n") {
                Some("Boolean (yes/no tokens)".to_string())
            } else {
                Some("Boolean (1/0 tokens)".to_string())
            }
        }
        ColumnType::Number => {
            let has_currency = ['$', '€', '£', '¥'].iter().any(|s| sample.contains(*s));
            if has_currency {
                Some("Currency symbol detected".to_string())
            } else if sample.contains(',') {
                Some("Thousands separator present".to_string())
            } else if sample.contains('.') {
                Some("Decimal point".to_string())
            } else {
                Some("Whole number".to_string())
            }
        }
        ColumnType::String | ColumnType::Null => None,
    }
}
