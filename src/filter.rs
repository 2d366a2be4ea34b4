use std::{cmp::Ordering, fmt};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{data::Value, mapping::MappedRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
}

impl ComparisonOperator {
    fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::NotEq => "!=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Ge => ">=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Le => "<=",
            ComparisonOperator::Contains => "contains",
            ComparisonOperator::StartsWith => "startswith",
            ComparisonOperator::EndsWith => "endswith",
        }
    }
}

/// A single `field <op> value` predicate over mapped rows. Serialized as its
/// textual form, e.g. `revenue >= 100` or `region contains 'west'`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FilterCondition {
    pub field: String,
    pub operator: ComparisonOperator,
    pub raw_value: String,
}

impl fmt::Display for FilterCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            ComparisonOperator::Contains
            | ComparisonOperator::StartsWith
            | ComparisonOperator::EndsWith => write!(
                f,
                "{} {} '{}'",
                self.field,
                self.operator.as_str(),
                self.raw_value
            ),
            _ => write!(f, "{} {} {}", self.field, self.operator.as_str(), self.raw_value),
        }
    }
}

impl TryFrom<String> for FilterCondition {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        parse_filter(&value)
    }
}

impl From<FilterCondition> for String {
    fn from(condition: FilterCondition) -> Self {
        condition.to_string()
    }
}

pub fn parse_filter(filter: &str) -> Result<FilterCondition> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty filter expression"));
    }

    let lowered = trimmed.to_ascii_lowercase();
    for (needle, op) in [
        (" contains ", ComparisonOperator::Contains),
        (" startswith ", ComparisonOperator::StartsWith),
        (" endswith ", ComparisonOperator::EndsWith),
    ] {
        if let Some(idx) = lowered.find(needle) {
            let (left, right_with_space) = trimmed.split_at(idx);
            let right = right_with_space[needle.len()..].trim();
            return condition(left, op, right);
        }
    }

    for needle in ["!=", ">=", "<=", "=", ">", "<"] {
        if let Some(idx) = trimmed.find(needle) {
            let op = match needle {
                "!=" => ComparisonOperator::NotEq,
                ">=" => ComparisonOperator::Ge,
                "<=" => ComparisonOperator::Le,
                ">" => ComparisonOperator::Gt,
                "<" => ComparisonOperator::Lt,
                _ => ComparisonOperator::Eq,
            };
            let right = trimmed[idx + needle.len()..].trim();
            // Accept `==` as a spelling of `=`.
            let right = match op {
                ComparisonOperator::Eq => right.strip_prefix('=').unwrap_or(right).trim(),
                _ => right,
            };
            return condition(&trimmed[..idx], op, right);
        }
    }

    Err(anyhow!("Failed to parse filter expression '{trimmed}'"))
}

fn condition(field: &str, operator: ComparisonOperator, raw: &str) -> Result<FilterCondition> {
    let field = field.trim();
    if field.is_empty() {
        return Err(anyhow!("Filter is missing a field name before '{}'", operator.as_str()));
    }
    Ok(FilterCondition {
        field: field.to_string(),
        operator,
        raw_value: unquote(raw).to_string(),
    })
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

impl FilterCondition {
    /// Evaluates the condition against a row. `None` when the row has no
    /// such field.
    pub fn evaluate(&self, row: &MappedRow) -> Option<bool> {
        let value = row.get(&self.field)?;
        Some(evaluate_condition(self, value))
    }
}

fn evaluate_condition(condition: &FilterCondition, value: &Value) -> bool {
    use ComparisonOperator::*;
    match condition.operator {
        Contains | StartsWith | EndsWith => {
            let raw = value.as_display();
            let needle = condition.raw_value.as_str();
            match condition.operator {
                Contains => raw.contains(needle),
                StartsWith => raw.starts_with(needle),
                _ => raw.ends_with(needle),
            }
        }
        Eq | NotEq | Gt | Ge | Lt | Le => {
            let rhs = Value::from(condition.raw_value.as_str());
            let ordering = match (value.is_missing(), rhs.is_missing()) {
                (true, true) => return matches!(condition.operator, Eq | Ge | Le),
                (true, false) | (false, true) => return matches!(condition.operator, NotEq),
                (false, false) => compare(value, &rhs),
            };
            match condition.operator {
                Eq => ordering == Ordering::Equal,
                NotEq => ordering != Ordering::Equal,
                Gt => ordering == Ordering::Greater,
                Ge => ordering != Ordering::Less,
                Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            }
        }
    }
}

fn compare(left: &Value, right: &Value) -> Ordering {
    if let Value::Boolean(b) = left {
        if let Some(parsed) = crate::data::parse_boolean_token(&right.as_display()) {
            return b.cmp(&parsed);
        }
    }
    left.loose_cmp(right)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> MappedRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn parses_operators_and_quotes() {
        let parsed = parse_filter("revenue >= 100").unwrap();
        assert_eq!(parsed.field, "revenue");
        assert_eq!(parsed.operator, ComparisonOperator::Ge);
        let parsed = parse_filter("region CONTAINS 'West'").unwrap();
        assert_eq!(parsed.operator, ComparisonOperator::Contains);
        assert_eq!(parsed.raw_value, "West");
        let parsed = parse_filter("status == \"open\"").unwrap();
        assert_eq!(parsed.operator, ComparisonOperator::Eq);
        assert_eq!(parsed.raw_value, "open");
        assert!(parse_filter("   ").is_err());
        assert!(parse_filter("no operator here").is_err());
        assert!(parse_filter(">= 3").is_err());
    }

    #[test]
    fn numeric_and_text_comparisons() {
        let r = row(&[
            ("revenue", Value::from("1,200")),
            ("region", Value::from("North West")),
            ("active", Value::Boolean(true)),
        ]);
        assert!(parse_filter("revenue > 999").unwrap().evaluate(&r).unwrap());
        assert!(parse_filter("region endswith West").unwrap().evaluate(&r).unwrap());
        assert!(parse_filter("active = yes").unwrap().evaluate(&r).unwrap());
        assert!(!parse_filter("region = south").unwrap().evaluate(&r).unwrap());
        assert_eq!(parse_filter("missing = 1").unwrap().evaluate(&r), None);
    }

    #[test]
    fn conditions_round_trip_through_text() {
        let parsed: FilterCondition = serde_yaml::from_str("\"qty <= 5\"").unwrap();
        assert_eq!(parsed.operator, ComparisonOperator::Le);
        assert_eq!(String::from(parsed), "qty <= 5");
    }
}
