//! Scalar transforms applied to each mapped value.

use std::{borrow::Cow, fmt};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{data::Value, expr::Expr, transform::string_ops};

/// Name under which the source value is visible to `calculate` expressions.
pub const VALUE_PLACEHOLDER: &str = "value";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueTransform {
    #[default]
    Identity,
    Format {
        style: FormatStyle,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decimals: Option<usize>,
    },
    Calculate {
        expression: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatStyle {
    Percent,
    Thousands,
    Fixed,
    Lowercase,
    Uppercase,
    Trim,
    SnakeCase,
}

impl FormatStyle {
    fn default_decimals(&self) -> usize {
        match self {
            FormatStyle::Fixed => 2,
            _ => 0,
        }
    }
}

impl fmt::Display for ValueTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueTransform::Identity => f.write_str("identity"),
            ValueTransform::Format { style, decimals } => match decimals {
                Some(d) => write!(f, "format({style:?}, {d})"),
                None => write!(f, "format({style:?})"),
            },
            ValueTransform::Calculate { expression } => write!(f, "calculate({expression})"),
        }
    }
}

impl ValueTransform {
    pub fn is_identity(&self) -> bool {
        matches!(self, ValueTransform::Identity)
    }

    /// Applies the transform to a single value. Use [`ValueTransform::prepare`]
    /// when the same transform runs over many cells.
    pub fn apply(&self, value: Value) -> Value {
        self.prepare().apply(value)
    }

    /// Parses any `calculate` expression up front. A malformed expression is
    /// logged here once and every value then passes through unchanged.
    pub fn prepare(&self) -> PreparedTransform<'_> {
        match self {
            ValueTransform::Calculate { expression } => {
                let parsed = match Expr::parse(expression) {
                    Ok(parsed) => Some(parsed),
                    Err(err) => {
                        warn!(
                            "Calculate expression '{expression}' rejected: {err}; values pass through"
                        );
                        None
                    }
                };
                PreparedTransform::Calculate { expression, parsed }
            }
            other => PreparedTransform::Direct(other),
        }
    }
}

/// A [`ValueTransform`] ready to run per cell.
#[derive(Debug)]
pub enum PreparedTransform<'a> {
    Direct(&'a ValueTransform),
    Calculate {
        expression: &'a str,
        parsed: Option<Expr>,
    },
}

impl PreparedTransform<'_> {
    /// Values a transform cannot handle come back unchanged.
    pub fn apply(&self, value: Value) -> Value {
        match self {
            PreparedTransform::Direct(ValueTransform::Format { style, decimals }) => {
                format_value(value, *style, decimals.unwrap_or(style.default_decimals()))
            }
            PreparedTransform::Direct(_) => value,
            PreparedTransform::Calculate { expression, parsed } => match parsed {
                Some(parsed) => calculate(expression, parsed, value),
                None => value,
            },
        }
    }
}

fn format_value(value: Value, style: FormatStyle, decimals: usize) -> Value {
    match style {
        FormatStyle::Lowercase => map_text(value, string_ops::lowercase),
        FormatStyle::Uppercase => map_text(value, string_ops::uppercase),
        FormatStyle::Trim => map_text(value, string_ops::trim),
        FormatStyle::SnakeCase => map_text(value, string_ops::snake_case),
        FormatStyle::Percent | FormatStyle::Thousands | FormatStyle::Fixed => {
            let Some(number) = value.as_number() else {
                return value;
            };
            let formatted = match style {
                FormatStyle::Percent => format!("{:.*}%", decimals, number * 100.0),
                FormatStyle::Thousands => string_ops::group_thousands(number, decimals),
                _ => format!("{number:.decimals$}"),
            };
            Value::String(formatted)
        }
    }
}

fn map_text(value: Value, op: fn(&str) -> Cow<'_, str>) -> Value {
    match value {
        Value::String(text) => Value::String(op(&text).into_owned()),
        other => other,
    }
}

fn calculate(expression: &str, parsed: &Expr, value: Value) -> Value {
    let lookup = |name: &str| (name == VALUE_PLACEHOLDER).then(|| value.clone());
    match parsed.evaluate(&lookup) {
        Ok(result) => result,
        Err(err) => {
            debug!("Calculate '{expression}' failed for '{value}': {err}; keeping original");
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(style: FormatStyle, decimals: Option<usize>, input: &str) -> Value {
        ValueTransform::Format { style, decimals }.apply(Value::from(input))
    }

    #[test]
    fn numeric_format_styles() {
        assert_eq!(format(FormatStyle::Percent, None, "0.256"), Value::from("26%"));
        assert_eq!(format(FormatStyle::Percent, Some(1), "0.256"), Value::from("25.6%"));
        assert_eq!(
            format(FormatStyle::Thousands, None, "$1234567"),
            Value::from("1,234,567")
        );
        assert_eq!(format(FormatStyle::Fixed, None, "3.14159"), Value::from("3.14"));
        assert_eq!(format(FormatStyle::Fixed, None, "n/a"), Value::from("n/a"));
    }

    #[test]
    fn string_format_styles() {
        assert_eq!(format(FormatStyle::Uppercase, None, "west"), Value::from("WEST"));
        assert_eq!(format(FormatStyle::Trim, None, "  a "), Value::from("a"));
        assert_eq!(
            format(FormatStyle::SnakeCase, None, "North East"),
            Value::from("north_east")
        );
        let number = ValueTransform::Format {
            style: FormatStyle::Lowercase,
            decimals: None,
        }
        .apply(Value::Number(4.0));
        assert_eq!(number, Value::Number(4.0));
    }

    #[test]
    fn calculate_evaluates_against_value() {
        let transform = ValueTransform::Calculate {
            expression: "{value} * 1000".to_string(),
        };
        assert_eq!(transform.apply(Value::from("1.5")), Value::Number(1500.0));
    }

    #[test]
    fn calculate_failures_keep_original() {
        let bad_syntax = ValueTransform::Calculate {
            expression: "{value} *".to_string(),
        };
        assert_eq!(bad_syntax.apply(Value::from("7")), Value::from("7"));

        let wrong_type = ValueTransform::Calculate {
            expression: "{value} / 2".to_string(),
        };
        assert_eq!(wrong_type.apply(Value::from("abc")), Value::from("abc"));

        let unknown = ValueTransform::Calculate {
            expression: "{other} + 1".to_string(),
        };
        assert_eq!(unknown.apply(Value::from("1")), Value::from("1"));
    }

    #[test]
    fn deeply_nested_calculate_keeps_original() {
        let depth = 10_000;
        let transform = ValueTransform::Calculate {
            expression: format!("{}{{value}}{}", "(".repeat(depth), ")".repeat(depth)),
        };
        assert_eq!(transform.apply(Value::from("3")), Value::from("3"));
    }

    #[test]
    fn prepared_calculate_parses_once_and_runs_per_cell() {
        let transform = ValueTransform::Calculate {
            expression: "{value} + 1".to_string(),
        };
        let prepared = transform.prepare();
        assert!(matches!(
            prepared,
            PreparedTransform::Calculate {
                parsed: Some(_),
                ..
            }
        ));
        assert_eq!(prepared.apply(Value::from("1")), Value::Number(2.0));
        assert_eq!(prepared.apply(Value::from("41")), Value::Number(42.0));
        assert_eq!(prepared.apply(Value::from("x")), Value::from("x"));

        let broken = ValueTransform::Calculate {
            expression: "{value} +".to_string(),
        };
        let prepared = broken.prepare();
        assert!(matches!(
            prepared,
            PreparedTransform::Calculate { parsed: None, .. }
        ));
        assert_eq!(prepared.apply(Value::from("5")), Value::from("5"));
    }

    #[test]
    fn transforms_deserialize_from_tagged_yaml() {
        let parsed: ValueTransform =
            serde_yaml::from_str("type: format\nstyle: percent\ndecimals: 1\n").unwrap();
        assert_eq!(
            parsed,
            ValueTransform::Format {
                style: FormatStyle::Percent,
                decimals: Some(1)
            }
        );
        let identity: ValueTransform = serde_yaml::from_str("type: identity\n").unwrap();
        assert!(identity.is_identity());
    }
}
