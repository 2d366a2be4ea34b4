use std::{cmp::Ordering, collections::HashMap, fmt};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{data::Value, expr::Expr, filter::FilterCondition, mapping::MappedRow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableTransform {
    Filter {
        condition: FilterCondition,
    },
    Aggregate {
        #[serde(default)]
        group_by: Vec<String>,
        field: String,
        op: AggregateOp,
        #[serde(rename = "as")]
        as_field: String,
    },
    Calculate {
        #[serde(rename = "as")]
        as_field: String,
        expression: String,
    },
    Sort {
        field: String,
        #[serde(default)]
        descending: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    Count,
    Sum,
    Mean,
    Min,
    Max,
}

impl fmt::Display for TableTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableTransform::Filter { condition } => write!(f, "filter({condition})"),
            TableTransform::Aggregate {
                group_by,
                field,
                op,
                as_field,
            } => write!(
                f,
                "aggregate({op:?} {field} by [{}] as {as_field})",
                group_by.join(", ")
            ),
            TableTransform::Calculate {
                as_field,
                expression,
            } => write!(f, "calculate({as_field} = {expression})"),
            TableTransform::Sort { field, descending } => write!(
                f,
                "sort({field} {})",
                if *descending { "desc" } else { "asc" }
            ),
        }
    }
}

/// Runs `transforms` in order. Only malformed transform definitions are
/// errors; rows a transform cannot evaluate are excluded by filters and
/// passed through unchanged by calculations.
pub fn apply_table_transforms(
    rows: Vec<MappedRow>,
    transforms: &[TableTransform],
) -> Result<Vec<MappedRow>> {
    let mut rows = rows;
    for transform in transforms {
        let before = rows.len();
        rows = match transform {
            TableTransform::Filter { condition } => filter_rows(rows, condition),
            TableTransform::Aggregate {
                group_by,
                field,
                op,
                as_field,
            } => aggregate_rows(rows, group_by, field, *op, as_field),
            TableTransform::Calculate {
                as_field,
                expression,
            } => {
                let parsed = Expr::parse(expression)
                    .with_context(|| format!("Parsing calculate expression '{expression}'"))?;
                calculate_rows(rows, &parsed, as_field)
            }
            TableTransform::Sort { field, descending } => sort_rows(rows, field, *descending),
        };
        debug!("{transform}: {before} -> {} row(s)", rows.len());
    }
    Ok(rows)
}

fn filter_rows(rows: Vec<MappedRow>, condition: &FilterCondition) -> Vec<MappedRow> {
    rows.into_iter()
        .filter(|row| match condition.evaluate(row) {
            Some(keep) => keep,
            None => {
                debug!("Row lacks field '{}'; excluded by filter", condition.field);
                false
            }
        })
        .collect()
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    count: usize,
    sum: f64,
    numeric: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl GroupAccumulator {
    fn update(&mut self, value: Option<&Value>) {
        let Some(value) = value.filter(|v| !v.is_missing()) else {
            return;
        };
        self.count += 1;
        if let Some(number) = value.as_number() {
            self.numeric += 1;
            self.sum += number;
            self.min = Some(self.min.map_or(number, |m| m.min(number)));
            self.max = Some(self.max.map_or(number, |m| m.max(number)));
        }
    }

    fn finish(&self, op: AggregateOp) -> Value {
        let number = match op {
            AggregateOp::Count => Some(self.count as f64),
            AggregateOp::Sum => (self.numeric > 0).then_some(self.sum),
            AggregateOp::Mean => (self.numeric > 0).then(|| self.sum / self.numeric as f64),
            AggregateOp::Min => self.min,
            AggregateOp::Max => self.max,
        };
        number.map(Value::Number).unwrap_or(Value::Null)
    }
}

/// One output row per distinct `group_by` key, in first-seen order.
fn aggregate_rows(
    rows: Vec<MappedRow>,
    group_by: &[String],
    field: &str,
    op: AggregateOp,
    as_field: &str,
) -> Vec<MappedRow> {
    let mut order: Vec<Vec<Value>> = Vec::new();
    let mut groups: HashMap<Vec<String>, GroupAccumulator> = HashMap::new();

    for row in &rows {
        let key_values: Vec<Value> = group_by
            .iter()
            .map(|name| row.get(name).cloned().unwrap_or_default())
            .collect();
        let key: Vec<String> = key_values.iter().map(Value::as_display).collect();
        let acc = groups.entry(key).or_insert_with(|| {
            order.push(key_values.clone());
            GroupAccumulator::default()
        });
        acc.update(row.get(field));
    }

    order
        .into_iter()
        .map(|key_values| {
            let key: Vec<String> = key_values.iter().map(Value::as_display).collect();
            let mut out: MappedRow = group_by.iter().cloned().zip(key_values).collect();
            let value = groups
                .get(&key)
                .map(|acc| acc.finish(op))
                .unwrap_or_default();
            out.insert(as_field.to_string(), value);
            out
        })
        .collect()
}

fn calculate_rows(rows: Vec<MappedRow>, expr: &Expr, as_field: &str) -> Vec<MappedRow> {
    rows.into_iter()
        .map(|mut row| {
            let result = expr.evaluate(&|name: &str| row.get(name).cloned());
            match result {
                Ok(value) => {
                    row.insert(as_field.to_string(), value);
                }
                Err(err) => debug!("Calculate '{as_field}' skipped for row: {err}"),
            }
            row
        })
        .collect()
}

/// Stable sort; rows with a missing value sort last in either direction.
fn sort_rows(mut rows: Vec<MappedRow>, field: &str, descending: bool) -> Vec<MappedRow> {
    rows.sort_by(|a, b| {
        let left = a.get(field).filter(|v| !v.is_missing());
        let right = b.get(field).filter(|v| !v.is_missing());
        match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(l), Some(r)) if descending => r.loose_cmp(l),
            (Some(l), Some(r)) => l.loose_cmp(r),
        }
    });
    rows
}
