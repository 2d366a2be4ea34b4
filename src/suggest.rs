//! Template field to CSV column suggestions.
//!
//! [`suggest_mappings`] resolves each template field by exact name, then by
//! substring containment, then by inferred column type. [`suggest_by_patterns`]
//! is a separate path that looks for well-known name fragments per chart
//! role; the two can disagree for the same input.

use std::collections::{BTreeMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    mapping::FieldMapping,
    schema::{ColumnProfile, Schema},
    template::TemplateFieldSpec,
    transform::string_ops,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestOptions {
    /// Never suggest the same column for two fields.
    pub exclusive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub field: String,
    pub column: String,
    pub kind: MatchKind,
}

impl Suggestion {
    pub fn to_field_mapping(&self) -> FieldMapping {
        FieldMapping::new(&self.field, &self.column)
    }
}

/// Likely column-name fragments per chart encoding role, most specific first.
const ROLE_PATTERNS: &[(&str, &[&str])] = &[
    (
        "x",
        &["date", "time", "year", "month", "day", "period", "category", "name", "x"],
    ),
    (
        "y",
        &["value", "amount", "total", "revenue", "sales", "price", "score", "count", "y"],
    ),
    (
        "color",
        &["category", "type", "group", "class", "segment", "region", "status", "color"],
    ),
    (
        "size",
        &["size", "volume", "weight", "population", "quantity", "count"],
    ),
    (
        "tooltip",
        &["description", "note", "comment", "detail", "info"],
    ),
    ("row", &["row", "facet", "panel"]),
    ("column", &["column", "facet", "panel"]),
    ("text", &["label", "name", "title", "text"]),
    ("href", &["url", "link", "href", "website"]),
    ("order", &["order", "rank", "position", "sequence", "index"]),
];

pub fn suggest_mappings(schema: &Schema, fields: &[TemplateFieldSpec]) -> BTreeMap<String, String> {
    suggest_mappings_with(schema, fields, SuggestOptions::default())
}

pub fn suggest_mappings_with(
    schema: &Schema,
    fields: &[TemplateFieldSpec],
    options: SuggestOptions,
) -> BTreeMap<String, String> {
    suggest_mappings_detailed(schema, fields, options)
        .into_iter()
        .map(|s| (s.field, s.column))
        .collect()
}

/// Suggestions in template field order, each tagged with the rule that
/// produced it. Fields without a match are absent.
pub fn suggest_mappings_detailed(
    schema: &Schema,
    fields: &[TemplateFieldSpec],
    options: SuggestOptions,
) -> Vec<Suggestion> {
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut suggestions = Vec::new();

    for field in fields {
        let available =
            |column: &&ColumnProfile| !options.exclusive || !claimed.contains(&column.index);
        let wanted = field.name.to_lowercase();

        let exact = schema
            .columns
            .iter()
            .filter(available)
            .find(|column| column.name.to_lowercase() == wanted)
            .map(|column| (column, MatchKind::Exact));
        let fuzzy = || {
            if wanted.is_empty() {
                return None;
            }
            schema
                .columns
                .iter()
                .filter(available)
                .find(|column| {
                    let name = column.name.to_lowercase();
                    !name.is_empty() && (name.contains(&wanted) || wanted.contains(&name))
                })
                .map(|column| (column, MatchKind::Fuzzy))
        };
        let by_type = || {
            let semantic = field.field_type?;
            schema
                .columns
                .iter()
                .filter(available)
                .find(|column| semantic.matches_column_type(column.column_type))
                .map(|column| (column, MatchKind::Type))
        };

        let Some((column, kind)) = exact.or_else(fuzzy).or_else(by_type) else {
            debug!("No column suggested for template field '{}'", field.name);
            continue;
        };
        debug!(
            "Suggested column '{}' for field '{}' ({:?} match)",
            column.name, field.name, kind
        );
        let index = column.index;
        suggestions.push(Suggestion {
            field: field.name.clone(),
            column: column.name.clone(),
            kind,
        });
        claimed.insert(index);
    }
    suggestions
}

pub fn known_roles() -> impl Iterator<Item = &'static str> {
    ROLE_PATTERNS.iter().map(|(role, _)| *role)
}

/// Assigns columns to chart roles from the pattern dictionary. Roles are
/// resolved in the given order and a column is never assigned twice.
pub fn suggest_by_patterns(schema: &Schema, roles: &[&str]) -> BTreeMap<String, String> {
    let normalized: Vec<String> = schema
        .columns
        .iter()
        .map(|column| string_ops::snake_case(&column.name).into_owned())
        .collect();
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut out = BTreeMap::new();

    for role in roles {
        let Some((_, patterns)) = ROLE_PATTERNS.iter().find(|(known, _)| known == role) else {
            debug!("Unknown chart role '{role}' ignored");
            continue;
        };
        let found = patterns.iter().find_map(|pattern| {
            normalized
                .iter()
                .enumerate()
                .find(|(idx, name)| !claimed.contains(idx) && pattern_matches(name, pattern))
                .map(|(idx, _)| idx)
        });
        if let Some(idx) = found {
            claimed.insert(idx);
            out.insert(role.to_string(), schema.columns[idx].name.clone());
        }
    }
    out
}

/// Single-letter patterns must be a whole `_`-separated token, longer ones
/// may appear anywhere in the name.
fn pattern_matches(normalized_name: &str, pattern: &str) -> bool {
    if pattern.chars().count() == 1 {
        normalized_name.split('_').any(|token| token == pattern)
    } else {
        normalized_name.contains(pattern)
    }
}

pub fn to_field_mappings(suggestions: &[Suggestion]) -> Vec<FieldMapping> {
    suggestions.iter().map(Suggestion::to_field_mapping).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema::ColumnType, template::SemanticType};

    fn column(name: &str, index: usize, column_type: ColumnType) -> ColumnProfile {
        ColumnProfile {
            name: name.to_string(),
            index,
            column_type,
            nullable: false,
            unique: false,
            sample_values: Vec::new(),
            null_count: 0,
        }
    }

    fn schema(columns: &[(&str, ColumnType)]) -> Schema {
        Schema {
            columns: columns
                .iter()
                .enumerate()
                .map(|(idx, (name, ty))| column(name, idx, *ty))
                .collect(),
            delimiter: ',',
            has_header: true,
            row_count: 0,
        }
    }

    #[test]
    fn exact_beats_fuzzy_beats_type() {
        let schema = schema(&[
            ("total_sales", ColumnType::Number),
            ("Sales", ColumnType::Number),
            ("units", ColumnType::Number),
        ]);
        let fields = [
            TemplateFieldSpec::new("sales").typed(SemanticType::Quantitative),
            TemplateFieldSpec::new("total").typed(SemanticType::Quantitative),
            TemplateFieldSpec::new("amount").typed(SemanticType::Quantitative),
        ];
        let detailed = suggest_mappings_detailed(&schema, &fields, SuggestOptions::default());
        assert_eq!(detailed[0].column, "Sales");
        assert_eq!(detailed[0].kind, MatchKind::Exact);
        assert_eq!(detailed[1].column, "total_sales");
        assert_eq!(detailed[1].kind, MatchKind::Fuzzy);
        assert_eq!(detailed[2].column, "total_sales");
        assert_eq!(detailed[2].kind, MatchKind::Type);
    }

    #[test]
    fn exclusive_mode_skips_claimed_columns() {
        let schema = schema(&[("price", ColumnType::Number), ("qty", ColumnType::Number)]);
        let fields = [
            TemplateFieldSpec::new("price").typed(SemanticType::Quantitative),
            TemplateFieldSpec::new("cost").typed(SemanticType::Quantitative),
            TemplateFieldSpec::new("other").typed(SemanticType::Quantitative),
        ];
        let shared = suggest_mappings(&schema, &fields);
        assert_eq!(shared["cost"], "price");
        assert_eq!(shared["other"], "price");

        let exclusive = suggest_mappings_with(&schema, &fields, SuggestOptions { exclusive: true });
        assert_eq!(exclusive["price"], "price");
        assert_eq!(exclusive["cost"], "qty");
        assert!(!exclusive.contains_key("other"));
    }

    #[test]
    fn untyped_and_ordinal_fields_have_no_type_match() {
        let schema = schema(&[("zz", ColumnType::String)]);
        let fields = [
            TemplateFieldSpec::new("label"),
            TemplateFieldSpec::new("rank").typed(SemanticType::Ordinal),
        ];
        assert!(suggest_mappings(&schema, &fields).is_empty());
    }

    #[test]
    fn patterns_assign_roles_without_reuse() {
        let schema = schema(&[
            ("OrderDate", ColumnType::Date),
            ("Total Revenue", ColumnType::Number),
            ("Region", ColumnType::String),
            ("max_y", ColumnType::Number),
        ]);
        let roles: Vec<&str> = known_roles().collect();
        let suggested = suggest_by_patterns(&schema, &roles);
        assert_eq!(suggested["x"], "OrderDate");
        assert_eq!(suggested["y"], "Total Revenue");
        assert_eq!(suggested["color"], "Region");
        // "order" would match OrderDate, which is already taken.
        assert!(!suggested.contains_key("order"));
    }

    #[test]
    fn single_letter_patterns_need_whole_tokens() {
        assert!(pattern_matches("axis_x", "x"));
        assert!(!pattern_matches("max_value", "x"));
        assert!(pattern_matches("unit_price", "price"));
    }
}
