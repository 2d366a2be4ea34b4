//! Applying field mappings to a parsed table.
//!
//! Problems are reported on the [`MappingResult`], never raised: a caller can
//! always show how many rows made it through and why the rest did not.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    parser::ParsedTable,
    schema::Schema,
    template::TemplateFieldSpec,
    transform::{PreparedTransform, TableTransform, ValueTransform, apply_table_transforms},
};

/// One output row keyed by template field name.
pub type MappedRow = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub template_field: String,
    pub csv_column: String,
    #[serde(default, skip_serializing_if = "ValueTransform::is_identity")]
    pub transform: ValueTransform,
}

impl FieldMapping {
    pub fn new(template_field: impl Into<String>, csv_column: impl Into<String>) -> Self {
        Self {
            template_field: template_field.into(),
            csv_column: csv_column.into(),
            transform: ValueTransform::Identity,
        }
    }

    pub fn with_transform(mut self, transform: ValueTransform) -> Self {
        self.transform = transform;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn merge(mut self, other: ValidationReport) -> Self {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.valid = self.errors.is_empty();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingStats {
    pub total_rows: usize,
    /// Rows produced by the field mappings, before any table transform.
    pub mapped_rows: usize,
    /// Rows left in `mapped_data` after table transforms, when any ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_rows: Option<usize>,
    pub unmapped_columns: Vec<String>,
    pub required_fields_mapped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingResult {
    pub mapped_data: Vec<MappedRow>,
    pub mappings: Vec<FieldMapping>,
    pub validation: ValidationReport,
    pub stats: MappingStats,
}

impl MappingResult {
    /// Template field names in mapping order, for tabular output.
    pub fn field_names(&self) -> Vec<String> {
        self.mappings
            .iter()
            .map(|m| m.template_field.clone())
            .unique()
            .collect()
    }

    /// Runs table transforms over `mapped_data` and records the resulting
    /// row count alongside `mapped_rows`. A no-op for an empty list.
    pub fn apply_transforms(&mut self, transforms: &[TableTransform]) -> Result<()> {
        if transforms.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.mapped_data);
        self.mapped_data = apply_table_transforms(rows, transforms)?;
        self.stats.transformed_rows = Some(self.mapped_data.len());
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing mapping result to JSON")
    }
}

/// Editable mapping document: the field mappings plus table transforms run
/// over the mapped rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingSet {
    #[serde(default)]
    pub mappings: Vec<FieldMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TableTransform>,
}

impl MappingSet {
    pub fn new(mappings: Vec<FieldMapping>) -> Self {
        Self {
            mappings,
            transforms: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening mapping file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).context("Parsing mapping YAML")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating mapping file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing mapping YAML")
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context("Parsing mapping YAML")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing mappings to YAML string")
    }
}

pub fn apply_mapping(
    table: &ParsedTable,
    schema: &Schema,
    mappings: &[FieldMapping],
    fields: &[TemplateFieldSpec],
) -> MappingResult {
    let missing: Vec<&str> = mappings
        .iter()
        .filter(|m| schema.column(&m.csv_column).is_none())
        .map(|m| m.csv_column.as_str())
        .unique()
        .collect();
    let mut errors = Vec::new();
    if !missing.is_empty() {
        errors.push(format!("Missing CSV columns: {}", missing.join(", ")));
    }

    let active: Vec<(&FieldMapping, usize, PreparedTransform<'_>)> = mappings
        .iter()
        .filter_map(|m| {
            table
                .column_index(&m.csv_column)
                .map(|idx| (m, idx, m.transform.prepare()))
        })
        .collect();

    let mut mapped_data = Vec::new();
    if !active.is_empty() {
        for (row_idx, row) in table.rows.iter().enumerate() {
            let mut out = MappedRow::new();
            let mut complete = true;
            for (mapping, idx, transform) in &active {
                let source = Value::from_cell(row.get(*idx).and_then(|c| c.as_deref()));
                let value = transform.apply(source);
                if value.is_missing() {
                    complete = false;
                    break;
                }
                out.insert(mapping.template_field.clone(), value);
            }
            if complete {
                mapped_data.push(out);
            } else {
                debug!("Dropping row {} with an empty mapped value", row_idx + 1);
            }
        }
    }

    let unmapped_columns = schema
        .columns
        .iter()
        .filter(|column| !mappings.iter().any(|m| m.csv_column == column.name))
        .map(|column| column.name.clone())
        .collect();

    let stats = MappingStats {
        total_rows: table.row_count,
        mapped_rows: mapped_data.len(),
        transformed_rows: None,
        unmapped_columns,
        required_fields_mapped: required_fields_mapped(mappings, fields),
    };
    let validation = ValidationReport::new(errors, Vec::new())
        .merge(validate_mapping_compatibility(schema, mappings, fields));

    MappingResult {
        mapped_data,
        mappings: mappings.to_vec(),
        validation,
        stats,
    }
}

/// True when every required template field has a mapping.
pub fn required_fields_mapped(mappings: &[FieldMapping], fields: &[TemplateFieldSpec]) -> bool {
    fields
        .iter()
        .filter(|field| field.required)
        .all(|field| mappings.iter().any(|m| m.template_field == field.name))
}

pub fn validate_mapping_compatibility(
    schema: &Schema,
    mappings: &[FieldMapping],
    fields: &[TemplateFieldSpec],
) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for field in fields.iter().filter(|field| field.required) {
        if !mappings.iter().any(|m| m.template_field == field.name) {
            errors.push(format!("Required field '{}' is not mapped", field.name));
        }
    }

    for mapping in mappings {
        let Some(field_type) = fields
            .iter()
            .find(|field| field.name == mapping.template_field)
            .and_then(|field| field.field_type)
        else {
            continue;
        };
        let Some(column) = schema.column(&mapping.csv_column) else {
            continue;
        };
        if !field_type.is_compatible_with(column.column_type) {
            warnings.push(format!(
                "Field '{}' expects {} data but column '{}' is {}",
                mapping.template_field, field_type, column.name, column.column_type
            ));
        }
    }

    for column in mappings.iter().map(|m| m.csv_column.as_str()).unique() {
        let users: Vec<&str> = mappings
            .iter()
            .filter(|m| m.csv_column == column)
            .map(|m| m.template_field.as_str())
            .collect();
        if users.len() > 1 {
            errors.push(format!(
                "CSV column '{column}' is mapped to multiple fields: {}",
                users.join(", ")
            ));
        }
    }

    ValidationReport::new(errors, warnings)
}
