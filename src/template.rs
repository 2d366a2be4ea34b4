//! Template field contracts.
//!
//! A template describes the data slots a visualization needs filled. Field
//! lists come from a YAML template document or are derived from the
//! `encoding` block of a declarative chart spec. Templates are loaded and
//! saved explicitly; nothing here is held in global state.

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

/// Encoding channels in the order their fields are reported.
pub const CHART_CHANNELS: &[&str] = &[
    "x", "y", "color", "size", "tooltip", "row", "column", "text", "href", "order",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Quantitative,
    Nominal,
    Temporal,
    Ordinal,
    String,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Quantitative => "quantitative",
            SemanticType::Nominal => "nominal",
            SemanticType::Temporal => "temporal",
            SemanticType::Ordinal => "ordinal",
            SemanticType::String => "string",
        }
    }

    /// Column type the suggester looks for when names do not match.
    /// Ordinal and string fields have no type-based match.
    pub fn matches_column_type(&self, column_type: ColumnType) -> bool {
        match self {
            SemanticType::Quantitative => column_type == ColumnType::Number,
            SemanticType::Nominal => {
                matches!(column_type, ColumnType::String | ColumnType::Boolean)
            }
            SemanticType::Temporal => column_type == ColumnType::Date,
            SemanticType::Ordinal | SemanticType::String => false,
        }
    }

    /// Whether a column of `column_type` is an acceptable source for this
    /// field when validating a mapping. Looser than
    /// [`SemanticType::matches_column_type`].
    pub fn is_compatible_with(&self, column_type: ColumnType) -> bool {
        match self {
            SemanticType::Ordinal => matches!(
                column_type,
                ColumnType::String | ColumnType::Number | ColumnType::Boolean
            ),
            SemanticType::String => true,
            _ => self.matches_column_type(column_type),
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quantitative" | "q" => Ok(SemanticType::Quantitative),
            "nominal" | "n" => Ok(SemanticType::Nominal),
            "temporal" | "t" => Ok(SemanticType::Temporal),
            "ordinal" | "o" => Ok(SemanticType::Ordinal),
            "string" => Ok(SemanticType::String),
            other => Err(anyhow!("Unknown semantic type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFieldSpec {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<SemanticType>,
    #[serde(default)]
    pub required: bool,
}

impl TemplateFieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            required: false,
        }
    }

    pub fn typed(mut self, field_type: SemanticType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<TemplateFieldSpec>,
}

impl TemplateSpec {
    /// Loads a YAML template, or derives one from a `.json` chart spec.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening template file {path:?}"))?;
        let reader = BufReader::new(file);
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            let chart: serde_json::Value =
                serde_json::from_reader(reader).context("Parsing chart spec JSON")?;
            let fallback = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("chart");
            return Ok(Self::from_chart_spec(&chart, fallback));
        }
        serde_yaml::from_reader(reader).context("Parsing template YAML")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating template file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing template YAML")
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context("Parsing template YAML")
    }

    pub fn from_chart_spec(chart: &serde_json::Value, fallback_name: &str) -> Self {
        let name = chart
            .get("title")
            .and_then(|title| title.as_str().or_else(|| title.get("text")?.as_str()))
            .unwrap_or(fallback_name)
            .to_string();
        let description = chart
            .get("description")
            .and_then(|d| d.as_str())
            .map(str::to_string);
        Self {
            name,
            description,
            fields: fields_from_chart_spec(chart),
        }
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &TemplateFieldSpec> {
        self.fields.iter().filter(|field| field.required)
    }
}

/// Collects `encoding.<channel>.field` entries as required template fields.
/// Known channels come first in [`CHART_CHANNELS`] order, then any others by
/// name. A field used on several channels is listed once.
pub fn fields_from_chart_spec(chart: &serde_json::Value) -> Vec<TemplateFieldSpec> {
    let Some(encoding) = chart.get("encoding").and_then(|e| e.as_object()) else {
        return Vec::new();
    };

    let rank = |channel: &str| {
        CHART_CHANNELS
            .iter()
            .position(|known| *known == channel)
            .unwrap_or(CHART_CHANNELS.len())
    };
    let mut channels: Vec<&String> = encoding.keys().collect();
    channels.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.cmp(b)));

    let mut fields: Vec<TemplateFieldSpec> = Vec::new();
    for channel in channels {
        let definition = &encoding[channel.as_str()];
        let Some(name) = definition.get("field").and_then(|f| f.as_str()) else {
            continue;
        };
        if fields.iter().any(|existing| existing.name == name) {
            continue;
        }
        let field_type = definition
            .get("type")
            .and_then(|t| t.as_str())
            .and_then(|t| match t.parse::<SemanticType>() {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    debug!("Ignoring type on channel '{channel}': {err}");
                    None
                }
            });
        fields.push(TemplateFieldSpec {
            name: name.to_string(),
            field_type,
            required: true,
        });
    }
    fields
}
