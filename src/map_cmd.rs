use anyhow::{Context, Result};
use itertools::Itertools;
use log::{info, warn};

use crate::{
    cli::MapArgs,
    io_utils, load_table,
    mapping::{self, MappedRow, MappingSet},
    schema::analyze_schema,
    suggest::{self, SuggestOptions},
    template::TemplateSpec,
};

pub fn execute(args: &MapArgs) -> Result<()> {
    let template = TemplateSpec::load(&args.template)
        .with_context(|| format!("Loading template from {:?}", args.template))?;
    let table = load_table(&args.input)?;
    let schema = analyze_schema(&table);

    let set = match &args.mappings {
        Some(path) => MappingSet::load(path)
            .with_context(|| format!("Loading mappings from {path:?}"))?,
        None => {
            let options = SuggestOptions {
                exclusive: args.exclusive,
            };
            let suggestions =
                suggest::suggest_mappings_detailed(&schema, &template.fields, options);
            info!(
                "No mapping file given; using {} suggested mapping(s)",
                suggestions.len()
            );
            MappingSet::new(suggest::to_field_mappings(&suggestions))
        }
    };

    let mut result = mapping::apply_mapping(&table, &schema, &set.mappings, &template.fields);
    for error in &result.validation.errors {
        warn!("{error}");
    }
    for warning in &result.validation.warnings {
        warn!("{warning}");
    }
    info!(
        "Mapped {} of {} row(s) onto template '{}' ({} error(s), {} warning(s))",
        result.stats.mapped_rows,
        result.stats.total_rows,
        template.name,
        result.validation.errors.len(),
        result.validation.warnings.len()
    );
    if !result.stats.unmapped_columns.is_empty() {
        info!(
            "Unmapped CSV columns: {}",
            result.stats.unmapped_columns.join(", ")
        );
    }

    if !set.transforms.is_empty() {
        result.apply_transforms(&set.transforms)?;
        info!(
            "Applied {} table transform(s); {} row(s) remain",
            set.transforms.len(),
            result.mapped_data.len()
        );
    }

    if args.report {
        println!("{}", result.to_json_string()?);
        if args.output.is_none() {
            return Ok(());
        }
    }

    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let fields = output_fields(result.field_names(), &result.mapped_data);
    io_utils::write_mapped_rows(
        args.output.as_deref(),
        &fields,
        &result.mapped_data,
        args.output_delimiter.unwrap_or(','),
        encoding,
    )?;
    if let Some(path) = &args.output {
        info!("Wrote {} row(s) to {path:?}", result.mapped_data.len());
    }
    Ok(())
}

/// Mapped fields still present after table transforms, in mapping order,
/// followed by fields the transforms introduced.
fn output_fields(mapped: Vec<String>, rows: &[MappedRow]) -> Vec<String> {
    if rows.is_empty() {
        return mapped;
    }
    let present = |field: &str| rows.iter().any(|row| row.contains_key(field));
    let mut fields: Vec<String> = mapped.into_iter().filter(|f| present(f)).collect();
    let extra: Vec<String> = rows
        .iter()
        .flat_map(|row| row.keys())
        .filter(|key| !fields.contains(*key))
        .unique()
        .cloned()
        .collect();
    fields.extend(extra);
    fields
}
