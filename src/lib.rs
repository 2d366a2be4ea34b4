pub mod cli;
pub mod data;
pub mod delimiter;
pub mod expr;
pub mod filter;
pub mod io_utils;
pub mod map_cmd;
pub mod mapping;
pub mod parser;
pub mod preview;
pub mod schema;
pub mod suggest;
pub mod table;
pub mod template;
pub mod tokenizer;
pub mod transform;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, InputArgs, OutputFormat},
    mapping::MappingSet,
    parser::ParsedTable,
    schema::analyze_schema,
    suggest::SuggestOptions,
    template::TemplateSpec,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_fieldmap", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Suggest(args) => handle_suggest(&args),
        Commands::Map(args) => map_cmd::execute(&args),
    }
}

/// Reads and parses the input document. Row-level problems are logged; a
/// document without any usable header or rows is an error.
pub(crate) fn load_table(input: &InputArgs) -> Result<ParsedTable> {
    let encoding = io_utils::resolve_encoding(input.input_encoding.as_deref())?;
    let text = io_utils::read_document(&input.input, encoding)?;
    let table = parser::parse_csv(&text, &input.parse_options());
    info!(
        "Parsed {} row(s) x {} column(s) from {:?} with delimiter '{}'",
        table.row_count,
        table.column_count,
        input.input,
        printable_delimiter(table.delimiter)
    );
    for warning in &table.warnings {
        warn!("{warning}");
    }
    if table.headers.is_empty() {
        bail!(
            "Unable to read {:?}: {}",
            input.input,
            table.errors.join("; ")
        );
    }
    for error in &table.errors {
        warn!("{error}");
    }
    Ok(table)
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let table = load_table(&args.input)?;
    let schema = analyze_schema(&table);
    let rendered = match args.format {
        OutputFormat::Table => table::render_schema(&schema),
        OutputFormat::Yaml => schema.to_yaml_string()?,
        OutputFormat::Json => format!("{}\n", schema.to_json_string()?),
    };
    print!("{rendered}");
    info!(
        "Inferred schema for {} column(s) from {:?}",
        schema.columns.len(),
        args.input.input
    );
    Ok(())
}

fn handle_suggest(args: &cli::SuggestArgs) -> Result<()> {
    let template = TemplateSpec::load(&args.template)
        .with_context(|| format!("Loading template from {:?}", args.template))?;
    let table = load_table(&args.input)?;
    let schema = analyze_schema(&table);
    let options = SuggestOptions {
        exclusive: args.exclusive,
    };
    let suggestions = suggest::suggest_mappings_detailed(&schema, &template.fields, options);
    for suggestion in &suggestions {
        debug!(
            "{} -> {} ({:?})",
            suggestion.field, suggestion.column, suggestion.kind
        );
    }
    info!(
        "Suggested {} of {} field(s) for template '{}'",
        suggestions.len(),
        template.fields.len(),
        template.name
    );

    let set = MappingSet::new(suggest::to_field_mappings(&suggestions));
    match &args.output {
        Some(path) => {
            set.save(path)
                .with_context(|| format!("Writing mappings to {path:?}"))?;
            info!("Mappings written to {path:?}");
        }
        None => print!("{}", set.to_yaml_string()?),
    }

    if args.patterns {
        // Emitted as YAML comments so the document stays loadable.
        let roles: Vec<&str> = suggest::known_roles().collect();
        let by_role = suggest::suggest_by_patterns(&schema, &roles);
        println!("# chart roles by name pattern:");
        for role in roles {
            if let Some(column) = by_role.get(role) {
                println!("#   {role}: {column}");
            }
        }
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: char) -> String {
    match delimiter {
        '\t' => "\\t".to_string(),
        '\n' => "\\n".to_string(),
        other => other.to_string(),
    }
}
