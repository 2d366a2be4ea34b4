use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::parser::{DEFAULT_ESCAPE_CHAR, DEFAULT_QUOTE_CHAR, ParseOptions};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Map CSV columns onto chart template fields",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a CSV file and print its inferred column schema
    Probe(ProbeArgs),
    /// Preview the first few rows of a CSV file in a formatted table
    Preview(PreviewArgs),
    /// Suggest template field to column mappings as editable YAML
    Suggest(SuggestArgs),
    /// Apply field mappings and write the mapped rows as CSV
    Map(MapArgs),
}

/// Input file and dialect options shared by every command.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV file (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|', ':'); detected when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<char>,
    /// Treat the first row as data and name columns Column_1, Column_2, ...
    #[arg(long = "no-header")]
    pub no_header: bool,
    /// Keep blank lines as rows of empty cells
    #[arg(long = "keep-empty-lines")]
    pub keep_empty_lines: bool,
    /// Keep leading and trailing whitespace in cells
    #[arg(long = "no-trim")]
    pub no_trim: bool,
    /// Quote character
    #[arg(long = "quote-char", default_value_t = DEFAULT_QUOTE_CHAR)]
    pub quote_char: char,
    /// Escape character placed before a quote inside quoted fields
    #[arg(long = "escape-char", default_value_t = DEFAULT_ESCAPE_CHAR)]
    pub escape_char: char,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

impl InputArgs {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            delimiter: self.delimiter,
            has_header: !self.no_header,
            skip_empty_lines: !self.keep_empty_lines,
            trim_whitespace: !self.no_trim,
            quote_char: self.quote_char,
            escape_char: self.escape_char,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Yaml,
    Json,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output format for the inferred schema
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct SuggestArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Template YAML file, or a chart spec with a `.json` extension
    #[arg(short = 't', long = "template")]
    pub template: PathBuf,
    /// Never suggest the same column for two fields
    #[arg(long)]
    pub exclusive: bool,
    /// Also print chart role suggestions from the name pattern dictionary
    #[arg(long)]
    pub patterns: bool,
    /// Write the suggested mappings to this file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Template YAML file, or a chart spec with a `.json` extension
    #[arg(short = 't', long = "template")]
    pub template: PathBuf,
    /// Mapping YAML file (suggested mappings are used when omitted)
    #[arg(short = 'm', long = "mappings")]
    pub mappings: Option<PathBuf>,
    /// Suggest exclusively when no mapping file is given
    #[arg(long)]
    pub exclusive: bool,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter for the output (defaults to ',')
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<char>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Print the full mapping result as JSON instead of CSV rows
    #[arg(long)]
    pub report: bool,
}

pub fn parse_delimiter(value: &str) -> Result<char, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok('\t'),
        "comma" | "," => Ok(','),
        "|" | "pipe" => Ok('|'),
        ";" | "semicolon" => Ok(';'),
        ":" | "colon" => Ok(':'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn delimiter_names_and_literals() {
        assert_eq!(parse_delimiter("tab"), Ok('\t'));
        assert_eq!(parse_delimiter("colon"), Ok(':'));
        assert_eq!(parse_delimiter("#"), Ok('#'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_parse_options() {
        let cli = Cli::try_parse_from([
            "csv-fieldmap",
            "probe",
            "-i",
            "data.csv",
            "--delimiter",
            ";",
            "--no-header",
            "--no-trim",
        ])
        .unwrap();
        let Commands::Probe(args) = cli.command else {
            panic!("expected probe");
        };
        let options = args.input.parse_options();
        assert_eq!(options.delimiter, Some(';'));
        assert!(!options.has_header);
        assert!(!options.trim_whitespace);
        assert!(options.skip_empty_lines);
        assert_eq!(options.quote_char, '"');
    }
}
