//! Table construction from raw CSV text.
//!
//! [`parse_csv`] is the entry point of the pipeline: it resolves the
//! delimiter, tokenizes each line, and hands the tokenized rows to
//! [`build_table`]. Problems are collected on the returned [`ParsedTable`]
//! instead of being raised, so callers inspect `errors` and `warnings`.

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{delimiter, tokenizer};

pub const DEFAULT_QUOTE_CHAR: char = '"';
pub const DEFAULT_ESCAPE_CHAR: char = '\\';
pub const SYNTHETIC_HEADER_PREFIX: &str = "Column_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Overrides delimiter detection when set.
    pub delimiter: Option<char>,
    pub has_header: bool,
    pub skip_empty_lines: bool,
    pub trim_whitespace: bool,
    pub quote_char: char,
    pub escape_char: char,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            has_header: true,
            skip_empty_lines: true,
            trim_whitespace: true,
            quote_char: DEFAULT_QUOTE_CHAR,
            escape_char: DEFAULT_ESCAPE_CHAR,
        }
    }
}

/// A rectangular table. `rows[i][j]` is the cell of row `i` under
/// `headers[j]`; `None` marks an empty cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub delimiter: char,
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ParsedTable {
    pub fn empty(delimiter: char, errors: Vec<String>) -> Self {
        Self {
            headers: Vec::new(),
            rows: Vec::new(),
            delimiter,
            row_count: 0,
            column_count: 0,
            errors,
            warnings: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(idx).and_then(|cell| cell.as_deref()))
    }
}

pub fn synthetic_header(index: usize) -> String {
    format!("{SYNTHETIC_HEADER_PREFIX}{}", index + 1)
}

pub fn parse_csv(text: &str, options: &ParseOptions) -> ParsedTable {
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| delimiter::detect_delimiter(text));
    if text.trim().is_empty() {
        return ParsedTable::empty(delimiter, vec!["CSV data is empty".to_string()]);
    }
    debug!(
        "Parsing CSV with delimiter {:?} (header: {}, trim: {})",
        delimiter, options.has_header, options.trim_whitespace
    );

    let mut line_errors = Vec::new();
    let mut tokenized = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if options.skip_empty_lines && line.trim().is_empty() {
            continue;
        }
        match tokenizer::try_tokenize_line(
            line,
            delimiter,
            options.quote_char,
            options.escape_char,
        ) {
            Ok(fields) => tokenized.push(fields),
            Err(err) => {
                debug!("Skipping line {}: {err}", idx + 1);
                line_errors.push(format!("Line {}: {err}", idx + 1));
            }
        }
    }

    let mut table = build_table(
        tokenized,
        options.has_header,
        options.trim_whitespace,
        delimiter,
    );
    line_errors.append(&mut table.errors);
    table.errors = line_errors;
    table
}

pub fn build_table(
    rows: Vec<Vec<String>>,
    has_header: bool,
    trim_whitespace: bool,
    delimiter: char,
) -> ParsedTable {
    if rows.is_empty() {
        return ParsedTable::empty(delimiter, vec!["No rows found in CSV data".to_string()]);
    }

    let mut warnings = Vec::new();
    let mut rows = rows.into_iter();
    let headers = if has_header {
        let header_row = rows.next().unwrap_or_default();
        resolve_headers(header_row, trim_whitespace, &mut warnings)
    } else {
        Vec::new()
    };
    let data: Vec<Vec<String>> = rows.collect();

    let headers = if has_header {
        headers
    } else {
        let width = data.iter().map(Vec::len).max().unwrap_or(0);
        (0..width).map(synthetic_header).collect()
    };
    let column_count = headers.len();

    let rows: Vec<Vec<Option<String>>> = data
        .into_iter()
        .map(|row| normalize_row(row, column_count, trim_whitespace))
        .collect();

    let mut errors = Vec::new();
    if rows.is_empty() {
        errors.push("No data rows found in CSV data".to_string());
    }

    ParsedTable {
        row_count: rows.len(),
        column_count,
        headers,
        rows,
        delimiter,
        errors,
        warnings,
    }
}

fn resolve_headers(
    raw: Vec<String>,
    trim_whitespace: bool,
    warnings: &mut Vec<String>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut headers = Vec::with_capacity(raw.len());
    for (idx, value) in raw.into_iter().enumerate() {
        let candidate = if value.trim().is_empty() {
            let name = synthetic_header(idx);
            warnings.push(format!(
                "Empty header at position {} replaced with '{name}'",
                idx + 1
            ));
            name
        } else if trim_whitespace {
            value.trim().to_string()
        } else {
            value
        };

        let mut name = candidate.clone();
        let mut suffix = 2usize;
        while !seen.insert(name.clone()) {
            name = format!("{candidate}_{suffix}");
            suffix += 1;
        }
        if name != candidate {
            warnings.push(format!(
                "Duplicate header '{candidate}' at position {} renamed to '{name}'",
                idx + 1
            ));
        }
        headers.push(name);
    }
    headers
}

fn normalize_row(mut row: Vec<String>, width: usize, trim_whitespace: bool) -> Vec<Option<String>> {
    row.resize(width, String::new());
    row.into_iter()
        .map(|cell| {
            let cell = if trim_whitespace {
                cell.trim().to_string()
            } else {
                cell
            };
            (!cell.is_empty()).then_some(cell)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn ragged_rows_are_padded_and_truncated() {
        let table = build_table(
            rows(&[&["a", "b", "c"], &["1"], &["1", "2", "3", "4"]]),
            true,
            true,
            ',',
        );
        assert_eq!(table.column_count, 3);
        assert_eq!(table.rows[0], vec![Some("1".to_string()), None, None]);
        assert_eq!(table.rows[1].len(), 3);
        assert!(table.is_ok());
    }

    #[test]
    fn blank_headers_are_synthesized_with_warning() {
        let table = build_table(rows(&[&["id", " ", "name"], &["1", "x", "y"]]), true, true, ',');
        assert_eq!(table.headers, vec!["id", "Column_2", "name"]);
        assert_eq!(table.warnings.len(), 1);
        assert_eq!(table.value(0, "Column_2"), Some("x"));
    }

    #[test]
    fn duplicate_headers_are_disambiguated() {
        let table = build_table(rows(&[&["x", "x", "x"], &["1", "2", "3"]]), true, true, ',');
        assert_eq!(table.headers, vec!["x", "x_2", "x_3"]);
        assert_eq!(table.warnings.len(), 2);
    }

    #[test]
    fn headerless_tables_use_widest_row() {
        let table = build_table(rows(&[&["1", "2"], &["3", "4", "5"]]), false, true, ',');
        assert_eq!(table.headers, vec!["Column_1", "Column_2", "Column_3"]);
        assert_eq!(table.row_count, 2);
    }

    #[test]
    fn whitespace_only_cells_become_null_when_trimming() {
        let table = build_table(rows(&[&["a", "b"], &["  ", " v "]]), true, true, ',');
        assert_eq!(table.rows[0], vec![None, Some("v".to_string())]);

        let untrimmed = build_table(rows(&[&["a", "b"], &["  ", " v "]]), true, false, ',');
        assert_eq!(
            untrimmed.rows[0],
            vec![Some("  ".to_string()), Some(" v ".to_string())]
        );
    }

    #[test]
    fn empty_input_reports_errors_without_panicking() {
        let table = parse_csv("", &ParseOptions::default());
        assert!(!table.is_ok());
        assert!(table.headers.is_empty());
        assert_eq!(table.row_count, 0);

        let header_only = parse_csv("a,b,c\n", &ParseOptions::default());
        assert_eq!(header_only.headers.len(), 3);
        assert_eq!(header_only.errors, vec!["No data rows found in CSV data"]);
    }

    #[test]
    fn bad_lines_are_reported_and_skipped() {
        let text = "id,name\n1,\"open\n2,ok\n";
        let table = parse_csv(text, &ParseOptions::default());
        assert_eq!(table.row_count, 1);
        assert_eq!(table.errors.len(), 1);
        assert!(table.errors[0].starts_with("Line 2:"));
        assert_eq!(table.value(0, "name"), Some("ok"));
    }

    #[test]
    fn crlf_and_blank_lines_are_handled() {
        let text = "a;b\r\n\r\n1;2\r\n3;4\r\n";
        let table = parse_csv(text, &ParseOptions::default());
        assert_eq!(table.delimiter, ';');
        assert_eq!(table.row_count, 2);
        assert_eq!(table.value(1, "b"), Some("4"));

        let keep_blank = ParseOptions {
            skip_empty_lines: false,
            ..ParseOptions::default()
        };
        let table = parse_csv(text, &keep_blank);
        assert_eq!(table.row_count, 3);
        assert_eq!(table.rows[0], vec![None, None]);
    }

    #[test]
    fn explicit_delimiter_overrides_detection() {
        let options = ParseOptions {
            delimiter: Some('|'),
            ..ParseOptions::default()
        };
        let table = parse_csv("a,b|c\n1,2|3", &options);
        assert_eq!(table.headers, vec!["a,b", "c"]);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ParseOptions = serde_json::from_str(r#"{"delimiter": ";"}"#).unwrap();
        assert_eq!(options.delimiter, Some(';'));
        assert!(options.has_header);
        assert_eq!(options.escape_char, '\\');
    }
}
