//! Elastic plain-text tables for terminal output.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    parser::ParsedTable,
    schema::{Schema, format_hint_for},
};

const NULL_MARKER: &str = "";

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    // Header
    let header_line = format_row(headers, &widths);
    let _ = writeln!(output, "{header_line}");

    // Separator
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths);
    let _ = writeln!(output, "{separator_line}");

    // Rows
    for row in rows {
        let row_line = format_row(row, &widths);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

/// Renders up to `limit` data rows of a parsed table.
pub fn render_preview(table: &ParsedTable, limit: usize) -> String {
    let rows = table
        .rows
        .iter()
        .take(limit)
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_deref().unwrap_or(NULL_MARKER).to_string())
                .collect()
        })
        .collect::<Vec<Vec<String>>>();
    render_table(&table.headers, &rows)
}

/// One line per column: position, name, inferred type, null and uniqueness
/// flags, sample values, and a format hint.
pub fn render_schema(schema: &Schema) -> String {
    let headers = ["#", "column", "type", "nulls", "unique", "samples", "format"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = schema
        .columns
        .iter()
        .map(|column| {
            vec![
                (column.index + 1).to_string(),
                column.name.clone(),
                column.column_type.to_string(),
                column.null_count.to_string(),
                if column.unique { "yes" } else { "no" }.to_string(),
                column.sample_values.join(", "),
                format_hint_for(column).unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = display_width(sanitized.as_ref());
        let mut cell = sanitized.into_owned();
        let padding = widths
            .get(idx)
            .copied()
            .unwrap_or_default()
            .saturating_sub(display);
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // Skip ANSI escape sequence (e.g. \x1b[31m)
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        let mut sanitized = String::with_capacity(value.len());
        for ch in value.chars() {
            match ch {
                '\n' | '\r' | '\t' => sanitized.push(' '),
                other => sanitized.push(other),
            }
        }
        Cow::Owned(sanitized)
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parser::{ParseOptions, parse_csv},
        schema::analyze_schema,
    };

    #[test]
    fn columns_are_padded_to_widest_cell() {
        let headers = vec!["id".to_string(), "name".to_string()];
        let rows = vec![vec!["1".to_string(), "Ada Lovelace".to_string()]];
        let rendered = render_table(&headers, &rows);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "id  name");
        assert_eq!(lines[1], "---  ------------");
        assert_eq!(lines[2], "1   Ada Lovelace");
    }

    #[test]
    fn ansi_sequences_do_not_count_towards_width() {
        assert_eq!(display_width("\u{1b}[31mred\u{1b}[0m"), 3);
        assert_eq!(sanitize_cell("a\tb"), "a b");
    }

    #[test]
    fn preview_renders_null_cells_blank() {
        let table = parse_csv("a,b\n1,\n2,x\n", &ParseOptions::default());
        let rendered = render_preview(&table, 1);
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.lines().nth(2).unwrap().starts_with('1'));
    }

    #[test]
    fn schema_listing_includes_format_hints() {
        let table = parse_csv(
            "price,when\n$5,2024-01-01\n$7,2024-02-01\n",
            &ParseOptions::default(),
        );
        let rendered = render_schema(&analyze_schema(&table));
        assert!(rendered.contains("Currency symbol detected"));
        assert!(rendered.contains("Hyphen-separated date"));
    }
}
