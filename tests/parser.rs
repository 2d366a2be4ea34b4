mod common;

use csv_fieldmap::{
    delimiter::detect_delimiter,
    parser::{ParseOptions, parse_csv},
    schema::analyze_schema,
    tokenizer::{tokenize_line, try_tokenize_line},
};
use proptest::prelude::*;

use common::{load_fixture, read_fixture};

#[test]
fn quoted_delimiters_stay_in_one_field() {
    assert_eq!(tokenize_line("a,\"b,c\",d", ',', '"', '\\'), vec!["a", "b,c", "d"]);
}

#[test]
fn escaped_quotes_are_literal() {
    assert_eq!(
        tokenize_line(r#""He said \"hi\"""#, ',', '"', '\\'),
        vec![r#"He said "hi""#]
    );
}

#[test]
fn unterminated_quote_reports_its_position() {
    let err = try_tokenize_line("a,\"bc", ',', '"', '\\').unwrap_err();
    assert_eq!(err.to_string(), "unterminated quoted field opened at character 3");
    assert_eq!(tokenize_line("a,\"bc", ',', '"', '\\'), vec!["a", "bc"]);
}

#[test]
fn detection_recovers_common_dialects() {
    let comma = "id,name,score\n1,Ada,90\n2,Bob,85\n";
    let semicolon = comma.replace(',', ";");
    let tab = comma.replace(',', "\t");
    assert_eq!(detect_delimiter(comma), ',');
    assert_eq!(detect_delimiter(&semicolon), ';');
    assert_eq!(detect_delimiter(&tab), '\t');
    assert_eq!(detect_delimiter(&semicolon), detect_delimiter(&semicolon));
}

#[test]
fn fixture_parses_with_detected_semicolon() {
    let (table, schema) = load_fixture("sales.csv");
    assert!(table.is_ok());
    assert_eq!(table.delimiter, ';');
    assert_eq!(table.row_count, 4);
    assert_eq!(table.value(2, "Region"), Some("East, Coast"));
    assert_eq!(table.value(3, "Revenue"), None);

    let types: Vec<&str> = schema.columns.iter().map(|c| c.column_type.as_str()).collect();
    assert_eq!(types, vec!["string", "string", "number", "boolean", "date"]);
    assert!(schema.column("Revenue").unwrap().nullable);
    assert!(!schema.column("Qtr").unwrap().unique);
}

#[test]
fn schema_analysis_is_idempotent() {
    let table = parse_csv(&read_fixture("sales.csv"), &ParseOptions::default());
    assert_eq!(analyze_schema(&table), analyze_schema(&table));
}

#[test]
fn headerless_input_gets_synthetic_names() {
    let options = ParseOptions {
        delimiter: Some('|'),
        has_header: false,
        ..ParseOptions::default()
    };
    let table = parse_csv("1|2\n3|4|5\n", &options);
    assert_eq!(table.headers, vec!["Column_1", "Column_2", "Column_3"]);
    assert!(!analyze_schema(&table).has_header);
}

proptest! {
    #[test]
    fn parsed_rows_are_rectangular(
        rows in prop::collection::vec(
            prop::collection::vec("[a-z0-9 ]{0,5}", 1..6),
            1..12,
        )
    ) {
        let text = rows
            .iter()
            .map(|cells| cells.join(","))
            .collect::<Vec<_>>()
            .join("\n");
        let options = ParseOptions { delimiter: Some(','), ..ParseOptions::default() };
        let table = parse_csv(&text, &options);
        prop_assert_eq!(table.column_count, table.headers.len());
        prop_assert_eq!(table.row_count, table.rows.len());
        for row in &table.rows {
            prop_assert_eq!(row.len(), table.headers.len());
        }
    }

    #[test]
    fn plain_fields_survive_tokenizing(fields in prop::collection::vec("[a-z ]{0,4}", 1..6)) {
        let line = fields.join(",");
        prop_assert_eq!(tokenize_line(&line, ',', '"', '\\'), fields);
    }
}
