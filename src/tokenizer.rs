//! Quote-aware splitting of a single line into raw fields.
//!
//! The document is split into lines before tokenizing, so a quoted field can
//! contain the delimiter but never a line break.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("unterminated quoted field opened at character {position}")]
    UnterminatedQuote { position: usize },
}

/// Splits `line` on `delimiter`, ignoring delimiters inside quotes. An
/// `escape` immediately followed by `quote` yields a literal quote; when
/// `escape == quote` that doubling only applies inside a quoted field. A line
/// that ends inside quotes is still returned as-is.
pub fn tokenize_line(line: &str, delimiter: char, quote: char, escape: char) -> Vec<String> {
    scan(line, delimiter, quote, escape).0
}

/// Strict variant of [`tokenize_line`] that rejects unterminated quotes.
pub fn try_tokenize_line(
    line: &str,
    delimiter: char,
    quote: char,
    escape: char,
) -> Result<Vec<String>, TokenizeError> {
    match scan(line, delimiter, quote, escape) {
        (_, Some(position)) => Err(TokenizeError::UnterminatedQuote { position }),
        (fields, None) => Ok(fields),
    }
}

fn scan(line: &str, delimiter: char, quote: char, escape: char) -> (Vec<String>, Option<usize>) {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut opened_at = 0usize;
    let mut chars = line.chars().enumerate().peekable();

    while let Some((position, ch)) = chars.next() {
        let escapes = escape != quote || in_quotes;
        if escapes && ch == escape && chars.peek().is_some_and(|(_, next)| *next == quote) {
            chars.next();
            current.push(quote);
            continue;
        }
        if ch == quote {
            in_quotes = !in_quotes;
            if in_quotes {
                opened_at = position + 1;
            }
        } else if ch == delimiter && !in_quotes {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);

    (fields, in_quotes.then_some(opened_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_delimiters_stay_in_field() {
        assert_eq!(tokenize_line(r#"a,"b,c",d"#, ',', '"', '\\'), vec!["a", "b,c", "d"]);
    }

    #[test]
    fn escaped_quotes_are_literal() {
        assert_eq!(
            tokenize_line(r#""He said \"hi\"""#, ',', '"', '\\'),
            vec![r#"He said "hi""#]
        );
    }

    #[test]
    fn doubled_quotes_when_escape_is_quote() {
        assert_eq!(tokenize_line(r#"a,"",b"#, ',', '"', '"'), vec!["a", "", "b"]);
        assert_eq!(
            tokenize_line(r#""say ""hi""",x"#, ',', '"', '"'),
            vec![r#"say "hi""#, "x"]
        );
        assert_eq!(tokenize_line(r#"a,"""""#, ',', '"', '"'), vec!["a", "\""]);
        assert_eq!(
            try_tokenize_line(r#""",next"#, ',', '"', '"'),
            Ok(vec![String::new(), "next".to_string()])
        );
    }

    #[test]
    fn empty_fields_are_preserved() {
        assert_eq!(tokenize_line(",,", ',', '"', '\\'), vec!["", "", ""]);
        assert_eq!(tokenize_line("", ',', '"', '\\'), vec![""]);
    }

    #[test]
    fn custom_quote_and_delimiter() {
        assert_eq!(
            tokenize_line("'x;y';z", ';', '\'', '\\'),
            vec!["x;y".to_string(), "z".to_string()]
        );
    }

    #[test]
    fn unterminated_quote_is_reported_by_strict_variant() {
        let err = try_tokenize_line(r#"a,"open"#, ',', '"', '\\').unwrap_err();
        assert_eq!(err, TokenizeError::UnterminatedQuote { position: 3 });
        assert_eq!(tokenize_line(r#"a,"open"#, ',', '"', '\\'), vec!["a", "open"]);
    }
}
