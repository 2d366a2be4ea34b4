use std::borrow::Cow;

use heck::ToSnakeCase;

/// Returns a lowercase representation, reusing the original string if already lowercase.
pub fn lowercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_uppercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_lowercase())
    }
}

/// Returns an uppercase representation, avoiding allocation when unnecessary.
pub fn uppercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_lowercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_uppercase())
    }
}

pub fn trim(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input.trim())
}

/// Converts identifiers to `snake_case`. `"Order Date"`, `"orderDate"` and
/// `"ORDER-DATE"` all become `order_date`.
pub fn snake_case(input: &str) -> Cow<'_, str> {
    let converted = input.to_snake_case();
    if converted == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(converted)
    }
}

/// Inserts `,` between groups of three integer digits, keeping `decimals`
/// fractional digits.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(formatted.len() + integer.len() / 3 + 1);
    if value.is_sign_negative() && formatted.chars().any(|c| matches!(c, '1'..='9')) {
        grouped.push('-');
    }
    for (idx, digit) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_helpers_borrow_when_unchanged() {
        assert!(matches!(lowercase("abc"), Cow::Borrowed(_)));
        assert_eq!(uppercase("abc"), "ABC");
        assert_eq!(trim("  x "), "x");
        assert_eq!(snake_case("Order Date"), "order_date");
        assert_eq!(snake_case("orderDate"), "order_date");
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(1234567.891, 2), "1,234,567.89");
        assert_eq!(group_thousands(999.0, 0), "999");
        assert_eq!(group_thousands(-1000.0, 0), "-1,000");
        assert_eq!(group_thousands(-0.001, 0), "0");
    }
}
