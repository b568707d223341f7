//! Field normalization
//!
//! Converts a raw field string into the canonical textual value stored in
//! the staging table. Order matters: dates are tried before numbers, and
//! the first matching date format wins even when a later one would also
//! match, so ambiguous values like `01-02-2020` are resolved by format
//! priority. Changing the priority would alter historical import results.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Accepted date formats, tried in order. First match wins.
const DATE_FORMATS: [&str; 3] = ["%d-%m-%Y", "%m/%d/%Y", "%Y-%m-%d"];

/// Canonical output format for dates.
const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d";

/// Normalize one raw field into its canonical stored form.
///
/// - trims surrounding whitespace;
/// - an empty result becomes `None` (SQL NULL), distinct from empty string
///   only in so far as the store writes NULL rather than `''`;
/// - values matching an accepted date format are re-rendered `yyyy-MM-dd`;
/// - decimal values are re-rendered in canonical invariant form;
/// - everything else is kept verbatim (trimmed).
///
/// Idempotent: normalizing an already-canonical value yields itself.
pub fn normalize_field(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.format(DATE_OUTPUT_FORMAT).to_string());
        }
    }

    if let Some(value) = parse_decimal(trimmed) {
        return Some(canonical_decimal(value));
    }

    Some(trimmed.to_string())
}

/// Parse a decimal, accepting comma group separators in quoted fields
/// ("1,000" is one thousand, not kept verbatim).
fn parse_decimal(text: &str) -> Option<Decimal> {
    if let Ok(value) = Decimal::from_str(text) {
        return Some(value);
    }
    if text.contains(',') {
        return Decimal::from_str(&text.replace(',', "")).ok();
    }
    None
}

/// Render a decimal in canonical form: trailing zeros stripped, integers
/// bare, fractional values carrying at least two decimal places.
fn canonical_decimal(value: Decimal) -> String {
    let mut value = value.normalize();
    if value.scale() > 0 && value.scale() < 2 {
        value.rescale(2);
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(normalize_field("  hello  ").as_deref(), Some("hello"));
    }

    #[test]
    fn test_empty_and_whitespace_are_null() {
        assert_eq!(normalize_field(""), None);
        assert_eq!(normalize_field("   "), None);
        assert_eq!(normalize_field("\t"), None);
    }

    #[test]
    fn test_date_formats_rerender_iso() {
        assert_eq!(normalize_field("25-12-2020").as_deref(), Some("2020-12-25"));
        assert_eq!(normalize_field("12/25/2020").as_deref(), Some("2020-12-25"));
        assert_eq!(normalize_field("2020-12-25").as_deref(), Some("2020-12-25"));
    }

    #[test]
    fn test_ambiguous_date_resolved_by_format_priority() {
        // dd-MM-yyyy is tried first, so this is February 1st, not January 2nd.
        assert_eq!(normalize_field("01-02-2020").as_deref(), Some("2020-02-01"));
    }

    #[test]
    fn test_invalid_dates_fall_through() {
        assert_eq!(normalize_field("2020-13-45").as_deref(), Some("2020-13-45"));
        assert_eq!(normalize_field("32-01-2020").as_deref(), Some("32-01-2020"));
    }

    #[test]
    fn test_decimal_canonicalization() {
        assert_eq!(normalize_field("10.5").as_deref(), Some("10.50"));
        assert_eq!(normalize_field("10.50").as_deref(), Some("10.50"));
        assert_eq!(normalize_field("10.500").as_deref(), Some("10.50"));
        assert_eq!(normalize_field("10.555").as_deref(), Some("10.555"));
        assert_eq!(normalize_field("1").as_deref(), Some("1"));
        assert_eq!(normalize_field("007").as_deref(), Some("7"));
        assert_eq!(normalize_field("-3.1").as_deref(), Some("-3.10"));
        assert_eq!(normalize_field("2.0").as_deref(), Some("2"));
    }

    #[test]
    fn test_group_separators_accepted() {
        assert_eq!(normalize_field("1,000").as_deref(), Some("1000"));
        assert_eq!(normalize_field("1,234.5").as_deref(), Some("1234.50"));
        assert_eq!(normalize_field("-2,500").as_deref(), Some("-2500"));
    }

    #[test]
    fn test_non_numeric_kept_verbatim() {
        assert_eq!(normalize_field("abc").as_deref(), Some("abc"));
        assert_eq!(normalize_field("12ab").as_deref(), Some("12ab"));
        assert_eq!(normalize_field("a,b").as_deref(), Some("a,b"));
        assert_eq!(normalize_field(",").as_deref(), Some(","));
    }

    #[test]
    fn test_idempotent_on_own_output() {
        for input in ["  10.5 ", "01-02-2020", "hello", "007", "2.0", "1,000", "x,y"] {
            let once = normalize_field(input);
            let twice = once.as_deref().and_then(normalize_field);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_date_round_trip() {
        for input in ["25-12-2020", "12/25/2020", "2020-12-25"] {
            let canonical = normalize_field(input);
            assert_eq!(canonical.as_deref(), Some("2020-12-25"));
            assert_eq!(
                canonical.as_deref().and_then(normalize_field),
                canonical,
                "canonical date must re-normalize to itself"
            );
        }
    }
}
