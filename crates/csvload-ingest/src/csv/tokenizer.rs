//! Line tokenization
//!
//! Splits one raw line into fields on commas, honoring double quotes: a
//! quote character toggles quoted mode, and commas inside quotes are
//! literal text. Embedded-quote escaping (`""`) is intentionally not
//! supported; a quote always toggles mode. This is a documented limitation
//! carried over from the system whose imports this tool reproduces.

/// Tokenize a single line into field strings.
///
/// Always yields at least one field; an empty line yields one empty field.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == ',' && !in_quotes {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(c);
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_fields() {
        assert_eq!(tokenize("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_line_yields_one_empty_field() {
        assert_eq!(tokenize(""), vec![""]);
    }

    #[test]
    fn test_trailing_comma_yields_empty_field() {
        assert_eq!(tokenize("a,b,"), vec!["a", "b", ""]);
    }

    #[test]
    fn test_leading_comma() {
        assert_eq!(tokenize(",a"), vec!["", "a"]);
    }

    #[test]
    fn test_quoted_comma_is_literal() {
        assert_eq!(
            tokenize(r#"1,"Smith, John",NY"#),
            vec!["1", "Smith, John", "NY"]
        );
    }

    #[test]
    fn test_quotes_are_stripped() {
        assert_eq!(tokenize(r#""a","b""#), vec!["a", "b"]);
    }

    #[test]
    fn test_unterminated_quote_swallows_rest() {
        // A lone quote toggles mode for the remainder of the line.
        assert_eq!(tokenize(r#"a,"b,c"#), vec!["a", "b,c"]);
    }

    #[test]
    fn test_doubled_quote_is_not_an_escape() {
        // "" toggles in and straight back out, yielding nothing.
        assert_eq!(tokenize(r#"a,""""#), vec!["a", ""]);
    }
}
