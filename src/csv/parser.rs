//! CSV parsing with RFC 4180-like behavior

use thiserror::Error;

/// A quoted field was still open at the end of the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unterminated quoted field")]
pub struct UnterminatedQuote;

/// CSV parser for reading CSV records
#[derive(Debug, Clone, Copy)]
pub struct CsvParser {
    delimiter: u8,
    quote_char: u8,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new(b',', b'"')
    }
}

impl CsvParser {
    /// Create a new CSV parser with custom delimiter and quote character
    pub fn new(delimiter: u8, quote_char: u8) -> Self {
        Self {
            delimiter,
            quote_char,
        }
    }

    /// Parse a complete record into fields
    ///
    /// The record may contain newlines inside quoted fields. Fails if a quoted
    /// field is not closed before the end of `record`.
    pub fn parse_record(&self, record: &str) -> Result<Vec<String>, UnterminatedQuote> {
        let quote = self.quote_char as char;
        let delimiter = self.delimiter as char;
        let mut fields = Vec::new();
        let mut current_field = String::new();
        let mut in_quotes = false;
        let mut chars = record.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch == quote {
                if in_quotes {
                    // Escaped quote ("")
                    if chars.peek() == Some(&quote) {
                        current_field.push(quote);
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            } else if ch == delimiter && !in_quotes {
                fields.push(std::mem::take(&mut current_field));
            } else {
                current_field.push(ch);
            }
        }

        if in_quotes {
            return Err(UnterminatedQuote);
        }
        fields.push(current_field);
        Ok(fields)
    }

    /// Whether `record` ends outside a quoted field
    ///
    /// A `false` result means the record continues on the next physical line.
    pub fn is_complete(&self, record: &str) -> bool {
        !self.toggles_quote(record)
    }

    /// Whether `line` flips the quoted/unquoted state of the record it belongs to
    ///
    /// Lets a caller track an open quote one physical line at a time without
    /// rescanning the text already joined.
    pub fn toggles_quote(&self, line: &str) -> bool {
        // An escaped quote toggles twice, so counting quotes is enough.
        line.bytes().filter(|&b| b == self.quote_char).count() % 2 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Vec<String> {
        CsvParser::default().parse_record(line).unwrap()
    }

    #[test]
    fn test_simple() {
        assert_eq!(parse("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quoted() {
        assert_eq!(parse(r#""a,b",c"#), vec!["a,b", "c"]);
    }

    #[test]
    fn test_escaped_quotes() {
        assert_eq!(
            parse(r#""Say ""Hello""",world"#),
            vec![r#"Say "Hello""#, "world"]
        );
    }

    #[test]
    fn test_empty_fields() {
        assert_eq!(parse("a,,c"), vec!["a", "", "c"]);
        assert_eq!(parse(",,"), vec!["", "", ""]);
        assert_eq!(parse(""), vec![""]);
    }

    #[test]
    fn test_quoted_with_newline() {
        assert_eq!(
            parse("\"Line 1\nLine 2\",normal"),
            vec!["Line 1\nLine 2", "normal"]
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let parser = CsvParser::new(b';', b'"');
        assert_eq!(
            parser.parse_record(r#"a;"b;c";d"#).unwrap(),
            vec!["a", "b;c", "d"]
        );
    }

    #[test]
    fn test_quoted_empty() {
        assert_eq!(parse(r#""","""#), vec!["", ""]);
    }

    #[test]
    fn test_unterminated_quote() {
        let parser = CsvParser::default();
        assert_eq!(parser.parse_record(r#"a,"b"#), Err(UnterminatedQuote));
        assert_eq!(UnterminatedQuote.to_string(), "unterminated quoted field");
    }

    #[test]
    fn test_is_complete() {
        let parser = CsvParser::default();
        assert!(parser.is_complete("a,b"));
        assert!(parser.is_complete(r#""Say ""hi""",x"#));
        assert!(!parser.is_complete("\"Line 1"));
        assert!(parser.is_complete("\"Line 1\nLine 2\",x"));
    }

    #[test]
    fn test_toggles_quote() {
        let parser = CsvParser::default();
        assert!(parser.toggles_quote(r#"bob,5'10""#));
        assert!(!parser.toggles_quote(r#""Say ""hi""",x"#));
        assert!(!parser.toggles_quote("plain,line"));
        assert!(parser.toggles_quote("end of field\",x"));
    }
}
