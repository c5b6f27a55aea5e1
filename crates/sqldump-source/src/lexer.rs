//! Value lexer for a single VALUES-list row.
//!
//! The input is the text between one row's parentheses, already
//! comma-boundary-correct. A single left-to-right scan (no backtracking)
//! produces one [`ScalarValue`] per value.

use serde::Serialize;

/// A scalar recovered from a dump literal.
///
/// Numeric variants are chosen by the presence of a decimal point in the
/// literal: `5` lexes as `Integer`, `5.0` as `Float`. Binary payloads
/// (`_binary '...'`) are represented as [`ScalarValue::Opaque`] without
/// decoding - they carry session data the pipeline never reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScalarValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    /// Undecoded binary payload.
    Opaque,
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Text content, if this value is textual.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content; `Text` holding a plain integer literal also
    /// resolves, since hand-edited dumps quote numbers inconsistently.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Integer(i) => Some(*i),
            ScalarValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float content, with the same leniency as [`ScalarValue::as_i64`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Float(f) => Some(*f),
            ScalarValue::Integer(i) => Some(*i as f64),
            ScalarValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("NULL"),
            ScalarValue::Integer(i) => write!(f, "{i}"),
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::Text(s) => write!(f, "'{s}'"),
            ScalarValue::Opaque => f.write_str("<binary>"),
        }
    }
}

/// Lex one row's raw text into an ordered list of values.
pub fn lex_row(input: &str) -> Vec<ScalarValue> {
    let mut values = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        if let Some(after) = strip_keyword(rest, "NULL") {
            values.push(ScalarValue::Null);
            rest = after;
        } else if let Some(after) = rest.strip_prefix("_binary") {
            // Binary payload: skip to the next top-level comma undecoded.
            values.push(ScalarValue::Opaque);
            rest = skip_to_comma(after);
        } else if let Some(after) = rest.strip_prefix('\'') {
            let (text, remaining) = take_quoted(after);
            values.push(ScalarValue::Text(text));
            rest = remaining;
        } else {
            let (literal, remaining) = take_bare(rest);
            values.push(classify_bare(literal));
            rest = remaining;
        }

        rest = rest.trim_start();
        match rest.strip_prefix(',') {
            Some(after) => rest = after.trim_start(),
            None => break,
        }
    }

    values
}

/// Match `word` only when followed by a value boundary, so a bare literal
/// that merely starts with `NULL` is not misread.
fn strip_keyword<'a>(input: &'a str, word: &str) -> Option<&'a str> {
    let rest = input.strip_prefix(word)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c == ',' || c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

/// Consume a quoted string body (opening quote already consumed).
///
/// `\x` escapes the following character literally, `''` is an escaped
/// single quote, and an unescaped `'` terminates. Because quoted mode
/// fully consumes to the matching quote, a comma inside the string can
/// never split the value.
fn take_quoted(input: &str) -> (String, &str) {
    let mut out = String::new();
    let mut chars = input.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            }
            '\'' => {
                // A doubled quote is a literal quote, not a terminator.
                if input[i + 1..].starts_with('\'') {
                    chars.next();
                    out.push('\'');
                } else {
                    return (out, &input[i + 1..]);
                }
            }
            _ => out.push(c),
        }
    }

    // Unterminated string: the dump was hand-edited, take what we have.
    (out, "")
}

/// Consume a bare literal up to the next comma or end of input.
fn take_bare(input: &str) -> (&str, &str) {
    match input.find(',') {
        Some(i) => (input[..i].trim_end(), &input[i..]),
        None => (input.trim_end(), ""),
    }
}

/// Skip ahead to the next top-level comma, tracking quoted strings so a
/// comma inside a binary payload's string form does not end the skip.
fn skip_to_comma(input: &str) -> &str {
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in input.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '\'' => in_string = !in_string,
            ',' if !in_string => return &input[i..],
            _ => {}
        }
    }
    ""
}

fn classify_bare(literal: &str) -> ScalarValue {
    if literal.contains('.') {
        if let Ok(f) = literal.parse::<f64>() {
            return ScalarValue::Float(f);
        }
    } else if let Ok(i) = literal.parse::<i64>() {
        return ScalarValue::Integer(i);
    }
    // Defensive fallback for unexpected literals.
    ScalarValue::Text(literal.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_mixed_row() {
        let values = lex_row("'a,b\\'c', 5, NULL, 3.14");
        assert_eq!(
            values,
            vec![
                ScalarValue::Text("a,b'c".to_string()),
                ScalarValue::Integer(5),
                ScalarValue::Null,
                ScalarValue::Float(3.14),
            ]
        );
    }

    #[test]
    fn test_comma_inside_string_does_not_split() {
        let values = lex_row("'one, two', 'three'");
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].as_str(), Some("one, two"));
    }

    #[test]
    fn test_doubled_quote_escape() {
        let values = lex_row("'it''s fine'");
        assert_eq!(values, vec![ScalarValue::Text("it's fine".to_string())]);
    }

    #[test]
    fn test_backslash_escapes_literally() {
        let values = lex_row("'a\\nb'");
        assert_eq!(values, vec![ScalarValue::Text("anb".to_string())]);
    }

    #[test]
    fn test_binary_payload_skipped() {
        let values = lex_row("1, _binary 'blob, with ''junk', 'after'");
        assert_eq!(
            values,
            vec![
                ScalarValue::Integer(1),
                ScalarValue::Opaque,
                ScalarValue::Text("after".to_string()),
            ]
        );
    }

    #[test]
    fn test_null_is_case_sensitive() {
        // The dump tool emits uppercase NULL; anything else is a literal.
        assert_eq!(lex_row("NULL"), vec![ScalarValue::Null]);
        assert_eq!(
            lex_row("null"),
            vec![ScalarValue::Text("null".to_string())]
        );
    }

    #[test]
    fn test_null_prefixed_literal_is_text() {
        assert_eq!(
            lex_row("NULLABLE"),
            vec![ScalarValue::Text("NULLABLE".to_string())]
        );
    }

    #[test]
    fn test_negative_and_float_literals() {
        assert_eq!(lex_row("-42"), vec![ScalarValue::Integer(-42)]);
        assert_eq!(lex_row("-0.5"), vec![ScalarValue::Float(-0.5)]);
    }

    #[test]
    fn test_whitespace_produces_no_spurious_values() {
        assert_eq!(lex_row("   "), Vec::<ScalarValue>::new());
        assert_eq!(lex_row("  1 ,  2  "), vec![
            ScalarValue::Integer(1),
            ScalarValue::Integer(2),
        ]);
    }

    #[test]
    fn test_unterminated_string_recovers() {
        let values = lex_row("'dangling");
        assert_eq!(values, vec![ScalarValue::Text("dangling".to_string())]);
    }

    #[test]
    fn test_bare_garbage_falls_back_to_text() {
        assert_eq!(
            lex_row("12abc, 1.2.3"),
            vec![
                ScalarValue::Text("12abc".to_string()),
                ScalarValue::Text("1.2.3".to_string()),
            ]
        );
    }
}
