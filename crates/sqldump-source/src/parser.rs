//! Dump parser: scans a whole dump text for `INSERT INTO` statements and
//! accumulates their rows into a [`DumpStore`].
//!
//! Row groups are split at top-level `),(` boundaries using the same
//! quote/escape tracking as the value lexer, so a string value containing
//! the literal sequence `),(` cannot corrupt a row.

use crate::lexer::lex_row;
use crate::store::DumpStore;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Parse a dump file into a [`DumpStore`].
///
/// The file is read into memory in one go - this is a batch tool and
/// dumps are expected to fit (callers enforce an upper size bound before
/// invoking the pipeline). An unreadable file is the only fatal error;
/// malformed statements inside the dump are skipped and counted.
pub fn parse(path: impl AsRef<Path>) -> Result<DumpStore> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dump file {}", path.display()))?;
    Ok(parse_text(&text))
}

/// Parse dump text already held in memory.
pub fn parse_text(text: &str) -> DumpStore {
    let mut store = DumpStore::default();
    let mut pos = 0;

    while let Some(found) = text[pos..].find("INSERT INTO") {
        let start = pos + found;
        match parse_insert(&text[start..]) {
            Some(stmt) => {
                debug!(
                    "Parsed INSERT into '{}': {} columns, {} rows",
                    stmt.table,
                    stmt.columns.len(),
                    stmt.rows.len()
                );
                store.append(stmt.table, stmt.columns, stmt.rows);
                pos = start + stmt.consumed;
            }
            None => {
                // One bad statement never aborts the parse; scanning
                // resumes at the next INSERT INTO occurrence.
                warn!(
                    "Skipping malformed INSERT statement at byte offset {}",
                    start
                );
                store.note_skipped_statement();
                pos = start + "INSERT INTO".len();
            }
        }
    }

    store
}

struct ParsedInsert {
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<crate::ScalarValue>>,
    /// Bytes consumed from the statement start, including the `;`.
    consumed: usize,
}

/// Parse one statement beginning at `INSERT INTO`. Returns `None` when
/// the statement does not match the expected data-bearing shape.
fn parse_insert(input: &str) -> Option<ParsedInsert> {
    let mut cursor = Cursor::new(input);
    cursor.expect_literal("INSERT INTO")?;
    cursor.skip_whitespace();

    let table = cursor.take_identifier()?;
    cursor.skip_whitespace();

    cursor.expect_char('(')?;
    let column_list = cursor.take_until(')')?;
    cursor.expect_char(')')?;
    let columns: Vec<String> = column_list
        .split(',')
        .map(normalize_identifier)
        .filter(|c| !c.is_empty())
        .collect();
    if columns.is_empty() {
        return None;
    }

    cursor.skip_whitespace();
    cursor.expect_keyword_ci("VALUES")?;
    cursor.skip_whitespace();

    let mut rows = Vec::new();
    loop {
        cursor.expect_char('(')?;
        let group = cursor.take_row_group()?;
        rows.push(lex_row(group));

        cursor.skip_whitespace();
        if cursor.eat_char(',') {
            cursor.skip_whitespace();
            continue;
        }
        cursor.expect_char(';')?;
        break;
    }

    Some(ParsedInsert {
        table,
        columns,
        rows,
        consumed: cursor.pos,
    })
}

/// Strip identifier quoting (backticks) and surrounding whitespace.
fn normalize_identifier(raw: &str) -> String {
    raw.trim().trim_matches('`').trim().to_string()
}

/// Byte-position scanner over one statement's text.
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Cursor { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn expect_literal(&mut self, literal: &str) -> Option<()> {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            Some(())
        } else {
            None
        }
    }

    fn expect_keyword_ci(&mut self, keyword: &str) -> Option<()> {
        let rest = self.rest();
        if rest.len() >= keyword.len() && rest[..keyword.len()].eq_ignore_ascii_case(keyword) {
            self.pos += keyword.len();
            Some(())
        } else {
            None
        }
    }

    fn expect_char(&mut self, c: char) -> Option<()> {
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            Some(())
        } else {
            None
        }
    }

    fn eat_char(&mut self, c: char) -> bool {
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Backtick-quoted or bare table identifier.
    fn take_identifier(&mut self) -> Option<String> {
        if self.eat_char('`') {
            let name = self.take_until('`')?.to_string();
            self.expect_char('`')?;
            if name.is_empty() {
                return None;
            }
            return Some(name);
        }

        let rest = self.rest();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        self.pos += end;
        Some(rest[..end].to_string())
    }

    /// Everything up to (not including) the next occurrence of `c`.
    fn take_until(&mut self, c: char) -> Option<&'a str> {
        let rest = self.rest();
        let end = rest.find(c)?;
        self.pos += end;
        Some(&rest[..end])
    }

    /// Consume a row group body, opening paren already eaten, up to and
    /// including its matching top-level close paren. Quote and escape
    /// state is tracked so parens inside string values are ignored.
    fn take_row_group(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let mut depth = 1usize;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, c) in rest.char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match c {
                '\\' if in_string => escape_next = true,
                '\'' => in_string = !in_string,
                '(' if !in_string => depth += 1,
                ')' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += i + 1;
                        return Some(&rest[..i]);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScalarValue;

    #[test]
    fn test_parse_single_statement() {
        let store = parse_text(
            "INSERT INTO `sites`(`id`, `code`, `name`) VALUES (1,'SITE-01','Plant One');",
        );
        assert_eq!(store.table_names(), vec!["sites"]);
        assert_eq!(store.row_count("sites"), 1);

        let rows = store.rows_of("sites");
        assert_eq!(rows[0].str_of("code"), Some("SITE-01"));
        assert_eq!(rows[0].int_of("id"), Some(1));
    }

    #[test]
    fn test_rows_accumulate_across_statements() {
        let dump = "\
INSERT INTO t(a) VALUES (1),(2),(3);
-- a comment between statements
INSERT INTO t(a) VALUES (4),(5),(6),(7);
";
        let store = parse_text(dump);
        assert_eq!(store.row_count("t"), 7);
    }

    #[test]
    fn test_row_boundary_inside_string_is_not_split() {
        // The literal sequence ),( inside a string value must not end the
        // row group.
        let store = parse_text("INSERT INTO t(a, b) VALUES ('x),(y', 1),(  'z', 2);");
        assert_eq!(store.row_count("t"), 2);

        let rows = store.rows_of("t");
        assert_eq!(rows[0].str_of("a"), Some("x),(y"));
        assert_eq!(rows[1].str_of("a"), Some("z"));
    }

    #[test]
    fn test_bare_identifiers_and_lowercase_values_keyword() {
        let store = parse_text("INSERT INTO meters(id, name) values (9, 'M-9');");
        assert_eq!(store.row_count("meters"), 1);
    }

    #[test]
    fn test_malformed_statement_is_skipped_not_fatal() {
        let dump = "\
INSERT INTO broken(a VALUES (1);
INSERT INTO ok(a) VALUES (1),(2);
";
        let store = parse_text(dump);
        assert_eq!(store.row_count("ok"), 2);
        assert_eq!(store.row_count("broken"), 0);
        assert_eq!(store.skipped_statements(), 1);
    }

    #[test]
    fn test_non_insert_statements_ignored() {
        let dump = "\
DROP TABLE IF EXISTS sites;
CREATE TABLE sites (id int, code varchar(32));
LOCK TABLES `sites` WRITE;
INSERT INTO sites(id, code) VALUES (1, 'A');
UNLOCK TABLES;
";
        let store = parse_text(dump);
        assert_eq!(store.table_names(), vec!["sites"]);
        assert_eq!(store.row_count("sites"), 1);
    }

    #[test]
    fn test_null_and_binary_values_survive_parsing() {
        let store =
            parse_text("INSERT INTO s(a, b, c) VALUES (NULL, _binary 'x),(y', 2.5);");
        let rows = store.rows_of("s");
        assert!(rows[0].get("a").unwrap().is_null());
        assert_eq!(rows[0].get("b"), Some(&ScalarValue::Opaque));
        assert_eq!(rows[0].float_of("c"), Some(2.5));
    }

    #[test]
    fn test_columns_fixed_at_first_sighting() {
        let dump = "\
INSERT INTO t(a, b) VALUES (1, 2);
INSERT INTO t(a, b) VALUES (3, 4);
";
        let store = parse_text(dump);
        let table = store.get("t").unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.rows.len(), 2);
    }
}
