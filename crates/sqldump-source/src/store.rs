//! In-memory per-table store built by the parser, and the row projector
//! that zips raw value lists against column names.

use crate::ScalarValue;
use std::collections::HashMap;

/// One source table recovered from the dump.
#[derive(Debug, Clone)]
pub struct DumpTable {
    pub name: String,
    /// Column names in declaration order, fixed at first sighting.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ScalarValue>>,
}

/// Table name → recovered table, built once per parse and read-only
/// afterwards. Iteration order follows first sighting in the dump.
#[derive(Debug, Default)]
pub struct DumpStore {
    tables: HashMap<String, DumpTable>,
    order: Vec<String>,
    skipped_statements: usize,
}

impl DumpStore {
    pub(crate) fn append(
        &mut self,
        name: String,
        columns: Vec<String>,
        mut rows: Vec<Vec<ScalarValue>>,
    ) {
        match self.tables.get_mut(&name) {
            Some(table) => {
                // Later statements for the same table are assumed to share
                // the first statement's column order (dump-tool output
                // guarantees this; it is not re-validated here).
                table.rows.append(&mut rows);
            }
            None => {
                self.order.push(name.clone());
                self.tables.insert(
                    name.clone(),
                    DumpTable {
                        name,
                        columns,
                        rows,
                    },
                );
            }
        }
    }

    pub(crate) fn note_skipped_statement(&mut self) {
        self.skipped_statements += 1;
    }

    /// Table names in first-sighting order.
    pub fn table_names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn get(&self, table: &str) -> Option<&DumpTable> {
        self.tables.get(table)
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn has_rows(&self, table: &str) -> bool {
        self.row_count(table) > 0
    }

    /// All rows of a table, projected against its column list.
    pub fn rows_of(&self, table: &str) -> Vec<ProjectedRow> {
        match self.tables.get(table) {
            Some(t) => t
                .rows
                .iter()
                .map(|values| ProjectedRow::project(&t.columns, values))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The first `n` projected rows of a table, for pre-screening output.
    pub fn sample_of(&self, table: &str, n: usize) -> Vec<ProjectedRow> {
        let mut rows = self.rows_of(table);
        rows.truncate(n);
        rows
    }

    /// Number of INSERT statements dropped as malformed during the parse.
    pub fn skipped_statements(&self) -> usize {
        self.skipped_statements
    }
}

/// A raw row labeled with its table's column names.
///
/// Ephemeral - created per row during import, never persisted.
#[derive(Debug, Clone, Default)]
pub struct ProjectedRow {
    fields: HashMap<String, ScalarValue>,
}

impl ProjectedRow {
    /// Zip `columns` against `values`.
    ///
    /// Missing trailing values project to `Null` and surplus values are
    /// dropped - a partially-populated row is preferred over aborting the
    /// whole table's import, since dumps are not guaranteed well-formed.
    pub fn project(columns: &[String], values: &[ScalarValue]) -> Self {
        let mut fields = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            let value = values.get(i).cloned().unwrap_or(ScalarValue::Null);
            fields.insert(column.clone(), value);
        }
        ProjectedRow { fields }
    }

    pub fn get(&self, column: &str) -> Option<&ScalarValue> {
        self.fields.get(column)
    }

    pub fn str_of(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(|v| v.as_str())
    }

    /// Trimmed, non-empty text content - the usual prerequisite for a
    /// natural key.
    pub fn non_empty_str(&self, column: &str) -> Option<&str> {
        self.str_of(column)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn int_of(&self, column: &str) -> Option<i64> {
        self.fields.get(column).and_then(|v| v.as_i64())
    }

    pub fn float_of(&self, column: &str) -> Option<f64> {
        self.fields.get(column).and_then(|v| v.as_f64())
    }

    /// Iterate over (column, value) pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_short_row_pads_with_null() {
        let row = ProjectedRow::project(
            &cols(&["a", "b", "c"]),
            &[ScalarValue::Integer(1)],
        );
        assert_eq!(row.int_of("a"), Some(1));
        assert!(row.get("b").unwrap().is_null());
        assert!(row.get("c").unwrap().is_null());
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_long_row_drops_extras() {
        let row = ProjectedRow::project(
            &cols(&["a"]),
            &[ScalarValue::Integer(1), ScalarValue::Integer(2)],
        );
        assert_eq!(row.len(), 1);
        assert_eq!(row.int_of("a"), Some(1));
    }

    #[test]
    fn test_non_empty_str_filters_blank_values() {
        let row = ProjectedRow::project(
            &cols(&["a", "b"]),
            &[
                ScalarValue::Text("  ".to_string()),
                ScalarValue::Text(" x ".to_string()),
            ],
        );
        assert_eq!(row.non_empty_str("a"), None);
        assert_eq!(row.non_empty_str("b"), Some("x"));
    }

    #[test]
    fn test_numeric_access_is_lenient_about_quoting() {
        let row = ProjectedRow::project(
            &cols(&["n", "f"]),
            &[
                ScalarValue::Text("7".to_string()),
                ScalarValue::Text("2.5".to_string()),
            ],
        );
        assert_eq!(row.int_of("n"), Some(7));
        assert_eq!(row.float_of("f"), Some(2.5));
    }

    #[test]
    fn test_missing_table_yields_empty_results() {
        let store = DumpStore::default();
        assert_eq!(store.row_count("nope"), 0);
        assert!(store.rows_of("nope").is_empty());
        assert!(!store.has_rows("nope"));
    }
}
