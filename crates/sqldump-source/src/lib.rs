//! Legacy SQL dump parsing for meter-sync
//!
//! This crate recovers typed table/row data from a hand-edited SQL dump
//! text file. It deliberately parses only the data-bearing shape
//! `INSERT INTO <table>(<columns>) VALUES (<row>),(<row>),...;` - DDL,
//! indexes, triggers and session statements are ignored.
//!
//! The pipeline is:
//!
//! 1. [`parse`] scans the whole dump and locates every `INSERT INTO`
//!    statement per table.
//! 2. The value lexer ([`lex_row`]) turns each row group into a sequence
//!    of [`ScalarValue`]s, honoring quoting and escape rules.
//! 3. The resulting [`DumpStore`] hands out [`ProjectedRow`]s - rows
//!    zipped against their table's column list - to downstream consumers.
//!
//! Dumps are not guaranteed well-formed: a malformed statement is skipped
//! (and counted) rather than aborting the parse, and short rows project
//! with trailing nulls instead of failing.

mod lexer;
mod parser;
mod store;

pub use lexer::{lex_row, ScalarValue};
pub use parser::{parse, parse_text};
pub use store::{DumpStore, DumpTable, ProjectedRow};
