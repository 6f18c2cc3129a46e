//! Character-separated values support for reading and writing tabular text.
//!
//! This module provides a reader and a writer that agree on one quoting grammar:
//! a field holding the separator, a quote, a carriage return or a line feed is
//! wrapped in `"` quotes, embedded quotes are doubled, and a quoted field may span
//! several physical lines. The separator is configurable; the quote character is
//! always `"`.
//!
//! # Module Architecture
//!
//! 1. **CsvLineParser**: splits one logical line into fields. Pure, no stream.
//! 2. **CsvReader**: assembles logical lines from a stream (joining physical lines
//!    until quotes balance) and yields [`CsvRow`]s.
//! 3. **CsvWriter**: serializes rows of values, quoting only when needed.
//! 4. **CsvRow / CsvField**: the immutable row produced by the reader and its
//!    field views with numeric accessors.
//!
//! Both the reader and the writer follow the builder pattern for configuration and
//! own their stream until they are closed or dropped.
//!
//! # Excel compatibility
//!
//! Spreadsheet applications strip leading zeroes from numeric-looking text. With
//! [`CsvWriterBuilder::preserve_leading_zeroes_for_excel`] enabled, values such as
//! `0123` are written as the literal formula `="0123"`. A reader built with
//! [`CsvReaderBuilder::remove_literal_excel_formulas`] turns them back into `0123`.
//!
//! # Encodings
//!
//! Readers decode their stream to UTF-8 with `encoding_rs_io`: a UTF-8 or UTF-16
//! byte-order mark selects the encoding, otherwise the one set with
//! [`CsvReaderBuilder::encoding`] is used. Writers encode each row into the
//! encoding set with [`CsvWriterBuilder::encoding`] (UTF-8 by default) and can
//! start the output with its byte-order mark.
//!
//! # Examples
//!
//! ## Reading
//!
//! ```
//! use scriptdb_csv::item::csv::{CsvReaderBuilder, LineTerminator};
//!
//! let data = "id,name,notes\n1,Alice,\"two\nlines\"\n\n2,Bob,\n";
//!
//! let reader = CsvReaderBuilder::new()
//!     .terminator(LineTerminator::LF)
//!     .from_reader(data.as_bytes());
//! let rows = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
//!
//! assert_eq!(rows.len(), 4);
//! assert_eq!(rows[1].values(), ["1", "Alice", "two\nlines"]);
//! assert!(rows[2].is_empty());
//! assert_eq!(rows[3].values(), ["2", "Bob", ""]);
//! ```
//!
//! ## Writing
//!
//! ```
//! use scriptdb_csv::item::csv::{CsvWriterBuilder, LineTerminator};
//!
//! let writer = CsvWriterBuilder::new()
//!     .separator(';')
//!     .terminator(LineTerminator::LF)
//!     .preserve_leading_zeroes_for_excel(true)
//!     .from_writer(Vec::new());
//!
//! writer.write_fields(["code", "label"]).unwrap();
//! writer.write_fields([Some("007"), Some("Bond; James")]).unwrap();
//! writer.write_fields([Some("008"), None]).unwrap();
//!
//! let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
//! assert_eq!(output, "code;label\n=\"007\";\"Bond; James\"\n=\"008\";\n");
//! ```

/// Field splitting for one logical line.
pub mod csv_line;

/// A module providing facilities for reading CSV rows from a stream.
pub mod csv_reader;

/// Row and field value types produced by the reader.
pub mod csv_row;

/// A module providing facilities for writing CSV rows to a sink.
pub mod csv_writer;

pub use csv_line::CsvLineParser;
pub use csv_reader::{CsvReader, CsvReaderBuilder, CsvRows};
pub use csv_row::{CsvField, CsvFields, CsvRow};
pub use csv_writer::{CsvWriter, CsvWriterBuilder, ToField};

/// Line terminator written after each row, and used to join the physical lines
/// of a multi-line quoted field on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTerminator {
    /// `\n`
    LF,
    /// `\r\n`
    CRLF,
}

impl LineTerminator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineTerminator::LF => "\n",
            LineTerminator::CRLF => "\r\n",
        }
    }
}

impl Default for LineTerminator {
    /// The platform terminator: CRLF on Windows, LF elsewhere.
    fn default() -> Self {
        if cfg!(windows) {
            LineTerminator::CRLF
        } else {
            LineTerminator::LF
        }
    }
}
