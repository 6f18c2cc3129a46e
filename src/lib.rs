#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # scriptdb-csv

 Reader and writer for character-separated values, as produced when exporting
 query results from a SQL Server scripting tool.

 The format follows the usual CSV conventions: fields are separated by a
 configurable character (`,` by default), a field holding the separator, a quote or
 a line break is wrapped in `"` quotes, and embedded quotes are doubled. Quoted
 fields may span several lines.

 ## Core Concepts

- **CsvReader:** reads a stream one logical line at a time and yields `CsvRow`s.
- **CsvRow / CsvField:** an immutable row of text fields, with field views offering
  blank detection and decimal/integer accessors that report the failing column.
- **CsvWriter:** writes rows of arbitrary values, quoting only when needed.
- **ItemReader / ItemWriter:** the traits through which the reader and the writer
  plug into code that moves items from a source to a sink.

 ## Excel leading zeroes

 Spreadsheet applications read `0123` as the number `123`. The writer can protect
 such values by emitting the literal formula `="0123"`, and the reader can unwrap
 those formulas again, so that a file round-trips unchanged through both.

 ## Features

| **Feature** | **Description**                                                       |
|-------------|-----------------------------------------------------------------------|
| serde       | `ItemWriter` for any `Serialize` item, one row per item (default)     |
| full        | Enables all available features                                        |

 ## Getting Started

```rust
use scriptdb_csv::{
    error::CsvError,
    item::csv::{CsvReaderBuilder, CsvWriterBuilder, LineTerminator},
};

fn main() -> Result<(), CsvError> {
    let writer = CsvWriterBuilder::new()
        .separator(';')
        .terminator(LineTerminator::LF)
        .preserve_leading_zeroes_for_excel(true)
        .from_writer(Vec::new());

    writer.write_fields(["zip", "city", "motto"])?;
    writer.write_fields(["02108", "Boston", "Sicut patribus; sit Deus nobis"])?;
    let output = writer.into_inner()?;

    let reader = CsvReaderBuilder::new()
        .separator(';')
        .remove_literal_excel_formulas(true)
        .from_reader(output.as_slice());

    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(rows[1].values(), ["02108", "Boston", "Sicut patribus; sit Deus nobis"]);

    Ok(())
}
```

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
 */

/// Core module for reader and writer abstractions
pub mod core;

/// Error types for reading and writing
pub mod error;

#[doc(inline)]
pub use error::*;

/// Set of items readers / writers (the csv reader and writer)
pub mod item;
