use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
/// Errors raised while reading or writing character-separated values.
pub enum CsvError {
    /// The source or destination could not be opened at construction time.
    #[error("Could not open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("ItemReader from: {0}")]
    ItemReader(String),

    #[error("ItemWriter from: {0}")]
    ItemWriter(String),

    /// The reader was advanced after its stream had been released.
    #[error("Reader is null")]
    ReaderUnavailable,

    /// The writer was used after its stream had been released.
    #[error("Writer is null")]
    WriterUnavailable,

    /// A numeric accessor was invoked on a field that does not hold a number.
    #[error("The field at index {index} is not in {expected} format")]
    FieldFormat { index: usize, expected: &'static str },
}

impl CsvError {
    pub(crate) fn open(path: impl Into<String>, source: io::Error) -> Self {
        CsvError::Open {
            path: path.into(),
            source,
        }
    }
}
