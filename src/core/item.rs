use crate::error::CsvError;

/// Result of a single [`ItemReader::read`] call.
///
/// - `Ok(Some(item))` when an item was read
/// - `Ok(None)` when the source is exhausted
/// - `Err(error)` when the underlying stream failed
pub type ItemReaderResult<R> = Result<Option<R>, CsvError>;

/// Result of the [`ItemWriter`] operations.
pub type ItemWriterResult = Result<(), CsvError>;

/// A source of items, read one at a time.
///
/// Readers take `&self` so they can be shared by reference with the code driving
/// them; implementations keep their cursor behind interior mutability.
pub trait ItemReader<R> {
    fn read(&self) -> ItemReaderResult<R>;
}

/// A sink of items, written one chunk at a time.
pub trait ItemWriter<W> {
    fn write(&self, items: &[W]) -> ItemWriterResult;

    fn flush(&self) -> ItemWriterResult;

    fn open(&self) -> ItemWriterResult {
        Ok(())
    }

    fn close(&self) -> ItemWriterResult {
        Ok(())
    }
}
