use std::{
    borrow::Cow,
    cell::{Cell, RefCell},
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use log::{debug, trace};
use rust_decimal::Decimal;

use crate::{core::item::ItemWriterResult, error::CsvError};

use super::{LineTerminator, csv_line::QUOTE, csv_row::CsvRow};

/// Conversion of a value into the text of one CSV field.
///
/// `None` stands for an absent value and is written as an empty field.
pub trait ToField {
    fn to_field(&self) -> Option<Cow<'_, str>>;
}

impl ToField for str {
    fn to_field(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self))
    }
}

impl ToField for String {
    fn to_field(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

impl ToField for Cow<'_, str> {
    fn to_field(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_ref()))
    }
}

impl<T: ToField + ?Sized> ToField for &T {
    fn to_field(&self) -> Option<Cow<'_, str>> {
        (**self).to_field()
    }
}

impl<T: ToField + ?Sized> ToField for Box<T> {
    fn to_field(&self) -> Option<Cow<'_, str>> {
        (**self).to_field()
    }
}

impl<T: ToField> ToField for Option<T> {
    fn to_field(&self) -> Option<Cow<'_, str>> {
        self.as_ref().and_then(ToField::to_field)
    }
}

macro_rules! display_to_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToField for $ty {
                fn to_field(&self) -> Option<Cow<'_, str>> {
                    Some(Cow::Owned(self.to_string()))
                }
            }
        )*
    };
}

display_to_field!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    Decimal,
);

#[cfg(feature = "serde")]
impl ToField for serde_json::Value {
    fn to_field(&self) -> Option<Cow<'_, str>> {
        match self {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some(Cow::Borrowed(text.as_str())),
            other => Some(Cow::Owned(other.to_string())),
        }
    }
}

/// A CSV writer producing one line per row with minimal quoting.
///
/// A field is wrapped in quotes only when it holds the separator, a quote, a
/// carriage return or a line feed; embedded quotes are doubled. Absent values are
/// written as empty fields.
///
/// With Excel leading-zero preservation enabled, unquoted values that look like a
/// number starting with `0` (optionally signed, surrounded by whitespace) are written
/// as `="value"` so a spreadsheet keeps their exact text.
///
/// The writer owns its sink. Each row is handed to the sink in a single write;
/// buffering is left to the sink (path-based writers use a `BufWriter`).
///
/// # Examples
///
/// ```
/// use scriptdb_csv::item::csv::{CsvWriterBuilder, LineTerminator, ToField};
///
/// let writer = CsvWriterBuilder::new()
///     .terminator(LineTerminator::CRLF)
///     .from_writer(Vec::new());
///
/// writer.write_fields(["id", "comment"]).unwrap();
/// writer.write_fields([&1_i32 as &dyn ToField, &"said \"hi\""]).unwrap();
///
/// let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
/// assert_eq!(output, "id,comment\r\n1,\"said \"\"hi\"\"\"\r\n");
/// ```
pub struct CsvWriter<W: Write> {
    /// `None` once the sink has been released.
    sink: RefCell<Option<W>>,
    separator: char,
    preserve_leading_zeroes_for_excel: bool,
    terminator: LineTerminator,
    has_headers: bool,
    encoding: &'static Encoding,
    byte_order_mark: bool,
    started: Cell<bool>,
    header_written: Cell<bool>,
}

impl<W: Write> CsvWriter<W> {
    /// The field separator character.
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Whether leading-zero numbers are written as `="0123"` literal formulas.
    pub fn preserve_leading_zeroes_for_excel(&self) -> bool {
        self.preserve_leading_zeroes_for_excel
    }

    /// The line terminator written after each row.
    pub fn terminator(&self) -> LineTerminator {
        self.terminator
    }

    /// The encoding rows are written in.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Writes one row. Each value becomes one field, in order.
    ///
    /// # Errors
    /// - [`CsvError::WriterUnavailable`] if the writer has been closed
    /// - [`CsvError::ItemWriter`] if the sink rejects the bytes
    pub fn write_fields<I>(&self, values: I) -> ItemWriterResult
    where
        I: IntoIterator,
        I::Item: ToField,
    {
        let line = self.format_row(values);
        self.write_line(&line)
    }

    /// Writes the fields of a row read by a [`CsvReader`](super::CsvReader).
    pub fn write_row(&self, row: &CsvRow) -> ItemWriterResult {
        self.write_fields(row.values())
    }

    /// Writes a whole table: an optional header row of column names followed by
    /// one line per row.
    pub fn write_table<C, T>(&self, columns: C, rows: T, include_header: bool) -> ItemWriterResult
    where
        C: IntoIterator,
        C::Item: ToField,
        T: IntoIterator,
        T::Item: IntoIterator,
        <T::Item as IntoIterator>::Item: ToField,
    {
        if include_header {
            self.write_fields(columns)?;
        }

        for row in rows {
            self.write_fields(row)?;
        }
        Ok(())
    }

    /// Returns the text written for one field value, quoted or wrapped as needed.
    pub fn quote_if_necessary<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let needs_quotes = text
            .contains(|c: char| c == self.separator || c == QUOTE || c == '\r' || c == '\n');

        if needs_quotes {
            Cow::Owned(format!("\"{}\"", text.replace(QUOTE, "\"\"")))
        } else if self.preserve_leading_zeroes_for_excel && has_leading_zero(text) {
            Cow::Owned(format!("=\"{text}\""))
        } else {
            Cow::Borrowed(text)
        }
    }

    /// Flushes the sink.
    pub fn flush(&self) -> ItemWriterResult {
        match self.sink.borrow_mut().as_mut() {
            Some(sink) => sink
                .flush()
                .map_err(|error| CsvError::ItemWriter(error.to_string())),
            None => Err(CsvError::WriterUnavailable),
        }
    }

    /// Flushes and releases the sink. Calling it again has no effect.
    pub fn close(&self) -> ItemWriterResult {
        let Some(mut sink) = self.sink.borrow_mut().take() else {
            return Ok(());
        };

        debug!("CsvWriter: stream released");
        sink.flush()
            .map_err(|error| CsvError::ItemWriter(error.to_string()))
    }

    /// Flushes the sink and returns it.
    pub fn into_inner(self) -> Result<W, CsvError> {
        let mut sink = self.sink.into_inner().ok_or(CsvError::WriterUnavailable)?;
        sink.flush()
            .map_err(|error| CsvError::ItemWriter(error.to_string()))?;
        Ok(sink)
    }

    fn format_row<I>(&self, values: I) -> String
    where
        I: IntoIterator,
        I::Item: ToField,
    {
        let mut line = String::new();
        let mut count = 0;

        for value in values {
            if count > 0 {
                line.push(self.separator);
            }
            let text = value.to_field().unwrap_or(Cow::Borrowed(""));
            line.push_str(&self.quote_if_necessary(&text));
            count += 1;
        }

        line.push_str(self.terminator.as_str());
        trace!("CsvWriter: formatted row of {} fields", count);
        line
    }

    fn write_line(&self, line: &str) -> ItemWriterResult {
        let mut guard = self.sink.borrow_mut();
        let sink = guard.as_mut().ok_or(CsvError::WriterUnavailable)?;

        let bytes = encode_line(self.encoding, line)?;

        if !self.started.replace(true) && self.byte_order_mark {
            sink.write_all(byte_order_mark(self.encoding))
                .map_err(|error| CsvError::ItemWriter(error.to_string()))?;
        }

        sink.write_all(&bytes)
            .map_err(|error| CsvError::ItemWriter(error.to_string()))
    }
}

#[cfg(feature = "serde")]
impl<W: Write> CsvWriter<W> {
    fn write_value(&self, value: serde_json::Value) -> ItemWriterResult {
        match value {
            serde_json::Value::Array(values) => self.write_fields(&values),
            serde_json::Value::Object(map) => {
                if self.has_headers && !self.header_written.replace(true) {
                    self.write_fields(map.keys())?;
                }
                self.write_fields(map.values())
            }
            scalar => self.write_fields([scalar]),
        }
    }
}

/// Writes each serializable item as one row.
///
/// Sequences and tuples map to fields in order; structs and maps map their values
/// in declaration order, preceded by a header row of their keys for a writer built
/// with `has_headers(true)`. `None` and unit values become empty fields, nested
/// values are written as compact JSON.
///
/// ```
/// use scriptdb_csv::core::item::ItemWriter;
/// use scriptdb_csv::item::csv::{CsvWriterBuilder, LineTerminator};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Product {
///     code: String,
///     price: f64,
///     note: Option<String>,
/// }
///
/// let writer = CsvWriterBuilder::new()
///     .has_headers(true)
///     .terminator(LineTerminator::LF)
///     .from_writer(Vec::new());
///
/// let items = vec![
///     Product { code: "A1".to_string(), price: 9.5, note: None },
///     Product { code: "B2".to_string(), price: 12.0, note: Some("big, red".to_string()) },
/// ];
/// writer.write(&items).unwrap();
///
/// let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
/// assert_eq!(output, "code,price,note\nA1,9.5,\nB2,12.0,\"big, red\"\n");
/// ```
#[cfg(feature = "serde")]
impl<W: Write, T: serde::Serialize> crate::core::item::ItemWriter<T> for CsvWriter<W> {
    fn write(&self, items: &[T]) -> ItemWriterResult {
        for item in items {
            let value = serde_json::to_value(item)
                .map_err(|error| CsvError::ItemWriter(error.to_string()))?;
            self.write_value(value)?;
        }
        Ok(())
    }

    fn flush(&self) -> ItemWriterResult {
        CsvWriter::flush(self)
    }

    fn close(&self) -> ItemWriterResult {
        CsvWriter::close(self)
    }
}

/// Matches text that a spreadsheet would read as a number and strip of its leading
/// zero: optional whitespace, an optional `-`, optional whitespace, `0`, then one or
/// more digits or periods, then optional whitespace.
fn has_leading_zero(text: &str) -> bool {
    let rest = text.trim_start();
    let rest = rest.strip_prefix('-').unwrap_or(rest).trim_start();

    let Some(rest) = rest.strip_prefix('0') else {
        return false;
    };

    let body = rest.trim_end();
    !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// Encodes one formatted row.
///
/// `encoding_rs` only decodes UTF-16, so both byte orders are encoded here.
/// Characters the target encoding cannot represent are an error rather than being
/// replaced.
fn encode_line<'a>(encoding: &'static Encoding, line: &'a str) -> Result<Cow<'a, [u8]>, CsvError> {
    if encoding == UTF_16LE {
        return Ok(Cow::Owned(line.encode_utf16().flat_map(u16::to_le_bytes).collect()));
    }
    if encoding == UTF_16BE {
        return Ok(Cow::Owned(line.encode_utf16().flat_map(u16::to_be_bytes).collect()));
    }

    let (bytes, _, unmappable) = encoding.encode(line);
    if unmappable {
        return Err(CsvError::ItemWriter(format!(
            "row holds characters that cannot be encoded in {}",
            encoding.name()
        )));
    }
    Ok(bytes)
}

/// Byte-order mark of the Unicode encodings, empty for every other one.
fn byte_order_mark(encoding: &'static Encoding) -> &'static [u8] {
    if encoding == UTF_8 {
        b"\xEF\xBB\xBF"
    } else if encoding == UTF_16LE {
        b"\xFF\xFE"
    } else if encoding == UTF_16BE {
        b"\xFE\xFF"
    } else {
        b""
    }
}

/// A builder for configuring CSV writing.
///
/// # Default Configuration
///
/// - Separator: comma (,)
/// - Terminator: platform line terminator
/// - Excel leading-zero preservation: disabled
/// - Headers: disabled (only used when writing serializable structs)
/// - Encoding: UTF-8
/// - Path destinations are truncated, without a byte-order mark
#[derive(Debug, Clone, Copy)]
pub struct CsvWriterBuilder {
    separator: char,
    preserve_leading_zeroes_for_excel: bool,
    terminator: LineTerminator,
    has_headers: bool,
    append: bool,
    encoding: &'static Encoding,
    byte_order_mark: bool,
}

impl Default for CsvWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvWriterBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> CsvWriterBuilder {
        CsvWriterBuilder {
            separator: ',',
            preserve_leading_zeroes_for_excel: false,
            terminator: LineTerminator::default(),
            has_headers: false,
            append: false,
            encoding: UTF_8,
            byte_order_mark: false,
        }
    }

    /// Sets the field separator. Fields holding it are quoted.
    pub fn separator(mut self, separator: char) -> CsvWriterBuilder {
        self.separator = separator;
        self
    }

    /// Wraps numbers having leading zeroes in literal formulas: `0123` becomes `="0123"`.
    pub fn preserve_leading_zeroes_for_excel(mut self, yes: bool) -> CsvWriterBuilder {
        self.preserve_leading_zeroes_for_excel = yes;
        self
    }

    /// Sets the line terminator written after each row.
    pub fn terminator(mut self, terminator: LineTerminator) -> CsvWriterBuilder {
        self.terminator = terminator;
        self
    }

    /// Writes the keys of the first serialized struct or map as a header row.
    ///
    /// Only affects items written through [`ItemWriter`](crate::core::item::ItemWriter).
    pub fn has_headers(mut self, yes: bool) -> CsvWriterBuilder {
        self.has_headers = yes;
        self
    }

    /// Appends to an existing file instead of truncating it. Path destinations only.
    pub fn append(mut self, yes: bool) -> CsvWriterBuilder {
        self.append = yes;
        self
    }

    /// Sets the encoding rows are written in.
    ///
    /// ```
    /// use scriptdb_csv::item::csv::{CsvWriterBuilder, LineTerminator};
    ///
    /// let writer = CsvWriterBuilder::new()
    ///     .encoding(encoding_rs::WINDOWS_1252)
    ///     .terminator(LineTerminator::LF)
    ///     .from_writer(Vec::new());
    /// writer.write_fields(["café"]).unwrap();
    ///
    /// assert_eq!(writer.into_inner().unwrap(), b"caf\xE9\n");
    /// ```
    pub fn encoding(mut self, encoding: &'static Encoding) -> CsvWriterBuilder {
        self.encoding = encoding;
        self
    }

    /// Emits the byte-order mark of the encoding before the first row.
    ///
    /// Only UTF-8 and UTF-16 have one; for other encodings nothing is written.
    pub fn byte_order_mark(mut self, yes: bool) -> CsvWriterBuilder {
        self.byte_order_mark = yes;
        self
    }

    /// Creates a `CsvWriter` writing to any sink implementing `Write`.
    pub fn from_writer<W: Write>(self, wtr: W) -> CsvWriter<W> {
        self.build(wtr, self.byte_order_mark)
    }

    /// Creates a `CsvWriter` for the file at `path`.
    ///
    /// No byte-order mark is written when appending to a file that already has content.
    ///
    /// # Errors
    /// Returns [`CsvError::Open`] if the file cannot be opened for writing.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvWriter<BufWriter<File>>, CsvError> {
        let path = path.as_ref();
        let file = File::options()
            .write(true)
            .create(true)
            .append(self.append)
            .truncate(!self.append)
            .open(path)
            .map_err(|error| CsvError::open(path.display().to_string(), error))?;

        let byte_order_mark =
            self.byte_order_mark && file.metadata().map(|m| m.len() == 0).unwrap_or(true);

        debug!(
            "CsvWriter: writing to {} (append: {})",
            path.display(),
            self.append
        );
        Ok(self.build(BufWriter::new(file), byte_order_mark))
    }

    fn build<W: Write>(self, wtr: W, byte_order_mark: bool) -> CsvWriter<W> {
        CsvWriter {
            sink: RefCell::new(Some(wtr)),
            separator: self.separator,
            preserve_leading_zeroes_for_excel: self.preserve_leading_zeroes_for_excel,
            terminator: self.terminator,
            has_headers: self.has_headers,
            encoding: self.encoding,
            byte_order_mark,
            started: Cell::new(false),
            header_written: Cell::new(false),
        }
    }
}
