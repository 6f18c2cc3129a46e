use std::{
    cell::RefCell,
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use encoding_rs::Encoding;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use log::{debug, trace};

use crate::{
    core::item::{ItemReader, ItemReaderResult},
    error::CsvError,
};

use super::{
    LineTerminator,
    csv_line::{CsvLineParser, count_quotes},
    csv_row::CsvRow,
};

/// The source decoded to UTF-8, buffered for line reads.
type DecodedSource<R> = BufReader<DecodeReaderBytes<R, Vec<u8>>>;

/// A CSV reader that implements the `ItemReader` trait.
///
/// Each call to [`read`](ItemReader::read) returns the next logical line as a
/// [`CsvRow`]. A logical line is the shortest run of physical lines holding an even
/// number of `"` characters, so quoted fields may contain line breaks. An empty
/// physical line yields a row without fields.
///
/// # Implementation Details
///
/// - The stream is held in a `RefCell` so rows can be read through `&self`
/// - Bytes are decoded to UTF-8 on the way in. A UTF-8 or UTF-16 byte-order mark
///   selects the encoding and is skipped; without one the configured encoding is
///   used, and a stream with neither must already be UTF-8
/// - If the stream ends while a quoted field is still open, the accumulated text is
///   parsed as is rather than reported as an error
/// - Releasing the reader (through [`close`](CsvReader::close) or by dropping it)
///   closes the underlying stream
///
/// # Examples
///
/// ```
/// use scriptdb_csv::item::csv::CsvReaderBuilder;
/// use scriptdb_csv::core::item::ItemReader;
///
/// let data = "name|value\nfoo|123\n\"bar|baz\"|456";
///
/// let reader = CsvReaderBuilder::new()
///     .separator('|')
///     .from_reader(data.as_bytes());
///
/// let header = reader.read().unwrap().unwrap();
/// assert_eq!(header.values(), ["name", "value"]);
///
/// let row = reader.read().unwrap().unwrap();
/// assert_eq!(row.get(1).unwrap().get_i32().unwrap(), 123);
///
/// let row = reader.read().unwrap().unwrap();
/// assert_eq!(row.values(), ["bar|baz", "456"]);
///
/// assert!(reader.read().unwrap().is_none());
/// ```
pub struct CsvReader<R> {
    /// `None` once the stream has been released.
    source: RefCell<Option<DecodedSource<R>>>,
    parser: CsvLineParser,
    terminator: LineTerminator,
}

impl<R: Read> CsvReader<R> {
    fn new(
        rdr: R,
        parser: CsvLineParser,
        terminator: LineTerminator,
        encoding: Option<&'static Encoding>,
    ) -> Self {
        let decoder = DecodeReaderBytesBuilder::new()
            .encoding(encoding)
            .bom_override(true)
            .strip_bom(true)
            .build(rdr);

        Self {
            source: RefCell::new(Some(BufReader::new(decoder))),
            parser,
            terminator,
        }
    }

    /// The field separator character.
    pub fn separator(&self) -> char {
        self.parser.separator()
    }

    /// Whether fields written as `="0123"` are read back as `0123`.
    pub fn remove_literal_excel_formulas(&self) -> bool {
        self.parser.remove_literal_excel_formulas()
    }

    /// The line parser configured for this reader.
    pub fn parser(&self) -> &CsvLineParser {
        &self.parser
    }

    /// Reads the next logical line.
    ///
    /// # Returns
    /// - `Ok(Some(row))` for each logical line
    /// - `Ok(None)` once the stream is exhausted
    /// - `Err(CsvError::ReaderUnavailable)` if the reader has been closed
    /// - `Err(CsvError::ItemReader(_))` if the stream fails or holds invalid UTF-8
    pub fn read_row(&self) -> ItemReaderResult<CsvRow> {
        let mut guard = self.source.borrow_mut();
        let source = guard.as_mut().ok_or(CsvError::ReaderUnavailable)?;

        let Some(mut data) = self.read_physical_line(source)? else {
            return Ok(None);
        };

        if data.is_empty() {
            debug!("CsvReader: data length is 0");
            return Ok(Some(CsvRow::default()));
        }

        let mut quotes = count_quotes(&data);
        while quotes % 2 == 1 {
            match self.read_physical_line(source)? {
                Some(line) => {
                    quotes += count_quotes(&line);
                    data.push_str(self.terminator.as_str());
                    data.push_str(&line);
                }
                None => {
                    debug!(
                        "CsvReader: stream ended inside a quoted field, parsing {} bytes as is",
                        data.len()
                    );
                    break;
                }
            }
        }

        let fields = self.parser.parse_line(&data);
        trace!("CsvReader: read row of {} fields", fields.len());

        Ok(Some(CsvRow::new(fields)))
    }

    /// Returns an iterator over the remaining rows.
    ///
    /// The iterator ends after the first error. On a closed reader it yields nothing.
    pub fn records(&self) -> CsvRows<'_, R> {
        CsvRows {
            reader: self,
            finished: false,
        }
    }

    /// Releases the underlying stream. Further reads fail with
    /// [`CsvError::ReaderUnavailable`]. Calling it again has no effect.
    pub fn close(&self) {
        if self.source.borrow_mut().take().is_some() {
            debug!("CsvReader: stream released");
        }
    }

    /// `true` once [`close`](CsvReader::close) has released the stream.
    pub fn is_closed(&self) -> bool {
        self.source.borrow().is_none()
    }

    /// Reads one physical line without its terminator, or `None` at end of stream.
    fn read_physical_line(&self, source: &mut DecodedSource<R>) -> Result<Option<String>, CsvError> {
        let mut line = String::new();
        let read = source
            .read_line(&mut line)
            .map_err(|error| CsvError::ItemReader(error.to_string()))?;

        if read == 0 {
            return Ok(None);
        }

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }
}

impl<R: Read> ItemReader<CsvRow> for CsvReader<R> {
    fn read(&self) -> ItemReaderResult<CsvRow> {
        self.read_row()
    }
}

/// Iterator over the rows of a [`CsvReader`], created by [`CsvReader::records`].
pub struct CsvRows<'r, R> {
    reader: &'r CsvReader<R>,
    finished: bool,
}

impl<R: Read> Iterator for CsvRows<'_, R> {
    type Item = Result<CsvRow, CsvError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.reader.read_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(CsvError::ReaderUnavailable) => {
                debug!("CsvReader: reader is null");
                self.finished = true;
                None
            }
            Err(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }
}

/// A builder for configuring CSV reading.
///
/// # Default Configuration
///
/// - Separator: comma (,)
/// - Literal Excel formulas: kept as read
/// - Continuation lines joined with the platform line terminator
/// - Encoding: detected from the byte-order mark, UTF-8 without one
///
/// # Examples
///
/// ```
/// use scriptdb_csv::item::csv::{CsvReaderBuilder, LineTerminator};
///
/// let reader = CsvReaderBuilder::new()
///     .separator('\t')
///     .remove_literal_excel_formulas(true)
///     .terminator(LineTerminator::CRLF)
///     .from_reader("=\"0042\"\tx".as_bytes());
///
/// let row = reader.read_row().unwrap().unwrap();
/// assert_eq!(row.values(), ["0042", "x"]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CsvReaderBuilder {
    separator: char,
    remove_literal_excel_formulas: bool,
    terminator: LineTerminator,
    encoding: Option<&'static Encoding>,
}

impl Default for CsvReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvReaderBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            separator: ',',
            remove_literal_excel_formulas: false,
            terminator: LineTerminator::default(),
            encoding: None,
        }
    }

    /// Sets the field separator. The quote character stays `"`.
    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Strips literal formulas written with
    /// [`preserve_leading_zeroes_for_excel`](super::CsvWriterBuilder::preserve_leading_zeroes_for_excel):
    /// `="0123"` is read as `0123`.
    pub fn remove_literal_excel_formulas(mut self, yes: bool) -> Self {
        self.remove_literal_excel_formulas = yes;
        self
    }

    /// Sets the text inserted between the physical lines of a multi-line quoted field.
    pub fn terminator(mut self, terminator: LineTerminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Sets the encoding of a stream that has no byte-order mark.
    ///
    /// A UTF-8 or UTF-16 byte-order mark still takes precedence. Bytes that are
    /// invalid in the encoding are replaced with U+FFFD.
    ///
    /// ```
    /// use scriptdb_csv::item::csv::CsvReaderBuilder;
    ///
    /// let reader = CsvReaderBuilder::new()
    ///     .encoding(encoding_rs::WINDOWS_1252)
    ///     .from_reader(&b"Gen\xE8ve,Zo\xEB"[..]);
    ///
    /// let row = reader.read_row().unwrap().unwrap();
    /// assert_eq!(row.values(), ["Genève", "Zoë"]);
    /// ```
    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Returns a line parser with this configuration, for parsing without a stream.
    pub fn parser(&self) -> CsvLineParser {
        CsvLineParser::new(self.separator)
            .remove_literal_excel_formulas_enabled(self.remove_literal_excel_formulas)
    }

    /// Creates a `CsvReader` from any source implementing `Read`.
    pub fn from_reader<R: Read>(self, rdr: R) -> CsvReader<R> {
        CsvReader::new(rdr, self.parser(), self.terminator, self.encoding)
    }

    /// Creates a `CsvReader` over the file at `path`.
    ///
    /// # Errors
    /// Returns [`CsvError::Open`] if the file cannot be opened for reading.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvReader<File>, CsvError> {
        let path = path.as_ref();
        let file =
            File::open(path).map_err(|error| CsvError::open(path.display().to_string(), error))?;

        debug!("CsvReader: reading {}", path.display());
        Ok(self.from_reader(file))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        error::Error,
        io::{self, Cursor},
    };

    use super::*;

    fn read_all(reader: &CsvReader<impl Read>) -> Result<Vec<Vec<String>>, CsvError> {
        reader
            .records()
            .map(|row| row.map(CsvRow::into_values))
            .collect()
    }

    fn lf_reader(data: &str) -> CsvReader<Cursor<Vec<u8>>> {
        CsvReaderBuilder::new()
            .terminator(LineTerminator::LF)
            .from_reader(Cursor::new(data.as_bytes().to_vec()))
    }

    #[test]
    fn rows_are_read_line_by_line() -> Result<(), Box<dyn Error>> {
        let reader = lf_reader("city,country,pop\nBoston,United States,4628910\r\nConcord,United States,42695");

        assert_eq!(
            read_all(&reader)?,
            vec![
                vec!["city", "country", "pop"],
                vec!["Boston", "United States", "4628910"],
                vec!["Concord", "United States", "42695"],
            ]
        );
        Ok(())
    }

    #[test]
    fn empty_line_yields_row_without_fields() -> Result<(), Box<dyn Error>> {
        let reader = lf_reader("a\n\n,\n\r\nb\n");

        let rows = read_all(&reader)?;
        assert_eq!(rows.len(), 5);
        assert!(rows[1].is_empty());
        assert_eq!(rows[2], vec!["", ""]);
        assert!(rows[3].is_empty());
        assert_eq!(rows[4], vec!["b"]);
        Ok(())
    }

    #[test]
    fn quoted_field_spanning_lines_is_joined() -> Result<(), Box<dyn Error>> {
        let reader = lf_reader("\"a\nb\",c\n\"x\n\n\"\"y\"\"\",z\nlast");

        assert_eq!(
            read_all(&reader)?,
            vec![
                vec!["a\nb", "c"],
                vec!["x\n\n\"y\"", "z"],
                vec!["last"],
            ]
        );
        Ok(())
    }

    #[test]
    fn continuation_uses_configured_terminator() -> Result<(), Box<dyn Error>> {
        let reader = CsvReaderBuilder::new()
            .terminator(LineTerminator::CRLF)
            .from_reader("\"a\nb\",c".as_bytes());

        let row = reader.read_row()?.ok_or("missing row")?;
        assert_eq!(row.values(), ["a\r\nb", "c"]);
        Ok(())
    }

    #[test]
    fn unterminated_quote_at_end_of_stream_is_parsed_as_is() -> Result<(), Box<dyn Error>> {
        let reader = lf_reader("1,\"open\nstill open");

        let row = reader.read_row()?.ok_or("missing row")?;
        assert_eq!(row.values(), ["1", "open\nstill open"]);
        assert!(reader.read_row()?.is_none());
        Ok(())
    }

    #[test]
    fn byte_order_mark_is_skipped() -> Result<(), Box<dyn Error>> {
        let reader = lf_reader("\u{feff}id,name\n1,\u{feff}x");

        assert_eq!(
            read_all(&reader)?,
            vec![vec!["id", "name"], vec!["1", "\u{feff}x"]]
        );
        Ok(())
    }

    fn utf16le(text: &str) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
        bytes
    }

    #[test]
    fn utf16_byte_order_mark_selects_the_encoding() -> Result<(), Box<dyn Error>> {
        let reader = CsvReaderBuilder::new()
            .terminator(LineTerminator::LF)
            .from_reader(Cursor::new(utf16le("id,name\n1,Zoë\n")));

        assert_eq!(read_all(&reader)?, vec![vec!["id", "name"], vec!["1", "Zoë"]]);
        Ok(())
    }

    #[test]
    fn byte_order_mark_overrides_configured_encoding() -> Result<(), Box<dyn Error>> {
        let mut data = vec![0xFE, 0xFF];
        data.extend("a,\"b\nc\"".encode_utf16().flat_map(u16::to_be_bytes));

        let reader = CsvReaderBuilder::new()
            .encoding(encoding_rs::WINDOWS_1252)
            .terminator(LineTerminator::LF)
            .from_reader(Cursor::new(data));

        assert_eq!(read_all(&reader)?, vec![vec!["a", "b\nc"]]);
        Ok(())
    }

    #[test]
    fn configured_encoding_applies_without_byte_order_mark() -> Result<(), Box<dyn Error>> {
        let reader = CsvReaderBuilder::new()
            .encoding(encoding_rs::WINDOWS_1252)
            .terminator(LineTerminator::LF)
            .from_reader(&b"caf\xE9;x\n"[..]);

        assert_eq!(read_all(&reader)?, vec![vec!["café;x"]]);
        Ok(())
    }

    #[test]
    fn closed_reader_reports_unavailable() {
        let reader = lf_reader("a,b\nc,d");
        reader.close();
        reader.close();

        assert!(reader.is_closed());
        assert!(matches!(reader.read(), Err(CsvError::ReaderUnavailable)));
        assert_eq!(reader.records().count(), 0);
    }

    #[test]
    fn invalid_utf8_is_a_reader_error() {
        let reader = CsvReaderBuilder::new().from_reader(&[b'a', b',', 0xff, b'\n'][..]);

        assert!(matches!(reader.read_row(), Err(CsvError::ItemReader(_))));
    }

    struct FailingSource;

    impl Read for FailingSource {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device unplugged"))
        }
    }

    #[test]
    fn records_stop_after_stream_error() {
        let reader = CsvReaderBuilder::new().from_reader(FailingSource);
        let mut records = reader.records();

        match records.next() {
            Some(Err(CsvError::ItemReader(message))) => assert!(message.contains("unplugged")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(records.next().is_none());
    }

    #[test]
    fn builder_exposes_a_standalone_parser() {
        let builder = CsvReaderBuilder::new()
            .separator(';')
            .remove_literal_excel_formulas(true);
        let parser = builder.parser();

        assert_eq!(parser.separator(), ';');
        assert_eq!(parser.parse_line("=\"01\";b"), vec!["01", "b"]);

        let reader = builder.from_reader(io::empty());
        assert_eq!(reader.separator(), ';');
        assert!(reader.remove_literal_excel_formulas());
        assert_eq!(reader.parser(), &parser);
    }
}
