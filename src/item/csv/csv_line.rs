/// The quote character. It does not change with the separator.
pub const QUOTE: char = '"';

const ESCAPED_QUOTE: &str = "\"\"";

/// Splits logical CSV lines into fields.
///
/// The parser holds no stream and no cursor: it is the part of a
/// [`CsvReader`](super::csv_reader::CsvReader) that turns one already balanced
/// logical line into its fields, and it can be used on its own for lines obtained
/// elsewhere.
///
/// Malformed quoting never produces an error. Field boundaries are recovered on a
/// best-effort basis instead.
///
/// # Examples
///
/// ```
/// use scriptdb_csv::item::csv::CsvLineParser;
///
/// let parser = CsvLineParser::new(';');
/// let fields = parser.parse_line(r#"1;"Smith; John";"said ""hi""""#);
///
/// assert_eq!(fields, vec!["1", "Smith; John", r#"said "hi""#]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvLineParser {
    separator: char,
    remove_literal_excel_formulas: bool,
}

impl Default for CsvLineParser {
    fn default() -> Self {
        Self::new(',')
    }
}

impl CsvLineParser {
    /// Creates a parser for the given separator, without Excel formula unwrapping.
    pub fn new(separator: char) -> Self {
        Self {
            separator,
            remove_literal_excel_formulas: false,
        }
    }

    /// Enables or disables stripping of `="..."` literal formulas from parsed fields.
    pub fn remove_literal_excel_formulas_enabled(mut self, yes: bool) -> Self {
        self.remove_literal_excel_formulas = yes;
        self
    }

    /// The field separator character.
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Whether fields written as `="0123"` are read back as `0123`.
    pub fn remove_literal_excel_formulas(&self) -> bool {
        self.remove_literal_excel_formulas
    }

    /// Returns the fields of a logical line.
    ///
    /// A line holding `n` separators outside quoted regions yields `n + 1` fields,
    /// so a trailing separator produces a trailing empty field. An empty string
    /// yields a single empty field; readers short-circuit empty lines to a row
    /// without fields before reaching this point.
    pub fn parse_line(&self, line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut cursor = Some(0);

        while let Some(start) = cursor {
            let (field, next) = self.parse_field(line, start);
            fields.push(self.remove_literal_formula(field));
            cursor = next;
        }

        fields
    }

    /// Parses the field starting at byte offset `start` of `line`.
    ///
    /// Returns the field value and the offset where the following field starts,
    /// or `None` once the line is consumed. Every offset returned by this function
    /// lies on a character boundary; an offset inside a multibyte character yields
    /// an empty final field.
    pub fn parse_field(&self, line: &str, start: usize) -> (String, Option<usize>) {
        let bytes = line.as_bytes();

        // The previous separator was the last character: the final field is empty.
        if start >= bytes.len() || !line.is_char_boundary(start) {
            return (String::new(), None);
        }

        if bytes[start] == b'"' {
            if start == bytes.len() - 1 {
                // A lone quote closing the line is taken as a one-character field.
                return (QUOTE.to_string(), None);
            }

            let closing = find_closing_quote(bytes, start + 1);
            let field = line[start + 1..closing].replace(ESCAPED_QUOTE, "\"");

            // Whatever character follows the closing quote is consumed as the separator.
            let after = closing + 1;
            let next = line
                .get(after..)
                .and_then(|rest| rest.chars().next())
                .map(|c| after + c.len_utf8());

            return (field, next);
        }

        match line[start..].find(self.separator) {
            Some(offset) => {
                let end = start + offset;
                (
                    line[start..end].to_string(),
                    Some(end + self.separator.len_utf8()),
                )
            }
            None => (line[start..].to_string(), None),
        }
    }

    fn remove_literal_formula(&self, field: String) -> String {
        if self.remove_literal_excel_formulas {
            if let Some(inner) = unwrap_literal_formula(&field) {
                return inner.to_string();
            }
        }
        field
    }
}

/// Offset of the next quote that is not part of a `""` pair, or the line length.
fn find_closing_quote(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'"' {
                i += 2;
                continue;
            }
            return i;
        }
        i += 1;
    }
    bytes.len()
}

/// Returns the text inside a `="..."` literal formula.
///
/// The field must start with `="` and contain no other quote than its last character.
pub(crate) fn unwrap_literal_formula(field: &str) -> Option<&str> {
    let rest = field.strip_prefix("=\"")?;
    match rest.find(QUOTE) {
        Some(i) if i == rest.len() - 1 => Some(&rest[..i]),
        _ => None,
    }
}

/// Number of quote characters in `text`.
pub(crate) fn count_quotes(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'"').count()
}
