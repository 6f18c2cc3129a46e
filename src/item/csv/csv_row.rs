use std::{slice, str::FromStr};

use rust_decimal::Decimal;

use crate::error::CsvError;

/// One record read from a CSV source.
///
/// A row is an immutable, ordered list of field values. Fields are exposed as
/// lightweight [`CsvField`] views created on each access.
///
/// A row without fields (read from an empty line) is distinct from a row holding
/// a single empty field.
///
/// # Examples
///
/// ```
/// use scriptdb_csv::item::csv::CsvRow;
///
/// let row = CsvRow::from(vec!["42".to_string(), " $19.99 ".to_string()]);
///
/// assert_eq!(row.len(), 2);
/// assert_eq!(row.get(0).unwrap().get_i32().unwrap(), 42);
/// assert_eq!(row.get(1).unwrap().get_decimal().unwrap().to_string(), "19.99");
/// assert!(row.get(2).is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    values: Vec<String>,
}

impl CsvRow {
    /// Wraps already parsed field values.
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    /// Number of fields in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` for a row read from an empty line.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The field at `index`, or `None` past the end of the row.
    pub fn get(&self, index: usize) -> Option<CsvField<'_>> {
        self.values
            .get(index)
            .map(|value| CsvField::new(Some(value), index))
    }

    /// Iterates over the fields in column order.
    pub fn iter(&self) -> CsvFields<'_> {
        CsvFields {
            inner: self.values.iter().enumerate(),
        }
    }

    /// The raw field values, in column order.
    ///
    /// ```
    /// use scriptdb_csv::item::csv::CsvRow;
    ///
    /// let row = CsvRow::from(vec!["a".to_string(), String::new()]);
    /// assert_eq!(row.values(), ["a", ""]);
    /// ```
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Consumes the row and returns its field values.
    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

impl From<Vec<String>> for CsvRow {
    fn from(values: Vec<String>) -> Self {
        Self::new(values)
    }
}

impl<'a> IntoIterator for &'a CsvRow {
    type Item = CsvField<'a>;
    type IntoIter = CsvFields<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the fields of a [`CsvRow`].
pub struct CsvFields<'a> {
    inner: std::iter::Enumerate<slice::Iter<'a, String>>,
}

impl<'a> Iterator for CsvFields<'a> {
    type Item = CsvField<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(index, value)| CsvField::new(Some(value), index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for CsvFields<'_> {}

/// A view over one field value and its zero-based column index.
///
/// Fields produced by a reader always hold a value. An absent value can only be
/// built directly through [`CsvField::new`] with `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvField<'a> {
    value: Option<&'a str>,
    index: usize,
}

impl<'a> CsvField<'a> {
    /// Creates a view over `value` at column `index`. `None` marks an absent value.
    pub fn new(value: Option<&'a str>, index: usize) -> Self {
        Self { value, index }
    }

    /// The field text, or `None` for an absent value.
    pub fn value(&self) -> Option<&'a str> {
        self.value
    }

    /// Column index of the field within its row.
    pub fn index(&self) -> usize {
        self.index
    }

    /// `true` only for an absent value. An empty string is not null.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// `true` when the value is absent, empty or only whitespace.
    pub fn is_null_or_empty(&self) -> bool {
        self.value.is_none_or(|value| value.trim().is_empty())
    }

    /// Parses the value as a decimal number.
    ///
    /// Blank values read as zero. Every `$` is removed first, then surrounding
    /// whitespace, one leading or trailing sign, `,` group separators in the integral
    /// part and a `.` decimal point are accepted.
    ///
    /// ```
    /// use scriptdb_csv::item::csv::CsvField;
    ///
    /// let price = CsvField::new(Some("$1,234.56"), 3);
    /// assert_eq!(price.get_decimal().unwrap().to_string(), "1234.56");
    ///
    /// let error = CsvField::new(Some("abc"), 3).get_decimal().unwrap_err();
    /// assert_eq!(error.to_string(), "The field at index 3 is not in decimal format");
    /// ```
    pub fn get_decimal(&self) -> Result<Decimal, CsvError> {
        let Some(value) = self.non_blank() else {
            return Ok(Decimal::ZERO);
        };

        let value = value.replace('$', "");
        parse_decimal(value.trim()).ok_or(CsvError::FieldFormat {
            index: self.index,
            expected: "decimal",
        })
    }

    /// Parses the value as a 32-bit integer. Blank values read as zero.
    pub fn get_i32(&self) -> Result<i32, CsvError> {
        let Some(value) = self.non_blank() else {
            return Ok(0);
        };

        i32::from_str(value.trim()).map_err(|_| CsvError::FieldFormat {
            index: self.index,
            expected: "int",
        })
    }

    fn non_blank(&self) -> Option<&'a str> {
        self.value.filter(|value| !value.trim().is_empty())
    }
}

/// Splits off a sign placed either before or after the number, not both.
fn split_sign(text: &str) -> Option<(&str, &str)> {
    let sign = |byte: Option<&u8>| match byte {
        Some(b'-') => Some("-"),
        Some(b'+') => Some(""),
        _ => None,
    };

    match (sign(text.as_bytes().first()), sign(text.as_bytes().last())) {
        (Some(_), Some(_)) => None,
        (Some(leading), None) => Some((leading, &text[1..])),
        (None, Some(trailing)) => Some((trailing, &text[..text.len() - 1])),
        (None, None) => Some(("", text)),
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let (sign, unsigned) = split_sign(text)?;

    let (integral, fraction) = match unsigned.split_once('.') {
        Some((integral, fraction)) => (integral, Some(fraction)),
        None => (unsigned, None),
    };

    // Group separators must sit between digits.
    if integral.starts_with(',') || integral.ends_with(',') {
        return None;
    }
    let digits: String = integral.chars().filter(|c| *c != ',').collect();

    let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(digits.as_str()) || !fraction.is_none_or(is_digits) {
        return None;
    }
    if digits.is_empty() && fraction.is_none_or(str::is_empty) {
        return None;
    }

    let normalized = match fraction {
        Some(fraction) if !fraction.is_empty() => {
            let integral = if digits.is_empty() { "0" } else { digits.as_str() };
            format!("{sign}{integral}.{fraction}")
        }
        _ => format!("{sign}{digits}"),
    };

    Decimal::from_str(&normalized).ok()
}
