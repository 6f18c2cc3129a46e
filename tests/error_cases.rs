mod common;

use common::MockSink;

use std::{error::Error, io};

use scriptdb_csv::{
    core::item::ItemReader,
    error::CsvError,
    item::csv::{CsvReaderBuilder, CsvRow, CsvWriterBuilder, LineTerminator},
};
use tempfile::tempdir;

#[test]
fn reader_from_missing_file_fails_at_construction() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("missing.csv");

    match CsvReaderBuilder::new().from_path(&path) {
        Err(error @ CsvError::Open { .. }) => {
            assert!(error.to_string().contains("missing.csv"));
            assert!(error.source().is_some());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("opening a missing file should fail"),
    }
    Ok(())
}

#[test]
fn writer_into_missing_directory_fails_at_construction() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("no").join("such").join("dir.csv");

    let result = CsvWriterBuilder::new().from_path(&path);

    assert!(matches!(result, Err(CsvError::Open { .. })));
    Ok(())
}

#[test]
fn sink_failure_is_reported_as_writer_error() {
    let mut sink = MockSink::default();
    sink.expect_write()
        .returning(|_| Err(io::Error::other("disk full")));

    let writer = CsvWriterBuilder::new().from_writer(sink);
    let result = writer.write_fields(["a", "b"]);

    match result {
        Err(CsvError::ItemWriter(message)) => assert!(message.contains("disk full")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn flush_failure_on_close_is_reported() -> Result<(), Box<dyn Error>> {
    let mut sink = MockSink::default();
    sink.expect_write().returning(|buf| Ok(buf.len()));
    sink.expect_flush()
        .times(1)
        .returning(|| Err(io::Error::other("device gone")));

    let writer = CsvWriterBuilder::new().from_writer(sink);
    writer.write_fields(["a"])?;

    assert!(matches!(writer.close(), Err(CsvError::ItemWriter(_))));
    // The sink was released even though flushing failed.
    assert!(matches!(
        writer.write_fields(["b"]),
        Err(CsvError::WriterUnavailable)
    ));
    Ok(())
}

#[test]
fn closed_writer_rejects_rows() -> Result<(), Box<dyn Error>> {
    let mut sink = MockSink::default();
    sink.expect_write().returning(|buf| Ok(buf.len()));
    sink.expect_flush().times(1).returning(|| Ok(()));

    let writer = CsvWriterBuilder::new()
        .terminator(LineTerminator::LF)
        .from_writer(sink);
    writer.write_fields(["before"])?;
    writer.close()?;
    writer.close()?;

    let error = writer.write_fields(["after"]).unwrap_err();
    assert_eq!(error.to_string(), "Writer is null");
    assert!(matches!(writer.flush(), Err(CsvError::WriterUnavailable)));
    assert!(matches!(
        writer.into_inner(),
        Err(CsvError::WriterUnavailable)
    ));
    Ok(())
}

#[test]
fn closed_reader_reports_unavailable() -> Result<(), Box<dyn Error>> {
    let reader = CsvReaderBuilder::new().from_reader("a,b\nc,d\n".as_bytes());
    assert!(reader.read()?.is_some());

    reader.close();
    reader.close();
    assert!(reader.is_closed());

    let error = reader.read().unwrap_err();
    assert!(matches!(error, CsvError::ReaderUnavailable));
    assert_eq!(error.to_string(), "Reader is null");

    assert_eq!(reader.records().count(), 0);
    Ok(())
}

#[test]
fn invalid_utf8_is_a_reader_error() {
    let data: &[u8] = b"ok,row\n\xff\xfe,broken\n";
    let reader = CsvReaderBuilder::new().from_reader(data);

    let results: Vec<Result<CsvRow, CsvError>> = reader.records().collect();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(CsvError::ItemReader(_))));
}

#[test]
fn field_format_error_names_the_column() -> Result<(), Box<dyn Error>> {
    let reader = CsvReaderBuilder::new().from_reader("10,twelve,3.5\n".as_bytes());
    let row = reader.read()?.ok_or("missing row")?;

    let error = row.get(1).ok_or("missing field")?.get_i32().unwrap_err();
    assert!(matches!(error, CsvError::FieldFormat { index: 1, .. }));
    assert_eq!(
        error.to_string(),
        "The field at index 1 is not in int format"
    );

    let error = row.get(2).ok_or("missing field")?.get_i32().unwrap_err();
    assert!(matches!(error, CsvError::FieldFormat { index: 2, .. }));
    Ok(())
}
