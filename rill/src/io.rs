//! Reader-backed sources and writer sinks.
//!
//! Line sources wrap any `Read` in a buffered reader; CSV goes through
//! the `csv` crate, with malformed rows surfacing as `Err` elements in a
//! result stream rather than aborting the pipeline. Every source owns its
//! handle inside the iterator chain, so dropping the stream closes the
//! file on any exit path.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use crate::stream::Stream;
use crate::Data;

impl Stream<String> {
    /// The lines of `reader`; reading stops quietly at the first I/O
    /// error. Use [`from_lines_err`](Stream::from_lines_err) to observe
    /// errors instead.
    pub fn from_reader_lines<R: Read + Send + 'static>(reader: R) -> Stream<String> {
        Stream::new(BufReader::new(reader).lines().map_while(Result::ok))
    }

    /// The lines of the file at `path`.
    pub fn from_file_lines(path: impl AsRef<Path>) -> std::io::Result<Stream<String>> {
        Ok(Stream::from_reader_lines(File::open(path)?))
    }

    /// The lines of the file at `path`.
    ///
    /// # Panics
    ///
    /// Panics when the file cannot be opened.
    pub fn must_from_file_lines(path: impl AsRef<Path>) -> Stream<String> {
        match Stream::from_file_lines(path.as_ref()) {
            Ok(stream) => stream,
            Err(err) => panic!("open {}: {err}", path.as_ref().display()),
        }
    }
}

impl Stream<Result<String, std::io::Error>> {
    /// The lines of `reader`, with read errors carried as `Err` elements.
    pub fn from_lines_err<R: Read + Send + 'static>(reader: R) -> Stream<Result<String, std::io::Error>> {
        Stream::new(BufReader::new(reader).lines())
    }
}

impl Stream<Result<Vec<String>, csv::Error>> {
    /// The rows of the CSV file at `path`.
    ///
    /// Malformed rows surface as `Err` elements; a header row, if any, is
    /// just the first data row.
    pub fn from_csv_file(path: impl AsRef<Path>) -> Result<Stream<Result<Vec<String>, csv::Error>>, csv::Error> {
        let reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
        Ok(Stream::new(reader.into_records().map(|r| r.map(record_fields))))
    }

    /// The rows of CSV from `reader`; the header row, if any, is the
    /// first data row.
    pub fn from_csv_reader<R: Read + Send + 'static>(reader: R) -> Stream<Result<Vec<String>, csv::Error>> {
        let reader = csv::ReaderBuilder::new().has_headers(false).from_reader(reader);
        Stream::new(reader.into_records().map(|r| r.map(record_fields)))
    }

    /// The rows of CSV from `reader`, skipping the leading header row.
    pub fn from_csv_with_header<R: Read + Send + 'static>(
        reader: R,
    ) -> Stream<Result<Vec<String>, csv::Error>> {
        let reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        Stream::new(reader.into_records().map(|r| r.map(record_fields)))
    }
}

fn record_fields(record: csv::StringRecord) -> Vec<String> {
    record.iter().map(str::to_owned).collect()
}

impl Stream<Vec<String>> {
    /// Writes each element as one CSV row.
    pub fn write_csv<W: Write>(self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        for row in self.iter {
            out.write_record(&row)?;
        }
        out.flush()?;
        Ok(())
    }
}

impl<T: Data> Stream<T> {
    /// Writes each element as one line, serialised by `fmt`.
    pub fn write_to<W: Write>(
        self,
        mut writer: W,
        mut fmt: impl FnMut(&T) -> String,
    ) -> std::io::Result<()> {
        for x in self.iter {
            writeln!(writer, "{}", fmt(&x))?;
        }
        writer.flush()
    }
}
