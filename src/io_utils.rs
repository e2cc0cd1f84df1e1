//! CSV row I/O for the command line: delimiter and encoding resolution,
//! sampling source tables, reading rows into [`Row`] maps and writing
//! transformed rows back out.
//!
//! Legacy hospital exports are frequently TIS-620 / windows-874, so input is
//! decoded and output transcoded through `encoding_rs`. The `-` path reads
//! stdin or writes stdout.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::{
    analyze::TableSample,
    value::{Row, Value},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, fallback: u8) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    match path.and_then(|p| p.extension()).and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        Some(ext) if ext.eq_ignore_ascii_case("csv") => DEFAULT_CSV_DELIMITER,
        _ => fallback,
    }
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(reader))
}

pub fn open_csv_writer(
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };
    let writer: Box<dyn Write> = if encoding == UTF_8 {
        base
    } else {
        Box::new(TranscodingWriter::new(base, encoding))
    };
    Ok(csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .from_writer(writer))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Streams decoded records, stopping after `limit` rows when given.
pub fn for_each_record<R, F>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
    limit: Option<usize>,
    mut handle: F,
) -> Result<Vec<String>>
where
    R: Read,
    F: FnMut(&[String], Vec<String>) -> Result<()>,
{
    let headers = decode_record(&reader.byte_headers()?.clone(), encoding)?;
    let mut record = csv::ByteRecord::new();
    let mut seen = 0usize;
    while limit.is_none_or(|max| seen < max) && reader.read_byte_record(&mut record)? {
        seen += 1;
        let fields = decode_record(&record, encoding)
            .with_context(|| format!("Decoding data row {seen}"))?;
        handle(&headers, fields)?;
    }
    Ok(headers)
}

/// Reads up to `sample_rows` rows as a table sample. Empty cells are `None`.
pub fn read_table_sample(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    sample_rows: usize,
) -> Result<TableSample> {
    let mut reader = open_csv_reader_from_path(path, delimiter)?;
    let mut rows = Vec::new();
    let headers = for_each_record(&mut reader, encoding, Some(sample_rows), |_, fields| {
        rows.push(
            fields
                .into_iter()
                .map(|field| (!field.is_empty()).then_some(field))
                .collect(),
        );
        Ok(())
    })?;
    Ok(TableSample { headers, rows })
}

/// Builds a row keyed by header. Empty cells become `Null`.
pub fn record_to_row(headers: &[String], fields: Vec<String>) -> Row {
    headers
        .iter()
        .cloned()
        .zip(fields.into_iter().map(|field| {
            if field.is_empty() {
                Value::Null
            } else {
                Value::Text(field)
            }
        }))
        .collect()
}

pub fn write_row<W: Write>(writer: &mut csv::Writer<W>, headers: &[String], row: &Row) -> Result<()> {
    let record = headers
        .iter()
        .map(|header| row.get(header).map(Value::as_display).unwrap_or_default())
        .collect::<Vec<_>>();
    writer.write_record(&record)?;
    Ok(())
}

/// Re-encodes UTF-8 output into a legacy encoding, holding back incomplete
/// multi-byte sequences until the next write.
struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    pending: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            pending: Vec::new(),
        }
    }

    fn drain_complete(&mut self, at_end: bool) -> io::Result<()> {
        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) if err.error_len().is_none() && !at_end => err.valid_up_to(),
            Err(err) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid UTF-8 in output stream after byte {}", err.valid_up_to()),
                ));
            }
        };
        if complete == 0 {
            return Ok(());
        }
        {
            let text = std::str::from_utf8(&self.pending[..complete])
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            let (encoded, _, unmappable) = self.encoding.encode(text);
            if unmappable {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Failed to encode text using {}", self.encoding.name()),
                ));
            }
            self.inner.write_all(&encoded)?;
        }
        self.pending.drain(..complete);
        Ok(())
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.drain_complete(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_complete(true)?;
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcodes_thai_into_windows_874() {
        let encoding = resolve_encoding(Some("windows-874")).expect("known label");
        let mut writer = TranscodingWriter::new(Vec::new(), encoding);
        let text = "สมชาย";
        let bytes = text.as_bytes();
        writer.write_all(&bytes[..2]).expect("partial write");
        writer.write_all(&bytes[2..]).expect("rest");
        writer.flush().expect("flush");
        let (decoded, _, errors) = encoding.decode(&writer.inner);
        assert!(!errors);
        assert_eq!(decoded, text);
    }

    #[test]
    fn empty_cells_become_null() {
        let headers = vec!["a".to_string(), "b".to_string()];
        let row = record_to_row(&headers, vec!["".into(), "x".into()]);
        assert_eq!(row["a"], Value::Null);
        assert_eq!(row["b"], Value::text("x"));
    }
}
