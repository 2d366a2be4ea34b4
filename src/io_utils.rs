//! I/O utilities for reading documents and writing mapped rows.
//!
//! All file I/O in csv-fieldmap flows through this module:
//!
//! - **Input**: whole documents are read into memory and decoded with
//!   `encoding_rs`, defaulting to UTF-8. A leading byte-order mark is dropped.
//! - **Output**: mapped rows are written through the `csv` writer, transcoded
//!   when an output encoding other than UTF-8 is requested.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::mapping::MappedRow;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Reads the whole document at `path` (or stdin for `-`) and decodes it.
pub fn read_document(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading input from stdin")?;
    } else {
        File::open(path)
            .with_context(|| format!("Opening input file {path:?}"))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    decode_bytes(&bytes, encoding).with_context(|| format!("Decoding {path:?}"))
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

pub fn open_csv_writer(
    path: Option<&Path>,
    delimiter: char,
    encoding: &'static Encoding,
) -> Result<csv::Writer<Box<dyn Write>>> {
    let delimiter = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| anyhow!("Output delimiter {delimiter:?} must be an ASCII character"))?;
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

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

/// Writes `rows` as CSV with one column per entry of `fields`. Fields a row
/// lacks are written empty.
pub fn write_mapped_rows(
    path: Option<&Path>,
    fields: &[String],
    rows: &[MappedRow],
    delimiter: char,
    encoding: &'static Encoding,
) -> Result<()> {
    let mut writer = open_csv_writer(path, delimiter, encoding)?;
    writer
        .write_record(fields)
        .context("Writing output headers")?;
    for (idx, row) in rows.iter().enumerate() {
        let record = fields
            .iter()
            .map(|field| row.get(field).map(|v| v.as_display()).unwrap_or_default());
        writer
            .write_record(record)
            .with_context(|| format!("Writing output row {}", idx + 1))?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}

struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    buffer: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            buffer: Vec::new(),
        }
    }

    fn flush_buffer(&mut self, force: bool) -> io::Result<()> {
        let mut idx = 0;
        while idx < self.buffer.len() {
            match std::str::from_utf8(&self.buffer[idx..]) {
                Ok(valid) => {
                    let text = valid.to_owned();
                    self.encode_and_write(&text)?;
                    self.buffer.clear();
                    return Ok(());
                }
                Err(err) => {
                    if let Some(error_len) = err.error_len() {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("Invalid UTF-8 sequence in output stream ({error_len} bytes)"),
                        ));
                    }
                    let valid_up_to = err.valid_up_to();
                    if valid_up_to > 0 {
                        let valid_slice = &self.buffer[idx..idx + valid_up_to];
                        let text = std::str::from_utf8(valid_slice)
                            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
                            .to_owned();
                        self.encode_and_write(&text)?;
                        self.buffer.drain(..idx + valid_up_to);
                        idx = 0;
                        continue;
                    }
                    if force {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "Incomplete UTF-8 sequence at end of output stream",
                        ));
                    } else {
                        return Ok(());
                    }
                }
            }
        }
        if force && !self.buffer.is_empty() {
            let text = String::from_utf8(self.buffer.clone()).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Invalid UTF-8 sequence at end of output stream",
                )
            })?;
            self.encode_and_write(&text)?;
            self.buffer.clear();
        }
        Ok(())
    }

    fn encode_and_write(&mut self, text: &str) -> io::Result<()> {
        let (encoded, _output_encoding, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to encode text using {}", self.encoding.name()),
            ));
        }
        self.inner.write_all(encoded.as_ref())
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.flush_buffer(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer(true)?;
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    #[test]
    fn resolves_known_encodings() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(
            resolve_encoding(Some(" latin1 ")).unwrap().name(),
            "windows-1252"
        );
        assert!(resolve_encoding(Some("klingon")).is_err());
    }

    #[test]
    fn decodes_legacy_bytes_and_strips_bom() {
        let latin = resolve_encoding(Some("windows-1252")).unwrap();
        assert_eq!(decode_bytes(b"caf\xe9", latin).unwrap(), "caf\u{e9}");
        assert_eq!(decode_bytes(b"\xef\xbb\xbfa,b", UTF_8).unwrap(), "a,b");
        assert!(decode_bytes(b"\xc3\x28", UTF_8).is_err());
    }

    #[test]
    fn writes_rows_in_field_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![MappedRow::from([
            ("value".to_string(), Value::Number(3.0)),
            ("label".to_string(), Value::from("a,b")),
        ])];
        let fields = vec!["label".to_string(), "value".to_string(), "extra".to_string()];
        write_mapped_rows(Some(&path), &fields, &rows, ',', UTF_8).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "label,value,extra\n\"a,b\",3,\n");
    }
}
