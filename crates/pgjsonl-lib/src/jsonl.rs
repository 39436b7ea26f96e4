//! JSONL file I/O.
//!
//! Reading: each non-blank line must be one JSON object and becomes a
//! [`DecodedRow`]. Decoding is schema-agnostic; the target table may not
//! exist yet when a file is read.
//!
//! Writing: export files are written to a temp path and renamed into place.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{PgJsonlError, Result};
use crate::value::DecodedRow;

const UTF8_BOM: char = '\u{feff}';

/// Decode one JSONL line.
///
/// Returns `Ok(None)` for blank lines. A UTF-8 byte order mark at the
/// start of line 1 is ignored.
///
/// # Errors
///
/// Returns `Decode` if the line is not valid JSON or its top-level value
/// is not an object.
pub fn decode_line(line: &str, line_number: usize) -> Result<Option<DecodedRow>> {
    let line = if line_number == 1 {
        line.strip_prefix(UTF8_BOM).unwrap_or(line)
    } else {
        line
    };
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value =
        serde_json::from_str(trimmed).map_err(|e| PgJsonlError::Decode {
            line: line_number,
            reason: e.to_string(),
        })?;

    match value {
        serde_json::Value::Object(map) => Ok(Some(DecodedRow::from_map(map))),
        other => Err(PgJsonlError::Decode {
            line: line_number,
            reason: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Streaming reader over the rows of a JSONL source.
///
/// Stops after the first error; a file with one bad line is never
/// partially consumed past it.
pub struct JsonlReader<R> {
    reader: R,
    line_number: usize,
    buf: String,
    done: bool,
}

impl JsonlReader<BufReader<fs::File>> {
    /// Open a JSONL file for reading.
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound` if the path does not exist, or `Io` otherwise.
    pub fn open(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PgJsonlError::FileNotFound(path.to_path_buf())
            } else {
                PgJsonlError::Io(e)
            }
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buf: String::new(),
            done: false,
        }
    }

    /// 1-based number of the last line read.
    #[must_use]
    pub const fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<R: BufRead> Iterator for JsonlReader<R> {
    type Item = Result<DecodedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_number += 1;
                    match decode_line(&self.buf, self.line_number) {
                        Ok(Some(row)) => return Some(Ok(row)),
                        Ok(None) => {}
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                }
                Err(e) => {
                    self.done = true;
                    let err = if e.kind() == std::io::ErrorKind::InvalidData {
                        PgJsonlError::Decode {
                            line: self.line_number + 1,
                            reason: "line is not valid UTF-8".to_string(),
                        }
                    } else {
                        PgJsonlError::Io(e)
                    };
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

/// Read at most `limit` rows from the start of a file.
///
/// # Errors
///
/// Returns the first open or decode error encountered within the sample.
pub fn read_sample(path: &Path, limit: usize) -> Result<Vec<DecodedRow>> {
    JsonlReader::open(path)?.take(limit).collect()
}

/// Write rows as JSONL, one compact object per line.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns `Io` if the file cannot be written.
pub fn write_jsonl<I>(path: &Path, rows: I) -> Result<usize>
where
    I: IntoIterator<Item = serde_json::Value>,
{
    write_atomic(path, |file| {
        let mut count = 0;
        for row in rows {
            let json = serde_json::to_string(&row)?;
            writeln!(file, "{json}")?;
            count += 1;
        }
        Ok(count)
    })
}

/// Write rows as a single pretty-printed JSON array.
///
/// # Errors
///
/// Returns `Io` if the file cannot be written.
pub fn write_json_array<I>(path: &Path, rows: I) -> Result<usize>
where
    I: IntoIterator<Item = serde_json::Value>,
{
    let rows: Vec<serde_json::Value> = rows.into_iter().collect();
    let count = rows.len();
    write_atomic(path, |file| {
        serde_json::to_writer_pretty(&mut *file, &rows)?;
        writeln!(file)?;
        Ok(count)
    })
}

fn write_atomic<F>(path: &Path, write: F) -> Result<usize>
where
    F: FnOnce(&mut fs::File) -> Result<usize>,
{
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    let mut file = fs::File::create(&tmp_path)?;
    let count = match write(&mut file).and_then(|count| {
        file.flush()?;
        Ok(count)
    }) {
        Ok(count) => count,
        Err(e) => {
            drop(file);
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
    };
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(count)
}
