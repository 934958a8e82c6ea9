//! Append-only CSV files with a fixed header.
//!
//! Rows are written one line at a time so a crash loses at most the row in
//! flight. Text is quoted per RFC 4180 when it contains a delimiter, a quote
//! or a line break; missing numbers are written as empty cells.

use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Row has {found} fields, header has {expected}")]
    ColumnMismatch { expected: usize, found: usize },
}

/// Handle to a CSV file whose header has been written.
#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
    columns: usize,
}

impl CsvLog {
    /// Open `path` for appending, writing `headers` first if the file is new or empty.
    ///
    /// An existing file is appended to as is; its header is not checked.
    pub fn open<P: AsRef<Path>>(path: P, headers: &[String]) -> Result<Self, LoggerError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| LoggerError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let needs_header = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        let log = Self {
            path: path.clone(),
            columns: headers.len(),
        };
        if needs_header {
            log.write_line(headers)?;
            tracing::info!("Created CSV log {}", path.display());
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_row(&self, fields: &[String]) -> Result<(), LoggerError> {
        if fields.len() != self.columns {
            return Err(LoggerError::ColumnMismatch {
                expected: self.columns,
                found: fields.len(),
            });
        }
        self.write_line(fields)
    }

    pub fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), LoggerError> {
        for row in rows {
            self.append_row(row)?;
        }
        Ok(())
    }

    fn write_line(&self, fields: &[String]) -> Result<(), LoggerError> {
        let line = fields
            .iter()
            .map(|f| escape_field(f))
            .collect::<Vec<_>>()
            .join(",");

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{}", line))
            .map_err(|source| LoggerError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// `value` with `decimals` places, or an empty cell.
pub fn optional_cell(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{:.*}", decimals, v))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_header_written_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.csv");

        let log = CsvLog::open(&path, &headers(&["a", "b"])).unwrap();
        log.append_row(&headers(&["1", "2"])).unwrap();

        // Reopening an existing file must not repeat the header
        let log = CsvLog::open(&path, &headers(&["a", "b"])).unwrap();
        log.append_row(&headers(&["3", "4"])).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a,b\n1,2\n3,4\n");
    }

    #[test]
    fn test_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("log.csv");

        CsvLog::open(&path, &headers(&["x"])).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_column_mismatch_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let log = CsvLog::open(temp_dir.path().join("log.csv"), &headers(&["a", "b"])).unwrap();

        let err = log.append_row(&headers(&["only one"])).unwrap_err();
        assert!(matches!(
            err,
            LoggerError::ColumnMismatch {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
        assert_eq!(escape_field(""), "");
    }

    #[test]
    fn test_optional_cell() {
        assert_eq!(optional_cell(Some(1.23456), 2), "1.23");
        assert_eq!(optional_cell(Some(-0.5), 1), "-0.5");
        assert_eq!(optional_cell(None, 2), "");
    }
}
