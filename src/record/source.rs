//! JSON-lines record source.
//!
//! The CLI feeds the scan pipeline from a stream of newline-delimited JSON
//! records, one [`Record`] per line, pre-sorted by
//! `(category, package, version)`. Blank lines are skipped. Malformed lines
//! fail fast with the offending line number; the pipeline itself never sees
//! partially-parsed records.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use super::Record;

/// Errors produced while reading a record stream.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed reading record stream: {0}")]
    Io(#[from] io::Error),
    #[error("malformed record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Streaming reader of newline-delimited JSON records.
pub struct JsonRecordSource<R: BufRead> {
    reader: R,
    line: usize,
    buf: String,
}

impl JsonRecordSource<BufReader<File>> {
    /// Open a record stream file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> JsonRecordSource<R> {
    /// Wrap an arbitrary buffered reader.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for JsonRecordSource<R> {
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            self.line += 1;
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(SourceError::Io(e))),
            }
            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(serde_json::from_str(trimmed).map_err(|source| SourceError::Parse {
                line: self.line,
                source,
            }));
        }
    }
}
