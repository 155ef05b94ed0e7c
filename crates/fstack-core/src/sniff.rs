//! Field delimiter detection for plain-text files

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes read from the head of a file when sniffing
const SAMPLE_BYTES: u64 = 64 * 1024;

/// Candidate delimiters, in order of preference when several qualify
const CANDIDATES: &[u8] = b",\t;|:";

/// Field delimiter recorded for a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    /// A sniffed single-character delimiter
    Char(char),
    /// Not a delimited text format
    NotApplicable,
}

impl Delimiter {
    /// The delimiter character, if any
    pub fn as_char(&self) -> Option<char> {
        match self {
            Delimiter::Char(c) => Some(*c),
            Delimiter::NotApplicable => None,
        }
    }
}

impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delimiter::Char('\t') => write!(f, "\\t"),
            Delimiter::Char(c) => write!(f, "{}", c),
            Delimiter::NotApplicable => write!(f, "NA"),
        }
    }
}

/// Detect the delimiter of a text file from a sample of its content
pub fn sniff_file<P: AsRef<Path>>(path: P) -> Result<char> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut sample = Vec::new();
    file.take(SAMPLE_BYTES)
        .read_to_end(&mut sample)
        .map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    // A cut-off sample ends mid-line; only whole lines are trustworthy
    if sample.len() as u64 == SAMPLE_BYTES {
        if let Some(last_newline) = sample.iter().rposition(|&b| b == b'\n') {
            sample.truncate(last_newline + 1);
        }
    }

    let text = String::from_utf8_lossy(&sample);
    sniff_str(&text).map_err(|reason| Error::Delimiter {
        path: path.to_path_buf(),
        reason,
    })
}

/// Detect the delimiter of in-memory text.
///
/// A candidate qualifies when it splits every non-blank record into the
/// same number of fields, more than one. Records are read with the csv
/// crate, so quoted fields may hold delimiters and line breaks.
pub fn sniff_str(text: &str) -> std::result::Result<char, String> {
    if text.trim().is_empty() {
        return Err("file is empty".to_string());
    }

    CANDIDATES
        .iter()
        .copied()
        .find(|&candidate| field_count(text, candidate).is_some_and(|n| n > 1))
        .map(char::from)
        .ok_or_else(|| "no delimiter is used consistently across lines".to_string())
}

/// Fields per record when every record agrees, skipping blank lines
fn field_count(text: &str, delimiter: u8) -> Option<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut width = None;
    for record in reader.records() {
        let record = record.ok()?;
        if record.len() == 1 && record.get(0).is_some_and(|f| f.trim().is_empty()) {
            continue;
        }
        match width {
            None => width = Some(record.len()),
            Some(n) if n == record.len() => {}
            Some(_) => return None,
        }
    }
    width
}
