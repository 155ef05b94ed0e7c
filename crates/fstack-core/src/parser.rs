//! Readers for comma- and tab-delimited text files

use crate::error::{Error, Result};
use crate::table::{CellValue, Table};
use encoding_rs::Encoding;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

/// Parse a comma-separated file into a Table, inferring cell types
pub fn parse_csv<P: AsRef<Path>>(
    path: P,
    nrows: Option<usize>,
    encoding: Option<&'static Encoding>,
) -> Result<Table> {
    let path = path.as_ref();
    let reader = open_text(path, encoding)?;
    let mut tables = read_csv(reader, path, nrows, None)?;
    Ok(tables.pop().unwrap_or_else(|| Table::new(path.to_path_buf())))
}

/// Parse a comma-separated file into sequential tables of at most
/// `chunk_size` rows each. A file without data rows yields no tables.
pub fn parse_csv_chunks<P: AsRef<Path>>(
    path: P,
    chunk_size: usize,
    nrows: Option<usize>,
    encoding: Option<&'static Encoding>,
) -> Result<Vec<Table>> {
    let path = path.as_ref();
    let reader = open_text(path, encoding)?;
    read_csv(reader, path, nrows, Some(chunk_size.max(1)))
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<Table> {
    let path = PathBuf::from(source_name);
    let mut tables = read_csv(content.as_bytes(), &path, None, None)?;
    Ok(tables.pop().unwrap_or_else(|| Table::new(path)))
}

/// Parse a tab-delimited file. The first non-blank line holds the headers
/// and every other cell is kept as a string.
pub fn parse_tab_delimited<P: AsRef<Path>>(
    path: P,
    nrows: Option<usize>,
    encoding: Option<&'static Encoding>,
) -> Result<Table> {
    let path = path.as_ref();
    let reader = BufReader::new(open_text(path, encoding)?);
    read_tab_delimited(reader, path, nrows)
}

/// Parse tab-delimited text from a string (useful for testing)
pub fn parse_tab_delimited_str(content: &str, source_name: &str) -> Result<Table> {
    read_tab_delimited(content.as_bytes(), Path::new(source_name), None)
}

/// Open a text file, transcoding it to UTF-8 up front when an explicit
/// encoding is given
fn open_text(path: &Path, encoding: Option<&'static Encoding>) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let Some(encoding) = encoding else {
        return Ok(Box::new(BufReader::new(file)));
    };

    let mut bytes = Vec::new();
    BufReader::new(file)
        .read_to_end(&mut bytes)
        .map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        return Err(Error::Decode {
            path: path.to_path_buf(),
            encoding: encoding.name().to_string(),
        });
    }

    Ok(Box::new(Cursor::new(text.into_owned().into_bytes())))
}

fn read_csv<R: Read>(
    reader: R,
    path: &Path,
    nrows: Option<usize>,
    chunk_size: Option<usize>,
) -> Result<Vec<Table>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = csv_reader.headers().map_err(|e| Error::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;

    // Chunked reads tolerate stray spaces after the delimiter in headers
    let names: Vec<String> = headers
        .iter()
        .map(|name| match chunk_size {
            Some(_) => name.trim_start().to_string(),
            None => name.to_string(),
        })
        .collect();

    if names.is_empty() {
        return Err(Error::CsvParse {
            path: path.to_path_buf(),
            message: "no columns found in CSV".to_string(),
        });
    }

    let limit = nrows.unwrap_or(usize::MAX);
    let mut tables = Vec::new();
    let mut current = Table::with_columns(names.iter().cloned(), path.to_path_buf());

    for result in csv_reader.records().take(limit) {
        let record = result.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;

        current.push_row(record.iter().map(CellValue::parse).collect());

        if chunk_size.is_some_and(|size| current.row_count() == size) {
            log::debug!(
                "{}: chunk {} ({} rows)",
                path.display(),
                tables.len(),
                current.row_count()
            );
            let full = std::mem::replace(
                &mut current,
                Table::with_columns(names.iter().cloned(), path.to_path_buf()),
            );
            tables.push(full);
        }
    }

    if chunk_size.is_none() || current.row_count() > 0 {
        tables.push(current);
    }

    Ok(tables)
}

fn read_tab_delimited<R: BufRead>(reader: R, path: &Path, nrows: Option<usize>) -> Result<Table> {
    let mut table: Option<Table> = None;
    let limit = nrows.unwrap_or(usize::MAX);

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let fields = line.split('\t');
        match table.as_mut() {
            None => {
                table = Some(Table::with_columns(fields, path.to_path_buf()));
            }
            Some(t) => {
                if t.row_count() >= limit {
                    break;
                }
                let cells: Vec<CellValue> =
                    fields.map(|f| CellValue::String(f.to_string())).collect();
                if cells.len() != t.column_count() {
                    return Err(Error::CsvParse {
                        path: path.to_path_buf(),
                        message: format!(
                            "line {} has {} fields, expected {}",
                            line_idx + 1,
                            cells.len(),
                            t.column_count()
                        ),
                    });
                }
                t.push_row(cells);
            }
        }
    }

    table.ok_or_else(|| Error::CsvParse {
        path: path.to_path_buf(),
        message: "no header row found".to_string(),
    })
}
