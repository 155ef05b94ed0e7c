//! JSON document reader
//!
//! Three layouts are understood:
//! - records: `[{"a": 1, "b": "x"}, ...]`
//! - columns as arrays: `{"a": [1, 2], "b": ["x", "y"]}`
//! - columns keyed by row label: `{"a": {"0": 1, "1": 2}}`

use crate::error::{Error, Result};
use crate::table::{CellValue, Table};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Parse a JSON file into a Table
pub fn parse_json<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let value: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::JsonData {
            path: path.to_path_buf(),
            source: e,
        })?;

    table_from_value(value, path)
}

/// Parse JSON from a string (useful for testing)
pub fn parse_json_str(content: &str, source_name: &str) -> Result<Table> {
    let path = Path::new(source_name);
    let value: Value = serde_json::from_str(content).map_err(|e| Error::JsonData {
        path: path.to_path_buf(),
        source: e,
    })?;

    table_from_value(value, path)
}

fn table_from_value(value: Value, path: &Path) -> Result<Table> {
    let shape_err = |message: &str| Error::JsonShape {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    match value {
        Value::Array(records) => {
            let objects = records
                .into_iter()
                .map(|r| match r {
                    Value::Object(map) => Ok(map),
                    _ => Err(shape_err("array elements must be objects")),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(from_records(objects, path))
        }
        Value::Object(columns) => {
            if columns.values().all(Value::is_array) {
                Ok(from_column_arrays(columns, path))
            } else if columns.values().all(Value::is_object) {
                Ok(from_column_objects(columns, path))
            } else {
                Err(shape_err(
                    "object values must all be arrays or all be objects",
                ))
            }
        }
        _ => Err(shape_err("top level must be an array or an object")),
    }
}

fn from_records(records: Vec<Map<String, Value>>, path: &Path) -> Table {
    let mut names: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let mut table = Table::with_columns(names.iter().cloned(), path.to_path_buf());
    for mut record in records {
        let cells = names
            .iter()
            .map(|n| record.remove(n).map(cell_value).unwrap_or(CellValue::Empty))
            .collect();
        table.push_row(cells);
    }
    table
}

fn from_column_arrays(columns: Map<String, Value>, path: &Path) -> Table {
    let names: Vec<String> = columns.keys().cloned().collect();
    let arrays: Vec<Vec<Value>> = columns
        .into_iter()
        .map(|(_, v)| match v {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
        .collect();
    let height = arrays.iter().map(Vec::len).max().unwrap_or(0);

    let mut table = Table::with_columns(names, path.to_path_buf());
    let mut iters: Vec<_> = arrays.into_iter().map(Vec::into_iter).collect();
    for _ in 0..height {
        let cells = iters
            .iter_mut()
            .map(|it| it.next().map(cell_value).unwrap_or(CellValue::Empty))
            .collect();
        table.push_row(cells);
    }
    table
}

fn from_column_objects(columns: Map<String, Value>, path: &Path) -> Table {
    let mut labels: Vec<String> = Vec::new();
    for column in columns.values() {
        if let Value::Object(cells) = column {
            for label in cells.keys() {
                if !labels.contains(label) {
                    labels.push(label.clone());
                }
            }
        }
    }

    let names: Vec<String> = columns.keys().cloned().collect();
    let mut table = Table::with_columns(names, path.to_path_buf());
    for label in &labels {
        let cells = columns
            .values()
            .map(|column| {
                column
                    .get(label)
                    .cloned()
                    .map(cell_value)
                    .unwrap_or(CellValue::Empty)
            })
            .collect();
        table.push_row(cells);
    }
    table
}

fn cell_value(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Integer(i),
            None => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Empty),
        },
        Value::String(s) => CellValue::String(s),
        nested => CellValue::String(nested.to_string()),
    }
}
