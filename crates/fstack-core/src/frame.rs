//! Conversion between tables and polars data frames
//!
//! Each table column becomes one typed series: integers stay `Int64`,
//! integer/float mixes widen to `Float64`, booleans stay `Boolean`, and any
//! other mix is carried as text. Empty cells become nulls.

use crate::error::Result;
use crate::table::{CellValue, Table};
use polars::prelude::{AnyValue, Column as FrameColumn, DataFrame, NamedFrom, Series};
use std::path::PathBuf;

/// Series type a table column converts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

impl ColumnKind {
    /// Narrowest kind holding every non-empty value; all-empty columns are `Int`
    pub(crate) fn of(values: &[&CellValue]) -> Self {
        let mut kind = None;
        for value in values {
            let k = match value {
                CellValue::Empty => continue,
                CellValue::Integer(_) => ColumnKind::Int,
                CellValue::Float(_) => ColumnKind::Float,
                CellValue::Bool(_) => ColumnKind::Bool,
                CellValue::String(_) => ColumnKind::Text,
            };
            kind = Some(match (kind, k) {
                (None, k) => k,
                (Some(a), b) if a == b => a,
                (Some(ColumnKind::Int), ColumnKind::Float)
                | (Some(ColumnKind::Float), ColumnKind::Int) => ColumnKind::Float,
                _ => return ColumnKind::Text,
            });
        }
        kind.unwrap_or(ColumnKind::Int)
    }
}

/// Build a data frame holding every column of `table`
pub fn to_frame(table: &Table) -> Result<DataFrame> {
    let columns: Vec<FrameColumn> = table
        .columns
        .iter()
        .map(|c| {
            let values: Vec<&CellValue> = table
                .rows
                .iter()
                .map(|r| r.get(c.index).unwrap_or(&CellValue::Empty))
                .collect();
            to_series(&c.name, &values).into()
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

fn to_series(name: &str, values: &[&CellValue]) -> Series {
    match ColumnKind::of(values) {
        ColumnKind::Int => {
            let v: Vec<Option<i64>> = values
                .iter()
                .map(|c| match c {
                    CellValue::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), v)
        }
        ColumnKind::Float => {
            let v: Vec<Option<f64>> = values.iter().map(|c| c.as_f64()).collect();
            Series::new(name.into(), v)
        }
        ColumnKind::Bool => {
            let v: Vec<Option<bool>> = values
                .iter()
                .map(|c| match c {
                    CellValue::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), v)
        }
        ColumnKind::Text => {
            let v: Vec<Option<String>> = values
                .iter()
                .map(|c| (!c.is_empty()).then(|| c.to_string_value()))
                .collect();
            Series::new(name.into(), v)
        }
    }
}

/// Read a data frame back into a table
pub fn from_frame(df: &DataFrame, source_path: PathBuf) -> Result<Table> {
    let names = df.get_column_names().into_iter().map(|n| n.to_string());
    let mut table = Table::with_columns(names, source_path);

    for i in 0..df.height() {
        let cells = df
            .get_columns()
            .iter()
            .map(|c| c.get(i).map(cell_value))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        table.push_row(cells);
    }

    Ok(table)
}

/// Cell for a single frame value; NaN reads as missing
pub(crate) fn cell_value(value: AnyValue<'_>) -> CellValue {
    match value {
        AnyValue::Null => CellValue::Empty,
        AnyValue::Boolean(b) => CellValue::Bool(b),
        AnyValue::Int32(i) => CellValue::Integer(i.into()),
        AnyValue::Int64(i) => CellValue::Integer(i),
        AnyValue::UInt32(u) => CellValue::Integer(u.into()),
        AnyValue::UInt64(u) => match i64::try_from(u) {
            Ok(i) => CellValue::Integer(i),
            Err(_) => CellValue::Float(u as f64),
        },
        AnyValue::Float32(f) => float_cell(f.into()),
        AnyValue::Float64(f) => float_cell(f),
        AnyValue::String(s) => CellValue::String(s.to_string()),
        AnyValue::StringOwned(s) => CellValue::String(s.to_string()),
        other => CellValue::String(format!("{:?}", other)),
    }
}

fn float_cell(f: f64) -> CellValue {
    if f.is_nan() {
        CellValue::Empty
    } else {
        CellValue::Float(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_csv_str;

    #[test]
    fn test_column_kind_widening() {
        let int = CellValue::Integer(1);
        let float = CellValue::Float(1.5);
        let text = CellValue::String("x".to_string());
        let flag = CellValue::Bool(true);

        assert_eq!(ColumnKind::of(&[&int, &CellValue::Empty]), ColumnKind::Int);
        assert_eq!(ColumnKind::of(&[&int, &float]), ColumnKind::Float);
        assert_eq!(ColumnKind::of(&[&flag, &flag]), ColumnKind::Bool);
        assert_eq!(ColumnKind::of(&[&int, &text]), ColumnKind::Text);
        assert_eq!(ColumnKind::of(&[&flag, &int]), ColumnKind::Text);
        assert_eq!(ColumnKind::of(&[&CellValue::Empty]), ColumnKind::Int);
    }

    #[test]
    fn test_frame_round_trip_keeps_cells() {
        let table = parse_csv_str("id,score,name,ok\n1,2.5,ann,true\n2,,bo,false\n3,4,,\n", "t.csv")
            .unwrap();

        let df = to_frame(&table).unwrap();
        assert_eq!(df.height(), 3);

        let back = from_frame(&df, PathBuf::from("t.csv")).unwrap();
        assert_eq!(back.column_names(), vec!["id", "score", "name", "ok"]);
        assert_eq!(
            back.rows[0].cells,
            vec![
                CellValue::Integer(1),
                CellValue::Float(2.5),
                CellValue::String("ann".to_string()),
                CellValue::Bool(true),
            ]
        );
        assert_eq!(back.rows[1].cells[1], CellValue::Empty);
        // Integers in a mixed column come back as floats
        assert_eq!(back.rows[2].cells[1], CellValue::Float(4.0));
        assert_eq!(back.rows[2].cells[2], CellValue::Empty);
    }

    #[test]
    fn test_nan_reads_as_empty() {
        assert_eq!(cell_value(AnyValue::Float64(f64::NAN)), CellValue::Empty);
        assert_eq!(cell_value(AnyValue::UInt32(3)), CellValue::Integer(3));
    }
}
