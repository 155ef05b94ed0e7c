//! Excel workbook reader with caller-controlled sheet selection

use crate::error::{Error, Result};
use crate::table::{CellValue, Table};
use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which sheets of a workbook are loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetSelection {
    /// Only the first sheet
    #[default]
    First,
    /// Every sheet the decider accepts
    All,
}

/// Decides whether a sheet is loaded when every sheet is offered
pub trait SheetDecider {
    /// `source` is the workbook's file name
    fn include(&mut self, source: &str, sheet: &str) -> bool;
}

impl<F> SheetDecider for F
where
    F: FnMut(&str, &str) -> bool,
{
    fn include(&mut self, source: &str, sheet: &str) -> bool {
        self(source, sheet)
    }
}

/// Accepts every sheet
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAll;

impl SheetDecider for IncludeAll {
    fn include(&mut self, _source: &str, _sheet: &str) -> bool {
        true
    }
}

/// Accepts sheets named in a pre-supplied list
#[derive(Debug, Clone, Default)]
pub struct SheetList {
    names: Vec<String>,
}

impl SheetList {
    /// Accept exactly the sheets named in `names`
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl SheetDecider for SheetList {
    fn include(&mut self, _source: &str, sheet: &str) -> bool {
        self.names.iter().any(|n| n == sheet)
    }
}

/// A sheet read from a workbook
#[derive(Debug, Clone)]
pub struct ExcelSheet {
    /// Sheet name
    pub name: String,
    /// 0-based position of the sheet in the workbook
    pub position: usize,
    /// Sheet contents, first row used as headers
    pub table: Table,
}

/// Read the selected sheets of a workbook.
///
/// calamine materializes a sheet's whole range at once, so every sheet is
/// returned as a single table even when the caller loads in chunks.
pub fn read_workbook<P: AsRef<Path>>(
    path: P,
    selection: SheetSelection,
    nrows: Option<usize>,
    decider: &mut dyn SheetDecider,
) -> Result<Vec<ExcelSheet>> {
    let path = path.as_ref();
    let excel_err = |e: calamine::Error| Error::Excel {
        path: path.to_path_buf(),
        source: e,
    };

    let mut workbook = open_workbook_auto(path).map_err(excel_err)?;
    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        log::warn!("{} has no worksheets", path.display());
        return Ok(Vec::new());
    }

    let source = crate::table::source_name(path);
    let wanted: Vec<(usize, String)> = match selection {
        SheetSelection::First => vec![(0, sheet_names[0].clone())],
        SheetSelection::All => sheet_names
            .into_iter()
            .enumerate()
            .filter(|(_, name)| {
                let keep = decider.include(&source, name);
                if !keep {
                    log::info!("skipping sheet '{}' of {}", name, source);
                }
                keep
            })
            .collect(),
    };

    let mut sheets = Vec::with_capacity(wanted.len());
    for (position, name) in wanted {
        let range = workbook.worksheet_range(&name).map_err(excel_err)?;
        let table = range_to_table(&range, path, nrows);
        log::debug!(
            "{}: sheet '{}' ({} rows)",
            source,
            name,
            table.row_count()
        );
        sheets.push(ExcelSheet {
            name,
            position,
            table,
        });
    }

    Ok(sheets)
}

/// Build a table from a sheet range, using the first row as headers
fn range_to_table(range: &Range<Data>, path: &Path, nrows: Option<usize>) -> Table {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Table::new(path.to_path_buf());
    };

    let headers = header.iter().enumerate().map(|(i, c)| match c {
        Data::Empty => format!("column_{}", i + 1),
        c => c.as_string().unwrap_or_else(|| c.to_string()),
    });
    let mut table = Table::with_columns(headers, path.to_path_buf());

    for row in rows.take(nrows.unwrap_or(usize::MAX)) {
        table.push_row(row.iter().map(cell_value).collect());
    }

    table
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(i) => CellValue::Integer(*i),
        // Workbooks store counts as floats; keep whole numbers integral
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => CellValue::Integer(*f as i64),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) => CellValue::String(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) => CellValue::String(format_datetime(&dt)),
            None => CellValue::String(cell.to_string()),
        },
        Data::DurationIso(s) => CellValue::String(s.clone()),
    }
}
