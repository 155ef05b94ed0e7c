//! Stacking engine: concatenates loaded tables with optional filtering
//! and group-by aggregation

use crate::error::{Error, Result};
use crate::filter::{apply_all, Filter};
use crate::frame::{cell_value, from_frame, to_frame, ColumnKind};
use crate::loader::TableSet;
use crate::table::{CellValue, Table};
use polars::prelude::{col, DataType, Expr, IntoLazy, SortMultipleOptions};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;

/// Name of the first column of an ungrouped summary
pub const FUNCTION_COLUMN: &str = "function";

/// Pseudo source path of a stacked table
pub const STACKED_SOURCE: &str = "stacked";

/// Reduction applied to a column within each group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    /// Non-empty values
    Count,
    /// All rows, empty or not
    Size,
    Sum,
    Mean,
    Median,
    Min,
    Max,
    /// Sample standard deviation
    Std,
    /// Sample variance
    Var,
    First,
    Last,
    /// Distinct non-empty values
    Nunique,
}

impl AggFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::Count => "count",
            AggFunc::Size => "size",
            AggFunc::Sum => "sum",
            AggFunc::Mean => "mean",
            AggFunc::Median => "median",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Std => "std",
            AggFunc::Var => "var",
            AggFunc::First => "first",
            AggFunc::Last => "last",
            AggFunc::Nunique => "nunique",
        }
    }

    /// Whether the function only reduces numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AggFunc::Sum | AggFunc::Mean | AggFunc::Median | AggFunc::Std | AggFunc::Var
        )
    }

    /// Polars expression reducing `column`. `widen` sums in `Float64`.
    fn expr(&self, column: &str, widen: bool) -> Expr {
        let c = col(column);
        match self {
            AggFunc::Count => c.count(),
            AggFunc::Size => c.len(),
            AggFunc::Sum if widen => c.cast(DataType::Float64).sum(),
            AggFunc::Sum => c.sum(),
            AggFunc::Mean => c.mean(),
            AggFunc::Median => c.median(),
            AggFunc::Min => c.min(),
            AggFunc::Max => c.max(),
            AggFunc::Std => c.std(1),
            AggFunc::Var => c.var(1),
            AggFunc::First => c.drop_nulls().first(),
            AggFunc::Last => c.drop_nulls().last(),
            AggFunc::Nunique => c.drop_nulls().n_unique(),
        }
    }
}

impl std::str::FromStr for AggFunc {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let func = match s.trim().to_ascii_lowercase().as_str() {
            "count" => AggFunc::Count,
            "size" => AggFunc::Size,
            "sum" => AggFunc::Sum,
            "mean" => AggFunc::Mean,
            "median" => AggFunc::Median,
            "min" => AggFunc::Min,
            "max" => AggFunc::Max,
            "std" => AggFunc::Std,
            "var" => AggFunc::Var,
            "first" => AggFunc::First,
            "last" => AggFunc::Last,
            "nunique" => AggFunc::Nunique,
            other => return Err(format!("unknown aggregate function '{}'", other)),
        };
        Ok(func)
    }
}

impl std::fmt::Display for AggFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn default_funcs() -> Vec<AggFunc> {
    vec![AggFunc::Count]
}

/// Options applied while concatenating
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcatOptions {
    /// Append a column with this name holding each row's source file name
    #[serde(default)]
    pub source_column: Option<String>,
}

/// Everything a stack operation needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackRequest {
    /// Tables to stack, by position; all tables when absent
    #[serde(default)]
    pub indices: Option<Vec<usize>>,
    /// Shared columns kept in the output, and the group-by keys when
    /// aggregating
    #[serde(default)]
    pub columns: Vec<String>,
    /// Columns reduced by `agg_funcs`
    #[serde(default)]
    pub agg_columns: Vec<String>,
    #[serde(default = "default_funcs")]
    pub agg_funcs: Vec<AggFunc>,
    /// Row filters, applied in order before projection
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub concat: ConcatOptions,
}

impl Default for StackRequest {
    fn default() -> Self {
        Self {
            indices: None,
            columns: Vec::new(),
            agg_columns: Vec::new(),
            agg_funcs: default_funcs(),
            filters: Vec::new(),
            concat: ConcatOptions::default(),
        }
    }
}

impl StackRequest {
    /// Stack the given shared columns
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Stack only the tables at these positions, in this order
    pub fn indices(mut self, indices: impl Into<Vec<usize>>) -> Self {
        self.indices = Some(indices.into());
        self
    }

    /// Reduce `columns` with each of `funcs`
    pub fn aggregate<I, S>(mut self, columns: I, funcs: impl Into<Vec<AggFunc>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agg_columns = columns.into_iter().map(Into::into).collect();
        self.agg_funcs = funcs.into();
        self
    }

    /// Add a row filter, applied after those already added
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Record each row's source file name in a column called `name`
    pub fn source_column(mut self, name: impl Into<String>) -> Self {
        self.concat.source_column = Some(name.into());
        self
    }

    /// Shared columns followed by aggregate columns not already listed
    fn projection(&self) -> Vec<String> {
        let mut names = self.columns.clone();
        for col in &self.agg_columns {
            if !names.contains(col) {
                names.push(col.clone());
            }
        }
        names
    }
}

/// Concatenate the selected tables of a set into one table
pub fn stack(set: &TableSet, request: &StackRequest) -> Result<Table> {
    if request.columns.is_empty() && request.agg_columns.is_empty() {
        return Err(Error::NothingToStack);
    }

    let selected: Vec<&Table> = match &request.indices {
        Some(indices) => indices
            .iter()
            .map(|&i| {
                set.get(i).ok_or_else(|| Error::TableIndexOutOfRange {
                    index: i,
                    len: set.len(),
                })
            })
            .collect::<Result<_>>()?,
        None => set.tables().iter().collect(),
    };

    let projection = request.projection();
    let out_columns = projection
        .iter()
        .chain(request.concat.source_column.as_ref())
        .cloned();
    let mut stacked = Table::with_columns(out_columns, PathBuf::from(STACKED_SOURCE));

    for table in selected {
        let filtered = if request.filters.is_empty() {
            Cow::Borrowed(table)
        } else {
            let mut owned = table.clone();
            apply_all(&request.filters, &mut owned)?;
            Cow::Owned(owned)
        };
        let projected = filtered.project(&projection)?;

        let source = table.source_name();
        for mut row in projected.rows {
            if request.concat.source_column.is_some() {
                row.cells.push(CellValue::String(source.clone()));
            }
            stacked.rows.push(row);
        }
    }

    log::info!(
        "stacked {} row(s) from {} table(s)",
        stacked.row_count(),
        request.indices.as_ref().map_or(set.len(), Vec::len)
    );

    match (request.columns.is_empty(), request.agg_columns.is_empty()) {
        (false, false) => group_by(&stacked, request),
        (true, false) => summarize(&stacked, request),
        _ => Ok(stacked),
    }
}

/// `{column}_{function}`, without trailing underscores
fn flat_name(column: &str, func: AggFunc) -> String {
    format!("{}_{}", column, func).trim_end_matches('_').to_string()
}

/// Absolute values of the integers add up without overflowing, so no
/// group's sum can overflow either
fn sum_fits_i64(values: &[&CellValue]) -> bool {
    values
        .iter()
        .try_fold(0i64, |total, v| match v {
            CellValue::Integer(i) => total.checked_add(i.checked_abs()?),
            _ => Some(total),
        })
        .is_some()
}

/// One aliased expression per (aggregate column, function) pair
fn agg_exprs(stacked: &Table, request: &StackRequest) -> Result<Vec<Expr>> {
    let mut exprs = Vec::new();
    for column in &request.agg_columns {
        let values = stacked.column_values(column)?;
        let kind = ColumnKind::of(&values);
        let widen = kind == ColumnKind::Int && !sum_fits_i64(&values);
        if widen {
            log::debug!("summing '{}' as floats to avoid integer overflow", column);
        }

        for func in &request.agg_funcs {
            if func.is_numeric() && matches!(kind, ColumnKind::Bool | ColumnKind::Text) {
                if let Some(bad) = values.iter().find(|v| !v.is_empty() && v.as_f64().is_none()) {
                    return Err(Error::AggregateType {
                        column: column.clone(),
                        function: func.name().to_string(),
                        value: bad.to_string_value(),
                    });
                }
            }
            exprs.push(func.expr(column, widen).alias(flat_name(column, *func)));
        }
    }
    Ok(exprs)
}

/// Group the stacked rows on the shared columns and aggregate. Rows with a
/// missing key are dropped and groups come out sorted by key.
fn group_by(stacked: &Table, request: &StackRequest) -> Result<Table> {
    let aggs = agg_exprs(stacked, request)?;
    let keys: Vec<Expr> = request.columns.iter().map(|c| col(c.as_str())).collect();

    let mut lf = to_frame(stacked)?.lazy();
    if let Some(present) = keys.iter().cloned().map(Expr::is_not_null).reduce(|a, b| a.and(b)) {
        lf = lf.filter(present);
    }
    let df = lf
        .group_by(keys.clone())
        .agg(aggs)
        .sort_by_exprs(keys, SortMultipleOptions::default())
        .collect()?;

    let mut out = from_frame(&df, PathBuf::from(STACKED_SOURCE))?;
    for (column, key) in out.columns.iter_mut().zip(&request.columns) {
        column.name = key.trim_end_matches('_').to_string();
    }
    Ok(out)
}

/// Reduce every row to one summary row per aggregate function
fn summarize(stacked: &Table, request: &StackRequest) -> Result<Table> {
    let aggs = agg_exprs(stacked, request)?;
    let df = to_frame(stacked)?.lazy().select(aggs).collect()?;

    let names =
        std::iter::once(FUNCTION_COLUMN.to_string()).chain(request.agg_columns.iter().cloned());
    let mut out = Table::with_columns(names, PathBuf::from(STACKED_SOURCE));

    for func in &request.agg_funcs {
        let mut cells = vec![CellValue::String(func.name().to_string())];
        for column in &request.agg_columns {
            let value = df.column(&flat_name(column, *func))?.get(0)?;
            cells.push(cell_value(value));
        }
        out.push_row(cells);
    }

    Ok(out)
}
