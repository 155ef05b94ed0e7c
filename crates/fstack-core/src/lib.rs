//! fstack-core: Core library for stacking directories of tabular data files
//!
//! This library provides functionality to:
//! - Catalog the CSV, delimited text, JSON and Excel files of a directory
//! - Sniff the delimiter of plain-text files
//! - Load every cataloged file (or chunk, or sheet) into a table
//! - Stack loaded tables with typed row filters and group-by aggregation
//!   run through polars

pub mod catalog;
pub mod error;
pub mod excel;
pub mod filter;
pub mod frame;
pub mod json;
pub mod loader;
pub mod parser;
pub mod request;
pub mod sniff;
pub mod stacker;
pub mod table;

pub use catalog::{Catalog, CatalogEntry, ScanOptions};
pub use error::{Error, Result};
pub use excel::{IncludeAll, SheetDecider, SheetList, SheetSelection};
pub use filter::{Filter, FilterOp};
pub use loader::{LoadOptions, TableMeta, TableSet};
pub use parser::{parse_csv, parse_tab_delimited};
pub use request::{JobFile, JobOutput};
pub use sniff::Delimiter;
pub use stacker::{stack, AggFunc, ConcatOptions, StackRequest};
pub use table::{CellValue, Column, Row, Table};
