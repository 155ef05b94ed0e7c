//! JSON request and job files
//!
//! A stack request file holds a single [`StackRequest`]. A job file bundles
//! the scans, load options and stack request of a whole run, so a repeated
//! analysis can be kept next to the data it reads.

use crate::catalog::{Catalog, ScanOptions};
use crate::error::{Error, Result};
use crate::excel::{IncludeAll, SheetDecider, SheetList};
use crate::filter::{Filter, FilterOp};
use crate::loader::{LoadOptions, TableSet};
use crate::stacker::{AggFunc, StackRequest};
use crate::table::{CellValue, Table};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(Error::Json)
}

fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}

impl StackRequest {
    /// Load a stack request from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_json(path.as_ref())
    }

    /// Save the stack request to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_json(self, path.as_ref())
    }

    /// An example request showing every option
    pub fn template() -> Self {
        StackRequest::columns(["category"])
            .aggregate(["amount"], [AggFunc::Sum, AggFunc::Count])
            .filter(Filter::new(
                "recent",
                "year",
                FilterOp::GreaterOrEqual(CellValue::Integer(2020)),
            ))
            .filter(Filter::new(
                "regions",
                "region",
                FilterOp::In(vec![
                    CellValue::String("north".to_string()),
                    CellValue::String("south".to_string()),
                ]),
            ))
            .source_column("source_file")
    }
}

/// A complete scan, load and stack run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFile {
    /// Directories to scan; the first rebuilds the catalog, the rest append
    pub scans: Vec<ScanOptions>,
    #[serde(default)]
    pub load: LoadOptions,
    /// Workbook sheets to include when every sheet is offered
    #[serde(default)]
    pub include_sheets: Option<Vec<String>>,
    #[serde(default)]
    pub stack: Option<StackRequest>,
    /// Where the stacked table is written
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// Everything a job run produced
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub catalog: Catalog,
    pub tables: TableSet,
    pub stacked: Option<Table>,
}

impl JobFile {
    /// Load a job file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_json(path.as_ref())
    }

    /// Save the job file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_json(self, path.as_ref())
    }

    /// Run the job. `decider` is consulted for workbook sheets unless the
    /// job lists the sheets to include.
    pub fn run(&self, decider: Option<&mut dyn SheetDecider>) -> Result<JobOutput> {
        let mut catalog = Catalog::new();
        for (i, scan) in self.scans.iter().enumerate() {
            if i == 0 {
                catalog.rebuild(scan)?;
            } else {
                catalog.append(scan)?;
            }
        }

        let mut listed;
        let mut include_all = IncludeAll;
        let decider: &mut dyn SheetDecider = match (&self.include_sheets, decider) {
            (Some(names), _) => {
                listed = SheetList::new(names.iter().cloned());
                &mut listed
            }
            (None, Some(decider)) => decider,
            (None, None) => &mut include_all,
        };

        let tables = TableSet::load_with(&catalog, &self.load, decider)?;
        let stacked = self
            .stack
            .as_ref()
            .map(|request| tables.stack(request))
            .transpose()?;

        Ok(JobOutput {
            catalog,
            tables,
            stacked,
        })
    }
}
