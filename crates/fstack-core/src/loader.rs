//! Loads every cataloged file into a caller-owned table collection

use crate::catalog::{Catalog, CatalogEntry};
use crate::error::{Error, Result};
use crate::excel::{read_workbook, IncludeAll, SheetDecider, SheetSelection};
use crate::json::parse_json;
use crate::parser::{parse_csv, parse_csv_chunks, parse_tab_delimited};
use crate::sniff::Delimiter;
use crate::stacker::{stack, StackRequest};
use crate::table::Table;
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Workbook extensions handed to the Excel reader
pub const EXCEL_EXTENSIONS: &[&str] = &["xls", "xlsx", "xlsm", "xlsb", "ods"];

/// How files are read
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Split CSV files into batches of this many rows. Workbook sheets stay
    /// whole and are keyed by their position in the workbook.
    #[serde(default)]
    pub chunk_size: Option<usize>,
    /// Read at most this many data rows per file or sheet
    #[serde(default)]
    pub nrows: Option<usize>,
    /// Encoding label for text files, e.g. `latin1` or `utf-16le`
    #[serde(default)]
    pub encoding: Option<String>,
    /// Workbook sheets to load
    #[serde(default)]
    pub sheets: SheetSelection,
}

impl LoadOptions {
    /// Resolve the configured encoding label
    pub fn text_encoding(&self) -> Result<Option<&'static Encoding>> {
        self.encoding
            .as_deref()
            .map(|label| {
                Encoding::for_label(label.as_bytes())
                    .ok_or_else(|| Error::UnknownEncoding(label.to_string()))
            })
            .transpose()
    }
}

/// Metadata for one loaded table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Position in the table collection
    pub index: usize,
    /// Batch number when loaded in chunks
    pub chunk: Option<usize>,
    /// Workbook sheet the table came from
    pub sheet: Option<String>,
    /// Rows in the table
    pub row_count: usize,
    /// Column names, in table order
    pub columns: Vec<String>,
    /// File name of the source
    pub source: String,
}

/// How a cataloged file is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    TabDelimited,
    Json,
    Excel,
}

fn format_of(entry: &CatalogEntry) -> Option<Format> {
    let ext = entry.extension();
    match (ext.as_str(), entry.delimiter) {
        ("csv", _) | (_, Delimiter::Char(',')) => Some(Format::Csv),
        (_, Delimiter::Char('\t')) => Some(Format::TabDelimited),
        ("json", _) => Some(Format::Json),
        (e, _) if EXCEL_EXTENSIONS.contains(&e) => Some(Format::Excel),
        _ => None,
    }
}

/// A table ready to be registered, with its metadata key
struct Pending {
    key: String,
    table: Table,
    chunk: Option<usize>,
    sheet: Option<String>,
}

/// Loaded tables plus a metadata map indexing into them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSet {
    tables: Vec<Table>,
    metadata: BTreeMap<String, TableMeta>,
}

impl TableSet {
    /// Create an empty table set
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap already-built tables, keyed by the stem of their source file
    pub fn from_tables(tables: Vec<Table>) -> Self {
        let mut set = Self::new();
        for table in tables {
            let source = table.source_name();
            let key = table
                .source_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.clone());
            set.register(Pending::whole(&key, table), &source);
        }
        set
    }

    /// Load every cataloged file into a fresh set
    pub fn load(catalog: &Catalog, options: &LoadOptions) -> Result<Self> {
        Self::load_with(catalog, options, &mut IncludeAll)
    }

    /// Load every cataloged file, consulting `decider` for workbook sheets
    pub fn load_with(
        catalog: &Catalog,
        options: &LoadOptions,
        decider: &mut dyn SheetDecider,
    ) -> Result<Self> {
        let mut set = Self::new();
        set.append_with(catalog, options, decider)?;
        Ok(set)
    }

    /// Discard loaded tables and load the catalog again. On error the
    /// current contents are left untouched.
    pub fn rebuild(&mut self, catalog: &Catalog, options: &LoadOptions) -> Result<usize> {
        self.rebuild_with(catalog, options, &mut IncludeAll)
    }

    pub fn rebuild_with(
        &mut self,
        catalog: &Catalog,
        options: &LoadOptions,
        decider: &mut dyn SheetDecider,
    ) -> Result<usize> {
        *self = Self::load_with(catalog, options, decider)?;
        Ok(self.len())
    }

    /// Load the catalog after the tables already held
    pub fn append(&mut self, catalog: &Catalog, options: &LoadOptions) -> Result<usize> {
        self.append_with(catalog, options, &mut IncludeAll)
    }

    /// Load the catalog after the tables already held, consulting `decider`
    /// for workbook sheets. Returns the number of tables added.
    pub fn append_with(
        &mut self,
        catalog: &Catalog,
        options: &LoadOptions,
        decider: &mut dyn SheetDecider,
    ) -> Result<usize> {
        let encoding = options.text_encoding()?;
        let before = self.len();

        for (file_name, entry) in catalog.iter() {
            let Some(format) = format_of(entry) else {
                log::debug!("skipping {}: no reader for this format", file_name);
                continue;
            };
            log::debug!("loading {} as {:?}", file_name, format);

            for pending in read_entry(entry, format, options, encoding, decider)? {
                self.register(pending, file_name);
            }
        }

        log::info!("loaded {} table(s)", self.len() - before);
        Ok(self.len() - before)
    }

    fn register(&mut self, pending: Pending, source: &str) {
        let index = self.tables.len();
        let meta = TableMeta {
            index,
            chunk: pending.chunk,
            sheet: pending.sheet,
            row_count: pending.table.row_count(),
            columns: pending.table.column_names(),
            source: source.to_string(),
        };
        self.tables.push(pending.table);
        self.metadata.insert(pending.key, meta);
    }

    /// All loaded tables, in load order
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Metadata keyed by derived table name
    pub fn metadata(&self) -> &BTreeMap<String, TableMeta> {
        &self.metadata
    }

    /// Get a table by position
    pub fn get(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    /// Get a table by its metadata key
    pub fn by_name(&self, name: &str) -> Option<&Table> {
        self.metadata.get(name).and_then(|m| self.tables.get(m.index))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Concatenate, filter and aggregate the loaded tables
    pub fn stack(&self, request: &StackRequest) -> Result<Table> {
        stack(self, request)
    }
}

/// Two-digit minimum, zero-padded batch suffix
fn chunk_suffix(index: usize) -> String {
    format!("{:02}", index)
}

/// Read all tables one catalog entry contributes, before any is registered
fn read_entry(
    entry: &CatalogEntry,
    format: Format,
    options: &LoadOptions,
    encoding: Option<&'static Encoding>,
    decider: &mut dyn SheetDecider,
) -> Result<Vec<Pending>> {
    let path = entry.path.as_path();
    let name = entry.name.as_str();
    let chunk_size = options.chunk_size;

    let pending = match format {
        Format::Csv => match chunk_size {
            Some(size) => parse_csv_chunks(path, size, options.nrows, encoding)?
                .into_iter()
                .enumerate()
                .map(|(i, table)| Pending {
                    key: format!("{}_{}", name, chunk_suffix(i)),
                    table,
                    chunk: Some(i),
                    sheet: None,
                })
                .collect(),
            None => vec![Pending::whole(name, parse_csv(path, options.nrows, encoding)?)],
        },
        Format::TabDelimited => vec![Pending::whole(
            name,
            parse_tab_delimited(path, options.nrows, encoding)?,
        )],
        Format::Json => vec![Pending::whole(name, parse_json(path)?)],
        Format::Excel => {
            let sheets = read_workbook(path, options.sheets, options.nrows, decider)?;
            sheets
                .into_iter()
                .map(|sheet| {
                    let key = match (chunk_size, options.sheets) {
                        (Some(_), _) => {
                            format!("{}_{}_{}", name, sheet.name, chunk_suffix(sheet.position))
                        }
                        (None, SheetSelection::All) => format!("{}_{}", name, sheet.name),
                        (None, SheetSelection::First) => name.to_string(),
                    };
                    Pending {
                        key,
                        table: sheet.table,
                        chunk: chunk_size.map(|_| sheet.position),
                        sheet: Some(sheet.name),
                    }
                })
                .collect()
        }
    };

    Ok(pending)
}

impl Pending {
    fn whole(name: &str, table: Table) -> Self {
        Self {
            key: name.to_string(),
            table,
            chunk: None,
            sheet: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScanOptions;
    use crate::table::CellValue;
    use std::fs;
    use tempfile::TempDir;

    fn catalog_of(dir: &TempDir, extensions: &[&str]) -> Catalog {
        Catalog::scan(&ScanOptions::new(dir.path(), extensions.iter().copied())).unwrap()
    }

    #[test]
    fn test_load_csv_row_count() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("orders.csv"), "id,amount\n1,10\n2,20\n3,30\n").unwrap();

        let set = TableSet::load(&catalog_of(&dir, &["csv"]), &LoadOptions::default()).unwrap();

        assert_eq!(set.len(), 1);
        let meta = &set.metadata()["orders"];
        assert_eq!(meta.index, 0);
        assert_eq!(meta.row_count, 3);
        assert_eq!(meta.columns, vec!["id", "amount"]);
        assert_eq!(meta.source, "orders.csv");
        assert_eq!(set.by_name("orders").unwrap().row_count(), 3);
    }

    #[test]
    fn test_load_dispatches_text_by_delimiter() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("comma.txt"), "a,b\n1,2\n").unwrap();
        fs::write(dir.path().join("tabs.txt"), "a\tb\n1\t2\n").unwrap();
        fs::write(dir.path().join("pipes.txt"), "a|b\n1|2\n").unwrap();

        let set = TableSet::load(&catalog_of(&dir, &["txt"]), &LoadOptions::default()).unwrap();

        // Pipe-delimited text has no reader and is skipped
        assert_eq!(set.len(), 2);
        assert!(set.metadata().get("pipes").is_none());
        assert_eq!(
            set.by_name("comma").unwrap().rows[0].cells[0],
            CellValue::Integer(1)
        );
        assert_eq!(
            set.by_name("tabs").unwrap().rows[0].cells[0],
            CellValue::String("1".to_string())
        );
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("people.json"), r#"[{"name":"ann"},{"name":"bo"}]"#).unwrap();

        let set = TableSet::load(&catalog_of(&dir, &["json"]), &LoadOptions::default()).unwrap();
        assert_eq!(set.metadata()["people"].row_count, 2);
    }

    #[test]
    fn test_chunked_csv_names_and_sizes() {
        let dir = TempDir::new().unwrap();
        let body: String = (0..25).map(|i| format!("{i}\n")).collect();
        fs::write(dir.path().join("big.csv"), format!("n\n{body}")).unwrap();

        let options = LoadOptions {
            chunk_size: Some(10),
            ..Default::default()
        };
        let set = TableSet::load(&catalog_of(&dir, &["csv"]), &options).unwrap();

        let keys: Vec<&String> = set.metadata().keys().collect();
        assert_eq!(keys, vec!["big_00", "big_01", "big_02"]);
        let counts: Vec<usize> = set.metadata().values().map(|m| m.row_count).collect();
        assert_eq!(counts, vec![10, 10, 5]);
        assert_eq!(set.metadata()["big_02"].chunk, Some(2));
    }

    #[test]
    fn test_chunk_suffix_widens_past_two_digits() {
        assert_eq!(chunk_suffix(3), "03");
        assert_eq!(chunk_suffix(42), "42");
        assert_eq!(chunk_suffix(123), "123");
    }

    #[test]
    fn test_append_keeps_existing_tables() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(first.path().join("a.csv"), "x\n1\n").unwrap();
        fs::write(second.path().join("b.csv"), "x\n2\n3\n").unwrap();

        let mut set = TableSet::new();
        set.rebuild(&catalog_of(&first, &["csv"]), &LoadOptions::default())
            .unwrap();
        let added = set
            .append(&catalog_of(&second, &["csv"]), &LoadOptions::default())
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(set.len(), 2);
        assert_eq!(set.metadata()["b"].index, 1);

        set.rebuild(&catalog_of(&second, &["csv"]), &LoadOptions::default())
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.metadata()["b"].index, 0);
    }

    #[test]
    fn test_malformed_file_registers_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good.csv"), "x\n1\n").unwrap();
        fs::write(dir.path().join("oops.csv"), "x,y\n1,2\n3\n").unwrap();

        let mut set = TableSet::new();
        let err = set
            .append(&catalog_of(&dir, &["csv"]), &LoadOptions::default())
            .unwrap_err();

        assert!(matches!(err, Error::Csv { .. }));
        assert_eq!(set.len(), 1);
        assert!(set.metadata().get("oops").is_none());
    }

    #[test]
    fn test_rebuild_failure_keeps_previous_contents() {
        let good = TempDir::new().unwrap();
        let bad = TempDir::new().unwrap();
        fs::write(good.path().join("a.csv"), "x\n1\n").unwrap();
        fs::write(bad.path().join("b.json"), "not json").unwrap();

        let mut set = TableSet::load(&catalog_of(&good, &["csv"]), &LoadOptions::default()).unwrap();
        assert!(set
            .rebuild(&catalog_of(&bad, &["json"]), &LoadOptions::default())
            .is_err());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_unknown_encoding() {
        let options = LoadOptions {
            encoding: Some("klingon".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            options.text_encoding(),
            Err(Error::UnknownEncoding(ref l)) if l == "klingon"
        ));
    }

    #[test]
    fn test_metadata_indices_resolve() {
        let dir = TempDir::new().unwrap();
        for name in ["a", "b", "c"] {
            fs::write(dir.path().join(format!("{name}.csv")), "x\n1\n2\n").unwrap();
        }
        let options = LoadOptions {
            chunk_size: Some(1),
            ..Default::default()
        };
        let set = TableSet::load(&catalog_of(&dir, &["csv"]), &options).unwrap();

        assert_eq!(set.len(), 6);
        for meta in set.metadata().values() {
            assert_eq!(set.get(meta.index).unwrap().row_count(), meta.row_count);
        }
    }
}
