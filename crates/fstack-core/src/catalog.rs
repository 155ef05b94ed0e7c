//! Directory catalog of tabular data files

use crate::error::Result;
use crate::sniff::{sniff_file, Delimiter};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions whose delimiter is sniffed from content
pub const DELIMITED_TEXT_EXTENSIONS: &[&str] = &["txt", "tsv"];

/// What to look for when scanning a directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Directory to scan (not recursive)
    pub dir: PathBuf,
    /// Accepted extensions, with or without the leading dot
    pub extensions: Vec<String>,
    /// Regex searched in each file name; empty matches everything
    #[serde(default)]
    pub pattern: String,
    /// Arbitrary label copied onto every entry found by this scan
    #[serde(default)]
    pub tag: Option<String>,
}

impl ScanOptions {
    /// Scan `dir` for files with any of `extensions`
    pub fn new<P, I, S>(dir: P, extensions: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dir: dir.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
            pattern: String::new(),
            tag: None,
        }
    }

    /// Only keep file names this regular expression finds a match in
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Record `tag` on every entry of the scan
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Metadata recorded for one discovered file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// File name without extension
    pub name: String,
    /// Extension including the leading dot, as found on disk
    pub ext: String,
    /// Directory the file was found in
    pub dir: PathBuf,
    /// Full path to the file
    pub path: PathBuf,
    /// Tag of the scan that found the file
    pub tag: Option<String>,
    /// Sniffed delimiter for plain-text files
    pub delimiter: Delimiter,
}

impl CatalogEntry {
    /// Lowercased extension without the dot
    pub fn extension(&self) -> String {
        self.ext.trim_start_matches('.').to_ascii_lowercase()
    }
}

/// Mapping from file name to file metadata, owned by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a directory into a fresh catalog
    pub fn scan(options: &ScanOptions) -> Result<Self> {
        let mut catalog = Self::new();
        catalog.append(options)?;
        Ok(catalog)
    }

    /// Discard current entries and replace them with a new scan
    pub fn rebuild(&mut self, options: &ScanOptions) -> Result<usize> {
        let fresh = Self::scan(options)?;
        *self = fresh;
        Ok(self.len())
    }

    /// Scan a directory and merge the results into this catalog
    pub fn append(&mut self, options: &ScanOptions) -> Result<usize> {
        let found = scan_entries(options)?;
        let count = found.len();
        self.merge(found);
        Ok(count)
    }

    /// Merge entries, overwriting any entry with the same file name
    pub fn merge<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, CatalogEntry)>,
    {
        self.entries.extend(entries);
    }

    /// Look up an entry by file name
    pub fn get(&self, file_name: &str) -> Option<&CatalogEntry> {
        self.entries.get(file_name)
    }

    /// Iterate entries in file name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CatalogEntry)> {
        self.entries.iter()
    }

    /// Number of cataloged files
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no file has been cataloged
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Catalog {
    type Item = (String, CatalogEntry);
    type IntoIter = std::collections::btree_map::IntoIter<String, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// List matching files in a directory and build their entries
fn scan_entries(options: &ScanOptions) -> Result<BTreeMap<String, CatalogEntry>> {
    let pattern = Regex::new(&options.pattern)?;
    let dir = options.dir.as_path();
    let mut found = BTreeMap::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() > 0 => {
                log::warn!("skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str() else {
            log::warn!("skipping non UTF-8 file name {:?}", entry.file_name());
            continue;
        };

        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext.is_empty() || !options.accepts_extension(ext) || !pattern.is_match(file_name) {
            continue;
        }

        found.insert(file_name.to_string(), build_entry(path, dir, options.tag.clone())?);
    }

    log::info!(
        "cataloged {} file(s) in {}",
        found.len(),
        options.dir.display()
    );

    Ok(found)
}

fn build_entry(path: &Path, dir: &Path, tag: Option<String>) -> Result<CatalogEntry> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let is_text = DELIMITED_TEXT_EXTENSIONS
        .iter()
        .any(|t| ext.trim_start_matches('.').eq_ignore_ascii_case(t));
    let delimiter = if is_text {
        Delimiter::Char(sniff_file(path)?)
    } else {
        Delimiter::NotApplicable
    };

    Ok(CatalogEntry {
        name,
        ext,
        dir: dir.to_path_buf(),
        path: path.to_path_buf(),
        tag,
        delimiter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sales_q1.csv"), "id\n1\n").unwrap();
        fs::write(dir.path().join("sales_q2.CSV"), "id\n2\n").unwrap();
        fs::write(dir.path().join("costs.csv"), "id\n3\n").unwrap();
        fs::write(dir.path().join("notes.md"), "# not data").unwrap();
        fs::write(dir.path().join("export.txt"), "a\tb\n1\t2\n").unwrap();
        fs::create_dir(dir.path().join("nested.csv")).unwrap();
        dir
    }

    #[test]
    fn test_scan_filters_by_extension() {
        let dir = fixture();
        let catalog = Catalog::scan(&ScanOptions::new(dir.path(), ["csv"])).unwrap();

        let names: Vec<&String> = catalog.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["costs.csv", "sales_q1.csv", "sales_q2.CSV"]);
        for (_, entry) in catalog.iter() {
            assert_eq!(entry.extension(), "csv");
            assert_eq!(entry.delimiter, Delimiter::NotApplicable);
        }
    }

    #[test]
    fn test_scan_applies_pattern_and_tag() {
        let dir = fixture();
        let options = ScanOptions::new(dir.path(), [".csv"])
            .pattern("^sales")
            .tag("revenue");
        let catalog = Catalog::scan(&options).unwrap();

        assert_eq!(catalog.len(), 2);
        let entry = catalog.get("sales_q1.csv").unwrap();
        assert_eq!(entry.name, "sales_q1");
        assert_eq!(entry.ext, ".csv");
        assert_eq!(entry.tag.as_deref(), Some("revenue"));
        assert_eq!(entry.path, dir.path().join("sales_q1.csv"));
        assert_eq!(entry.dir, dir.path());
    }

    #[test]
    fn test_scan_sniffs_text_delimiter() {
        let dir = fixture();
        let catalog = Catalog::scan(&ScanOptions::new(dir.path(), ["txt"])).unwrap();
        assert_eq!(
            catalog.get("export.txt").unwrap().delimiter,
            Delimiter::Char('\t')
        );
    }

    #[test]
    fn test_scan_text_with_quoted_line_break() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "id,note\n1,\"first\nsecond\"\n2,plain\n").unwrap();

        let catalog = Catalog::scan(&ScanOptions::new(dir.path(), ["txt"])).unwrap();
        assert_eq!(catalog.get("notes.txt").unwrap().delimiter, Delimiter::Char(','));
    }

    #[test]
    fn test_scan_empty_text_file_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blank.txt"), "").unwrap();

        let err = Catalog::scan(&ScanOptions::new(dir.path(), ["txt"])).unwrap_err();
        assert!(matches!(err, Error::Delimiter { .. }));
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = fixture();
        let err = Catalog::scan(&ScanOptions::new(dir.path(), ["csv"]).pattern("(")).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern(_)));
    }

    #[test]
    fn test_rebuild_replaces_and_append_merges() {
        let first = fixture();
        let second = TempDir::new().unwrap();
        fs::write(second.path().join("costs.csv"), "id\n9\n").unwrap();
        fs::write(second.path().join("extra.csv"), "id\n10\n").unwrap();

        let mut catalog = Catalog::new();
        catalog
            .rebuild(&ScanOptions::new(first.path(), ["csv"]))
            .unwrap();
        assert_eq!(catalog.len(), 3);

        let added = catalog
            .append(&ScanOptions::new(second.path(), ["csv"]).tag("second"))
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(catalog.len(), 4);
        // Name collision overwrites the older entry
        assert_eq!(catalog.get("costs.csv").unwrap().dir, second.path());

        catalog
            .rebuild(&ScanOptions::new(second.path(), ["csv"]))
            .unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("sales_q1.csv").is_none());
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = Catalog::scan(&ScanOptions::new(missing, ["csv"])).unwrap_err();
        assert!(matches!(err, Error::WalkDir(_)));
    }
}
