use fstack_core::{
    Catalog, CellValue, LoadOptions, ScanOptions, SheetList, SheetSelection, StackRequest,
    TableSet,
};

// quarters.xlsx holds three sheets: Q1 (3 rows), Q2 (2 rows) and Notes
const DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data");

fn workbook_catalog() -> Catalog {
    Catalog::scan(&ScanOptions::new(DATA_DIR, ["xlsx"])).unwrap()
}

#[test]
fn test_first_sheet_keyed_by_file_name() {
    let catalog = workbook_catalog();
    assert!(catalog.get("quarters.xlsx").is_some());

    let tables = TableSet::load(&catalog, &LoadOptions::default()).unwrap();
    let keys: Vec<&String> = tables.metadata().keys().collect();
    assert_eq!(keys, vec!["quarters"]);

    let meta = &tables.metadata()["quarters"];
    assert_eq!(meta.sheet.as_deref(), Some("Q1"));
    assert_eq!(meta.chunk, None);
    assert_eq!(meta.row_count, 3);
    assert_eq!(meta.columns, vec!["region", "sales"]);

    let q1 = tables.by_name("quarters").unwrap();
    assert_eq!(
        q1.rows[0].cells,
        vec![CellValue::String("north".to_string()), CellValue::Integer(5)]
    );
}

#[test]
fn test_all_sheets_with_sheet_list() {
    let catalog = workbook_catalog();
    let options = LoadOptions {
        sheets: SheetSelection::All,
        ..Default::default()
    };

    let tables =
        TableSet::load_with(&catalog, &options, &mut SheetList::new(["Q1", "Q2"])).unwrap();
    let keys: Vec<&String> = tables.metadata().keys().collect();
    assert_eq!(keys, vec!["quarters_Q1", "quarters_Q2"]);
    assert_eq!(tables.metadata()["quarters_Q2"].sheet.as_deref(), Some("Q2"));
    assert_eq!(tables.metadata()["quarters_Q2"].row_count, 2);

    let stacked = tables
        .stack(&StackRequest::columns(["region", "sales"]))
        .unwrap();
    assert_eq!(stacked.row_count(), 5);
}

#[test]
fn test_chunked_load_keys_sheets_by_position() {
    let catalog = workbook_catalog();
    let options = LoadOptions {
        chunk_size: Some(2),
        sheets: SheetSelection::All,
        ..Default::default()
    };

    let tables =
        TableSet::load_with(&catalog, &options, &mut SheetList::new(["Q1", "Q2"])).unwrap();
    let keys: Vec<&String> = tables.metadata().keys().collect();
    assert_eq!(keys, vec!["quarters_Q1_00", "quarters_Q2_01"]);

    // Sheets are not split; the chunk number is the sheet position
    let q1 = &tables.metadata()["quarters_Q1_00"];
    assert_eq!(q1.chunk, Some(0));
    assert_eq!(q1.row_count, 3);
    assert_eq!(tables.metadata()["quarters_Q2_01"].chunk, Some(1));
}

#[test]
fn test_closure_decider_sees_every_sheet() {
    let catalog = workbook_catalog();
    let options = LoadOptions {
        sheets: SheetSelection::All,
        ..Default::default()
    };

    let mut asked = Vec::new();
    let mut decider = |source: &str, sheet: &str| {
        asked.push(format!("{source}:{sheet}"));
        sheet == "Notes"
    };
    let tables = TableSet::load_with(&catalog, &options, &mut decider).unwrap();

    assert_eq!(
        asked,
        vec!["quarters.xlsx:Q1", "quarters.xlsx:Q2", "quarters.xlsx:Notes"]
    );
    let keys: Vec<&String> = tables.metadata().keys().collect();
    assert_eq!(keys, vec!["quarters_Notes"]);
}

#[test]
fn test_row_limit_applies_per_sheet() {
    let catalog = workbook_catalog();
    let options = LoadOptions {
        nrows: Some(1),
        sheets: SheetSelection::All,
        ..Default::default()
    };

    let tables =
        TableSet::load_with(&catalog, &options, &mut SheetList::new(["Q1", "Q2"])).unwrap();
    assert_eq!(tables.metadata()["quarters_Q1"].row_count, 1);
    assert_eq!(tables.metadata()["quarters_Q2"].row_count, 1);
}
