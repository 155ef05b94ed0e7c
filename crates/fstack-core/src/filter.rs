//! Typed row filters applied before stacking

use crate::error::Result;
use crate::table::{CellValue, Row, Table};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison performed by a filter, with its operand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", content = "value")]
pub enum FilterOp {
    #[serde(rename = "==")]
    Equals(CellValue),
    #[serde(rename = "!=")]
    NotEquals(CellValue),
    #[serde(rename = ">")]
    GreaterThan(CellValue),
    #[serde(rename = ">=")]
    GreaterOrEqual(CellValue),
    #[serde(rename = "<")]
    LessThan(CellValue),
    #[serde(rename = "<=")]
    LessOrEqual(CellValue),
    #[serde(rename = "in")]
    In(Vec<CellValue>),
    #[serde(rename = "not in")]
    NotIn(Vec<CellValue>),
    #[serde(rename = "regex")]
    MatchesPattern(String),
}

/// A named condition on one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub name: String,
    pub column: String,
    #[serde(flatten)]
    pub op: FilterOp,
}

impl Filter {
    pub fn new(name: impl Into<String>, column: impl Into<String>, op: FilterOp) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            op,
        }
    }

    /// Keep only the rows of `table` this filter accepts
    pub fn apply(&self, table: &mut Table) -> Result<()> {
        let idx = table.require_column(&self.column)?;
        let compiled = Compiled::new(&self.op)?;
        let before = table.row_count();

        table.rows.retain(|row| compiled.matches(cell(row, idx)));

        log::debug!(
            "filter '{}' on {}: {} -> {} rows",
            self.name,
            table.source_name(),
            before,
            table.row_count()
        );
        Ok(())
    }
}

/// Apply filters in declaration order; rows must pass every one
pub fn apply_all(filters: &[Filter], table: &mut Table) -> Result<()> {
    filters.iter().try_for_each(|f| f.apply(table))
}

/// Whether a single cell satisfies an operator
pub fn matches(op: &FilterOp, value: &CellValue) -> Result<bool> {
    Ok(Compiled::new(op)?.matches(value))
}

fn cell(row: &Row, idx: usize) -> &CellValue {
    row.get(idx).unwrap_or(&CellValue::Empty)
}

/// Operator with its pattern compiled once per application
enum Compiled<'a> {
    Op(&'a FilterOp),
    Pattern(Regex),
}

impl<'a> Compiled<'a> {
    fn new(op: &'a FilterOp) -> Result<Self> {
        Ok(match op {
            FilterOp::MatchesPattern(pattern) => Compiled::Pattern(Regex::new(pattern)?),
            op => Compiled::Op(op),
        })
    }

    fn matches(&self, value: &CellValue) -> bool {
        let op = match self {
            Compiled::Pattern(re) => {
                return !value.is_empty() && re.is_match(&value.to_string_value())
            }
            Compiled::Op(op) => op,
        };

        let ord = |operand: &CellValue| value.compare(operand);
        match op {
            FilterOp::Equals(v) => ord(v) == Some(Ordering::Equal),
            FilterOp::NotEquals(v) => ord(v) != Some(Ordering::Equal),
            FilterOp::GreaterThan(v) => ord(v) == Some(Ordering::Greater),
            FilterOp::GreaterOrEqual(v) => {
                matches!(ord(v), Some(Ordering::Greater | Ordering::Equal))
            }
            FilterOp::LessThan(v) => ord(v) == Some(Ordering::Less),
            FilterOp::LessOrEqual(v) => matches!(ord(v), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::In(set) => set.iter().any(|v| ord(v) == Some(Ordering::Equal)),
            FilterOp::NotIn(set) => !set.iter().any(|v| ord(v) == Some(Ordering::Equal)),
            // Compiled into `Compiled::Pattern` above
            FilterOp::MatchesPattern(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::parser::parse_csv_str;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn people() -> Table {
        parse_csv_str(
            "name,age,city\nann,31,Oslo\nbo,25,Bergen\ncy,,Oslo\ndee,40.5,Tromso\n",
            "people.csv",
        )
        .unwrap()
    }

    fn names(table: &Table) -> Vec<String> {
        table.rows.iter().map(|r| r.cells[0].to_string_value()).collect()
    }

    #[test]
    fn test_equality_and_inequality() {
        assert!(matches(&FilterOp::Equals(CellValue::Integer(5)), &CellValue::Float(5.0)).unwrap());
        assert!(!matches(&FilterOp::Equals(CellValue::Integer(5)), &s("5")).unwrap());
        assert!(matches(&FilterOp::NotEquals(s("a")), &CellValue::Empty).unwrap());
        assert!(!matches(&FilterOp::Equals(CellValue::Empty), &CellValue::Empty).unwrap());
    }

    #[test]
    fn test_ordering_across_number_kinds() {
        let mut table = people();
        Filter::new("adults", "age", FilterOp::GreaterOrEqual(CellValue::Integer(31)))
            .apply(&mut table)
            .unwrap();
        assert_eq!(names(&table), vec!["ann", "dee"]);
    }

    #[test]
    fn test_mismatched_types_are_unordered() {
        assert!(!matches(&FilterOp::LessThan(s("z")), &CellValue::Integer(1)).unwrap());
        assert!(!matches(&FilterOp::GreaterThan(CellValue::Integer(0)), &CellValue::Empty).unwrap());
    }

    #[test]
    fn test_membership() {
        let mut table = people();
        Filter::new("west", "city", FilterOp::In(vec![s("Oslo"), s("Bergen")]))
            .apply(&mut table)
            .unwrap();
        assert_eq!(names(&table), vec!["ann", "bo", "cy"]);

        Filter::new("not oslo", "city", FilterOp::NotIn(vec![s("Oslo")]))
            .apply(&mut table)
            .unwrap();
        assert_eq!(names(&table), vec!["bo"]);
    }

    #[test]
    fn test_regex_searches_text() {
        let mut table = people();
        Filter::new("o-cities", "city", FilterOp::MatchesPattern("^[OT]".to_string()))
            .apply(&mut table)
            .unwrap();
        assert_eq!(names(&table), vec!["ann", "cy", "dee"]);

        let mut table = people();
        Filter::new("thirties", "age", FilterOp::MatchesPattern("^3".to_string()))
            .apply(&mut table)
            .unwrap();
        assert_eq!(names(&table), vec!["ann"]);
    }

    #[test]
    fn test_filters_compose_in_order() {
        let mut table = people();
        let filters = vec![
            Filter::new("oslo", "city", FilterOp::Equals(s("Oslo"))),
            Filter::new("has age", "age", FilterOp::NotEquals(CellValue::Empty)),
        ];
        apply_all(&filters, &mut table).unwrap();
        // Empty is never equal to anything, so "!= null" keeps every row
        assert_eq!(names(&table), vec!["ann", "cy"]);
    }

    #[test]
    fn test_missing_column_and_bad_regex() {
        let mut table = people();
        let err = Filter::new("f", "salary", FilterOp::Equals(CellValue::Integer(1)))
            .apply(&mut table)
            .unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { .. }));

        let err = Filter::new("f", "city", FilterOp::MatchesPattern("(".to_string()))
            .apply(&mut table)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPattern(_)));
    }

    #[test]
    fn test_deserialize_operator_syntax() {
        let json = r#"[
            {"name": "f1", "column": "x", "operator": "==", "value": 5},
            {"name": "f2", "column": "y", "operator": "not in", "value": ["a", "b"]},
            {"column": "z", "operator": "regex", "value": "^ab"}
        ]"#;
        let filters: Vec<Filter> = serde_json::from_str(json).unwrap();

        assert_eq!(filters[0].op, FilterOp::Equals(CellValue::Integer(5)));
        assert_eq!(filters[1].op, FilterOp::NotIn(vec![s("a"), s("b")]));
        assert_eq!(filters[2].op, FilterOp::MatchesPattern("^ab".to_string()));
        assert_eq!(filters[2].name, "");
    }
}
