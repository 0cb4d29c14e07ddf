//! Column-ordered table of loosely typed cells.
//!
//! Static files may carry columns the live feed does not, so rows are kept as
//! positional cells against a shared header instead of a fixed struct.

use anyhow::Result;
use std::fmt;

use crate::record::{ObservationRecord, SCHEMA};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn from_opt_num(v: Option<f64>) -> Self {
        v.map(Cell::Number).unwrap_or(Cell::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Cell::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

/// CSV rendering: missing is empty, booleans are `True`/`False`.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Bool(true) => f.write_str("True"),
            Cell::Bool(false) => f.write_str("False"),
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

static MISSING: Cell = Cell::Missing;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Empty table with the canonical observation columns.
    pub fn with_schema() -> Self {
        Self::new(SCHEMA.iter().map(|c| c.to_string()).collect())
    }

    pub fn from_records(records: &[ObservationRecord]) -> Self {
        let mut table = Self::with_schema();
        table.rows = records.iter().map(ObservationRecord::to_row).collect();
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Appends a row, padding short rows with `Missing` and truncating long ones.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Missing);
        self.rows.push(row);
    }

    /// Cells of one column, `Missing` for every row when the column is absent.
    pub fn column<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Cell> + 'a {
        let idx = self.column_index(name);
        self.rows.iter().map(move |row| match idx {
            Some(i) => &row[i],
            None => &MISSING,
        })
    }

    /// Row-wise concatenation over the ordered union of both column sets.
    pub fn concat(&self, other: &Table) -> Table {
        let mut columns = self.columns.clone();
        for col in &other.columns {
            if !columns.contains(col) {
                columns.push(col.clone());
            }
        }

        let mut out = Table::new(columns);
        out.rows.reserve(self.len() + other.len());
        for source in [self, other] {
            let mapping: Vec<Option<usize>> =
                out.columns.iter().map(|c| source.column_index(c)).collect();
            for row in &source.rows {
                out.rows.push(
                    mapping
                        .iter()
                        .map(|idx| idx.map(|i| row[i].clone()).unwrap_or(Cell::Missing))
                        .collect(),
                );
            }
        }
        out
    }

    /// New table holding only the rows the predicate keeps.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Cell]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    pub fn write_csv<W: std::io::Write>(&self, out: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|c| c.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// UTF-8 CSV with a header row.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(buf)
    }
}
