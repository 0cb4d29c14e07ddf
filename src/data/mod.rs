//! Static dataset loading.
//!
//! The four numeric columns are coerced: any cell that does not parse as a
//! float becomes `Cell::Missing` and the row is kept. Rows whose field count
//! differs from the header are padded or cut to the header width and counted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::logging::{log_static_load, obj, v_num, v_str, warn, Domain};
use crate::record::{COL_HAZARDOUS, NUMERIC_COLUMNS, SCHEMA, TEXT_COLUMNS};
use crate::table::{Cell, Table};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub path: String,
    pub hash_sha256: String,
    pub row_count: u64,
    pub columns: Vec<String>,
    pub missing_columns: Vec<String>,
    /// Per numeric column, cells that held text but did not parse.
    pub coerced_cells: BTreeMap<String, u64>,
    pub warnings: Vec<String>,
    pub generated_at_epoch: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReport {
    pub columns: Vec<String>,
    pub expected: Vec<String>,
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub rows: u64,
    pub coerced_cells: u64,
    pub empty_numeric_cells: u64,
    /// Rows with more or fewer fields than the header.
    pub ragged_rows: u64,
    pub warnings: Vec<String>,
}

/// Result of reading a static file: the table plus coercion counts.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Table,
    pub coerced: BTreeMap<String, u64>,
    pub empty_numeric: u64,
    pub ragged_rows: u64,
}

impl LoadedTable {
    pub fn coerced_total(&self) -> u64 {
        self.coerced.values().sum()
    }
}

pub fn load_static(path: &Path) -> Result<Table> {
    let loaded = read_static(path)?;
    log_static_load(
        &path.display().to_string(),
        loaded.table.len(),
        loaded.coerced_total() as usize,
    );
    if loaded.ragged_rows > 0 {
        warn(
            Domain::Data,
            "ragged_rows",
            obj(&[
                ("path", v_str(&path.display().to_string())),
                ("rows", v_num(loaded.ragged_rows as f64)),
            ]),
        );
    }
    Ok(loaded.table)
}

pub fn read_static(path: &Path) -> Result<LoadedTable> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_static_from(file).with_context(|| format!("parse {}", path.display()))
}

pub fn read_static_from<R: Read>(input: R) -> Result<LoadedTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let kinds: Vec<ColumnKind> = columns.iter().map(|c| ColumnKind::of(c)).collect();

    let mut table = Table::new(columns);
    let mut coerced: BTreeMap<String, u64> = BTreeMap::new();
    let mut empty_numeric = 0u64;
    let mut ragged_rows = 0u64;

    for record in reader.records() {
        let record = record?;
        if record.len() != kinds.len() {
            ragged_rows += 1;
        }
        let mut row = Vec::with_capacity(kinds.len());
        for (idx, kind) in kinds.iter().enumerate() {
            let raw = record.get(idx).unwrap_or("");
            let cell = kind.parse(raw);
            if *kind == ColumnKind::Numeric && cell.is_missing() {
                if raw.is_empty() {
                    empty_numeric += 1;
                } else {
                    *coerced.entry(table.columns[idx].clone()).or_default() += 1;
                }
            }
            row.push(cell);
        }
        table.push_row(row);
    }

    Ok(LoadedTable {
        table,
        coerced,
        empty_numeric,
        ragged_rows,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Numeric,
    Text,
    Inferred,
}

impl ColumnKind {
    fn of(column: &str) -> Self {
        if NUMERIC_COLUMNS.contains(&column) {
            ColumnKind::Numeric
        } else if TEXT_COLUMNS.contains(&column) {
            ColumnKind::Text
        } else {
            ColumnKind::Inferred
        }
    }

    fn parse(self, raw: &str) -> Cell {
        if raw.is_empty() {
            return Cell::Missing;
        }
        match self {
            ColumnKind::Numeric => parse_number(raw).map(Cell::Number).unwrap_or(Cell::Missing),
            ColumnKind::Text => Cell::Text(raw.to_string()),
            ColumnKind::Inferred => {
                if let Some(b) = parse_bool(raw) {
                    Cell::Bool(b)
                } else if let Some(v) = parse_number(raw) {
                    Cell::Number(v)
                } else {
                    Cell::Text(raw.to_string())
                }
            }
        }
    }
}

/// Finite float or nothing; `NaN`/`inf` spellings count as missing.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        s if s.eq_ignore_ascii_case("true") => Some(true),
        s if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

pub fn analyze_static(path: &Path, now_ts: u64) -> Result<(DatasetManifest, DataQualityReport)> {
    let hash = file_sha256(path)?;
    let loaded = read_static(path)?;
    let schema = schema_report(&loaded.table.columns);

    let missing_columns: Vec<String> = schema
        .expected
        .iter()
        .filter(|c| !schema.columns.contains(c))
        .cloned()
        .collect();

    let mut warnings = Vec::new();
    for col in &missing_columns {
        warnings.push(format!("missing_column: {}", col));
    }
    for (col, n) in &loaded.coerced {
        warnings.push(format!("coerced_to_missing: {} ({} cells)", col, n));
    }
    let hazard_bad = loaded
        .table
        .column(COL_HAZARDOUS)
        .filter(|c| matches!(c, Cell::Text(_)))
        .count();
    if hazard_bad > 0 {
        warnings.push(format!("non_boolean_hazard_flag: {} rows", hazard_bad));
    }
    if loaded.ragged_rows > 0 {
        warnings.push(format!("ragged_row: {} rows", loaded.ragged_rows));
    }
    if loaded.table.is_empty() {
        warnings.push("no_rows".to_string());
    }

    let manifest = DatasetManifest {
        path: path.display().to_string(),
        hash_sha256: hash,
        row_count: loaded.table.len() as u64,
        columns: loaded.table.columns.clone(),
        missing_columns,
        coerced_cells: loaded.coerced.clone(),
        warnings: warnings.clone(),
        generated_at_epoch: now_ts,
    };

    let report = DataQualityReport {
        rows: loaded.table.len() as u64,
        coerced_cells: loaded.coerced_total(),
        empty_numeric_cells: loaded.empty_numeric,
        ragged_rows: loaded.ragged_rows,
        warnings,
    };

    Ok((manifest, report))
}

/// Checks the header carries every canonical column; extra columns are allowed.
pub fn validate_schema(path: &Path) -> Result<SchemaReport> {
    let header = read_header(path)?;
    Ok(schema_report(&header))
}

fn schema_report(header: &[String]) -> SchemaReport {
    let expected: Vec<String> = SCHEMA.iter().map(|s| s.to_string()).collect();
    let missing: Vec<&String> = expected.iter().filter(|c| !header.contains(c)).collect();
    let ok = missing.is_empty();
    let message = if ok {
        "schema ok".to_string()
    } else {
        format!("schema mismatch: missing {:?}", missing)
    };
    SchemaReport {
        columns: header.to_vec(),
        expected,
        ok,
        message,
    }
}

pub fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    Ok(reader.headers()?.iter().map(|h| h.to_string()).collect())
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn default_manifest_path(dataset_path: &Path) -> PathBuf {
    let mut p = dataset_path.to_path_buf();
    let fname = dataset_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset.csv");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}
