//! Cohort Cleaning Engine
//!
//! Turns a freshly ingested [`Table`] into an analysis-ready one and records
//! what happened along the way. The stages always run in this order:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  raw table   │────▶│ strip column │────▶│   drop exact │────▶│ impute with  │
//! │  (ingested)  │     │    names     │     │  duplicates  │     │ median/mode  │
//! └──────────────┘     └──────────────┘     └──────────────┘     └──────┬───────┘
//!                                                                        │
//!                                           ┌──────────────┐     ┌──────▼───────┐
//!                                           │ CleaningLog  │◀────│ CleanedData  │
//!                                           │ + snapshots  │     │   (table)    │
//!                                           └──────────────┘     └──────────────┘
//! ```
//!
//! Duplicate detection is two-phase. Rows are fingerprinted in parallel with
//! rayon, then a sequential pass keeps the first row of every group of equal
//! rows. Rows that share a fingerprint are compared cell by cell, so hash
//! collisions never drop distinct rows.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::data::{ColumnData, Table};
use crate::error::{DashboardError, Result};
use crate::stats;

pub const STEP_COLUMN_NAMES: &str = "Column name cleanup";
pub const STEP_DUPLICATES: &str = "Duplicates removed";
pub const STEP_MISSING: &str = "Missing values handled";

// ─── BitMask ────────────────────────────────────────────────────────────────

/// Compact bitmask for O(1) duplicate tracking, 64 rows per `u64` word.
#[derive(Debug, Clone)]
pub struct BitMask {
    words: Vec<u64>,
    len: usize,
}

impl BitMask {
    /// Create a new bitmask with all bits cleared.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(64)],
            len,
        }
    }

    /// Set bit at `index` to 1.
    #[inline(always)]
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.words[index >> 6] |= 1u64 << (index & 63);
    }

    /// Test whether bit at `index` is set.
    #[inline(always)]
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.words[index >> 6] & (1u64 << (index & 63)) != 0
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ─── Row fingerprints ───────────────────────────────────────────────────────

/// FNV-1a 64-bit hash.
#[inline(always)]
fn fnv1a(data: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// Hash of every cell in a row, in column order.
fn row_fingerprint(table: &Table, row: usize) -> u64 {
    let mut key = Vec::with_capacity(table.column_count() * 9);
    for column in table.columns() {
        column.data.write_key(row, &mut key);
    }
    fnv1a(&key)
}

fn rows_equal(table: &Table, a: usize, b: usize) -> bool {
    table.columns().iter().all(|c| c.data.cells_equal(a, b))
}

// ─── Duplicate scan ─────────────────────────────────────────────────────────

/// Result of scanning a table for exact duplicate rows.
#[derive(Debug, Clone)]
pub struct DuplicateScan {
    /// Bit `i` is set if row `i` repeats an earlier row.
    pub duplicates: BitMask,
    pub total_rows: usize,
    pub duplicate_count: usize,
}

impl DuplicateScan {
    pub fn is_duplicate(&self, row: usize) -> bool {
        self.duplicates.get(row)
    }

    /// Flags for [`Table::retain_rows`]: `true` for rows to keep.
    pub fn keep_flags(&self) -> Vec<bool> {
        (0..self.total_rows).map(|i| !self.is_duplicate(i)).collect()
    }
}

/// Find rows that exactly repeat an earlier row. The first occurrence in
/// ingestion order is never flagged.
pub fn scan_duplicates(table: &Table) -> DuplicateScan {
    let row_count = table.row_count();

    // Phase 1: fingerprint rows in parallel. The table is read-only here.
    let fingerprints: Vec<u64> = (0..row_count)
        .into_par_iter()
        .map(|i| row_fingerprint(table, i))
        .collect();

    // Phase 2: sequential, so the first-seen row of each group is kept.
    let mut duplicates = BitMask::new(row_count);
    let mut seen: HashMap<u64, Vec<usize>> = HashMap::with_capacity(row_count);

    for (i, fp) in fingerprints.iter().enumerate() {
        let bucket = seen.entry(*fp).or_default();
        let earlier = bucket.iter().copied().find(|&j| rows_equal(table, i, j));
        match earlier {
            Some(_) => duplicates.set(i),
            None => bucket.push(i),
        }
    }

    let duplicate_count = duplicates.count_ones();
    DuplicateScan {
        duplicates,
        total_rows: row_count,
        duplicate_count,
    }
}

// ─── Log & snapshots ────────────────────────────────────────────────────────

/// One cleaning stage and what it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub step: String,
    pub result: String,
}

/// Ordered record of the cleaning stages, one entry per stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CleaningLog {
    entries: Vec<LogEntry>,
}

impl CleaningLog {
    fn record(&mut self, step: &str, result: String) {
        debug!(step, %result, "cleaning stage complete");
        self.entries.push(LogEntry {
            step: step.to_string(),
            result,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Description recorded for a stage.
    pub fn get(&self, step: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.step == step)
            .map(|e| e.result.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Missing-entry count per column at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MissingSnapshot {
    counts: Vec<(String, usize)>,
}

impl MissingSnapshot {
    pub fn capture(table: &Table) -> Self {
        Self {
            counts: table
                .columns()
                .iter()
                .map(|c| (c.name.clone(), c.data.missing_count()))
                .collect(),
        }
    }

    pub fn counts(&self) -> &[(String, usize)] {
        &self.counts
    }

    pub fn get(&self, column: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, n)| *n)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }

    pub fn is_all_zero(&self) -> bool {
        self.total() == 0
    }

    /// Only the columns whose count is above zero.
    pub fn nonzero(&self) -> Vec<(String, usize)> {
        self.counts.iter().filter(|(_, n)| *n > 0).cloned().collect()
    }
}

// ─── Stages ─────────────────────────────────────────────────────────────────

/// Strip leading and trailing whitespace from every column name.
pub fn strip_column_names(table: &mut Table) {
    for column in table.columns_mut() {
        let trimmed = column.name.trim();
        if trimmed.len() != column.name.len() {
            column.name = trimmed.to_string();
        }
    }
}

/// Drop exact duplicate rows, keeping the first. Returns the number removed.
pub fn remove_duplicates(table: &mut Table) -> usize {
    let scan = scan_duplicates(table);
    if scan.duplicate_count > 0 {
        table.retain_rows(&scan.keep_flags());
    }
    scan.duplicate_count
}

/// Fill missing entries: numeric columns with their median, categorical
/// columns with their mode. Returns the number of entries filled.
pub fn impute_missing(table: &mut Table) -> Result<usize> {
    let mut filled = 0;

    for column in table.columns_mut() {
        let missing = column.data.missing_count();
        if missing == 0 {
            continue;
        }

        match &mut column.data {
            ColumnData::Numeric(values) => {
                let fill = stats::median(values).ok_or_else(|| DashboardError::Imputation {
                    column: column.name.clone(),
                })?;
                debug!(column = %column.name, fill, missing, "imputing median");
                for value in values.iter_mut().filter(|v| v.is_none()) {
                    *value = Some(fill);
                }
            }
            ColumnData::Categorical(values) => {
                let fill = stats::mode(values)
                    .map(str::to_string)
                    .ok_or_else(|| DashboardError::Imputation {
                        column: column.name.clone(),
                    })?;
                debug!(column = %column.name, %fill, missing, "imputing mode");
                for value in values.iter_mut().filter(|v| v.is_none()) {
                    *value = Some(fill.clone());
                }
            }
        }

        filled += missing;
    }

    Ok(filled)
}

// ─── Pipeline ───────────────────────────────────────────────────────────────

/// The cleaned table plus everything recorded while cleaning it.
#[derive(Debug, Clone)]
pub struct CleanedData {
    pub table: Table,
    pub log: CleaningLog,
    /// Missing counts after duplicate removal, before imputation
    pub missing_before: MissingSnapshot,
    /// Missing counts after imputation; all zero
    pub missing_after: MissingSnapshot,
    pub duplicates_removed: usize,
    pub values_filled: usize,
}

/// Run every cleaning stage in order. An [`DashboardError::Imputation`]
/// stops the pipeline; no partially cleaned table is returned.
pub fn clean(mut table: Table) -> Result<CleanedData> {
    let mut log = CleaningLog::default();

    strip_column_names(&mut table);
    log.record(
        STEP_COLUMN_NAMES,
        "Whitespace stripped from column names".to_string(),
    );

    let rows_before = table.row_count();
    let duplicates_removed = remove_duplicates(&mut table);
    debug_assert_eq!(rows_before - table.row_count(), duplicates_removed);
    info!(
        removed = duplicates_removed,
        rows = table.row_count(),
        "dropped duplicate rows"
    );
    log.record(
        STEP_DUPLICATES,
        format!("{} duplicate rows removed", duplicates_removed),
    );

    let missing_before = MissingSnapshot::capture(&table);
    let values_filled = impute_missing(&mut table)?;
    let missing_after = MissingSnapshot::capture(&table);
    debug_assert!(missing_after.is_all_zero());
    info!(filled = values_filled, "imputed missing values");
    log.record(
        STEP_MISSING,
        format!("{} missing values filled using median/mode", values_filled),
    );

    Ok(CleanedData {
        table,
        log,
        missing_before,
        missing_after,
        duplicates_removed,
        values_filled,
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn example_table() -> Table {
        Table::from_columns(vec![
            Column::new("A", ColumnData::Numeric(vec![Some(1.0), Some(1.0), Some(2.0)])),
            Column::new("B", ColumnData::Categorical(vec![s("x"), s("x"), None])),
        ])
        .unwrap()
    }

    #[test]
    fn test_bitmask_basic() {
        let mut bm = BitMask::new(128);
        assert!(!bm.get(0));
        assert!(!bm.get(127));

        bm.set(0);
        bm.set(63);
        bm.set(64);
        bm.set(127);

        assert!(bm.get(0));
        assert!(bm.get(63));
        assert!(bm.get(64));
        assert!(bm.get(127));
        assert!(!bm.get(1));
        assert_eq!(bm.count_ones(), 4);
        assert!(!bm.get(500));
    }

    #[test]
    fn test_fingerprint_ignores_negative_zero() {
        let table = Table::from_columns(vec![Column::new(
            "x",
            ColumnData::Numeric(vec![Some(0.0), Some(-0.0)]),
        )])
        .unwrap();
        assert_eq!(row_fingerprint(&table, 0), row_fingerprint(&table, 1));
        assert_eq!(scan_duplicates(&table).duplicate_count, 1);
    }

    #[test]
    fn test_missing_cells_match_each_other() {
        let table = Table::from_columns(vec![
            Column::new("a", ColumnData::Numeric(vec![None, None, Some(1.0)])),
            Column::new("b", ColumnData::Categorical(vec![None, None, None])),
        ])
        .unwrap();
        let scan = scan_duplicates(&table);
        assert!(scan.is_duplicate(1));
        assert!(!scan.is_duplicate(2));
    }

    #[test]
    fn test_missing_is_not_an_empty_string() {
        let table = Table::from_columns(vec![Column::new(
            "b",
            ColumnData::Categorical(vec![None, s("")]),
        )])
        .unwrap();
        assert_eq!(scan_duplicates(&table).duplicate_count, 0);
    }

    #[test]
    fn test_strip_column_names() {
        let mut table = Table::from_columns(vec![
            Column::new(" Grade ", ColumnData::Numeric(vec![Some(1.0)])),
            Column::new("Name", ColumnData::Categorical(vec![s("a")])),
        ])
        .unwrap();
        strip_column_names(&mut table);
        assert_eq!(table.column_names(), vec!["Grade", "Name"]);
    }

    #[test]
    fn test_example_pipeline() {
        let cleaned = clean(example_table()).unwrap();

        assert_eq!(cleaned.table.row_count(), 2);
        assert_eq!(cleaned.duplicates_removed, 1);
        assert_eq!(
            cleaned.log.get(STEP_DUPLICATES),
            Some("1 duplicate rows removed")
        );
        assert_eq!(
            cleaned.table.column("B").unwrap().data,
            ColumnData::Categorical(vec![s("x"), s("x")])
        );
        assert_eq!(cleaned.missing_before.get("B"), Some(1));
        assert_eq!(cleaned.missing_after.get("B"), Some(0));
        assert_eq!(
            cleaned.log.get(STEP_MISSING),
            Some("1 missing values filled using median/mode")
        );
    }

    #[test]
    fn test_numeric_median_imputation() {
        let table = Table::from_columns(vec![Column::new(
            "n",
            ColumnData::Numeric(vec![Some(1.0), Some(2.0), None, Some(4.0)]),
        )])
        .unwrap();
        let cleaned = clean(table).unwrap();
        assert_eq!(
            cleaned.table.column("n").unwrap().data,
            ColumnData::Numeric(vec![Some(1.0), Some(2.0), Some(2.0), Some(4.0)])
        );
    }

    #[test]
    fn test_median_is_taken_after_duplicate_removal() {
        // With the duplicate 10s the median would be 10; without them it is 5.5
        let table = Table::from_columns(vec![
            Column::new("id", ColumnData::Categorical(vec![s("a"), s("a"), s("a"), s("b"), s("c")])),
            Column::new(
                "n",
                ColumnData::Numeric(vec![Some(10.0), Some(10.0), Some(10.0), Some(1.0), None]),
            ),
        ])
        .unwrap();
        let cleaned = clean(table).unwrap();
        assert_eq!(cleaned.duplicates_removed, 2);
        assert_eq!(
            cleaned.table.column("n").unwrap().data,
            ColumnData::Numeric(vec![Some(10.0), Some(1.0), Some(5.5)])
        );
    }

    #[test]
    fn test_log_has_one_entry_per_stage_in_order() {
        let cleaned = clean(example_table()).unwrap();
        let steps: Vec<&str> = cleaned.log.entries().iter().map(|e| e.step.as_str()).collect();
        assert_eq!(steps, vec![STEP_COLUMN_NAMES, STEP_DUPLICATES, STEP_MISSING]);
        assert_eq!(
            cleaned.log.get(STEP_COLUMN_NAMES),
            Some("Whitespace stripped from column names")
        );
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let once = clean(example_table()).unwrap();
        let twice = clean(once.table.clone()).unwrap();

        assert_eq!(twice.duplicates_removed, 0);
        assert_eq!(twice.values_filled, 0);
        assert_eq!(twice.table, once.table);
        assert_eq!(twice.log.len(), 3);
        assert_eq!(twice.log.get(STEP_DUPLICATES), Some("0 duplicate rows removed"));
        assert_eq!(
            twice.log.get(STEP_MISSING),
            Some("0 missing values filled using median/mode")
        );
    }

    #[test]
    fn test_cleaning_is_idempotent_on_messy_table() {
        let csv = b" Score ,Name\t,Group\n1,a,x\n1,a,x\n,b,y\n4,b,z\n,b,y\n9,,x\n4,b,z\n";
        let once = clean(Table::from_csv_bytes(csv, b',').unwrap()).unwrap();
        assert_eq!(once.table.column_names(), vec!["Score", "Name", "Group"]);
        assert_eq!(once.duplicates_removed, 3);
        assert_eq!(once.values_filled, 2);
        assert!(once.missing_after.is_all_zero());

        let twice = clean(once.table.clone()).unwrap();
        assert_eq!(twice.duplicates_removed, 0);
        assert_eq!(twice.values_filled, 0);
        assert_eq!(twice.table, once.table);
    }

    #[test]
    fn test_nan_spelled_cells_are_cleaned_as_categories() {
        let table = Table::from_csv_bytes(b"n,g\n1,a\nNAN,b\nNAN,b\n,c\n", b',').unwrap();
        let cleaned = clean(table).unwrap();

        assert_eq!(cleaned.duplicates_removed, 1);
        assert_eq!(cleaned.values_filled, 1);
        assert!(cleaned.missing_after.is_all_zero());
        assert_eq!(
            cleaned.table.column("n").unwrap().data,
            ColumnData::Categorical(vec![s("1"), s("NAN"), s("1")])
        );
    }

    #[test]
    fn test_entirely_missing_column_fails() {
        let table = Table::from_columns(vec![
            Column::new("ok", ColumnData::Numeric(vec![Some(1.0), Some(2.0)])),
            Column::new("empty", ColumnData::Categorical(vec![None, None])),
        ])
        .unwrap();
        match clean(table) {
            Err(DashboardError::Imputation { column }) => assert_eq!(column, "empty"),
            other => panic!("Expected ImputationError, got {:?}", other.map(|c| c.log)),
        }
    }

    #[test]
    fn test_removed_count_matches_row_difference() {
        let table = Table::from_csv_bytes(b"a,b\n1,x\n1,x\n1,x\n2,x\n2,y\n", b',').unwrap();
        let before = table.row_count();
        let cleaned = clean(table).unwrap();
        assert_eq!(before - cleaned.table.row_count(), cleaned.duplicates_removed);
        assert_eq!(cleaned.duplicates_removed, 2);
    }

    #[test]
    fn test_snapshot_nonzero_filter() {
        let cleaned = clean(example_table()).unwrap();
        assert_eq!(cleaned.missing_before.nonzero(), vec![("B".to_string(), 1)]);
        assert!(cleaned.missing_after.nonzero().is_empty());
        assert!(cleaned.missing_after.is_all_zero());
    }
}
