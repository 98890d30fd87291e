//! Cohort - CSV ingestion and the in-memory table
//!
//! Uploads are memory-mapped (or buffered from stdin) and parsed once into a
//! column-oriented [`Table`]. Each column's kind is decided here and carried
//! as a tagged variant for the rest of the session.

use memmap2::Mmap;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{DashboardError, Result};

/// Cell contents treated as missing, on top of the empty cell.
const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Whether a column holds numbers or free-form categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Column values, tagged by kind. `None` is a missing entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnData {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Categorical(_) => ColumnKind::Categorical,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn missing_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Categorical(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Whether two rows of this column hold the same value. Two missing
    /// entries compare equal.
    pub fn cells_equal(&self, a: usize, b: usize) -> bool {
        match self {
            ColumnData::Numeric(v) => v[a] == v[b],
            ColumnData::Categorical(v) => v[a] == v[b],
        }
    }

    /// Append a canonical byte encoding of one cell, used for row hashing.
    pub fn write_key(&self, row: usize, out: &mut Vec<u8>) {
        match self {
            ColumnData::Numeric(v) => match v[row] {
                // `+ 0.0` folds -0.0 into 0.0 so equal values hash equally
                Some(x) => {
                    out.push(1);
                    out.extend_from_slice(&(x + 0.0).to_bits().to_le_bytes());
                }
                None => out.push(0),
            },
            ColumnData::Categorical(v) => match &v[row] {
                Some(s) => {
                    out.push(2);
                    out.extend_from_slice(&(s.len() as u64).to_le_bytes());
                    out.extend_from_slice(s.as_bytes());
                }
                None => out.push(0),
            },
        }
    }

    /// Display string for one cell.
    pub fn display(&self, row: usize) -> String {
        match self {
            ColumnData::Numeric(v) => v[row].map(format_number).unwrap_or_else(|| "NaN".into()),
            ColumnData::Categorical(v) => v[row].clone().unwrap_or_else(|| "NaN".into()),
        }
    }

    /// Numeric view of the column. Categorical cells that parse as numbers
    /// are kept, everything else becomes missing.
    pub fn coerce_numeric(&self) -> Vec<Option<f64>> {
        match self {
            ColumnData::Numeric(v) => v.clone(),
            ColumnData::Categorical(v) => v
                .iter()
                .map(|cell| cell.as_deref().and_then(parse_number))
                .collect(),
        }
    }

    fn retain(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        match self {
            ColumnData::Numeric(v) => v.retain(|_| *flags.next().unwrap_or(&true)),
            ColumnData::Categorical(v) => v.retain(|_| *flags.next().unwrap_or(&true)),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }
}

/// Row-by-column dataset produced by ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
    /// Where the data came from, for display
    pub source: String,
    /// Upload size in bytes
    pub size: u64,
}

impl Table {
    /// Build a table from already-typed columns. All columns must have the
    /// same length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map(|c| c.data.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.data.len() != row_count) {
            return Err(DashboardError::parse(format!(
                "column '{}' has {} rows, expected {}",
                bad.name,
                bad.data.len(),
                row_count
            )));
        }
        Ok(Self {
            columns,
            row_count,
            source: "<memory>".to_string(),
            size: 0,
        })
    }

    /// Memory-map a CSV file and parse it.
    pub fn open<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)?;
        let size = file.metadata()?.len();

        if size == 0 {
            return Err(DashboardError::parse("No columns to parse from file"));
        }

        let mmap = unsafe { Mmap::map(&file)? };

        let mut table = Self::from_csv_bytes(&mmap, delimiter)?;
        table.source = path_ref.display().to_string();
        table.size = size;
        Ok(table)
    }

    /// Read a CSV upload from stdin: `cat students.csv | cohort -`
    pub fn from_stdin(delimiter: u8) -> Result<Self> {
        let mut buffer = Vec::new();
        io::stdin().lock().read_to_end(&mut buffer)?;

        let mut table = Self::from_csv_bytes(&buffer, delimiter)?;
        table.source = "<stdin>".to_string();
        table.size = buffer.len() as u64;
        Ok(table)
    }

    /// Parse CSV bytes. The header row names the columns; cell contents
    /// decide each column's kind.
    pub fn from_csv_bytes(bytes: &[u8], delimiter: u8) -> Result<Self> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(DashboardError::parse("No columns to parse from file"));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(bytes);

        let names = unique_header_names(reader.headers()?.iter());
        let width = names.len();
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width];

        for result in reader.records() {
            let record = result?;
            if record.len() > width {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                return Err(DashboardError::parse(format!(
                    "Expected {} fields in line {}, saw {}",
                    width,
                    line,
                    record.len()
                )));
            }
            for (i, column) in cells.iter_mut().enumerate() {
                let cell = record.get(i).filter(|s| !is_na(s)).map(str::to_string);
                column.push(cell);
            }
        }

        let columns: Vec<Column> = names
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| Column::new(name, infer_column(cells)))
            .collect();

        for column in &columns {
            debug!(column = %column.name, kind = ?column.kind(), "inferred column kind");
        }

        let table = Self::from_columns(columns)?;
        info!(
            rows = table.row_count(),
            columns = table.column_count(),
            "parsed CSV upload"
        );
        Ok(table)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    /// First column with the given name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns of numeric kind, in table order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.kind() == ColumnKind::Numeric)
    }

    /// Display strings for one row.
    pub fn row(&self, index: usize) -> Option<Vec<String>> {
        if index >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| c.data.display(index)).collect())
    }

    /// Keep only rows whose flag is `true`.
    pub(crate) fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.row_count);
        for column in &mut self.columns {
            column.data.retain(keep);
        }
        self.row_count = keep.iter().filter(|k| **k).count();
    }

    /// Get formatted upload size string
    pub fn size_human(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;

        if self.size >= MB {
            format!("{:.2} MB", self.size as f64 / MB as f64)
        } else if self.size >= KB {
            format!("{:.2} KB", self.size as f64 / KB as f64)
        } else {
            format!("{} B", self.size)
        }
    }
}

/// Serialized as column names, kinds and display-formatted rows.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let kinds: Vec<ColumnKind> = self.columns.iter().map(Column::kind).collect();
        let rows: Vec<Vec<String>> = (0..self.row_count).filter_map(|i| self.row(i)).collect();

        let mut state = serializer.serialize_struct("Table", 3)?;
        state.serialize_field("columns", &self.column_names())?;
        state.serialize_field("kinds", &kinds)?;
        state.serialize_field("rows", &rows)?;
        state.end()
    }
}

/// Pick the delimiter from the file extension: tab for `.tsv`, comma otherwise.
pub fn detect_delimiter<P: AsRef<Path>>(path: P) -> u8 {
    match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

/// Parse a cell as a number, ignoring surrounding whitespace. Spellings of
/// NaN outside the NA tokens (`NAN`, `Nan`) are not numbers.
pub fn parse_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || is_na(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|x| !x.is_nan())
}

/// Render a number without a trailing `.0` for whole values.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else if value.is_finite() {
        let s = format!("{:.4}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        value.to_string()
    }
}

fn is_na(cell: &str) -> bool {
    cell.is_empty() || NA_TOKENS.contains(&cell)
}

/// Numeric iff every present cell parses as a number. A column with no
/// present cells is numeric.
fn infer_column(cells: Vec<Option<String>>) -> ColumnData {
    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(s) => parse_number(s).map(Some),
        })
        .collect();

    match parsed {
        Some(values) => ColumnData::Numeric(values),
        None => ColumnData::Categorical(cells),
    }
}

/// Rename repeated headers to `name.1`, `name.2`, ...
fn unique_header_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::new();

    for header in headers {
        let mut name = header.to_string();
        while let Some(count) = seen.get_mut(&name) {
            *count += 1;
            name = format!("{}.{}", header, count);
        }
        seen.insert(name.clone(), 0);
        names.push(name);
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_kind_inference() -> Result<()> {
        let csv = b"A,B,C\n1,x,\n2.5,y,\n,z,\n";
        let table = Table::from_csv_bytes(csv, b',')?;
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column("A").unwrap().kind(), ColumnKind::Numeric);
        assert_eq!(table.column("B").unwrap().kind(), ColumnKind::Categorical);
        // Entirely missing columns count as numeric
        assert_eq!(table.column("C").unwrap().kind(), ColumnKind::Numeric);
        assert_eq!(
            table.column("A").unwrap().data,
            ColumnData::Numeric(vec![Some(1.0), Some(2.5), None])
        );
        Ok(())
    }

    #[test]
    fn test_odd_nan_spellings_are_not_numbers() -> Result<()> {
        assert_eq!(parse_number("NAN"), None);
        assert_eq!(parse_number(" Nan "), None);
        assert_eq!(parse_number("inf"), Some(f64::INFINITY));

        let table = Table::from_csv_bytes(b"n,g\n1,a\nNAN,b\nNAN,b\n,c\n", b',')?;
        assert_eq!(
            table.column("n").unwrap().data,
            ColumnData::Categorical(vec![
                Some("1".to_string()),
                Some("NAN".to_string()),
                Some("NAN".to_string()),
                None,
            ])
        );
        Ok(())
    }

    #[test]
    fn test_na_tokens_are_missing() -> Result<()> {
        let csv = b"Score,Name\nNA,None\n3,bob\nnan,N/A\n";
        let table = Table::from_csv_bytes(csv, b',')?;
        assert_eq!(table.column("Score").unwrap().data.missing_count(), 2);
        assert_eq!(table.column("Name").unwrap().data.missing_count(), 2);
        Ok(())
    }

    #[test]
    fn test_header_whitespace_is_kept_at_ingestion() -> Result<()> {
        let table = Table::from_csv_bytes(b" Grade ,x\nA,1\n", b',')?;
        assert_eq!(table.column_names(), vec![" Grade ", "x"]);
        Ok(())
    }

    #[test]
    fn test_duplicate_headers_are_renamed() -> Result<()> {
        let table = Table::from_csv_bytes(b"a,a,a\n1,2,3\n", b',')?;
        assert_eq!(table.column_names(), vec!["a", "a.1", "a.2"]);
        Ok(())
    }

    #[test]
    fn test_short_rows_are_padded() -> Result<()> {
        let table = Table::from_csv_bytes(b"a,b\n1\n2,3\n", b',')?;
        assert_eq!(table.column("b").unwrap().data.missing_count(), 1);
        Ok(())
    }

    #[test]
    fn test_long_rows_are_a_parse_error() {
        let err = Table::from_csv_bytes(b"a,b\n1,2,3\n", b',').unwrap_err();
        assert!(matches!(err, DashboardError::Parse { .. }));
    }

    #[test]
    fn test_empty_upload_is_a_parse_error() {
        let err = Table::from_csv_bytes(b"", b',').unwrap_err();
        assert!(matches!(err, DashboardError::Parse { .. }));
    }

    #[test]
    fn test_invalid_utf8_is_a_parse_error() {
        let err = Table::from_csv_bytes(b"a,b\n\xff\xfe,1\n", b',').unwrap_err();
        assert!(matches!(err, DashboardError::Parse { .. }));
    }

    #[test]
    fn test_open_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "Gender\tFinal_Grade")?;
        writeln!(file, "Female\t88")?;
        writeln!(file, "Male\t71")?;

        let table = Table::open(file.path(), b'\t')?;
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.row(1).unwrap(), vec!["Male", "71"]);
        assert!(table.size > 0);
        Ok(())
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("students.csv"), b',');
        assert_eq!(detect_delimiter("students.TSV"), b'\t');
        assert_eq!(detect_delimiter("students"), b',');
    }

    #[test]
    fn test_coerce_numeric() {
        let data = ColumnData::Categorical(vec![Some("4".into()), Some("high".into()), None]);
        assert_eq!(data.coerce_numeric(), vec![Some(4.0), None, None]);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1.0 / 3.0), "0.3333");
    }
}
