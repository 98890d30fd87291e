//! Cohort - Descriptive statistics
//!
//! Median, mode, quartiles, Pearson correlation and grouped means over
//! table columns. Missing entries are skipped everywhere.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::data::{format_number, Column, ColumnData, ColumnKind, Table};

/// Median of the present values, interpolating between the two middle
/// values for even counts. `None` when nothing is present.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    quantile(&sorted_present(values), 0.5)
}

/// Most frequent present value. Ties go to the smallest value in lexical
/// order. `None` when nothing is present.
pub fn mode(values: &[Option<String>]) -> Option<&str> {
    frequencies(values)
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
        .map(|(value, _)| value)
}

fn frequencies(values: &[Option<String>]) -> HashMap<&str, usize> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.iter().flatten() {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Linear-interpolated quantile of already sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn sorted_present(values: &[Option<f64>]) -> Vec<f64> {
    let mut present: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|x| !x.is_nan())
        .collect();
    present.sort_by(|a, b| a.total_cmp(b));
    present
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1).
fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

// ─── describe ───────────────────────────────────────────────────────────────

/// Per-column summary, matching a describe-everything table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnSummary {
    Numeric {
        count: usize,
        mean: Option<f64>,
        std: Option<f64>,
        min: Option<f64>,
        q1: Option<f64>,
        median: Option<f64>,
        q3: Option<f64>,
        max: Option<f64>,
    },
    Categorical {
        count: usize,
        unique: usize,
        top: Option<String>,
        freq: usize,
    },
}

/// Summary of one named column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescribedColumn {
    pub name: String,
    #[serde(flatten)]
    pub summary: ColumnSummary,
}

/// Row labels for a describe table, in display order.
pub const DESCRIBE_ROWS: [&str; 11] = [
    "count", "unique", "top", "freq", "mean", "std", "min", "25%", "50%", "75%", "max",
];

impl DescribedColumn {
    /// Cell text for one of [`DESCRIBE_ROWS`]; `NaN` where the statistic
    /// does not apply to the column's kind.
    pub fn cell(&self, row: &str) -> String {
        let num = |v: &Option<f64>| v.map(format_number).unwrap_or_else(|| "NaN".into());
        match (&self.summary, row) {
            (ColumnSummary::Numeric { count, .. }, "count") => count.to_string(),
            (ColumnSummary::Numeric { mean, .. }, "mean") => num(mean),
            (ColumnSummary::Numeric { std, .. }, "std") => num(std),
            (ColumnSummary::Numeric { min, .. }, "min") => num(min),
            (ColumnSummary::Numeric { q1, .. }, "25%") => num(q1),
            (ColumnSummary::Numeric { median, .. }, "50%") => num(median),
            (ColumnSummary::Numeric { q3, .. }, "75%") => num(q3),
            (ColumnSummary::Numeric { max, .. }, "max") => num(max),
            (ColumnSummary::Categorical { count, .. }, "count") => count.to_string(),
            (ColumnSummary::Categorical { unique, .. }, "unique") => unique.to_string(),
            (ColumnSummary::Categorical { top, .. }, "top") => {
                top.clone().unwrap_or_else(|| "NaN".into())
            }
            (ColumnSummary::Categorical { freq, .. }, "freq") => freq.to_string(),
            _ => "NaN".into(),
        }
    }
}

/// Summarize every column of the table.
pub fn describe(table: &Table) -> Vec<DescribedColumn> {
    table.columns().iter().map(describe_column).collect()
}

fn describe_column(column: &Column) -> DescribedColumn {
    let summary = match &column.data {
        ColumnData::Numeric(values) => {
            let sorted = sorted_present(values);
            ColumnSummary::Numeric {
                count: sorted.len(),
                mean: mean(&sorted),
                std: std_dev(&sorted),
                min: sorted.first().copied(),
                q1: quantile(&sorted, 0.25),
                median: quantile(&sorted, 0.5),
                q3: quantile(&sorted, 0.75),
                max: sorted.last().copied(),
            }
        }
        ColumnData::Categorical(values) => {
            let counts = frequencies(values);
            let top = mode(values).map(str::to_string);
            let freq = top
                .as_deref()
                .and_then(|t| counts.get(t).copied())
                .unwrap_or(0);
            ColumnSummary::Categorical {
                count: values.iter().flatten().count(),
                unique: counts.len(),
                top,
                freq,
            }
        }
    };
    DescribedColumn {
        name: column.name.clone(),
        summary,
    }
}

// ─── Correlation ────────────────────────────────────────────────────────────

/// Square matrix of Pearson coefficients. `None` cells are undefined
/// (too few pairs or a constant column).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Pearson matrix over named series, using pairwise-complete rows.
    pub fn from_series(series: Vec<(String, Vec<Option<f64>>)>) -> Self {
        let values = series
            .iter()
            .map(|(_, a)| series.iter().map(|(_, b)| pearson(a, b)).collect())
            .collect();
        Self {
            columns: series.into_iter().map(|(name, _)| name).collect(),
            values,
        }
    }

    /// Correlation of every numeric column in the table.
    pub fn numeric(table: &Table) -> Self {
        let series = table
            .numeric_columns()
            .map(|c| (c.name.clone(), c.data.coerce_numeric()))
            .collect();
        Self::from_series(series)
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Pearson correlation over rows where both sides are present.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

// ─── Encoding & grouping ────────────────────────────────────────────────────

/// Integer codes for a column's distinct values, numbered in first-seen
/// order from 0. Missing entries get -1.
pub fn category_codes(data: &ColumnData) -> Vec<i64> {
    let keys = group_keys(data);
    let mut codes: HashMap<&str, i64> = HashMap::new();
    keys.iter()
        .map(|key| match key {
            Some(k) => {
                let next = codes.len() as i64;
                *codes.entry(k.as_str()).or_insert(next)
            }
            None => -1,
        })
        .collect()
}

/// Display value of every row, used as a grouping key.
pub fn group_keys(data: &ColumnData) -> Vec<Option<String>> {
    match data {
        ColumnData::Numeric(v) => v.iter().map(|x| x.map(format_number)).collect(),
        ColumnData::Categorical(v) => v.clone(),
    }
}

/// Distinct group keys in first-seen order.
pub fn distinct_keys(data: &ColumnData) -> Vec<String> {
    let mut seen = HashSet::new();
    group_keys(data)
        .into_iter()
        .flatten()
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Distinct group keys, sorted numerically for numeric columns and
/// lexically otherwise.
pub fn sorted_groups(data: &ColumnData) -> Vec<String> {
    let mut distinct = distinct_keys(data);
    match data.kind() {
        ColumnKind::Numeric => distinct.sort_by(|a, b| {
            let x = a.parse::<f64>().unwrap_or(f64::NAN);
            let y = b.parse::<f64>().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }),
        ColumnKind::Categorical => distinct.sort(),
    }
    distinct
}

/// Mean of each metric within each group of `by`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedMeans {
    pub group_column: String,
    pub metrics: Vec<String>,
    /// `(group key, mean per metric)` in sorted key order
    pub groups: Vec<(String, Vec<Option<f64>>)>,
}

impl GroupedMeans {
    pub fn compute(by: &Column, metrics: &[(String, Vec<Option<f64>>)]) -> Self {
        let keys = group_keys(&by.data);
        let groups = sorted_groups(&by.data)
            .into_iter()
            .map(|group| {
                let means = metrics
                    .iter()
                    .map(|(_, values)| {
                        let in_group: Vec<f64> = keys
                            .iter()
                            .zip(values)
                            .filter(|(k, _)| k.as_deref() == Some(group.as_str()))
                            .filter_map(|(_, v)| *v)
                            .collect();
                        mean(&in_group)
                    })
                    .collect();
                (group, means)
            })
            .collect();

        Self {
            group_column: by.name.clone(),
            metrics: metrics.iter().map(|(name, _)| name.clone()).collect(),
            groups,
        }
    }
}

/// Five-number summary for a box plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    pub count: usize,
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: usize,
}

impl BoxStats {
    /// Quartiles plus whiskers at the most extreme points within 1.5 IQR.
    pub fn compute(values: &[Option<f64>]) -> Option<Self> {
        let mut sorted = sorted_present(values);
        sorted.retain(|x| x.is_finite());
        let q1 = quantile(&sorted, 0.25)?;
        let median = quantile(&sorted, 0.5)?;
        let q3 = quantile(&sorted, 0.75)?;
        let iqr = q3 - q1;
        let (lo_fence, hi_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

        let inside: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|x| *x >= lo_fence && *x <= hi_fence)
            .collect();

        Some(Self {
            count: sorted.len(),
            lower_whisker: inside.first().copied().unwrap_or(q1),
            q1,
            median,
            q3,
            upper_whisker: inside.last().copied().unwrap_or(q3),
            outliers: sorted.len() - inside.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[Some(1.0), Some(2.0), None, Some(4.0)]), Some(2.0));
        assert_eq!(median(&[Some(4.0), Some(1.0), Some(3.0), Some(2.0)]), Some(2.5));
        assert_eq!(median(&[None, None]), None);
    }

    #[test]
    fn test_mode_prefers_lexically_smallest_on_tie() {
        let values = vec![s("b"), s("a"), s("b"), s("a"), None, s("c")];
        assert_eq!(mode(&values), Some("a"));
        let values = vec![s("x"), s("y"), s("y")];
        assert_eq!(mode(&values), Some("y"));
        assert_eq!(mode(&[None]), None);
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&sorted, 0.75), Some(3.25));
    }

    #[test]
    fn test_pearson() {
        let a = [Some(1.0), Some(2.0), Some(3.0)];
        let b = [Some(2.0), Some(4.0), Some(6.0)];
        let c = [Some(3.0), Some(2.0), Some(1.0)];
        assert!((pearson(&a, &b).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&a, &c).unwrap() + 1.0).abs() < 1e-12);
        // Constant series has no defined correlation
        assert_eq!(pearson(&a, &[Some(1.0), Some(1.0), Some(1.0)]), None);
    }

    #[test]
    fn test_pearson_skips_incomplete_pairs() {
        let a = [Some(1.0), None, Some(2.0), Some(3.0)];
        let b = [Some(1.0), Some(100.0), Some(2.0), Some(3.0)];
        assert!((pearson(&a, &b).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_category_codes_first_seen() {
        let data = ColumnData::Categorical(vec![s("High"), s("Low"), None, s("High"), s("Medium")]);
        assert_eq!(category_codes(&data), vec![0, 1, -1, 0, 2]);
    }

    #[test]
    fn test_grouped_means_sorted_numeric_keys() {
        let by = Column::new(
            "Stress",
            ColumnData::Numeric(vec![Some(10.0), Some(2.0), Some(10.0)]),
        );
        let metrics = vec![("Grade".to_string(), vec![Some(50.0), Some(90.0), Some(70.0)])];
        let grouped = GroupedMeans::compute(&by, &metrics);
        assert_eq!(
            grouped.groups,
            vec![
                ("2".to_string(), vec![Some(90.0)]),
                ("10".to_string(), vec![Some(60.0)]),
            ]
        );
    }

    #[test]
    fn test_describe_kinds() {
        let table = Table::from_columns(vec![
            Column::new("n", ColumnData::Numeric(vec![Some(1.0), Some(3.0)])),
            Column::new("c", ColumnData::Categorical(vec![s("x"), s("x")])),
        ])
        .unwrap();
        let summary = describe(&table);
        assert_eq!(summary[0].cell("mean"), "2");
        assert_eq!(summary[0].cell("top"), "NaN");
        assert_eq!(summary[1].cell("top"), "x");
        assert_eq!(summary[1].cell("freq"), "2");
        assert_eq!(summary[1].cell("unique"), "1");
    }

    #[test]
    fn test_box_stats_outliers() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0, 100.0].iter().map(|x| Some(*x)).collect();
        let stats = BoxStats::compute(&values).unwrap();
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.outliers, 1);
        assert_eq!(stats.upper_whisker, 4.0);
    }

    #[test]
    fn test_box_stats_skip_nan() {
        let stats = BoxStats::compute(&[Some(1.0), Some(5.0), Some(f64::NAN), None]).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.q3, 4.0);
        assert_eq!(stats.upper_whisker, 5.0);
        assert!(BoxStats::compute(&[Some(f64::NAN)]).is_none());
        assert_eq!(median(&[Some(1.0), Some(f64::NAN), Some(3.0)]), Some(2.0));
    }
}
