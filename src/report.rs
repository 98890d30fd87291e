//! Cohort - Headless reports
//!
//! Prints one view to a writer, as aligned plain text or as JSON, without
//! starting the terminal UI.

use std::io::{self, Write};

use crate::data::format_number;
use crate::engine::CleanedData;
use crate::error::Result;
use crate::stats::{CorrelationMatrix, DESCRIBE_ROWS};
use crate::views::{self, RenderInstruction, ViewMode, VisualizationPlan};

/// Render `mode` and write it to `out`.
pub fn write_report<W: Write>(
    cleaned: &CleanedData,
    mode: ViewMode,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let instruction = views::select(cleaned, mode)?;
    if json {
        serde_json::to_writer_pretty(&mut *out, &instruction).map_err(io::Error::from)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", render_text(&instruction))?;
    }
    Ok(())
}

/// Plain-text rendering of a view.
pub fn render_text(instruction: &RenderInstruction<'_>) -> String {
    let mut out = String::new();
    match instruction {
        RenderInstruction::Data { table, summary } => {
            section(&mut out, "Raw Dataset Preview");
            let headers: Vec<String> = table.column_names().iter().map(|s| s.to_string()).collect();
            let rows: Vec<Vec<String>> = (0..table.row_count()).filter_map(|i| table.row(i)).collect();
            out.push_str(&grid(&headers, &rows));

            section(&mut out, "Summary Statistics");
            let mut headers = vec![String::new()];
            headers.extend(summary.iter().map(|c| c.name.clone()));
            let rows: Vec<Vec<String>> = DESCRIBE_ROWS
                .iter()
                .map(|stat| {
                    let mut row = vec![stat.to_string()];
                    row.extend(summary.iter().map(|c| c.cell(stat)));
                    row
                })
                .collect();
            out.push_str(&grid(&headers, &rows));
        }
        RenderInstruction::Cleaning {
            log,
            missing_before,
            missing_after,
        } => {
            section(&mut out, "Data Cleaning Summary");
            for entry in log.entries() {
                out.push_str(&format!("[x] {}: {}\n", entry.step, entry.result));
            }

            section(&mut out, "Missing Values (Before & After Cleaning)");
            let headers = vec!["column".to_string(), "before".to_string(), "after".to_string()];
            let rows: Vec<Vec<String>> = missing_before
                .iter()
                .zip(missing_after)
                .map(|((name, before), (_, after))| {
                    vec![name.clone(), before.to_string(), after.to_string()]
                })
                .collect();
            if rows.is_empty() {
                out.push_str("No missing values found.\n");
            } else {
                out.push_str(&grid(&headers, &rows));
            }
        }
        RenderInstruction::Summary {
            correlation,
            missing_after,
        } => {
            section(&mut out, "Correlation Matrix (Numerical)");
            out.push_str(&matrix_text(correlation));

            section(&mut out, "Missing Values (After Cleaning)");
            let rows: Vec<Vec<String>> = missing_after
                .counts()
                .iter()
                .map(|(name, n)| vec![name.clone(), n.to_string()])
                .collect();
            out.push_str(&grid(&["column".to_string(), "missing".to_string()], &rows));
        }
        RenderInstruction::Visuals(plan) => visuals_text(&mut out, plan),
    }
    out
}

fn visuals_text(out: &mut String, plan: &VisualizationPlan) {
    for scatter in &plan.scatter {
        section(out, &scatter.title);
        for series in &scatter.series {
            out.push_str(&format!(
                "{} = {}: {} points\n",
                scatter.hue_column,
                series.label,
                series.points.len()
            ));
        }
    }

    for plot in &plan.boxes {
        section(out, &plot.title);
        let headers: Vec<String> = ["group", "n", "low", "q1", "median", "q3", "high", "outliers"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows: Vec<Vec<String>> = plot
            .groups
            .iter()
            .map(|(group, b)| {
                vec![
                    group.clone(),
                    b.count.to_string(),
                    format_number(b.lower_whisker),
                    format_number(b.q1),
                    format_number(b.median),
                    format_number(b.q3),
                    format_number(b.upper_whisker),
                    b.outliers.to_string(),
                ]
            })
            .collect();
        out.push_str(&grid(&headers, &rows));
    }

    let means = &plan.stress_bars.means;
    section(out, &plan.stress_bars.title);
    let mut headers = vec![means.group_column.clone()];
    headers.extend(means.metrics.iter().cloned());
    let rows: Vec<Vec<String>> = means
        .groups
        .iter()
        .map(|(group, values)| {
            let mut row = vec![group.clone()];
            row.extend(values.iter().map(|v| v.map(format_number).unwrap_or_else(|| "NaN".into())));
            row
        })
        .collect();
    out.push_str(&grid(&headers, &rows));

    section(out, &plan.stress_heatmap.title);
    out.push_str(&matrix_text(&plan.stress_heatmap.matrix));
}

fn matrix_text(matrix: &CorrelationMatrix) -> String {
    if matrix.is_empty() {
        return "No numeric columns.\n".to_string();
    }
    let mut headers = vec![String::new()];
    headers.extend(matrix.columns.iter().cloned());
    let rows: Vec<Vec<String>> = matrix
        .columns
        .iter()
        .zip(&matrix.values)
        .map(|(name, values)| {
            let mut row = vec![name.clone()];
            row.extend(values.iter().map(|v| v.map(|r| format!("{:.2}", r)).unwrap_or_default()));
            row
        })
        .collect();
    grid(&headers, &rows)
}

fn section(out: &mut String, title: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!("== {} ==\n", title));
}

/// Left-aligned columns separated by two spaces.
fn grid(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(headers);
    for row in rows {
        out.push_str(&line(row));
    }
    out
}
