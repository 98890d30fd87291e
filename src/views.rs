//! Cohort - View selection
//!
//! Maps one of the four dashboard views to the data its renderer needs.
//! Selection is a pure function of the cleaned data; nothing here mutates
//! the table, and derived structures are rebuilt on every call.

use serde::Serialize;
use tracing::debug;

use crate::data::{Column, Table};
use crate::engine::{CleanedData, CleaningLog, MissingSnapshot};
use crate::error::{DashboardError, Result};
use crate::stats::{self, BoxStats, CorrelationMatrix, DescribedColumn, GroupedMeans};

pub const STUDY_HOURS: &str = "Study_Hours_per_Week";
pub const ASSIGNMENT_COMPLETION: &str = "Assignment_Completion_Rate (%)";
pub const EXAM_SCORE: &str = "Exam_Score (%)";
pub const FINAL_GRADE: &str = "Final_Grade";
pub const GENDER: &str = "Gender";
pub const SLEEP_HOURS: &str = "Sleep_Hours_per_Night";
pub const SOCIAL_MEDIA: &str = "Time_Spent_on_Social_Media (hours/week)";
pub const STRESS_LEVEL: &str = "Self_Reported_Stress_Level";
pub const STRESS_LEVEL_ENCODED: &str = "Self_Reported_Stress_Level_Encoded";

const SCATTER_COLUMNS: [&str; 3] = [STUDY_HOURS, ASSIGNMENT_COMPLETION, EXAM_SCORE];
const LIFESTYLE_COLUMNS: [&str; 2] = [SLEEP_HOURS, SOCIAL_MEDIA];
const STRESS_FACTORS: [&str; 3] = [SLEEP_HOURS, STUDY_HOURS, FINAL_GRADE];

/// Charts on the visualization view: one per scatter and box plot, plus the
/// stress bars and the stress heatmap.
pub const PANEL_COUNT: usize = SCATTER_COLUMNS.len() + LIFESTYLE_COLUMNS.len() + 2;

/// Every column the visualization view reads, in the order they are checked.
pub const VISUALIZATION_COLUMNS: [&str; 8] = [
    STUDY_HOURS,
    ASSIGNMENT_COMPLETION,
    EXAM_SCORE,
    FINAL_GRADE,
    GENDER,
    SLEEP_HOURS,
    SOCIAL_MEDIA,
    STRESS_LEVEL,
];

/// The four dashboard views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Table preview plus describe statistics
    Data,
    /// Cleaning log and missing-value snapshots
    Cleaning,
    /// Numeric correlation matrix
    Summary,
    /// Scatter, box, bar and heatmap panels
    Visuals,
}

impl ViewMode {
    pub const ALL: [ViewMode; 4] = [
        ViewMode::Data,
        ViewMode::Cleaning,
        ViewMode::Summary,
        ViewMode::Visuals,
    ];

    pub fn toggle(&mut self) {
        *self = match self {
            ViewMode::Data => ViewMode::Cleaning,
            ViewMode::Cleaning => ViewMode::Summary,
            ViewMode::Summary => ViewMode::Visuals,
            ViewMode::Visuals => ViewMode::Data,
        };
    }

    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Data => "View Data",
            ViewMode::Cleaning => "Data Cleaning Report",
            ViewMode::Summary => "Summary & Correlations",
            ViewMode::Visuals => "Visualizations",
        }
    }

    /// Parse a view name (for the CLI).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "data" | "view" | "preview" => Some(ViewMode::Data),
            "cleaning" | "clean" | "report" => Some(ViewMode::Cleaning),
            "summary" | "correlation" | "corr" => Some(ViewMode::Summary),
            "visuals" | "visualizations" | "viz" => Some(ViewMode::Visuals),
            _ => None,
        }
    }

    /// Number key that selects this view in the TUI.
    pub fn hotkey(&self) -> char {
        match self {
            ViewMode::Data => '1',
            ViewMode::Cleaning => '2',
            ViewMode::Summary => '3',
            ViewMode::Visuals => '4',
        }
    }
}

// ─── Render instructions ────────────────────────────────────────────────────

/// Everything a renderer needs for one view.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum RenderInstruction<'a> {
    Data {
        table: &'a Table,
        summary: Vec<DescribedColumn>,
    },
    Cleaning {
        log: &'a CleaningLog,
        /// Columns that had missing entries before imputation
        missing_before: Vec<(String, usize)>,
        /// The same columns after imputation
        missing_after: Vec<(String, usize)>,
    },
    Summary {
        correlation: CorrelationMatrix,
        missing_after: &'a MissingSnapshot,
    },
    Visuals(VisualizationPlan),
}

impl RenderInstruction<'_> {
    pub fn mode(&self) -> ViewMode {
        match self {
            RenderInstruction::Data { .. } => ViewMode::Data,
            RenderInstruction::Cleaning { .. } => ViewMode::Cleaning,
            RenderInstruction::Summary { .. } => ViewMode::Summary,
            RenderInstruction::Visuals(_) => ViewMode::Visuals,
        }
    }
}

/// Points of one hue group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HueSeries {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPlot {
    pub title: String,
    pub x_column: String,
    pub y_column: String,
    pub hue_column: String,
    pub series: Vec<HueSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPlot {
    pub title: String,
    pub column: String,
    pub by_column: String,
    pub groups: Vec<(String, BoxStats)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedBar {
    pub title: String,
    pub means: GroupedMeans,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub title: String,
    pub matrix: CorrelationMatrix,
}

/// The fixed battery of charts on the visualization view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationPlan {
    pub scatter: Vec<ScatterPlot>,
    pub boxes: Vec<BoxPlot>,
    pub stress_bars: GroupedBar,
    pub stress_heatmap: Heatmap,
}

// ─── Selection ──────────────────────────────────────────────────────────────

/// Build the render instruction for `mode`. Only the visualization view can
/// fail, when a column it needs is absent.
pub fn select(cleaned: &CleanedData, mode: ViewMode) -> Result<RenderInstruction<'_>> {
    debug!(view = mode.label(), "selecting view");
    let instruction = match mode {
        ViewMode::Data => RenderInstruction::Data {
            table: &cleaned.table,
            summary: stats::describe(&cleaned.table),
        },
        ViewMode::Cleaning => {
            let missing_before = cleaned.missing_before.nonzero();
            let missing_after = missing_before
                .iter()
                .map(|(name, _)| (name.clone(), cleaned.missing_after.get(name).unwrap_or(0)))
                .collect();
            RenderInstruction::Cleaning {
                log: &cleaned.log,
                missing_before,
                missing_after,
            }
        }
        ViewMode::Summary => RenderInstruction::Summary {
            correlation: CorrelationMatrix::numeric(&cleaned.table),
            missing_after: &cleaned.missing_after,
        },
        ViewMode::Visuals => RenderInstruction::Visuals(visualization_plan(&cleaned.table)?),
    };
    Ok(instruction)
}

fn require<'t>(table: &'t Table, name: &str) -> Result<&'t Column> {
    table.column(name).ok_or_else(|| DashboardError::MissingColumn {
        column: name.to_string(),
        view: ViewMode::Visuals.label(),
    })
}

/// Compute every chart of the visualization view from coerced copies of
/// the columns it references.
pub fn visualization_plan(table: &Table) -> Result<VisualizationPlan> {
    for name in VISUALIZATION_COLUMNS {
        require(table, name)?;
    }

    let grade = require(table, FINAL_GRADE)?;
    let gender = require(table, GENDER)?;
    let stress = require(table, STRESS_LEVEL)?;

    let grade_values = grade.data.coerce_numeric();
    let gender_keys = stats::group_keys(&gender.data);
    let gender_groups = stats::distinct_keys(&gender.data);

    let scatter = SCATTER_COLUMNS
        .iter()
        .map(|&x_name| -> Result<ScatterPlot> {
            let x_values = require(table, x_name)?.data.coerce_numeric();
            let series = gender_groups
                .iter()
                .map(|group| HueSeries {
                    label: group.clone(),
                    points: (0..table.row_count())
                        .filter(|&i| gender_keys[i].as_deref() == Some(group.as_str()))
                        .filter_map(|i| Some((x_values[i]?, grade_values[i]?)))
                        .collect(),
                })
                .collect();
            Ok(ScatterPlot {
                title: format!("{} vs Final Grade", x_name.replace('_', " ")),
                x_column: x_name.to_string(),
                y_column: FINAL_GRADE.to_string(),
                hue_column: GENDER.to_string(),
                series,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let boxes = LIFESTYLE_COLUMNS
        .iter()
        .map(|&name| -> Result<BoxPlot> {
            let values = require(table, name)?.data.coerce_numeric();
            let groups = gender_groups
                .iter()
                .filter_map(|group| {
                    let in_group: Vec<Option<f64>> = values
                        .iter()
                        .zip(&gender_keys)
                        .filter(|(_, k)| k.as_deref() == Some(group.as_str()))
                        .map(|(v, _)| *v)
                        .collect();
                    BoxStats::compute(&in_group).map(|stats| (group.clone(), stats))
                })
                .collect();
            Ok(BoxPlot {
                title: format!("{} by Gender", name),
                column: name.to_string(),
                by_column: GENDER.to_string(),
                groups,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let factors = STRESS_FACTORS
        .iter()
        .map(|&name| Ok((name.to_string(), require(table, name)?.data.coerce_numeric())))
        .collect::<Result<Vec<(String, Vec<Option<f64>>)>>>()?;

    let stress_bars = GroupedBar {
        title: "Average Performance & Lifestyle Factors by Stress Level".to_string(),
        means: GroupedMeans::compute(stress, &factors),
    };

    let encoded: Vec<Option<f64>> = stats::category_codes(&stress.data)
        .into_iter()
        .map(|code| (code >= 0).then_some(code as f64))
        .collect();
    let mut series = factors;
    series.push((STRESS_LEVEL_ENCODED.to_string(), encoded));

    let stress_heatmap = Heatmap {
        title: "Correlation Between Stress Level and Other Metrics".to_string(),
        matrix: CorrelationMatrix::from_series(series),
    };

    Ok(VisualizationPlan {
        scatter,
        boxes,
        stress_bars,
        stress_heatmap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clean;

    const STUDENTS: &str = "\
Gender,Study_Hours_per_Week,Assignment_Completion_Rate (%),Exam_Score (%),Final_Grade,Sleep_Hours_per_Night,Time_Spent_on_Social_Media (hours/week),Self_Reported_Stress_Level
Female,10,90,85,88,7,5,Low
Male,5,70,60,65,6,12,High
Female,8,80,,79,8,6,Medium
Male,12,95,92,90,,4,Low
Female,3,50,45,52,5,20,High
";

    fn cleaned_students() -> CleanedData {
        clean(Table::from_csv_bytes(STUDENTS.as_bytes(), b',').unwrap()).unwrap()
    }

    #[test]
    fn test_view_mode_cycle() {
        let mut mode = ViewMode::Data;
        for expected in [ViewMode::Cleaning, ViewMode::Summary, ViewMode::Visuals, ViewMode::Data] {
            mode.toggle();
            assert_eq!(mode, expected);
        }
    }

    #[test]
    fn test_view_mode_parse() {
        assert_eq!(ViewMode::parse("DATA"), Some(ViewMode::Data));
        assert_eq!(ViewMode::parse("cleaning"), Some(ViewMode::Cleaning));
        assert_eq!(ViewMode::parse("summary"), Some(ViewMode::Summary));
        assert_eq!(ViewMode::parse("visuals"), Some(ViewMode::Visuals));
        assert_eq!(ViewMode::parse("charts"), None);
    }

    #[test]
    fn test_every_mode_selects_its_own_instruction() {
        let cleaned = cleaned_students();
        for mode in ViewMode::ALL {
            assert_eq!(select(&cleaned, mode).unwrap().mode(), mode);
        }
    }

    #[test]
    fn test_cleaning_report_filters_to_columns_missing_before() {
        let cleaned = cleaned_students();
        match select(&cleaned, ViewMode::Cleaning).unwrap() {
            RenderInstruction::Cleaning {
                log,
                missing_before,
                missing_after,
            } => {
                assert_eq!(log.len(), 3);
                assert_eq!(
                    missing_before,
                    vec![(EXAM_SCORE.to_string(), 1), (SLEEP_HOURS.to_string(), 1)]
                );
                assert_eq!(
                    missing_after,
                    vec![(EXAM_SCORE.to_string(), 0), (SLEEP_HOURS.to_string(), 0)]
                );
            }
            other => panic!("Expected cleaning report, got {:?}", other.mode()),
        }
    }

    #[test]
    fn test_summary_is_numeric_only() {
        let cleaned = cleaned_students();
        match select(&cleaned, ViewMode::Summary).unwrap() {
            RenderInstruction::Summary {
                correlation,
                missing_after,
            } => {
                assert!(!correlation.columns.contains(&GENDER.to_string()));
                assert!(!correlation.columns.contains(&STRESS_LEVEL.to_string()));
                assert_eq!(correlation.columns.len(), 6);
                let self_corr = correlation.get(FINAL_GRADE, FINAL_GRADE).unwrap();
                assert!((self_corr - 1.0).abs() < 1e-12);
                assert!(missing_after.is_all_zero());
            }
            other => panic!("Expected summary, got {:?}", other.mode()),
        }
    }

    #[test]
    fn test_visualizations_battery() {
        let plan = visualization_plan(&cleaned_students().table).unwrap();

        assert_eq!(plan.scatter.len(), 3);
        assert_eq!(plan.scatter[0].title, "Study Hours per Week vs Final Grade");
        let labels: Vec<&str> = plan.scatter[0].series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Female", "Male"]);
        assert_eq!(plan.scatter[0].series[0].points[0], (10.0, 88.0));

        assert_eq!(plan.boxes.len(), 2);
        assert_eq!(plan.boxes[0].title, "Sleep_Hours_per_Night by Gender");

        let groups: Vec<&str> = plan
            .stress_bars
            .means
            .groups
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(groups, vec!["High", "Low", "Medium"]);

        assert_eq!(
            plan.stress_heatmap.matrix.columns.last().map(String::as_str),
            Some(STRESS_LEVEL_ENCODED)
        );
        assert_eq!(plan.scatter.len() + plan.boxes.len() + 2, PANEL_COUNT);
    }

    #[test]
    fn test_missing_final_grade_only_breaks_visuals() {
        let csv = STUDENTS.replace("Final_Grade", "Grade");
        let cleaned = clean(Table::from_csv_bytes(csv.as_bytes(), b',').unwrap()).unwrap();

        match select(&cleaned, ViewMode::Visuals) {
            Err(DashboardError::MissingColumn { column, .. }) => assert_eq!(column, FINAL_GRADE),
            other => panic!("Expected MissingColumnError, got {:?}", other.map(|i| i.mode())),
        }
        assert!(select(&cleaned, ViewMode::Data).is_ok());
        assert!(select(&cleaned, ViewMode::Cleaning).is_ok());
        assert!(select(&cleaned, ViewMode::Summary).is_ok());
    }

    #[test]
    fn test_visuals_do_not_mutate_the_table() {
        let cleaned = cleaned_students();
        let before = cleaned.table.clone();
        visualization_plan(&cleaned.table).unwrap();
        assert_eq!(cleaned.table, before);
        assert!(cleaned.table.column(STRESS_LEVEL_ENCODED).is_none());
    }

    #[test]
    fn test_categorical_metric_is_coerced() {
        // Final_Grade as letter grades: coercion leaves nothing numeric, but
        // the view still renders
        let csv = STUDENTS
            .replace(",88,", ",A,")
            .replace(",65,", ",C,");
        let cleaned = clean(Table::from_csv_bytes(csv.as_bytes(), b',').unwrap()).unwrap();
        let plan = visualization_plan(&cleaned.table).unwrap();
        let female_points = plan.scatter[0].series[0].points.len();
        assert_eq!(female_points, 2);
    }
}
