//! Cohort - UI rendering
//!
//! Draws the view tabs, the selected view and the status bar with Ratatui
//! widgets. Views are selected afresh on every draw.

use std::iter;

use crate::app::{App, SessionState};
use crate::data::{format_number, Table};
use crate::engine::{CleaningLog, MissingSnapshot};
use crate::error::DashboardError;
use crate::stats::{BoxStats, CorrelationMatrix, DescribedColumn, DESCRIBE_ROWS};
use crate::views::{
    self, BoxPlot, GroupedBar, RenderInstruction, ScatterPlot, ViewMode, VisualizationPlan,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Clear, Dataset, GraphType,
        Paragraph, Row, Table as TableWidget, Tabs, Wrap,
    },
    Frame,
};

/// Theme colors for the UI
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub accent: Color,
    pub error: Color,
    pub warning: Color,
    pub border: Color,
    pub muted: Color,
    pub ok: Color,
}

impl Default for Theme {
    fn default() -> Self {
        // Dracula-inspired dark theme
        Self {
            bg: Color::Rgb(40, 42, 54),
            fg: Color::Rgb(248, 248, 242),
            accent: Color::Rgb(139, 233, 253),
            error: Color::Rgb(255, 85, 85),
            warning: Color::Rgb(255, 184, 108),
            border: Color::Rgb(98, 114, 164),
            muted: Color::Rgb(98, 114, 164),
            ok: Color::Rgb(80, 250, 123),
        }
    }
}

/// One color per hue group (e.g. gender)
const HUE_COLORS: [Color; 4] = [
    Color::Rgb(0, 255, 255),
    Color::Rgb(255, 0, 255),
    Color::Rgb(128, 128, 255),
    Color::Rgb(255, 128, 191),
];

/// One color per metric in grouped bars
const METRIC_COLORS: [Color; 3] = [
    Color::Rgb(102, 194, 165),
    Color::Rgb(252, 141, 98),
    Color::Rgb(141, 160, 203),
];

/// Furthest the current view can scroll, as seen by the last draw.
#[derive(Debug, Default, Clone, Copy)]
struct ScrollLimits {
    max_scroll: usize,
    max_column: usize,
}

/// Render the entire UI
pub fn render(frame: &mut Frame, app: &mut App) {
    let theme = Theme::default();

    app.set_viewport_height(frame.area().height as usize);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_tabs(frame, app, chunks[0], &theme);
    let limits = render_content(frame, app, chunks[1], &theme);
    app.clamp_position(limits.max_scroll, limits.max_column);
    render_status_bar(frame, app, chunks[2], &theme);

    if app.show_help {
        render_help_popup(frame, &theme);
    }
}

fn panel_block<'a>(title: impl Into<String>, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .title(Span::styled(
            format!(" {} ", title.into()),
            Style::default().fg(theme.accent),
        ))
        .style(Style::default().bg(theme.bg).fg(theme.fg))
}

/// Render the view selector
fn render_tabs(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let titles: Vec<Line> = ViewMode::ALL
        .iter()
        .map(|mode| Line::from(format!(" {} {} ", mode.hotkey(), mode.label())))
        .collect();
    let selected = ViewMode::ALL
        .iter()
        .position(|mode| *mode == app.view_mode)
        .unwrap_or(0);

    let tabs = Tabs::new(titles)
        .select(selected)
        .block(panel_block("Cohort", theme))
        .style(Style::default().fg(theme.muted))
        .highlight_style(
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED),
        )
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the selected view, or the error that replaces it
fn render_content(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) -> ScrollLimits {
    let cleaned = match &app.state {
        SessionState::Ready(cleaned) => cleaned,
        SessionState::Failed(err) => {
            render_error(frame, area, theme, "Dataset unavailable", err);
            return ScrollLimits::default();
        }
    };

    match views::select(cleaned, app.view_mode) {
        Ok(RenderInstruction::Data { table, summary }) => {
            render_data(frame, app, table, &summary, area, theme)
        }
        Ok(RenderInstruction::Cleaning {
            log,
            missing_before,
            missing_after,
        }) => {
            render_cleaning(frame, log, &missing_before, &missing_after, area, theme);
            ScrollLimits::default()
        }
        Ok(RenderInstruction::Summary {
            correlation,
            missing_after,
        }) => render_summary(frame, app, &correlation, missing_after, area, theme),
        Ok(RenderInstruction::Visuals(plan)) => {
            render_visuals(frame, app.panel, &plan, area, theme);
            ScrollLimits::default()
        }
        Err(err) => {
            render_error(frame, area, theme, app.view_mode.label(), &err);
            ScrollLimits::default()
        }
    }
}

fn render_error(frame: &mut Frame, area: Rect, theme: &Theme, title: &str, err: &DashboardError) {
    let lines = vec![
        Line::from(Span::styled(
            err.kind(),
            Style::default()
                .fg(theme.error)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(err.to_string(), Style::default().fg(theme.fg))),
        Line::from(""),
        Line::from(Span::styled(
            "Other views are still available (1-4), or press r to reload the file.",
            Style::default().fg(theme.muted),
        )),
    ];

    let paragraph = Paragraph::new(lines)
        .block(panel_block(title, theme))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Width for a column, based on its header
fn column_width(name: &str) -> u16 {
    (name.chars().count() as u16 + 2).clamp(8, 28)
}

/// Raw preview on top, describe statistics below
fn render_data(
    frame: &mut Frame,
    app: &App,
    table: &Table,
    summary: &[DescribedColumn],
    area: Rect,
    theme: &Theme,
) -> ScrollLimits {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let column_count = table.column_count();
    let first_column = app.column_offset.min(column_count.saturating_sub(1));
    let shown = first_column..column_count;
    let names = table.column_names();

    let header_style = Style::default()
        .fg(theme.accent)
        .add_modifier(Modifier::BOLD);

    // ── Preview ──
    let body_rows = (chunks[0].height as usize).saturating_sub(3);
    let max_scroll = table.row_count().saturating_sub(body_rows);
    let start = app.scroll.min(max_scroll);
    let end = (start + body_rows).min(table.row_count());

    let header = Row::new(
        iter::once(Cell::from("#")).chain(shown.clone().map(|c| Cell::from(names[c].to_string()))),
    )
    .style(header_style);

    let rows: Vec<Row> = (start..end)
        .map(|r| {
            Row::new(
                iter::once(Cell::from(Span::styled(
                    r.to_string(),
                    Style::default().fg(theme.muted),
                )))
                .chain(
                    shown
                        .clone()
                        .map(|c| Cell::from(table.columns()[c].data.display(r))),
                ),
            )
        })
        .collect();

    let widths: Vec<Constraint> = iter::once(Constraint::Length(6))
        .chain(shown.clone().map(|c| Constraint::Length(column_width(names[c]))))
        .collect();

    let title = format!(
        "Raw Dataset Preview │ rows {}-{} of {} │ columns {}-{} of {}",
        if end > start { start + 1 } else { 0 },
        end,
        table.row_count(),
        if column_count > 0 { first_column + 1 } else { 0 },
        column_count,
        column_count,
    );

    let preview = TableWidget::new(rows, widths.clone())
        .header(header)
        .column_spacing(1)
        .block(panel_block(title, theme));
    frame.render_widget(preview, chunks[0]);

    // ── Summary statistics ──
    let header = Row::new(
        iter::once(Cell::from("")).chain(shown.clone().map(|c| Cell::from(names[c].to_string()))),
    )
    .style(header_style);

    let rows: Vec<Row> = DESCRIBE_ROWS
        .iter()
        .map(|stat| {
            Row::new(
                iter::once(Cell::from(Span::styled(
                    stat.to_string(),
                    Style::default().fg(theme.warning),
                )))
                .chain(summary[first_column..].iter().map(|c| Cell::from(c.cell(stat)))),
            )
        })
        .collect();

    let stats = TableWidget::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(panel_block("Summary Statistics", theme));
    frame.render_widget(stats, chunks[1]);

    ScrollLimits {
        max_scroll,
        max_column: column_count.saturating_sub(1),
    }
}

/// Cleaning log plus before/after missing counts
fn render_cleaning(
    frame: &mut Frame,
    log: &CleaningLog,
    missing_before: &[(String, usize)],
    missing_after: &[(String, usize)],
    area: Rect,
    theme: &Theme,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(log.len() as u16 + 2),
            Constraint::Min(3),
        ])
        .split(area);

    let lines: Vec<Line> = log
        .entries()
        .iter()
        .map(|entry| {
            Line::from(vec![
                Span::styled(" ✓ ", Style::default().fg(theme.ok)),
                Span::styled(
                    format!("{}: ", entry.step),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(entry.result.clone()),
            ])
        })
        .collect();
    frame.render_widget(
        Paragraph::new(lines).block(panel_block("Data Cleaning Summary", theme)),
        chunks[0],
    );

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    render_missing_counts(frame, "Before Cleaning", missing_before, 0, halves[0], theme);
    render_missing_counts(frame, "After Cleaning", missing_after, 0, halves[1], theme);
}

fn render_missing_counts(
    frame: &mut Frame,
    title: &str,
    counts: &[(String, usize)],
    scroll: usize,
    area: Rect,
    theme: &Theme,
) {
    if counts.is_empty() {
        let paragraph = Paragraph::new(Span::styled(
            "No missing values",
            Style::default().fg(theme.ok),
        ))
        .block(panel_block(title, theme));
        frame.render_widget(paragraph, area);
        return;
    }

    let rows: Vec<Row> = counts
        .iter()
        .skip(scroll)
        .map(|(name, n)| {
            let style = if *n > 0 {
                Style::default().fg(theme.warning)
            } else {
                Style::default().fg(theme.ok)
            };
            Row::new(vec![Cell::from(name.clone()), Cell::from(n.to_string())]).style(style)
        })
        .collect();

    let table = TableWidget::new(rows, [Constraint::Min(20), Constraint::Length(8)])
        .header(
            Row::new(vec!["column", "missing"]).style(
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
        )
        .block(panel_block(title, theme));
    frame.render_widget(table, area);
}

/// Correlation heatmap with the post-cleaning missing counts beside it
fn render_summary(
    frame: &mut Frame,
    app: &App,
    correlation: &CorrelationMatrix,
    missing_after: &MissingSnapshot,
    area: Rect,
    theme: &Theme,
) -> ScrollLimits {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(72), Constraint::Percentage(28)])
        .split(area);

    render_heatmap(
        frame,
        "Correlation Heatmap (Numerical)",
        correlation,
        chunks[0],
        theme,
    );

    let counts = missing_after.counts();
    let visible = (chunks[1].height as usize).saturating_sub(3);
    let max_scroll = counts.len().saturating_sub(visible);
    render_missing_counts(
        frame,
        "Missing Values (After Cleaning)",
        counts,
        app.scroll.min(max_scroll),
        chunks[1],
        theme,
    );

    ScrollLimits {
        max_scroll,
        max_column: 0,
    }
}

/// Blue for -1, light grey for 0, red for +1
fn coolwarm(r: f64) -> Color {
    const COLD: (f64, f64, f64) = (59.0, 76.0, 192.0);
    const MID: (f64, f64, f64) = (221.0, 221.0, 221.0);
    const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

    let lerp = |a: (f64, f64, f64), b: (f64, f64, f64), t: f64| {
        Color::Rgb(
            (a.0 + (b.0 - a.0) * t).round() as u8,
            (a.1 + (b.1 - a.1) * t).round() as u8,
            (a.2 + (b.2 - a.2) * t).round() as u8,
        )
    };

    let r = r.clamp(-1.0, 1.0);
    if r < 0.0 {
        lerp(MID, COLD, -r)
    } else {
        lerp(MID, WARM, r)
    }
}

fn render_heatmap(
    frame: &mut Frame,
    title: &str,
    matrix: &CorrelationMatrix,
    area: Rect,
    theme: &Theme,
) {
    if matrix.is_empty() {
        let paragraph = Paragraph::new(Span::styled(
            "No numeric columns to correlate",
            Style::default().fg(theme.muted),
        ))
        .block(panel_block(title, theme));
        frame.render_widget(paragraph, area);
        return;
    }

    let label_width = matrix
        .columns
        .iter()
        .map(|c| c.chars().count())
        .max()
        .unwrap_or(0)
        .min(28) as u16;

    let header = Row::new(
        iter::once(Cell::from("")).chain(
            matrix
                .columns
                .iter()
                .map(|c| Cell::from(c.chars().take(9).collect::<String>())),
        ),
    )
    .style(
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = matrix
        .columns
        .iter()
        .zip(&matrix.values)
        .map(|(name, values)| {
            let cells = values.iter().map(|v| match v {
                Some(r) => Cell::from(format!(" {:>5.2}", r))
                    .style(Style::default().bg(coolwarm(*r)).fg(Color::Black)),
                None => Cell::from("  NaN").style(Style::default().fg(theme.muted)),
            });
            Row::new(iter::once(Cell::from(name.clone())).chain(cells))
        })
        .collect();

    let widths: Vec<Constraint> = iter::once(Constraint::Length(label_width))
        .chain(matrix.columns.iter().map(|_| Constraint::Length(9)))
        .collect();

    let table = TableWidget::new(rows, widths)
        .header(header)
        .column_spacing(0)
        .block(panel_block(title, theme));
    frame.render_widget(table, area);
}

/// One chart of the visualization battery, paged by `panel`
fn render_visuals(
    frame: &mut Frame,
    panel: usize,
    plan: &VisualizationPlan,
    area: Rect,
    theme: &Theme,
) {
    let page = format!("[{}/{}]", panel + 1, views::PANEL_COUNT);
    let scatter_count = plan.scatter.len();
    let box_count = plan.boxes.len();

    if let Some(plot) = plan.scatter.get(panel) {
        render_scatter(frame, plot, &page, area, theme);
    } else if let Some(plot) = plan.boxes.get(panel - scatter_count) {
        render_box(frame, plot, &page, area, theme);
    } else if panel == scatter_count + box_count {
        render_bars(frame, &plan.stress_bars, &page, area, theme);
    } else {
        let title = format!("{} {}", plan.stress_heatmap.title, page);
        render_heatmap(frame, &title, &plan.stress_heatmap.matrix, area, theme);
    }
}

/// Padded `[min, max]` over some values; `[0, 1]` when there are none.
fn bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    if lo == hi {
        return [lo - 1.0, hi + 1.0];
    }
    let pad = (hi - lo) * 0.05;
    [lo - pad, hi + pad]
}

fn axis_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .iter()
        .map(|v| Span::raw(format!("{:.1}", v)))
        .collect()
}

fn render_scatter(frame: &mut Frame, plot: &ScatterPlot, page: &str, area: Rect, theme: &Theme) {
    let points = || plot.series.iter().flat_map(|s| s.points.iter());
    let x_bounds = bounds(points().map(|p| p.0));
    let y_bounds = bounds(points().map(|p| p.1));

    let datasets: Vec<Dataset> = plot
        .series
        .iter()
        .enumerate()
        .map(|(i, series)| {
            Dataset::default()
                .name(format!("{} = {}", plot.hue_column, series.label))
                .marker(Marker::Braille)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(HUE_COLORS[i % HUE_COLORS.len()]))
                .data(&series.points)
        })
        .collect();

    let axis_style = Style::default().fg(theme.muted);
    let chart = Chart::new(datasets)
        .block(panel_block(format!("{} {}", plot.title, page), theme))
        .x_axis(
            Axis::default()
                .title(plot.x_column.replace('_', " "))
                .style(axis_style)
                .bounds(x_bounds)
                .labels(axis_labels(x_bounds)),
        )
        .y_axis(
            Axis::default()
                .title(plot.y_column.replace('_', " "))
                .style(axis_style)
                .bounds(y_bounds)
                .labels(axis_labels(y_bounds)),
        );

    frame.render_widget(chart, area);
}

/// Horizontal box drawn with box-drawing characters across `width` cells
fn box_line(stats: &BoxStats, lo: f64, hi: f64, width: usize) -> String {
    if width < 2 {
        return String::new();
    }
    let pos = |v: f64| -> usize {
        if hi <= lo {
            return width / 2;
        }
        let t = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
        (t * (width - 1) as f64).round() as usize
    };

    let mut cells = vec![' '; width];
    let (lw, q1, median, q3, uw) = (
        pos(stats.lower_whisker),
        pos(stats.q1),
        pos(stats.median),
        pos(stats.q3),
        pos(stats.upper_whisker),
    );
    for cell in &mut cells[lw.min(uw)..=lw.max(uw)] {
        *cell = '─';
    }
    for cell in &mut cells[q1.min(q3)..=q1.max(q3)] {
        *cell = '█';
    }
    cells[lw] = '├';
    cells[uw] = '┤';
    cells[median] = '┃';
    cells.into_iter().collect()
}

fn render_box(frame: &mut Frame, plot: &BoxPlot, page: &str, area: Rect, theme: &Theme) {
    let lo = plot
        .groups
        .iter()
        .map(|(_, b)| b.lower_whisker)
        .fold(f64::INFINITY, f64::min);
    let hi = plot
        .groups
        .iter()
        .map(|(_, b)| b.upper_whisker)
        .fold(f64::NEG_INFINITY, f64::max);

    let label_width = plot
        .groups
        .iter()
        .map(|(g, _)| g.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(6, 16);
    let width = (area.width as usize).saturating_sub(label_width + 8);

    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} by {}", plot.column, plot.by_column),
            Style::default().fg(theme.muted),
        )),
        Line::from(""),
    ];

    for (i, (group, stats)) in plot.groups.iter().enumerate() {
        let color = HUE_COLORS[i % HUE_COLORS.len()];
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:<w$} ", group, w = label_width),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(box_line(stats, lo, hi, width), Style::default().fg(color)),
        ]));
        lines.push(Line::from(Span::styled(
            format!(
                "{:<w$} n={}  whiskers {}–{}  quartiles {}–{}  median {}  outliers {}",
                "",
                stats.count,
                format_number(stats.lower_whisker),
                format_number(stats.upper_whisker),
                format_number(stats.q1),
                format_number(stats.q3),
                format_number(stats.median),
                stats.outliers,
                w = label_width
            ),
            Style::default().fg(theme.muted),
        )));
        lines.push(Line::from(""));
    }

    if plot.groups.is_empty() {
        lines.push(Line::from(Span::styled(
            "No numeric values to plot",
            Style::default().fg(theme.warning),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            format!(
                "{:<w$} {:<gap$}{}",
                "",
                format_number(lo),
                format_number(hi),
                w = label_width,
                gap = width.saturating_sub(format_number(hi).chars().count()),
            ),
            Style::default().fg(theme.muted),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(panel_block(format!("{} {}", plot.title, page), theme))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_bars(frame: &mut Frame, bars: &GroupedBar, page: &str, area: Rect, theme: &Theme) {
    let block = panel_block(format!("{} {}", bars.title, page), theme);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(3)])
        .split(inner);

    let means = &bars.means;
    let mut legend = vec![Span::styled(
        "Metric: ",
        Style::default().fg(theme.muted),
    )];
    for (i, metric) in means.metrics.iter().enumerate() {
        legend.push(Span::styled(
            format!("■ {}  ", metric),
            Style::default().fg(METRIC_COLORS[i % METRIC_COLORS.len()]),
        ));
    }
    let legend = vec![
        Line::from(legend),
        Line::from(Span::styled(
            format!("x: {}, y: average value", means.group_column.replace('_', " ")),
            Style::default().fg(theme.muted),
        )),
    ];
    frame.render_widget(Paragraph::new(legend), chunks[0]);

    let group_count = means.groups.len().max(1);
    let per_group = means.metrics.len() + 1;
    let bar_width = ((chunks[1].width as usize / group_count) / per_group.max(1))
        .saturating_sub(1)
        .clamp(1, 9) as u16;

    let mut chart = BarChart::default()
        .bar_width(bar_width)
        .bar_gap(1)
        .group_gap(2);

    for (group, values) in &means.groups {
        let group_bars: Vec<Bar> = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let color = METRIC_COLORS[i % METRIC_COLORS.len()];
                // Bars hold integers, so scale by 10 to keep one decimal
                let scaled = value.map(|v| (v * 10.0).round().max(0.0) as u64).unwrap_or(0);
                Bar::default()
                    .value(scaled)
                    .text_value(
                        value
                            .map(|v| format!("{:.1}", v))
                            .unwrap_or_else(|| "NaN".to_string()),
                    )
                    .style(Style::default().fg(color))
                    .value_style(Style::default().fg(Color::Black).bg(color))
            })
            .collect();
        chart = chart.data(
            BarGroup::default()
                .label(Line::from(group.clone()))
                .bars(&group_bars),
        );
    }

    frame.render_widget(chart, chunks[1]);
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let sep = || Span::styled("|", Style::default().fg(theme.border));

    let mut spans = vec![
        Span::styled(
            concat!(" Cohort v", env!("CARGO_PKG_VERSION"), " "),
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        sep(),
        Span::styled(
            format!(" {} ", app.source.display_name()),
            Style::default().fg(theme.fg),
        ),
    ];

    match &app.state {
        SessionState::Ready(cleaned) => {
            spans.push(sep());
            spans.push(Span::styled(
                format!(
                    " {} rows × {} cols ({}) ",
                    cleaned.table.row_count(),
                    cleaned.table.column_count(),
                    cleaned.table.size_human()
                ),
                Style::default().fg(theme.fg),
            ));
            spans.push(sep());
            spans.push(Span::styled(
                format!(
                    " {} dups removed, {} values filled ",
                    cleaned.duplicates_removed, cleaned.values_filled
                ),
                Style::default().fg(theme.ok),
            ));
        }
        SessionState::Failed(err) => {
            spans.push(sep());
            spans.push(Span::styled(
                format!(" {} ", err.kind()),
                Style::default().fg(theme.error),
            ));
        }
    }

    if let Some(status) = &app.status {
        spans.push(sep());
        spans.push(Span::styled(
            format!(" {} ", status),
            Style::default().fg(theme.warning),
        ));
    }

    spans.push(sep());
    spans.push(Span::styled(
        " 1-4:View ?:Help q:Quit ",
        Style::default().fg(theme.muted),
    ));

    let status_bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .style(Style::default().bg(theme.bg)),
    );

    frame.render_widget(status_bar, area);
}

/// Render help popup
fn render_help_popup(frame: &mut Frame, theme: &Theme) {
    let area = centered_rect(55, 80, frame.area());

    // Clear the background
    frame.render_widget(Clear, area);

    let key = |k: &'static str, what: &'static str, color: Color| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", k), Style::default().fg(color)),
            Span::raw(what),
        ])
    };
    let heading = |text: &'static str, color: Color| {
        Line::from(Span::styled(
            text,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))
    };

    let help_text = vec![
        heading("Keyboard Shortcuts", theme.accent),
        Line::from(""),
        heading("Views", theme.accent),
        key("1", "View Data", theme.accent),
        key("2", "Data Cleaning Report", theme.accent),
        key("3", "Summary & Correlations", theme.accent),
        key("4", "Visualizations", theme.accent),
        key("Tab", "Next view", theme.accent),
        Line::from(""),
        heading("Navigation", theme.warning),
        key("j / Down", "Scroll down", theme.warning),
        key("k / Up", "Scroll up", theme.warning),
        key("g / G", "Top / bottom", theme.warning),
        key("Ctrl+d/u", "Half page down / up", theme.warning),
        key("h / Left", "Previous column or chart", theme.warning),
        key("l / Right", "Next column or chart", theme.warning),
        Line::from(""),
        heading("Data", theme.ok),
        key("r", "Reload and re-clean the file", theme.ok),
        Line::from(""),
        key("?", "Toggle this help", theme.muted),
        key("q", "Quit", theme.error),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" Help ", Style::default().fg(theme.accent)))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border))
                .style(Style::default().bg(theme.bg)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(help, area);
}

/// Helper to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_line_tolerates_unordered_positions() {
        let stats = BoxStats {
            count: 3,
            lower_whisker: 3.0,
            q1: 3.0,
            median: 5.0,
            q3: f64::NAN,
            upper_whisker: f64::NAN,
            outliers: 0,
        };
        let line = box_line(&stats, 0.0, 10.0, 20);
        assert_eq!(line.chars().count(), 20);
    }

    #[test]
    fn test_coolwarm_endpoints() {
        assert_eq!(coolwarm(-1.0), Color::Rgb(59, 76, 192));
        assert_eq!(coolwarm(0.0), Color::Rgb(221, 221, 221));
        assert_eq!(coolwarm(1.0), Color::Rgb(180, 4, 38));
    }

    #[test]
    fn test_bounds() {
        assert_eq!(bounds(iter::empty()), [0.0, 1.0]);
        assert_eq!(bounds([3.0, 3.0].into_iter()), [2.0, 4.0]);
        assert_eq!(bounds([0.0, 10.0].into_iter()), [-0.5, 10.5]);
    }

    #[test]
    fn test_box_line_marks_quartiles_and_median() {
        let stats = BoxStats {
            count: 5,
            lower_whisker: 0.0,
            q1: 2.5,
            median: 5.0,
            q3: 7.5,
            upper_whisker: 10.0,
            outliers: 0,
        };
        let line: Vec<char> = box_line(&stats, 0.0, 10.0, 11).chars().collect();
        assert_eq!(line.len(), 11);
        assert_eq!(line[0], '├');
        assert_eq!(line[10], '┤');
        assert_eq!(line[5], '┃');
        assert_eq!(line[3], '█');
        assert_eq!(line[1], '─');
    }
}
