//! Cohort - Application state management
//!
//! One session owns one cleaned dataset. Navigation events move between the
//! four views; each draw re-runs view selection against the current data.

use std::path::PathBuf;
use tracing::{info, warn};

use crate::data::Table;
use crate::engine::{self, CleanedData};
use crate::error::{DashboardError, Result};
use crate::views::{self, RenderInstruction, ViewMode};

/// Where the session's data was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Stdin,
}

impl Source {
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Source::Stdin
        } else {
            Source::File(PathBuf::from(arg))
        }
    }

    /// Short name for titles.
    pub fn display_name(&self) -> String {
        match self {
            Source::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            Source::Stdin => "<stdin>".to_string(),
        }
    }
}

/// Read and clean a dataset. Any failure blocks every view.
pub fn load(source: &Source, delimiter: u8) -> Result<CleanedData> {
    let table = match source {
        Source::File(path) => Table::open(path, delimiter)?,
        Source::Stdin => Table::from_stdin(delimiter)?,
    };
    engine::clean(table)
}

/// Cleaned data for the session, or the error that prevented it.
#[derive(Debug)]
pub enum SessionState {
    Ready(Box<CleanedData>),
    Failed(DashboardError),
}

/// Main application state
pub struct App {
    pub state: SessionState,
    pub source: Source,
    pub delimiter: u8,
    /// Current view
    pub view_mode: ViewMode,
    /// First visible row (or line) of the current view
    pub scroll: usize,
    /// First visible column in the data preview
    pub column_offset: usize,
    /// Visualization panel being shown
    pub panel: usize,
    /// Number of visible lines in the viewport
    pub viewport_height: usize,
    /// One-line message for the status bar
    pub status: Option<String>,
    /// Whether to show the help popup
    pub show_help: bool,
    /// Whether the app should quit
    pub should_quit: bool,
}

impl App {
    /// Create a new app with a cleaned dataset
    pub fn new(cleaned: CleanedData, source: Source, delimiter: u8) -> Self {
        Self::with_state(SessionState::Ready(Box::new(cleaned)), source, delimiter)
    }

    /// Start on an error screen; `r` retries the load.
    pub fn failed(err: DashboardError, source: Source, delimiter: u8) -> Self {
        Self::with_state(SessionState::Failed(err), source, delimiter)
    }

    fn with_state(state: SessionState, source: Source, delimiter: u8) -> Self {
        Self {
            state,
            source,
            delimiter,
            view_mode: ViewMode::Data,
            scroll: 0,
            column_offset: 0,
            panel: 0,
            viewport_height: 20,
            status: None,
            show_help: false,
            should_quit: false,
        }
    }

    /// Cleaned data, if the last load succeeded.
    pub fn cleaned(&self) -> Option<&CleanedData> {
        match &self.state {
            SessionState::Ready(cleaned) => Some(cleaned.as_ref()),
            SessionState::Failed(_) => None,
        }
    }

    /// Render instruction for the current view, rebuilt on every call.
    pub fn instruction(&self) -> Option<Result<RenderInstruction<'_>>> {
        self.cleaned()
            .map(|cleaned| views::select(cleaned, self.view_mode))
    }

    /// Switch to a view. Re-selecting the current view starts it over.
    pub fn select_view(&mut self, mode: ViewMode) {
        self.view_mode = mode;
        self.reset_position();
    }

    /// Cycle to the next view
    pub fn next_view(&mut self) {
        self.view_mode.toggle();
        self.reset_position();
    }

    /// Re-read the source and clean it again, replacing the session data.
    pub fn reload(&mut self) {
        if self.source == Source::Stdin {
            self.status = Some("stdin cannot be reloaded".to_string());
            return;
        }

        match load(&self.source, self.delimiter) {
            Ok(cleaned) => {
                info!(source = %self.source.display_name(), "reloaded dataset");
                self.status = Some(format!(
                    "Reloaded {} rows",
                    cleaned.table.row_count()
                ));
                self.state = SessionState::Ready(Box::new(cleaned));
            }
            Err(err) => {
                warn!(error = %err, "reload failed");
                self.status = Some(format!("{}: reload failed", err.kind()));
                self.state = SessionState::Failed(err);
            }
        }
        self.reset_position();
    }

    fn reset_position(&mut self) {
        self.scroll = 0;
        self.column_offset = 0;
        self.panel = 0;
    }

    /// Scroll down by n lines
    pub fn scroll_down(&mut self, n: usize) {
        self.scroll = self.scroll.saturating_add(n);
    }

    /// Scroll up by n lines
    pub fn scroll_up(&mut self, n: usize) {
        self.scroll = self.scroll.saturating_sub(n);
    }

    /// Jump to the beginning
    pub fn goto_top(&mut self) {
        self.scroll = 0;
    }

    /// Jump to the end; the renderer clamps to the last page
    pub fn goto_bottom(&mut self) {
        self.scroll = usize::MAX;
    }

    /// Right: next panel on the visualization view, next column elsewhere.
    pub fn step_right(&mut self) {
        match self.view_mode {
            ViewMode::Visuals => self.panel = (self.panel + 1) % views::PANEL_COUNT,
            _ => self.column_offset = self.column_offset.saturating_add(1),
        }
    }

    /// Left: previous panel on the visualization view, previous column elsewhere.
    pub fn step_left(&mut self) {
        match self.view_mode {
            ViewMode::Visuals => {
                self.panel = (self.panel + views::PANEL_COUNT - 1) % views::PANEL_COUNT
            }
            _ => self.column_offset = self.column_offset.saturating_sub(1),
        }
    }

    /// Keep scroll positions inside what the last draw could show.
    pub fn clamp_position(&mut self, max_scroll: usize, max_column: usize) {
        self.scroll = self.scroll.min(max_scroll);
        self.column_offset = self.column_offset.min(max_column);
    }

    /// Update viewport height based on terminal size
    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height.saturating_sub(8); // Tabs, borders and status bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn app_for(csv: &str) -> (App, NamedTempFile) {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", csv).unwrap();
        let source = Source::File(file.path().to_path_buf());
        let cleaned = load(&source, b',').unwrap();
        (App::new(cleaned, source, b','), file)
    }

    #[test]
    fn test_navigation_resets_position() {
        let (mut app, _file) = app_for("a,b\n1,x\n2,y\n");
        app.scroll_down(5);
        app.step_right();
        app.select_view(ViewMode::Summary);
        assert_eq!(app.view_mode, ViewMode::Summary);
        assert_eq!(app.scroll, 0);
        assert_eq!(app.column_offset, 0);

        app.next_view();
        assert_eq!(app.view_mode, ViewMode::Visuals);
    }

    #[test]
    fn test_panels_wrap_on_visuals() {
        let (mut app, _file) = app_for("a\n1\n");
        app.select_view(ViewMode::Visuals);
        app.step_left();
        assert_eq!(app.panel, views::PANEL_COUNT - 1);
        app.step_right();
        assert_eq!(app.panel, 0);
    }

    #[test]
    fn test_missing_columns_only_fail_visuals() {
        let (mut app, _file) = app_for("a\n1\n");
        app.select_view(ViewMode::Data);
        assert!(matches!(app.instruction(), Some(Ok(_))));
        app.select_view(ViewMode::Visuals);
        assert!(matches!(
            app.instruction(),
            Some(Err(DashboardError::MissingColumn { .. }))
        ));
    }

    #[test]
    fn test_reload_replaces_session() {
        let (mut app, mut file) = app_for("a\n1\n1\n");
        assert_eq!(app.cleaned().unwrap().duplicates_removed, 1);

        writeln!(file, "2").unwrap();
        app.reload();
        let cleaned = app.cleaned().unwrap();
        assert_eq!(cleaned.table.row_count(), 2);
    }

    #[test]
    fn test_failed_start_recovers_on_reload() {
        let mut file = NamedTempFile::new().unwrap();
        let source = Source::File(file.path().to_path_buf());
        let err = load(&source, b',').unwrap_err();
        assert_eq!(err.kind(), "ParseError");

        let mut app = App::failed(err, source, b',');
        assert!(app.cleaned().is_none());

        write!(file, "a\n1\n").unwrap();
        app.reload();
        assert_eq!(app.cleaned().unwrap().table.row_count(), 1);
    }

    #[test]
    fn test_failed_reload_blocks_every_view() {
        let (mut app, file) = app_for("a,b\n1,\n2,x\n");
        std::fs::write(file.path(), "a,b\n1,\n2,\n").unwrap();
        app.reload();
        assert!(matches!(
            app.state,
            SessionState::Failed(DashboardError::Imputation { .. })
        ));
        for mode in ViewMode::ALL {
            app.select_view(mode);
            assert!(app.instruction().is_none());
        }
    }
}
