//! Cohort - Terminal dashboard for student-records CSV files
//!
//! Cleans the upload once, then serves four views over the cleaned data,
//! either interactively or as a one-shot report.

use anyhow::{bail, Context, Result};
use argh::FromArgs;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::fs::File;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use cohort::app::{self, App, Source};
use cohort::data;
use cohort::report;
use cohort::tui::Tui;
use cohort::ui;
use cohort::views::ViewMode;

/// Cohort - clean and explore a student-records CSV
#[derive(FromArgs)]
struct Args {
    /// path to the CSV file, or "-" to read from stdin
    #[argh(positional)]
    file: String,

    /// print one view to stdout instead of starting the dashboard
    #[argh(switch, short = 'r')]
    report: bool,

    /// view for --report: data, cleaning, summary or visuals
    #[argh(option, short = 'v', default = "String::from(\"cleaning\")")]
    view: String,

    /// emit the report as JSON
    #[argh(switch)]
    json: bool,

    /// field delimiter (default: tab for .tsv files, comma otherwise)
    #[argh(option, short = 'd')]
    delimiter: Option<char>,

    /// write logs to this file (the dashboard otherwise logs nothing)
    #[argh(option)]
    log_file: Option<String>,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    init_logging(&args)?;

    let source = Source::from_arg(&args.file);
    let delimiter = match (args.delimiter, &source) {
        (Some(c), _) if c.is_ascii() => c as u8,
        (Some(c), _) => bail!("delimiter must be a single ASCII character, got {:?}", c),
        (None, Source::File(path)) => data::detect_delimiter(path),
        (None, Source::Stdin) => b',',
    };

    if args.report {
        return run_report(&args, &source, delimiter);
    }

    eprintln!("📂 Opening {}...", source.display_name());
    let mut app = match app::load(&source, delimiter) {
        Ok(cleaned) => {
            eprintln!(
                "✓ Loaded {} rows × {} columns ({}), {} duplicates removed, {} values filled",
                cleaned.table.row_count(),
                cleaned.table.column_count(),
                cleaned.table.size_human(),
                cleaned.duplicates_removed,
                cleaned.values_filled
            );
            App::new(cleaned, source, delimiter)
        }
        Err(err) => {
            eprintln!("⚠ {}: {}", err.kind(), err);
            App::failed(err, source, delimiter)
        }
    };

    run_tui(&mut app)?;
    eprintln!("👋 Goodbye!");
    Ok(())
}

/// Logs go to `--log-file` when given; report mode otherwise logs warnings to
/// stderr, and the dashboard stays silent so the terminal is not corrupted.
fn init_logging(args: &Args) -> Result<()> {
    let filter = |default: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    if let Some(path) = &args.log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file: {}", path))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter("info"))
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else if args.report {
        tracing_subscriber::fmt()
            .with_env_filter(filter("warn"))
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

/// Headless mode: clean, render one view, exit.
fn run_report(args: &Args, source: &Source, delimiter: u8) -> Result<()> {
    let Some(mode) = ViewMode::parse(&args.view) else {
        bail!(
            "unknown view {:?} (expected data, cleaning, summary or visuals)",
            args.view
        );
    };

    let cleaned = app::load(source, delimiter)
        .with_context(|| format!("Failed to load dataset: {}", source.display_name()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report::write_report(&cleaned, mode, args.json, &mut out)
        .with_context(|| format!("Failed to render view: {}", mode.label()))?;
    out.flush()?;
    Ok(())
}

/// Interactive dashboard loop
fn run_tui(app: &mut App) -> Result<()> {
    let mut tui = Tui::new()?;
    let mut dirty = true;

    loop {
        if dirty {
            tui.draw(|frame| ui::render(frame, app))?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    handle_key(app, key.code, key.modifiers);
                    dirty = true;
                }
                Event::Resize(_, _) => dirty = true,
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    tui.restore()?;
    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    // Any key dismisses a status message
    app.status = None;

    match (code, modifiers) {
        // Quit
        (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => {
            app.should_quit = true;
        }
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }

        // Views
        (KeyCode::Char(c @ '1'..='4'), _) => {
            if let Some(mode) = ViewMode::ALL.into_iter().find(|m| m.hotkey() == c) {
                app.select_view(mode);
            }
        }
        (KeyCode::Tab, _) => {
            app.next_view();
        }

        // Navigation
        (KeyCode::Char('d'), KeyModifiers::CONTROL) => {
            app.scroll_down(app.viewport_height / 2);
        }
        (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
            app.scroll_up(app.viewport_height / 2);
        }
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => {
            app.scroll_down(1);
        }
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => {
            app.scroll_up(1);
        }
        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => {
            app.goto_top();
        }
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => {
            app.goto_bottom();
        }
        (KeyCode::PageDown, _) => {
            app.scroll_down(app.viewport_height);
        }
        (KeyCode::PageUp, _) => {
            app.scroll_up(app.viewport_height);
        }
        (KeyCode::Char('l'), _) | (KeyCode::Right, _) => {
            app.step_right();
        }
        (KeyCode::Char('h'), _) | (KeyCode::Left, _) => {
            app.step_left();
        }

        // Data
        (KeyCode::Char('r'), _) => {
            app.reload();
        }

        // Toggle help
        (KeyCode::Char('?'), _) => {
            app.show_help = !app.show_help;
        }

        _ => {}
    }
}
