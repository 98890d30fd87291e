//! Cohort - Student-records dashboard over a single CSV upload.
//!
//! Ingests the upload into a typed table, runs a fixed cleaning pipeline
//! (column-name cleanup, duplicate removal, median/mode imputation) and
//! selects one of four views over the cleaned data.
//!
//! - `data`, `engine`: ingestion and the cleaning pipeline
//! - `stats`, `views`: statistics and view selection
//! - `app`, `tui`, `ui`: terminal dashboard
//! - `report`: headless text/JSON output of a single view

pub mod app;
pub mod data;
pub mod engine;
pub mod error;
pub mod report;
pub mod stats;
pub mod tui;
pub mod ui;
pub mod views;
