//! Cohort - Error types
//!
//! Every failure is reported straight to the user: the TUI shows the message
//! in place of the view, report mode prints it and exits non-zero.

/// Errors raised while loading, cleaning or viewing a dataset.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// The upload is not a well-formed CSV.
    #[error("Failed to parse CSV: {message}")]
    Parse { message: String },

    /// A column with missing entries has nothing to impute from.
    #[error("Cannot impute column '{column}': it has no non-missing values")]
    Imputation { column: String },

    /// A view references a column the upload does not have.
    #[error("Column '{column}' is required by the {view} view but is not in the dataset")]
    MissingColumn { column: String, view: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        DashboardError::Parse {
            message: message.into(),
        }
    }

    /// Short tag used in the status bar and in JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardError::Parse { .. } => "ParseError",
            DashboardError::Imputation { .. } => "ImputationError",
            DashboardError::MissingColumn { .. } => "MissingColumnError",
            DashboardError::Io(_) => "IoError",
        }
    }
}

impl From<csv::Error> for DashboardError {
    fn from(err: csv::Error) -> Self {
        DashboardError::parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
