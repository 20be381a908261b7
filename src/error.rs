use thiserror::Error;

/// Errors surfaced by the dashboard actions.
///
/// Nothing here is retried: every variant aborts the current action and is
/// reported to the user, leaving any previously loaded dataset in place.
#[derive(Error, Debug)]
pub enum DashboardError {
    /// Database unreachable or the query failed
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Remote forecasting call failed or returned malformed data
    #[error("Forecast service error: {0}")]
    ForecastService(String),

    #[error("Please select at least one forecasting model before proceeding")]
    EmptyModelList,

    /// The horizon leaves no points for the backtest slice
    #[error("Horizon of {horizon} periods needs more history than the {available} points available")]
    InsufficientHistory { horizon: usize, available: usize },

    #[error("Forecast horizon must be between {min} and {max}, got {got}")]
    InvalidHorizon { got: usize, min: usize, max: usize },

    #[error("Unknown forecasting model: {0}")]
    UnknownModel(String),

    #[error("Model selected more than once: {0}")]
    DuplicateModel(String),

    #[error("Unknown or empty variable: {0}")]
    UnknownVariable(String),

    #[error("No data loaded. Load data from the database first")]
    DataNotLoaded,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(String),
}

impl From<tokio_postgres::Error> for DashboardError {
    fn from(error: tokio_postgres::Error) -> Self {
        DashboardError::Connection(error.to_string())
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(error: reqwest::Error) -> Self {
        DashboardError::ForecastService(error.to_string())
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(error: std::io::Error) -> Self {
        DashboardError::Export(error.to_string())
    }
}

impl From<csv::Error> for DashboardError {
    fn from(error: csv::Error) -> Self {
        DashboardError::Export(error.to_string())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(error: serde_json::Error) -> Self {
        DashboardError::Export(error.to_string())
    }
}

/// Type alias for Result with DashboardError
pub type Result<T> = std::result::Result<T, DashboardError>;
