use std::path::PathBuf;

use thiserror::Error;

/// Result type used by every import and publish stage.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Failures of the export pipeline, from reading the broker report to the
/// last Sheets API call.
#[derive(Debug, Error)]
pub enum ExportError {
    /// File or socket access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client secrets, token cache or an API payload is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The broker report could not be opened as an xlsx workbook.
    #[error("cannot read report workbook: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Errors bubbled up from the local SQLite store.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Transport level failures while talking to Google APIs.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Sheets API answered with a non-success status.
    #[error("Sheets API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Raised when the OAuth flow cannot produce an access token.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Raised when the report does not follow the expected layout.
    #[error("invalid report: {0}")]
    InvalidReport(String),

    /// Raised when the header row does not describe one column per
    /// transaction field.
    #[error("header row has {found} labelled columns, expected {expected}")]
    HeaderMismatch { expected: usize, found: usize },

    /// Raised when a decimal field cannot be parsed.
    #[error("invalid decimal value '{value}' in field {field}")]
    InvalidDecimal { field: &'static str, value: String },

    /// Raised when a required identifier is neither passed nor stored.
    #[error("{key} required! Pass it with {flag} or store it with --store-args-to-db")]
    MissingSetting {
        key: &'static str,
        flag: &'static str,
    },

    /// Raised when a setting is present but cannot be interpreted.
    #[error("invalid value '{value}' for setting {key}")]
    InvalidSetting { key: &'static str, value: String },

    /// Raised when a ticker group uses a currency without a template sheet.
    #[error("no template sheet for currency '{currency}' (ticker {ticker})")]
    UnknownCurrency { ticker: String, currency: String },

    /// The report path given on the command line does not exist.
    #[error("report not found: {0}")]
    MissingInput(PathBuf),

    /// The log filter or subscriber could not be installed.
    #[error("cannot set up logging: {0}")]
    Logging(String),
}
