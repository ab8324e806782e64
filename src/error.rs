//! Error types shared across the crate.
//!
//! Each concern gets its own enum so callers can match on the failure that
//! matters to them; [`Error`] folds them together for code that drives
//! a whole workflow and only needs to abort.

use thiserror::Error;

/// Convenience alias for results using the crate-wide error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed experiment-design input.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV input has no header line")]
    MissingHeader,

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("row {row}, column '{column}': '{value}' is not a number")]
    NotANumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}, column '{column}': '{value}' is not an integer")]
    NotAnInteger {
        row: usize,
        column: String,
        value: String,
    },

    #[error("'{0}' is not a well identifier (expected e.g. 'C7')")]
    InvalidWell(String),
}

/// Missing or unusable protocol parameters.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse parameters: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parameters must be a JSON object")]
    NotAnObject,

    #[error("missing parameter '{0}'")]
    MissingKey(String),

    #[error("parameter '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("unrecognised pipette '{0}' (expected e.g. 'p20_single_gen2')")]
    UnknownPipette(String),

    #[error("no pipette configured")]
    NoPipettes,

    #[error("slot {0} is referenced by the design but not configured")]
    UnknownSlot(String),

    #[error("slot {slot} already holds '{occupant}', cannot place '{requested}' there")]
    SlotOccupied {
        slot: String,
        occupant: String,
        requested: String,
    },
}

/// Physically meaningless derived quantities.
#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    #[error("invalid plate shape '{0}' (expected 'circular' or 'rectangular')")]
    InvalidShape(String),

    #[error("plate shape '{shape}' needs {expected} dimension(s), got {got}")]
    InvalidDimensions {
        shape: String,
        expected: usize,
        got: usize,
    },

    #[error("{name} must be a finite number, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    #[error("base area {area} times density {density} must be positive")]
    NonPositiveBase { area: f64, density: f64 },

    #[error("plate weight {full} is below the empty plate weight {empty}")]
    NegativeMaterial { full: f64, empty: f64 },
}

/// Failure reported by the hardware driver.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("driver rejected command: {0}")]
    Rejected(String),

    #[error("driver I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems rendering a protocol template.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template has no {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("failed to read template {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// Any failure that aborts a protocol run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("template error: {0}")]
    Template(#[from] TemplateError),
}
