use thiserror::Error;

use crate::models::Channel;

/// Input file could not be turned into member records.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("file must have a header row and at least one data row")]
    NoData,

    #[error("CSV header must contain a column with \"disease\", \"condition\", or \"illness\"")]
    MissingDiseaseColumn,

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("JSON must be an array of members or have a \"members\" or \"data\" array")]
    UnrecognizedStructure,

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// A single recipient's send failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SendError {
    #[error("recipient has no {0} address")]
    MissingDestination(Channel),

    #[error("provider rejected message: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("no {channel} template named \"{key}\"")]
    UnknownTemplate { channel: Channel, key: String },

    #[error("template body is empty")]
    EmptyTemplate,

    #[error("no disease data available for an alert")]
    NoDiseaseData,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not encode or decode stored value: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure that stops a whole dispatch batch. Per-recipient send failures
/// never surface here.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("could not record notification: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("disease name must not be empty")]
    EmptyName,

    #[error("no covered disease with id {0}")]
    NotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}
