//! Error types for x4db

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for x4db operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid catalog file: {0}")]
    InvalidCatalog(String),

    #[error("Invalid markup: {0}")]
    InvalidMarkup(String),

    #[error("Missing payload file: {0}")]
    MissingPayload(PathBuf),

    #[error("No archive content found to load")]
    NothingToLoad,
}

/// Result type alias for x4db operations
pub type Result<T> = std::result::Result<T, Error>;
