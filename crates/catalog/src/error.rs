//! Error types for the catalog crate.
//!
//! Rust error handling concepts demonstrated:
//! - thiserror for defining custom error types
//! - Enum variants carrying the context needed to locate a bad record
//! - Automatic `Display` and `Error` trait implementations

use thiserror::Error;

/// Errors that can occur while loading, parsing or validating a catalog
///
/// The `#[derive(Error)]` macro from thiserror implements `std::error::Error`
/// and `Display` from the `#[error(...)]` attributes.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in a data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Referenced entity doesn't exist (e.g., rating for an unknown item)
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: String },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, CatalogError>;
