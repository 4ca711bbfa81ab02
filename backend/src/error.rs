//! Error types for the wallet card pipeline.
//!
//! This module defines the error hierarchy of a render run:
//!
//! - [`CsvError`] - the upload could not be read as a table
//! - [`SchemaError`] - a required column is missing (fatal to the run)
//! - [`EmptyResultError`] - the filters matched nothing (recoverable)
//! - [`EncodeError`] - one address could not become a QR code (skips that record)
//! - [`ComposeError`] - the document backend rejected an image (fatal to the run)
//! - [`RenderError`] - top-level pipeline error
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors while turning raw upload bytes into a table.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// A row could not be parsed.
    #[error("Line {line}: {message}")]
    Malformed { line: u64, message: String },
}

// =============================================================================
// Schema Errors
// =============================================================================

/// The table does not carry the columns a wallet sheet needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A required column is absent from the header row.
    #[error("Missing required column '{0}'")]
    MissingColumn(String),
}

// =============================================================================
// Grouping Errors
// =============================================================================

/// Filters left no record to render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No wallets match the current selection ({selection})")]
pub struct EmptyResultError {
    /// Human readable description of the active filters.
    pub selection: String,
}

// =============================================================================
// QR Encoding Errors
// =============================================================================

/// A payload could not be turned into a scannable code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Nothing to encode.
    #[error("Cannot encode an empty payload")]
    EmptyPayload,

    /// Payload exceeds the capacity of the largest QR version.
    #[error("Payload of {len} bytes exceeds QR capacity")]
    PayloadTooLong { len: usize },

    /// Any other encoder failure.
    #[error("QR encoding failed: {0}")]
    Encoder(String),

    /// The raster could not be written as PNG.
    #[error("PNG encoding failed: {0}")]
    Raster(String),
}

// =============================================================================
// Composition Errors
// =============================================================================

/// The document backend could not accept content.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Writing or reading the ephemeral image file failed.
    #[error("Image file {path} unusable: {source}")]
    ImageFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The image file did not contain a decodable image.
    #[error("Image file {path} could not be decoded: {message}")]
    ImageDecode { path: String, message: String },

    /// The finished document could not be serialized.
    #[error("Document output failed: {0}")]
    Output(#[source] std::io::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid environment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    /// The logo URL template lacks the `{coin}` placeholder.
    #[error("Logo URL template must contain '{{coin}}': {0}")]
    MissingPlaceholder(String),
}

// =============================================================================
// Render Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// This is the error type returned by [`crate::transform::pipeline::render_bytes`].
#[derive(Debug, Error)]
pub enum RenderError {
    /// Upload could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Required column missing.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Filters matched nothing.
    #[error("Empty result: {0}")]
    EmptyResult(#[from] EmptyResultError),

    /// Document backend failure.
    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),
}

impl RenderError {
    /// Plain-language message shown to users instead of the internal error.
    pub fn user_message(&self) -> String {
        match self {
            RenderError::Csv(CsvError::EmptyFile) => "The uploaded file is empty.".to_string(),
            RenderError::Csv(_) => {
                "The uploaded file could not be read as a CSV table.".to_string()
            }
            RenderError::Schema(SchemaError::MissingColumn(column)) => {
                format!("The CSV file must have a column named '{}'.", column)
            }
            RenderError::EmptyResult(_) => "No wallets match the selected filters.".to_string(),
            RenderError::Compose(_) => "The PDF document could not be generated.".to_string(),
        }
    }

    /// Whether the run may be presented as an empty state rather than a failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RenderError::EmptyResult(_))
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or wrong access key.
    #[error("Access denied")]
    Unauthorized,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for composition.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Result type for pipeline operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
