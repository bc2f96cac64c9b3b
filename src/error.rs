//! Error types for the PDF generator.
//!
//! A single error enum covers the four failure families of document
//! generation: format/parse errors, missing resources, API sequencing misuse,
//! and configuration errors. The enum is `Clone` so the builder can hand the
//! same sticky error back to every call made after the first failure.

use std::sync::Arc;

/// Result type alias for PDF generation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while building or serializing a document.
#[derive(Debug, Clone, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Malformed font program (bad magic, bad table layout)
    #[error("Invalid font: {0}")]
    InvalidFont(String),

    /// Font program uses a feature this generator cannot embed
    #[error("Unsupported font: {0}")]
    UnsupportedFont(String),

    /// Read past the end of a binary buffer
    #[error("Read out of bounds: {len} byte(s) at offset {offset}, buffer holds {size}")]
    OutOfBounds {
        /// Offset of the attempted read
        offset: usize,
        /// Number of bytes requested
        len: usize,
        /// Size of the underlying buffer
        size: usize,
    },

    /// Malformed or unsupported image data
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// No font registered under the requested family
    #[error("Font not found: family '{0}' is not registered")]
    FontNotFound(String),

    /// Requested style is absent and the family has no Regular definition
    #[error("Style not found: '{family}' has no style '{style}', no regular fallback")]
    StyleNotFound {
        /// Normalized family name
        family: String,
        /// Canonical style string
        style: String,
    },

    /// File source could not find the file
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Image name is not registered
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// Spot color name is not registered
    #[error("Spot color not found: {0}")]
    SpotColorNotFound(String),

    /// Caller misused the stateful API (unbalanced scopes, output twice)
    #[error("Sequence error: {0}")]
    Sequence(String),

    /// Page box type is not one of trim, bleed, crop, art, media
    #[error("Unknown page box type: {0}")]
    UnknownPageBox(String),

    /// Invalid configuration value, rejected at the call that set it
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Font error without a more specific category
    #[error("Font error: {0}")]
    Font(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    /// JSON font definition error
    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(Arc::new(err))
    }
}

impl Error {
    /// Wrap an I/O failure with the operation and path that triggered it.
    pub fn io_context(op: &str, path: &str, err: std::io::Error) -> Self {
        let kind = err.kind();
        Error::Io(Arc::new(std::io::Error::new(kind, format!("{} '{}': {}", op, path, err))))
    }

    /// Short category label, used in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidFont(_)
            | Error::UnsupportedFont(_)
            | Error::OutOfBounds { .. }
            | Error::InvalidImage(_)
            | Error::Json(_) => "format",
            Error::FontNotFound(_)
            | Error::StyleNotFound { .. }
            | Error::FileNotFound(_)
            | Error::ImageNotFound(_)
            | Error::SpotColorNotFound(_) => "not-found",
            Error::Sequence(_) | Error::UnknownPageBox(_) => "sequence",
            Error::InvalidConfig(_) => "config",
            Error::Font(_) => "font",
            Error::Io(_) => "io",
        }
    }
}
