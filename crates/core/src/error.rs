//! Error types for document section editing.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while locating, rewriting or persisting a document.
#[derive(Error, Debug)]
pub enum Error {
    /// A required section, heading or pattern was not located.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A caption-like block did not parse into `{Kind} {major}.{minor}`.
    #[error("Malformed caption at block {index}: {text:?}")]
    MalformedCaption { index: usize, text: String },

    /// A block index outside the story.
    #[error("Block index {index} out of bounds (story has {len} blocks)")]
    InvalidIndex { index: usize, len: usize },

    /// A block range outside the story.
    #[error("Block range {start}..{end} out of bounds (story has {len} blocks)")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// Failed to read the source or write the destination file.
    #[error("Failed to read or write file: {0}")]
    IoError(#[from] std::io::Error),

    /// ZIP archive error (for DOCX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for DOCX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// Invalid or corrupted package.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
