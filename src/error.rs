use thiserror::Error;

/// Main error type for convflow
#[derive(Error, Debug)]
pub enum ConvflowError {
    /// KB service errors (transport, status, decoding)
    #[error("KB service error: {0}")]
    Kb(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenient Result type using ConvflowError
pub type Result<T> = std::result::Result<T, ConvflowError>;
