//! Error handling for pipeliner-rs
//!
//! Stage-local problems (wrong payload, lost chunks, redundant label releases)
//! never surface here; they are absorbed inside the stage and show up in
//! counters. This type covers what can go wrong while assembling a pipeline:
//! configuration, input files and report serialization.

use thiserror::Error;

/// Main error type for pipeliner-rs operations
#[derive(Error, Debug)]
pub enum PipelinerError {
    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Row width must be at least one element
    #[error("Invalid row width: {0}")]
    InvalidWidth(usize),

    /// Malformed CSV input that cannot be skipped
    #[error("CSV error at line {line}: {message}")]
    Csv { line: usize, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse errors
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelinerError>,
    },
}

impl PipelinerError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelinerError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for pipeliner-rs operations
pub type Result<T> = std::result::Result<T, PipelinerError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelinerError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| PipelinerError::from(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelinerError::Config("width missing".to_string());
        assert_eq!(err.to_string(), "Configuration error: width missing");
    }

    #[test]
    fn test_error_with_context() {
        let err = PipelinerError::InvalidWidth(0);
        let with_ctx = err.with_context("Failed to build labelling stage");
        assert!(with_ctx.to_string().contains("Failed to build labelling stage"));
        assert!(with_ctx.to_string().contains("Invalid row width: 0"));
    }

    #[test]
    fn test_csv_error() {
        let err = PipelinerError::Csv {
            line: 7,
            message: "unterminated row".to_string(),
        };
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn test_io_context() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = res.context("Opening input").unwrap_err();
        assert!(err.to_string().starts_with("Opening input"));
    }
}
