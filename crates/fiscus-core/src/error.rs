//! Error types for the report ETL system.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for ETL operations.
#[derive(Error, Debug)]
pub enum FiscusError {
    /// Expected raw file missing for the supplied parameters
    #[error("No raw file available at {path}")]
    FileNotFound { path: PathBuf },

    /// Geometric reconstruction produced an unexpected shape or a crop
    /// anchor was not found
    #[error("Parse error: {0}")]
    Parse(String),

    /// Numeric coercion failure in strict mode
    #[error("Coercion error: {0}")]
    Coercion(String),

    /// A reconstructed record failed the per-report schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// Subtotal algebra failed beyond tolerance
    #[error("Validation error: {0}")]
    Validation(String),

    /// OCR backend transient failure or exhausted retries
    #[error("Provider error: {0}")]
    Provider(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl FiscusError {
    /// Create a file-not-found error.
    pub fn file_not_found(path: impl AsRef<Path>) -> Self {
        Self::FileNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a coercion error.
    pub fn coercion(msg: impl Into<String>) -> Self {
        Self::Coercion(msg.into())
    }

    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check whether this error aborts a batch run or only the current
    /// invocation. Missing files are skipped by batch runners; everything
    /// else is fatal.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::FileNotFound { .. })
    }
}

/// Result type alias for ETL operations.
pub type FiscusResult<T> = Result<T, FiscusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_helpers() {
        let err = FiscusError::parse("bad crop");
        assert!(matches!(err, FiscusError::Parse(_)));
        assert_eq!(err.to_string(), "Parse error: bad crop");

        let err = FiscusError::file_not_found("/data/raw/2021_03.pdf");
        assert!(err.is_skippable());
        assert!(!FiscusError::validation("off by 10").is_skippable());
    }
}
