//! Error types for shapeclass

use thiserror::Error;

/// Result type alias for shapeclass operations
pub type Result<T> = std::result::Result<T, ShapeClassError>;

/// Main error type for the classification and clustering engine
#[derive(Error, Debug)]
pub enum ShapeClassError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ShapeClassError {
    /// Shorthand for building an [`ShapeClassError::InvalidParameter`]
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ShapeClassError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ShapeClassError {
    fn from(err: serde_json::Error) -> Self {
        ShapeClassError::Serialization(err.to_string())
    }
}

impl From<polars::error::PolarsError> for ShapeClassError {
    fn from(err: polars::error::PolarsError) -> Self {
        ShapeClassError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShapeClassError::DimensionMismatch { expected: 16, actual: 90 };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 16, got 90");
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = ShapeClassError::invalid_parameter("p", 0, "Minkowski order must be >= 1");
        assert_eq!(
            err.to_string(),
            "Invalid parameter: p = 0, Minkowski order must be >= 1"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ShapeClassError = io_err.into();
        assert!(matches!(err, ShapeClassError::Io(_)));
    }
}
