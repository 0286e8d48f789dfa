//! Error types for line_ekf_slam

/// Main error type for the SLAM estimator
#[derive(Debug, thiserror::Error)]
pub enum SlamError {
    /// Vector/matrix dimensions out of sync. Fatal for the current cycle.
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Innovation covariance could not be inverted for a landmark
    #[error("Singular innovation covariance for landmark {landmark}")]
    SingularInnovation { landmark: usize },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed extracted line feature
    #[error("Invalid feature: {0}")]
    InvalidFeature(String),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Visualization error
    #[error("Visualization error: {0}")]
    Visualization(String),
}

impl From<toml::de::Error> for SlamError {
    fn from(e: toml::de::Error) -> Self {
        SlamError::Config(e.to_string())
    }
}

/// Result type alias for SLAM operations
pub type SlamResult<T> = Result<T, SlamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SlamError::ShapeMismatch {
            what: "covariance rows",
            expected: 5,
            actual: 3,
        };
        assert_eq!(
            format!("{}", err),
            "Shape mismatch in covariance rows: expected 5, got 3"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SlamError = io_err.into();
        assert!(matches!(err, SlamError::Io(_)));
    }
}
