use thiserror::Error;

/// Error types for the gcdeconv-rs library.
#[derive(Error, Debug)]
pub enum DeconvError {
    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The observed sample set is not a clean two-column numeric table.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// An initial guess could not be turned into a peak parameter tuple.
    #[error("Invalid initial guess: {0}")]
    InvalidGuess(String),

    /// No peaks were requested.
    #[error("At least one initial guess is required")]
    EmptyGuesses,

    /// The model variant selector was not recognized.
    #[error("Unknown peak variant: {0:?}")]
    UnknownVariant(String),

    /// The damped normal equations could not be solved.
    #[error("Linear algebra error: {0}")]
    LinearAlgebraError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for gcdeconv-rs operations.
pub type Result<T> = std::result::Result<T, DeconvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeconvError::DimensionMismatch("expected 6 parameters, got 5".to_string());
        assert!(format!("{}", err).contains("expected 6 parameters, got 5"));

        let err = DeconvError::UnknownVariant("Lorentzian".to_string());
        assert!(format!("{}", err).contains("\"Lorentzian\""));

        assert_eq!(
            DeconvError::EmptyGuesses.to_string(),
            "At least one initial guess is required"
        );
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<Vec<f64>>("[1.0,").unwrap_err();
        let err: DeconvError = json_err.into();

        match err {
            DeconvError::JsonError(_) => (),
            _ => panic!("Expected JsonError variant"),
        }
    }
}
