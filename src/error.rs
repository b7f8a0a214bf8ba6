//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, SnapEraseError>;

/// Error taxonomy for the tensor pipeline and its ambient services
#[derive(Error, Debug)]
pub enum SnapEraseError {
    /// Degenerate input geometry (zero width or height)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model artifact missing, unreadable or rejected by the runtime
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The inference backend failed while producing a prediction
    #[error("Inference failure: {0}")]
    InferenceFailure(String),

    /// A shape or dimension check between pipeline stages failed
    #[error("Internal invariant violation: {0}")]
    InternalInvariantViolation(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The run was cancelled between stages
    #[error("Processing cancelled before {0}")]
    Cancelled(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl SnapEraseError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new model unavailable error
    pub fn model_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::ModelUnavailable(msg.into())
    }

    /// Create a new inference failure error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::InferenceFailure(msg.into())
    }

    /// Create a new internal invariant violation
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        Self::InternalInvariantViolation(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a model error with the offending path and troubleshooting hints
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let path_display = model_path.as_ref().display();
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::ModelUnavailable(format!(
            "Failed to {} model '{}': {}.{}",
            operation, path_display, error, suggestion_text
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Whether this error points at a bug rather than at the caller's input
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalInvariantViolation(_))
    }
}
