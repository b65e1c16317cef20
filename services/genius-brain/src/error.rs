//! Error types for the brain
//!
//! Two layers: `ProducerError` is absorbed per producer and turned into an
//! inactive signal, `BrainError` is what a caller of a whole decision cycle
//! can actually see.

/// Failure of a single producer call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProducerError {
    #[error("Producer timed out after {0}ms")]
    Timeout(u64),

    #[error("Producer failed: {0}")]
    Failed(String),

    #[error("Invalid producer output: {0}")]
    InvalidOutput(String),

    #[error("Producer panicked: {0}")]
    Panicked(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Invalid response format: {0}")]
    Decode(String),
}

/// Errors that abort a decision cycle or engine construction
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrainError {
    /// Market input too short or malformed to derive risk levels
    #[error("Input validation failed: {0}")]
    InputValidation(String),

    /// Bad weights, thresholds or producer registration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller cancelled the cycle before all producers reported
    #[error("Decision cycle cancelled")]
    Cancelled,
}

/// Result type for brain operations
pub type Result<T> = std::result::Result<T, BrainError>;
