//! Error types for the underwriting orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, UnderwritingError>;

#[derive(Error, Debug)]
pub enum UnderwritingError {

    // =============================
    // Pre-flight Failures
    // =============================

    #[error("Generation service credential is not configured")]
    MissingCredential,

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("No documents supplied for analysis")]
    EmptyArtifactSet,

    // =============================
    // Generation Service Failures
    // =============================

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Generation service returned no text")]
    EmptyResponse,

    #[error("Malformed generation output: {0}")]
    MalformedOutput(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
