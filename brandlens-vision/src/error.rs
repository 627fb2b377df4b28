//! Error types for brandlens-vision
//!
//! Capability failures never surface here: capability clients convert them
//! into empty evidence, and the engine clamps out-of-range requests. These
//! errors cover manifest loading and artifact persistence.

use thiserror::Error;

/// Vision engine error type
#[derive(Debug, Error)]
pub enum VisionError {
    /// Request manifest could not be read or parsed
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Artifact could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Artifact could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for vision operations
pub type VisionResult<T> = Result<T, VisionError>;
