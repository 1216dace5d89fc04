//! Error types for the Grounded knowledge service.
//!
//! One unified enum covers every failure category the index lifecycle can
//! hit. Each variant doubles as the reason code surfaced by operator-facing
//! operations, so callers can assert on *why* a stage degraded instead of
//! receiving a bare failure flag.

use thiserror::Error;

/// Unified error type for the Grounded knowledge service.
///
/// All fallible functions return `Result<T, AppError>`. Errors are
/// propagated with `?` up to the lifecycle manager boundary, where they are
/// converted into an unavailable state rather than crashing the process.
#[derive(Error, Debug)]
pub enum AppError {
    /// Embedding backend unreachable or misconfigured
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// No documents found under the knowledge root
    #[error("No source documents found: {0}")]
    SourceEmpty(String),

    /// Durable index present but unreadable, incomplete, or inconsistent
    #[error("Index artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single source document could not be read or parsed
    #[error("Document error: {0}")]
    Document(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl AppError {
    /// Short stable reason code for status reporting.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AppError::ProviderUnavailable(_) => "provider_unavailable",
            AppError::SourceEmpty(_) => "source_empty",
            AppError::ArtifactCorrupt(_) => "artifact_corrupt",
            AppError::Io(_) => "io_failure",
            AppError::Document(_) => "document",
            AppError::Config(_) => "config",
            AppError::Serialization(_) => "serialization",
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(
            AppError::ProviderUnavailable("down".into()).reason_code(),
            "provider_unavailable"
        );
        assert_eq!(
            AppError::SourceEmpty("empty".into()).reason_code(),
            "source_empty"
        );
        assert_eq!(
            AppError::ArtifactCorrupt("bad".into()).reason_code(),
            "artifact_corrupt"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AppError = io.into();
        assert_eq!(err.reason_code(), "io_failure");
        assert!(err.to_string().contains("missing"));
    }
}
