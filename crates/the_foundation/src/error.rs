//! Error types shared across CRYPTEX crates.
//!
//! Lives in The Foundation rather than The Collective because crates with no
//! need for caching or observability (the normalizer, the assessor) still
//! need to return `CryptexResult`.

use thiserror::Error;

/// CryptexError - All possible errors in the CRYPTEX system
///
/// Follows the principle of transparent error reporting - no hidden failures,
/// all errors are explicit and informative.
#[derive(Error, Debug)]
pub enum CryptexError {
    /// Configuration error - The Charter is invalid or incomplete
    #[error("Charter error: {0}")]
    CharterError(String),

    /// Agitator (AI provider) error
    #[error("Agitator error: {0}")]
    AgitatorError(String),

    /// Network/HTTP error against an upstream source; transient by default
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Upstream responded with a non-retryable failure (4xx other than 429,
    /// or a payload that doesn't parse as the expected shape).
    #[error("Permanent upstream error: {0}")]
    PermanentUpstream(String),

    /// Archive (database) error believed to be a constraint violation or
    /// other permanent schema-level failure.
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// Archive error believed to be transient (connection loss, pool
    /// exhaustion); callers may retry the batch.
    #[error("Storage transient error: {0}")]
    StorageTransient(String),

    /// Invalid inquiry structure
    #[error("Invalid inquiry: {0}")]
    InvalidInquiry(String),

    /// Timeout - operation took too long
    #[error("Timeout: operation exceeded time limit")]
    Timeout,

    /// Input to the read API does not satisfy its contract
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for unexpected/impossible states
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// CryptexResult - Standard Result type for CRYPTEX operations
///
/// All fallible operations should return this type.
pub type CryptexResult<T> = Result<T, CryptexError>;

impl CryptexError {
    pub fn charter<S: Into<String>>(msg: S) -> Self {
        CryptexError::CharterError(msg.into())
    }

    pub fn agitator<S: Into<String>>(msg: S) -> Self {
        CryptexError::AgitatorError(msg.into())
    }

    /// Wrap a lower-level transport failure (client construction, connect,
    /// send) that didn't arrive via `reqwest::Error`'s own `From` impl.
    pub fn network<S: Into<String>>(msg: S) -> Self {
        CryptexError::AgitatorError(format!("network error: {}", msg.into()))
    }

    pub fn permanent_upstream<S: Into<String>>(msg: S) -> Self {
        CryptexError::PermanentUpstream(msg.into())
    }

    pub fn archive<S: Into<String>>(msg: S) -> Self {
        CryptexError::ArchiveError(msg.into())
    }

    pub fn storage_transient<S: Into<String>>(msg: S) -> Self {
        CryptexError::StorageTransient(msg.into())
    }

    pub fn invalid_inquiry<S: Into<String>>(msg: S) -> Self {
        CryptexError::InvalidInquiry(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        CryptexError::NotFound(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        CryptexError::ValidationError(msg.into())
    }

    pub fn unknown<S: Into<String>>(msg: S) -> Self {
        CryptexError::Unknown(msg.into())
    }

    /// Whether a caller should retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CryptexError::NetworkError(_) | CryptexError::StorageTransient(_) | CryptexError::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CryptexError::charter("Invalid configuration");
        assert!(matches!(err, CryptexError::CharterError(_)));
        assert_eq!(err.to_string(), "Charter error: Invalid configuration");
    }

    #[test]
    fn test_agitator_error() {
        let err = CryptexError::agitator("OpenAI API key missing");
        assert!(matches!(err, CryptexError::AgitatorError(_)));
    }

    #[test]
    fn test_result_type() {
        fn returns_result() -> CryptexResult<String> {
            Ok("success".to_string())
        }

        assert!(returns_result().is_ok());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CryptexError::Timeout.is_retryable());
        assert!(CryptexError::storage_transient("connection reset").is_retryable());
        assert!(!CryptexError::validation("bad input").is_retryable());
        assert!(!CryptexError::not_found("CVE-2024-0001").is_retryable());
    }
}
