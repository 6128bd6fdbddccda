//! Error taxonomy for Source Clients (C1):
//!
//! - transient network/5xx -> retryable
//! - HTTP 429 -> rate-limited with a backoff hint
//! - HTTP 4xx (other than 429) -> permanent
//! - malformed payload -> permanent, with a diagnostic

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transient error, retryable: {0}")]
    Retryable(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("permanent upstream error: {0}")]
    Permanent(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Retryable(_) | ClientError::RateLimited { .. })
    }
}

impl From<ClientError> for the_foundation::CryptexError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Retryable(msg) => the_foundation::CryptexError::StorageTransient(msg),
            ClientError::RateLimited { retry_after } => {
                the_foundation::CryptexError::PermanentUpstream(format!(
                    "rate limited, retry after {retry_after:?}"
                ))
            }
            ClientError::Permanent(msg) => the_foundation::CryptexError::PermanentUpstream(msg),
            ClientError::Malformed(msg) => the_foundation::CryptexError::PermanentUpstream(msg),
        }
    }
}
