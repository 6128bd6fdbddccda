//! Error envelope for the read-side API: every error response carries
//! `{error, status_code, details, path}` (spec.md section 6.2). Internal
//! storage failures never leak their message to the caller; only the
//! classified error kinds below do.

use axum::extract::OriginalUri;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use the_foundation::CryptexError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    status_code: u16,
    details: Option<Value>,
    path: String,
}

/// API error wrapper. `path` is filled in by [`ApiError::with_path`] from an
/// `OriginalUri` extractor at the handler boundary, since the error type
/// itself has no access to the request.
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<Value>,
    path: String,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
            path: String::new(),
            headers: Vec::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Scenario 3 (spec.md section 8): the 61st request in a minute gets
    /// `retry_after=60` and `X-RateLimit-Remaining-Minute: 0`.
    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        let mut err = Self::new(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded")
            .with_details(serde_json::json!({ "retry_after": retry_after_seconds }));
        err.headers.push((
            HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&retry_after_seconds.to_string()).unwrap(),
        ));
        err.headers.push((
            HeaderName::from_static("x-ratelimit-remaining-minute"),
            HeaderValue::from_static("0"),
        ));
        err
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

impl From<CryptexError> for ApiError {
    fn from(err: CryptexError) -> Self {
        match err {
            CryptexError::NotFound(msg) => ApiError::new(StatusCode::NOT_FOUND, msg),
            CryptexError::ValidationError(msg) => ApiError::new(StatusCode::BAD_REQUEST, msg),
            other => {
                tracing::error!("unclassified storage error: {:?}", other);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            status_code: self.status.as_u16(),
            details: self.details,
            path: self.path,
        };

        let mut response = (self.status, Json(body)).into_response();
        for (name, value) in self.headers {
            response.headers_mut().insert(name, value);
        }
        response
    }
}

/// Wraps a fallible handler body so `?` on a `CryptexError`/validation error
/// automatically carries the request path into the error envelope. Handlers
/// take `OriginalUri` as their first extractor and pass it to this helper
/// around the rest of their body.
pub async fn with_request_path<F, T>(uri: OriginalUri, f: F) -> Result<T, ApiError>
where
    F: std::future::Future<Output = Result<T, ApiError>>,
{
    f.await.map_err(|e| e.with_path(uri.0.path().to_string()))
}
