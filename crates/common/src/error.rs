//! Common error types shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::NotFound`] → 404
/// - [`ServiceError::Internal`] → 500
///
/// Field encryption failures are deliberately absent: they are recovered
/// inside the write hook and never surface to callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed, e.g. a body that is not a JSON object.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The addressed record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::NotFound(_) => 404,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}
