//! Unified application error.
//!
//! Every layer funnels into `AppError`; the API crate maps it onto HTTP
//! responses. Validation failures carry their own variants so handlers can
//! translate them without string matching.

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid expiry time for upload link")]
    InvalidExpiry,

    #[error("unknown or expired upload link")]
    InvalidUploadId,

    #[error("no image exists for the given id")]
    InvalidImage,

    #[error("failed to stream image data")]
    StreamFailure,

    #[error("you're not allowed to perform that action")]
    Unauthorized,

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status the error maps to at the API boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::InvalidExpiry | AppError::MalformedBody(_) => 400,
            AppError::Unauthorized => 403,
            AppError::InvalidUploadId | AppError::InvalidImage => 404,
            AppError::StreamFailure | AppError::Database(_) | AppError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_classes() {
        assert_eq!(AppError::InvalidExpiry.status_code(), 400);
        assert_eq!(AppError::MalformedBody("nope".into()).status_code(), 400);
        assert_eq!(AppError::Unauthorized.status_code(), 403);
        assert_eq!(AppError::InvalidUploadId.status_code(), 404);
        assert_eq!(AppError::InvalidImage.status_code(), 404);
        assert_eq!(AppError::StreamFailure.status_code(), 500);
        assert_eq!(AppError::Database("down".into()).status_code(), 500);
    }
}
