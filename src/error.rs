// src/error.rs
// Standardized error types for Mnemo

use thiserror::Error;

/// Main error type for the Mnemo library.
///
/// Each variant carries a short machine-readable code (`code()`), which is
/// what reaches the wire; messages are human-readable and never contain
/// stack traces.
#[derive(Error, Debug, Clone)]
pub enum MnemoError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("session queue full: {0}")]
    Busy(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("endpoint unavailable: {0}")]
    EndpointUnavailable(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Result using MnemoError
pub type Result<T> = std::result::Result<T, MnemoError>;

impl MnemoError {
    /// Short machine-readable code carried in every error payload
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "INVALID_PARAMETER",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Busy(_) => "BUSY",
            Self::Timeout(_) => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::EndpointUnavailable(_) => "ENDPOINT_UNAVAILABLE",
            Self::MalformedResponse(_) => "MALFORMED_RESPONSE",
            Self::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            Self::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP status for this error kind
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidParameter(_) | Self::ConstraintViolation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Busy(_) => 429,
            Self::Timeout(_) | Self::Cancelled => 408,
            _ => 500,
        }
    }

    /// Whether retrieval may recover from this error by degrading
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::Provider(_)
                | Self::Parse(_)
                | Self::EndpointUnavailable(_)
                | Self::MalformedResponse(_)
                | Self::DimensionMismatch { .. }
        )
    }
}

impl From<serde_json::Error> for MnemoError {
    fn from(err: serde_json::Error) -> Self {
        MnemoError::Parse(err.to_string())
    }
}

impl From<tokio::task::JoinError> for MnemoError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            MnemoError::Cancelled
        } else {
            MnemoError::Internal(err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for MnemoError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        MnemoError::Timeout("deadline elapsed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            MnemoError::InvalidParameter("x".into()).code(),
            "INVALID_PARAMETER"
        );
        assert_eq!(MnemoError::Cancelled.code(), "CANCELLED");
        assert_eq!(
            MnemoError::DimensionMismatch {
                expected: 768,
                actual: 3
            }
            .code(),
            "DIMENSION_MISMATCH"
        );
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(MnemoError::InvalidParameter("x".into()).http_status(), 400);
        assert_eq!(MnemoError::NotFound("x".into()).http_status(), 404);
        assert_eq!(MnemoError::Busy("x".into()).http_status(), 429);
        assert_eq!(MnemoError::Timeout("x".into()).http_status(), 408);
        assert_eq!(MnemoError::Cancelled.http_status(), 408);
        assert_eq!(MnemoError::Provider("x".into()).http_status(), 500);
        assert_eq!(MnemoError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn test_provider_errors_are_degradable() {
        assert!(MnemoError::Provider("down".into()).is_degradable());
        assert!(MnemoError::EndpointUnavailable("down".into()).is_degradable());
        assert!(!MnemoError::InvalidParameter("bad".into()).is_degradable());
        assert!(!MnemoError::Cancelled.is_degradable());
    }
}
