//! Error types for Keystone
//!
//! Every failure that reaches the wire is one of these variants. The variant
//! decides the HTTP status and the envelope `kind`; `Display` is the envelope
//! `msg`.

use hyper::StatusCode;
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::signatory::SignatoryError;

/// Retryability hint carried by every error envelope record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    #[default]
    Temporary,
    Permanent,
}

/// Main error type for Keystone operations
#[derive(Debug, thiserror::Error)]
pub enum KeystoneError {
    /// Malformed wire payload; the decoder's message is kept as-is
    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("no route for {0}")]
    NotFound(String),

    /// Policy engine or vault failure, message untouched
    #[error("{message}")]
    Backend { message: String, kind: ErrorKind },

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeystoneError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Backend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DeadlineExceeded => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Envelope `kind` for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend { kind, .. } => *kind,
            _ => ErrorKind::Temporary,
        }
    }

    /// Envelope `id` tag
    pub fn id(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            _ => "failure",
        }
    }
}

impl From<AuthError> for KeystoneError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Missing => Self::Unauthorized(err.to_string()),
            AuthError::Invalid(_) => Self::Forbidden(err.to_string()),
        }
    }
}

impl From<SignatoryError> for KeystoneError {
    fn from(err: SignatoryError) -> Self {
        Self::Backend {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for Keystone operations
pub type Result<T> = std::result::Result<T, KeystoneError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::VaultError;

    #[test]
    fn test_status_precedence_codes() {
        assert_eq!(KeystoneError::Decode("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(KeystoneError::from(AuthError::Missing).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            KeystoneError::from(AuthError::Invalid("bad".into())).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(KeystoneError::DeadlineExceeded.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_backend_message_is_untouched() {
        let err: KeystoneError = SignatoryError::Vault(VaultError::backend("hsm offline")).into();
        assert_eq!(err.to_string(), "hsm offline");
        assert_eq!(err.kind(), ErrorKind::Temporary);
        assert_eq!(err.id(), "failure");
    }

    #[test]
    fn test_backend_can_signal_permanent() {
        let err: KeystoneError = SignatoryError::Vault(VaultError::permanent("key destroyed")).into();
        assert_eq!(err.kind(), ErrorKind::Permanent);
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ErrorKind::Temporary).unwrap(), "\"temporary\"");
        assert_eq!(serde_json::to_string(&ErrorKind::Permanent).unwrap(), "\"permanent\"");
    }
}
