//! Request authentication
//!
//! A caller proves it holds an authorized key by signing the canonical bytes
//! of the request and passing the signature in the `authentication` query
//! parameter. The canonical bytes cover method, path and body, so a
//! signature cannot be replayed against another request.

use std::sync::Arc;

use hyper::StatusCode;
use tracing::debug;

use super::authorized_keys::AuthorizedKeys;
use crate::crypto::Signature;

/// Query parameter carrying the request signature
pub const AUTH_QUERY_PARAM: &str = "authentication";

/// Tag byte leading the canonical request bytes
const REQUEST_TAG: u8 = 0x04;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing authentication signature field")]
    Missing,

    #[error("invalid authentication signature: {0}")]
    Invalid(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Missing => StatusCode::UNAUTHORIZED,
            Self::Invalid(_) => StatusCode::FORBIDDEN,
        }
    }
}

/// Bytes a caller signs: `0x04 || METHOD || 0x00 || PATH || 0x00 || BODY`
pub fn signing_bytes(method: &str, path: &str, body: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(3 + method.len() + path.len() + body.len());
    bytes.push(REQUEST_TAG);
    bytes.extend_from_slice(method.to_ascii_uppercase().as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(path.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(body);
    bytes
}

/// The parts of a request that authentication looks at
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub body: &'a [u8],
    pub signature: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    keys: Option<Arc<AuthorizedKeys>>,
}

impl Authenticator {
    /// Every request passes
    pub fn disabled() -> Self {
        Self { keys: None }
    }

    pub fn new(keys: AuthorizedKeys) -> Self {
        Self {
            keys: Some(Arc::new(keys)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.keys.is_some()
    }

    pub fn authorized_keys(&self) -> Option<&AuthorizedKeys> {
        self.keys.as_deref()
    }

    pub fn authenticate(&self, request: &AuthRequest<'_>) -> Result<(), AuthError> {
        let Some(keys) = &self.keys else {
            return Ok(());
        };

        let encoded = request
            .signature
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::Missing)?;

        let signature = encoded
            .parse::<Signature>()
            .map_err(|e| AuthError::Invalid(e.to_string()))?;

        let message = signing_bytes(request.method, request.path, request.body);
        match keys.verify(&message, &signature) {
            Some(key_hash) => {
                debug!(authorized_key = %key_hash, path = request.path, "Request authenticated");
                Ok(())
            }
            None => Err(AuthError::Invalid("no authorized key matches".into())),
        }
    }
}
