//! Authentication for Keystone
//!
//! Provides:
//! - The authorized key set built from configuration
//! - Signature-based request authentication

pub mod authenticator;
pub mod authorized_keys;

pub use authenticator::{signing_bytes, AuthError, AuthRequest, Authenticator, AUTH_QUERY_PARAM};
pub use authorized_keys::{AuthorizedKeys, AuthorizedKeysError};
