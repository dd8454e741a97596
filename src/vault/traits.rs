//! Vault capability set.
//!
//! A vault owns private key material and never hands it back. The signatory
//! addresses keys by the vault's own opaque `key_id`; the chain-level key hash
//! is derived outside the vault from the public key it reports.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{PublicKey, Signature};
use crate::types::ErrorKind;

/// JWK key type tag for every imported key
pub const JWK_KEY_TYPE: &str = "EC";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("{message}")]
    Backend { message: String, kind: ErrorKind },

    #[error("key {0} not found in vault")]
    KeyNotFound(String),

    #[error("vault operation cancelled")]
    Cancelled,

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
}

impl VaultError {
    /// Retryable backend failure
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            kind: ErrorKind::Temporary,
        }
    }

    /// Backend failure the caller should not retry
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            kind: ErrorKind::Permanent,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend { kind, .. } => *kind,
            _ => ErrorKind::Temporary,
        }
    }
}

/// A key held by a vault
#[derive(Debug, Clone)]
pub struct StoredKey {
    pub key_id: String,
    pub public_key: PublicKey,
}

/// Elliptic-curve key pair in JWK form, the only shape a vault import accepts.
///
/// Coordinates and the scalar are base64url without padding.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
    pub d: String,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("d", &"[REDACTED]")
            .finish()
    }
}

/// Instance naming, probed only when enriching audit records.
pub trait NamedVault {
    fn vault_name(&self) -> &str;
}

/// Signing backend.
///
/// Every operation takes the request's cancellation token. Honouring it is
/// best effort: a backend may finish an operation after the caller gave up.
#[async_trait::async_trait]
pub trait Vault: Send + Sync {
    /// Backend type name
    fn name(&self) -> &str;

    async fn list_public_keys(&self, cancel: &CancellationToken) -> Result<Vec<StoredKey>, VaultError>;

    async fn get_public_key(&self, cancel: &CancellationToken, key_id: &str) -> Result<PublicKey, VaultError>;

    /// Sign `message`; the vault hashes it with the chain's digest.
    async fn sign(
        &self,
        cancel: &CancellationToken,
        key_id: &str,
        message: &[u8],
    ) -> Result<Signature, VaultError>;

    /// Provision a key and return the vault-assigned key id.
    async fn import(&self, cancel: &CancellationToken, material: &KeyMaterial) -> Result<String, VaultError>;

    fn as_named(&self) -> Option<&dyn NamedVault> {
        None
    }
}
