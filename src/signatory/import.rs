//! Key import.
//!
//! A key pair is validated and converted to JWK key material before the
//! vault is touched; a pair that fails validation never reaches the vault.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

use super::audit_span;
use crate::crypto::{KeyHash, KeyPair, KeyPairError};
use crate::vault::{KeyMaterial, Vault, VaultError, JWK_KEY_TYPE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    KeyPair(#[from] KeyPairError),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// A freshly provisioned key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedKey {
    pub key_id: String,
    pub hash: KeyHash,
}

impl From<&KeyPair> for KeyMaterial {
    fn from(pair: &KeyPair) -> Self {
        Self {
            kty: JWK_KEY_TYPE.to_string(),
            crv: pair.curve_name().to_string(),
            x: URL_SAFE_NO_PAD.encode(pair.x()),
            y: URL_SAFE_NO_PAD.encode(pair.y()),
            d: URL_SAFE_NO_PAD.encode(pair.d().as_slice()),
        }
    }
}

/// Validate `public_key`/`secret_key` and provision them into `vault`.
pub async fn import_key(
    cancel: &CancellationToken,
    public_key: &str,
    secret_key: &str,
    vault: &dyn Vault,
) -> Result<ImportedKey, ImportError> {
    let pair = KeyPair::from_encoded(public_key, secret_key)?;
    let hash = pair.hash();
    let material = KeyMaterial::from(&pair);
    drop(pair);

    let span = audit_span(&hash, vault);
    info!(parent: &span, "Requesting import operation");

    let key_id = vault.import(cancel, &material).instrument(span.clone()).await?;

    span.record("key_id", key_id.as_str());
    info!(parent: &span, "Successfully imported");

    Ok(ImportedKey { key_id, hash })
}
