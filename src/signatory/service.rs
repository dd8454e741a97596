//! Signing service
//!
//! The routing table from key hash to vault is built once from the keys each
//! vault reports and never changes afterwards, so lookups take no lock and a
//! slow vault only ever holds up requests for its own keys.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use super::audit_span;
use crate::crypto::KeyHash;
use crate::policy::{Policy, PolicyError};
use crate::types::ErrorKind;
use crate::vault::{Vault, VaultError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatoryError {
    #[error("key {0} is not available")]
    UnknownKey(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("key {key_hash} is offered by both {first} and {second}")]
    DuplicateKey {
        key_hash: KeyHash,
        first: String,
        second: String,
    },
}

impl SignatoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Policy(err) => err.kind(),
            Self::Vault(err) => err.kind(),
            _ => ErrorKind::Temporary,
        }
    }
}

/// Core operations the HTTP layer depends on
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    /// Sign `message` with the key behind `key_hash`, returning the encoded signature.
    async fn sign(
        &self,
        cancel: &CancellationToken,
        key_hash: &str,
        message: &[u8],
    ) -> Result<String, SignatoryError>;

    /// Encoded public key behind `key_hash`.
    async fn get_public_key(&self, cancel: &CancellationToken, key_hash: &str) -> Result<String, SignatoryError>;

    /// Routable key hashes, sorted
    fn key_hashes(&self) -> Vec<KeyHash>;

    fn key_count(&self) -> usize {
        self.key_hashes().len()
    }
}

struct Route {
    vault: Arc<dyn Vault>,
    key_id: String,
}

fn vault_label(vault: &dyn Vault) -> String {
    match vault.as_named() {
        Some(named) => format!("{} ({})", vault.name(), named.vault_name()),
        None => vault.name().to_string(),
    }
}

pub struct Signatory {
    routes: HashMap<KeyHash, Route>,
    policy: Arc<dyn Policy>,
}

impl Signatory {
    /// Ask every vault for its keys and build the routing table.
    pub async fn build(
        vaults: Vec<Arc<dyn Vault>>,
        policy: Arc<dyn Policy>,
        cancel: &CancellationToken,
    ) -> Result<Self, SignatoryError> {
        let mut routes: HashMap<KeyHash, Route> = HashMap::new();

        for vault in vaults {
            let keys = vault.list_public_keys(cancel).await?;
            if keys.is_empty() {
                warn!(vault = %vault_label(vault.as_ref()), "Vault holds no keys");
            }

            for stored in keys {
                let key_hash = stored.public_key.hash();
                if let Some(existing) = routes.get(&key_hash) {
                    return Err(SignatoryError::DuplicateKey {
                        key_hash,
                        first: vault_label(existing.vault.as_ref()),
                        second: vault_label(vault.as_ref()),
                    });
                }

                info!(
                    pkh = %key_hash,
                    vault = %vault_label(vault.as_ref()),
                    key_id = %stored.key_id,
                    "Key available"
                );
                routes.insert(
                    key_hash,
                    Route {
                        vault: Arc::clone(&vault),
                        key_id: stored.key_id,
                    },
                );
            }
        }

        Ok(Self { routes, policy })
    }

    fn route(&self, key_hash: &str) -> Result<(&KeyHash, &Route), SignatoryError> {
        self.routes
            .get_key_value(key_hash)
            .ok_or_else(|| SignatoryError::UnknownKey(key_hash.to_string()))
    }
}

#[async_trait::async_trait]
impl Signer for Signatory {
    async fn sign(
        &self,
        cancel: &CancellationToken,
        key_hash: &str,
        message: &[u8],
    ) -> Result<String, SignatoryError> {
        let (key_hash, route) = self.route(key_hash)?;
        let span = audit_span(key_hash, route.vault.as_ref());
        span.record("key_id", route.key_id.as_str());

        info!(parent: &span, "Requesting signing operation");

        if let Err(err) = self.policy.evaluate(key_hash, message).instrument(span.clone()).await {
            warn!(parent: &span, error = %err, "Policy refused signing");
            return Err(err.into());
        }

        let signature = route
            .vault
            .sign(cancel, &route.key_id, message)
            .instrument(span.clone())
            .await?;

        info!(parent: &span, "Signed");
        Ok(signature.to_string())
    }

    async fn get_public_key(&self, cancel: &CancellationToken, key_hash: &str) -> Result<String, SignatoryError> {
        let (key_hash, route) = self.route(key_hash)?;
        let span = audit_span(key_hash, route.vault.as_ref());
        span.record("key_id", route.key_id.as_str());

        info!(parent: &span, "Requesting public key");

        let public_key = route
            .vault
            .get_public_key(cancel, &route.key_id)
            .instrument(span)
            .await?;
        Ok(public_key.to_string())
    }

    fn key_hashes(&self) -> Vec<KeyHash> {
        let mut hashes: Vec<KeyHash> = self.routes.keys().cloned().collect();
        hashes.sort();
        hashes
    }

    fn key_count(&self) -> usize {
        self.routes.len()
    }
}
