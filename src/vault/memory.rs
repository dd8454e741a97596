//! In-process vault.
//!
//! Keys only ever arrive as JWK key material and are held in a concurrent
//! map keyed by a random key id. Scalars are wiped when an entry is dropped.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::traits::{KeyMaterial, NamedVault, StoredKey, Vault, VaultError, JWK_KEY_TYPE};
use crate::crypto::keys::SIGNATURE_LEN;
use crate::crypto::{digest, Curve, PublicKey, Signature};

#[derive(Clone)]
enum MemoryKey {
    Secp256k1(k256::ecdsa::SigningKey),
    P256(p256::ecdsa::SigningKey),
}

impl MemoryKey {
    fn from_material(material: &KeyMaterial) -> Result<Self, VaultError> {
        if material.kty != JWK_KEY_TYPE {
            return Err(VaultError::InvalidKeyMaterial(format!(
                "unsupported key type {:?}",
                material.kty
            )));
        }

        let d = zeroize::Zeroizing::new(decode_field("d", &material.d)?);
        let key = if material.crv == Curve::Secp256k1.name() {
            k256::ecdsa::SigningKey::from_slice(&d)
                .map(Self::Secp256k1)
                .map_err(|e| VaultError::InvalidKeyMaterial(e.to_string()))?
        } else if material.crv == Curve::P256.name() {
            p256::ecdsa::SigningKey::from_slice(&d)
                .map(Self::P256)
                .map_err(|e| VaultError::InvalidKeyMaterial(e.to_string()))?
        } else {
            return Err(VaultError::InvalidKeyMaterial(format!(
                "unsupported curve {:?}",
                material.crv
            )));
        };

        let x = decode_field("x", &material.x)?;
        let y = decode_field("y", &material.y)?;
        match key.public_key().coordinates() {
            Some((px, py)) if px == x && py == y => Ok(key),
            _ => Err(VaultError::InvalidKeyMaterial(
                "public coordinates do not match the private scalar".into(),
            )),
        }
    }

    fn public_key(&self) -> PublicKey {
        match self {
            Self::Secp256k1(key) => PublicKey::Secp256k1(key.verifying_key().clone()),
            Self::P256(key) => PublicKey::P256(key.verifying_key().clone()),
        }
    }

    fn sign(&self, message: &[u8]) -> Result<Signature, VaultError> {
        let digest = digest(message);
        let mut bytes = [0u8; SIGNATURE_LEN];
        let curve = match self {
            Self::Secp256k1(key) => {
                let sig: k256::ecdsa::Signature = key
                    .sign_prehash(&digest)
                    .map_err(|e| VaultError::backend(e.to_string()))?;
                let sig = sig.normalize_s().unwrap_or(sig);
                bytes.copy_from_slice(&sig.to_bytes());
                Curve::Secp256k1
            }
            Self::P256(key) => {
                let sig: p256::ecdsa::Signature = key
                    .sign_prehash(&digest)
                    .map_err(|e| VaultError::backend(e.to_string()))?;
                bytes.copy_from_slice(&sig.to_bytes());
                Curve::P256
            }
        };
        Ok(Signature::new(curve, bytes))
    }
}

fn decode_field(field: &str, value: &str) -> Result<Vec<u8>, VaultError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| VaultError::InvalidKeyMaterial(format!("{}: {}", field, e)))
}

/// Vault backed by process memory.
pub struct MemoryVault {
    name: String,
    keys: DashMap<String, MemoryKey>,
}

impl MemoryVault {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn key(&self, key_id: &str) -> Result<MemoryKey, VaultError> {
        self.keys
            .get(key_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| VaultError::KeyNotFound(key_id.to_string()))
    }
}

impl NamedVault for MemoryVault {
    fn vault_name(&self) -> &str {
        &self.name
    }
}

#[async_trait::async_trait]
impl Vault for MemoryVault {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_public_keys(&self, _cancel: &CancellationToken) -> Result<Vec<StoredKey>, VaultError> {
        Ok(self
            .keys
            .iter()
            .map(|entry| StoredKey {
                key_id: entry.key().clone(),
                public_key: entry.value().public_key(),
            })
            .collect())
    }

    async fn get_public_key(&self, _cancel: &CancellationToken, key_id: &str) -> Result<PublicKey, VaultError> {
        self.key(key_id).map(|key| key.public_key())
    }

    async fn sign(
        &self,
        cancel: &CancellationToken,
        key_id: &str,
        message: &[u8],
    ) -> Result<Signature, VaultError> {
        if cancel.is_cancelled() {
            return Err(VaultError::Cancelled);
        }
        self.key(key_id)?.sign(message)
    }

    async fn import(&self, cancel: &CancellationToken, material: &KeyMaterial) -> Result<String, VaultError> {
        if cancel.is_cancelled() {
            return Err(VaultError::Cancelled);
        }

        let key = MemoryKey::from_material(material)?;
        let key_id = Uuid::new_v4().to_string();
        self.keys.insert(key_id.clone(), key);

        debug!(key_id = %key_id, crv = %material.crv, "Stored key material");
        Ok(key_id)
    }

    fn as_named(&self) -> Option<&dyn NamedVault> {
        Some(self)
    }
}
