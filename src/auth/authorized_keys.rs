//! Set of public keys allowed to authenticate signing requests
//!
//! Built once at start-up from configuration text and read-only afterwards.

use std::str::FromStr;

use crate::crypto::{CryptoError, KeyHash, PublicKey, Signature};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizedKeysError {
    #[error("authorized key list is empty")]
    Empty,

    #[error("invalid authorized key {key:?}: {source}")]
    Invalid { key: String, source: CryptoError },
}

#[derive(Debug, Clone)]
struct AuthorizedKey {
    public_key: PublicKey,
    hash: KeyHash,
}

/// Immutable authorized key set, in configuration order
#[derive(Debug, Clone)]
pub struct AuthorizedKeys {
    keys: Vec<AuthorizedKey>,
}

impl AuthorizedKeys {
    /// Parse keys separated by commas and/or whitespace. One bad entry fails the whole set.
    pub fn parse(text: &str) -> Result<Self, AuthorizedKeysError> {
        let keys = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let public_key: PublicKey = entry.parse().map_err(|source| AuthorizedKeysError::Invalid {
                    key: entry.to_string(),
                    source,
                })?;
                let hash = public_key.hash();
                Ok(AuthorizedKey { public_key, hash })
            })
            .collect::<Result<Vec<_>, AuthorizedKeysError>>()?;

        if keys.is_empty() {
            return Err(AuthorizedKeysError::Empty);
        }
        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn hashes(&self) -> Vec<KeyHash> {
        self.keys.iter().map(|key| key.hash.clone()).collect()
    }

    /// Hash of the first key that verifies `signature` over `message`
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Option<&KeyHash> {
        self.keys
            .iter()
            .find(|key| key.public_key.verify(message, signature).is_ok())
            .map(|key| &key.hash)
    }
}

impl FromStr for AuthorizedKeys {
    type Err = AuthorizedKeysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
