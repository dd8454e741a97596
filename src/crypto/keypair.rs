//! Validated ECDSA key pairs built from their encoded halves.
//!
//! A `KeyPair` only exists once the public key has been checked against the
//! point derived from the secret scalar, so anything built from it (key
//! material for a vault import) inherits that guarantee.

use zeroize::Zeroizing;

use super::base58;
use super::keys::{invalid_key, CryptoError, Curve, KeyHash, PublicKey};

/// Secret scalar length for secp256k1 and P-256
pub const SECRET_KEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyPairError {
    #[error("invalid public key: {0}")]
    PublicKey(CryptoError),

    #[error("invalid secret key: {0}")]
    SecretKey(CryptoError),

    #[error("encrypted secret keys are not supported, decrypt it first")]
    Encrypted,

    #[error("{0} keys cannot be imported as EC key material")]
    UnsupportedCurve(Curve),

    #[error("public key is {public} but secret key is {secret}")]
    CurveMismatch { public: Curve, secret: Curve },

    #[error("public key does not match secret key")]
    Mismatch,
}

enum SecretScalar {
    Secp256k1(k256::ecdsa::SigningKey),
    P256(p256::ecdsa::SigningKey),
}

impl SecretScalar {
    fn parse(encoded: &str) -> Result<Self, KeyPairError> {
        if ["edesk", "spesk", "p2esk"].iter().any(|p| encoded.starts_with(p)) {
            return Err(KeyPairError::Encrypted);
        }

        if encoded.starts_with("spsk") {
            let bytes = base58::decode(encoded, base58::SPSK, SECRET_KEY_LEN)
                .map_err(KeyPairError::SecretKey)?;
            k256::ecdsa::SigningKey::from_slice(&bytes)
                .map(Self::Secp256k1)
                .map_err(|e| KeyPairError::SecretKey(invalid_key(Curve::Secp256k1, e)))
        } else if encoded.starts_with("p2sk") {
            let bytes = base58::decode(encoded, base58::P2SK, SECRET_KEY_LEN)
                .map_err(KeyPairError::SecretKey)?;
            p256::ecdsa::SigningKey::from_slice(&bytes)
                .map(Self::P256)
                .map_err(|e| KeyPairError::SecretKey(invalid_key(Curve::P256, e)))
        } else if encoded.starts_with("edsk") {
            Err(KeyPairError::UnsupportedCurve(Curve::Ed25519))
        } else {
            Err(KeyPairError::SecretKey(CryptoError::UnknownPrefix(
                base58::tag(encoded),
            )))
        }
    }

    fn curve(&self) -> Curve {
        match self {
            Self::Secp256k1(_) => Curve::Secp256k1,
            Self::P256(_) => Curve::P256,
        }
    }

    fn public_key(&self) -> PublicKey {
        match self {
            Self::Secp256k1(key) => PublicKey::Secp256k1(key.verifying_key().clone()),
            Self::P256(key) => PublicKey::P256(key.verifying_key().clone()),
        }
    }

    fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        match self {
            Self::Secp256k1(key) => Zeroizing::new(key.to_bytes().to_vec()),
            Self::P256(key) => Zeroizing::new(key.to_bytes().to_vec()),
        }
    }
}

/// An elliptic-curve key pair whose halves are known to agree.
pub struct KeyPair {
    public_key: PublicKey,
    secret: SecretScalar,
}

impl KeyPair {
    /// Parse both halves and cross-check them on the declared curve.
    pub fn from_encoded(public_key: &str, secret_key: &str) -> Result<Self, KeyPairError> {
        let public_key: PublicKey = public_key.parse().map_err(KeyPairError::PublicKey)?;
        if public_key.curve() == Curve::Ed25519 {
            return Err(KeyPairError::UnsupportedCurve(Curve::Ed25519));
        }

        let secret = SecretScalar::parse(secret_key)?;
        if secret.curve() != public_key.curve() {
            return Err(KeyPairError::CurveMismatch {
                public: public_key.curve(),
                secret: secret.curve(),
            });
        }

        if secret.public_key() != public_key {
            return Err(KeyPairError::Mismatch);
        }

        Ok(Self { public_key, secret })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn hash(&self) -> KeyHash {
        self.public_key.hash()
    }

    pub fn curve_name(&self) -> &'static str {
        self.public_key.curve().name()
    }

    pub fn x(&self) -> Vec<u8> {
        self.coordinates().0
    }

    pub fn y(&self) -> Vec<u8> {
        self.coordinates().1
    }

    /// Secret scalar, big-endian
    pub fn d(&self) -> Zeroizing<Vec<u8>> {
        self.secret.to_bytes()
    }

    fn coordinates(&self) -> (Vec<u8>, Vec<u8>) {
        // from_encoded never admits an Ed25519 public key
        self.public_key.coordinates().unwrap_or_default()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key.to_string())
            .finish_non_exhaustive()
    }
}
