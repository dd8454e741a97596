//! Public keys, key hashes and signatures.
//!
//! All three Tezos signature schemes sign the blake2b-256 digest of the
//! message: Ed25519 signs the digest bytes, the ECDSA curves treat the digest
//! as the prehash.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use blake2::digest::consts::{U20, U32};
use blake2::{Blake2b, Digest};
use ed25519_dalek::Verifier;
use p256::ecdsa::signature::hazmat::PrehashVerifier;

use super::base58;

type Blake2b160 = Blake2b<U20>;
type Blake2b256 = Blake2b<U32>;

/// Ed25519 public key length
pub const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// Compressed SEC1 point length for secp256k1 and P-256
pub const COMPRESSED_POINT_LEN: usize = 33;

/// Raw signature length for every supported scheme
pub const SIGNATURE_LEN: usize = 64;

/// Key hash payload length (blake2b-160)
pub const KEY_HASH_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("base58 decoding failed: {0}")]
    Base58(String),

    #[error("unknown encoding prefix {0:?}")]
    UnknownPrefix(String),

    #[error("invalid payload length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("invalid {curve} key: {reason}")]
    InvalidKey { curve: Curve, reason: String },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signature verification failed")]
    Verification,
}

/// Signature scheme of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curve {
    Ed25519,
    Secp256k1,
    P256,
}

impl Curve {
    /// Curve name as used in JWK `crv`
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ed25519 => "Ed25519",
            Self::Secp256k1 => "secp256k1",
            Self::P256 => "P-256",
        }
    }

    fn key_hash_prefix(&self) -> &'static [u8] {
        match self {
            Self::Ed25519 => base58::TZ1,
            Self::Secp256k1 => base58::TZ2,
            Self::P256 => base58::TZ3,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// blake2b-256 digest of `message`, the value every signature covers
pub fn digest(message: &[u8]) -> [u8; 32] {
    Blake2b256::digest(message).into()
}

// =============================================================================
// Key Hash
// =============================================================================

/// Public key hash (`tz1...`, `tz2...`, `tz3...`), the address of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyHash(String);

impl KeyHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for KeyHash {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Public Key
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    Secp256k1(k256::ecdsa::VerifyingKey),
    P256(p256::ecdsa::VerifyingKey),
}

impl PublicKey {
    pub fn curve(&self) -> Curve {
        match self {
            Self::Ed25519(_) => Curve::Ed25519,
            Self::Secp256k1(_) => Curve::Secp256k1,
            Self::P256(_) => Curve::P256,
        }
    }

    /// Raw key bytes: 32 bytes for Ed25519, compressed SEC1 otherwise
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Ed25519(key) => key.to_bytes().to_vec(),
            Self::Secp256k1(key) => key.to_encoded_point(true).as_bytes().to_vec(),
            Self::P256(key) => key.to_encoded_point(true).as_bytes().to_vec(),
        }
    }

    /// Affine X/Y coordinates of an ECDSA point, `None` for Ed25519
    pub fn coordinates(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        let point = match self {
            Self::Ed25519(_) => return None,
            Self::Secp256k1(key) => key.to_encoded_point(false).as_bytes().to_vec(),
            Self::P256(key) => key.to_encoded_point(false).as_bytes().to_vec(),
        };
        // 0x04 || X || Y
        let (x, y) = point[1..].split_at(32);
        Some((x.to_vec(), y.to_vec()))
    }

    pub fn hash(&self) -> KeyHash {
        let hash = Blake2b160::digest(self.to_bytes());
        KeyHash(base58::encode(self.curve().key_hash_prefix(), &hash))
    }

    /// Verify `signature` over the digest of `message`.
    ///
    /// A signature tagged with another curve never verifies; a generic
    /// signature is checked with this key's scheme.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        if signature.curve().is_some_and(|curve| curve != self.curve()) {
            return Err(CryptoError::Verification);
        }

        let digest = digest(message);
        let bytes = signature.as_bytes();
        match self {
            Self::Ed25519(key) => {
                let sig = ed25519_dalek::Signature::from_bytes(bytes);
                key.verify(&digest, &sig).map_err(|_| CryptoError::Verification)
            }
            Self::Secp256k1(key) => {
                let sig = k256::ecdsa::Signature::from_slice(bytes)
                    .map_err(|_| CryptoError::Verification)?;
                key.verify_prehash(&digest, &sig)
                    .map_err(|_| CryptoError::Verification)
            }
            Self::P256(key) => {
                let sig = p256::ecdsa::Signature::from_slice(bytes)
                    .map_err(|_| CryptoError::Verification)?;
                key.verify_prehash(&digest, &sig)
                    .map_err(|_| CryptoError::Verification)
            }
        }
    }
}

impl FromStr for PublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("edpk") {
            let bytes = base58::decode(s, base58::EDPK, ED25519_PUBLIC_KEY_LEN)?;
            let mut raw = [0u8; ED25519_PUBLIC_KEY_LEN];
            raw.copy_from_slice(&bytes);
            ed25519_dalek::VerifyingKey::from_bytes(&raw)
                .map(Self::Ed25519)
                .map_err(|e| invalid_key(Curve::Ed25519, e))
        } else if s.starts_with("sppk") {
            let bytes = base58::decode(s, base58::SPPK, COMPRESSED_POINT_LEN)?;
            k256::ecdsa::VerifyingKey::from_sec1_bytes(&bytes)
                .map(Self::Secp256k1)
                .map_err(|e| invalid_key(Curve::Secp256k1, e))
        } else if s.starts_with("p2pk") {
            let bytes = base58::decode(s, base58::P2PK, COMPRESSED_POINT_LEN)?;
            p256::ecdsa::VerifyingKey::from_sec1_bytes(&bytes)
                .map(Self::P256)
                .map_err(|e| invalid_key(Curve::P256, e))
        } else {
            Err(CryptoError::UnknownPrefix(base58::tag(s)))
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self {
            Self::Ed25519(_) => base58::EDPK,
            Self::Secp256k1(_) => base58::SPPK,
            Self::P256(_) => base58::P2PK,
        };
        f.write_str(&base58::encode(prefix, &self.to_bytes()))
    }
}

pub(crate) fn invalid_key(curve: Curve, err: impl fmt::Display) -> CryptoError {
    CryptoError::InvalidKey {
        curve,
        reason: err.to_string(),
    }
}

// =============================================================================
// Signature
// =============================================================================

/// A 64-byte signature, optionally tagged with the curve that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    curve: Option<Curve>,
    bytes: [u8; SIGNATURE_LEN],
}

impl Signature {
    pub fn new(curve: Curve, bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self {
            curve: Some(curve),
            bytes,
        }
    }

    /// Untagged (`sig...`) signature
    pub fn generic(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self { curve: None, bytes }
    }

    pub fn curve(&self) -> Option<Curve> {
        self.curve
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.bytes
    }
}

impl FromStr for Signature {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (curve, prefix) = if s.starts_with("edsig") {
            (Some(Curve::Ed25519), base58::EDSIG)
        } else if s.starts_with("spsig1") {
            (Some(Curve::Secp256k1), base58::SPSIG)
        } else if s.starts_with("p2sig") {
            (Some(Curve::P256), base58::P2SIG)
        } else if s.starts_with("sig") {
            (None, base58::SIG)
        } else {
            return Err(CryptoError::InvalidSignature(format!(
                "unknown signature prefix {:?}",
                base58::tag(s)
            )));
        };

        let payload = base58::decode(s, prefix, SIGNATURE_LEN)?;
        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes.copy_from_slice(&payload);
        Ok(Self { curve, bytes })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.curve {
            Some(Curve::Ed25519) => base58::EDSIG,
            Some(Curve::Secp256k1) => base58::SPSIG,
            Some(Curve::P256) => base58::P2SIG,
            None => base58::SIG,
        };
        f.write_str(&base58::encode(prefix, &self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Signer;
    use p256::ecdsa::signature::hazmat::PrehashSigner;
    use rand::rngs::OsRng;

    fn ed25519_pair() -> (ed25519_dalek::SigningKey, PublicKey) {
        let sk = ed25519_dalek::SigningKey::generate(&mut OsRng);
        let pk = PublicKey::Ed25519(sk.verifying_key());
        (sk, pk)
    }

    #[test]
    fn test_parse_known_ed25519_key() {
        let encoded = "edpktpQKJF4vRodmSfT3h6LrYisshQuJeoybUxB9c8s3b1QymvisHC";
        let key: PublicKey = encoded.parse().unwrap();

        assert_eq!(key.curve(), Curve::Ed25519);
        assert_eq!(key.to_string(), encoded);

        let hash = key.hash();
        assert!(hash.as_str().starts_with("tz1"));
        assert_eq!(hash.as_str().len(), 36);
    }

    #[test]
    fn test_ecdsa_keys_roundtrip_and_hash_prefix() {
        let k1 = k256::ecdsa::SigningKey::random(&mut OsRng);
        let secp = PublicKey::Secp256k1(k1.verifying_key().clone());
        let parsed: PublicKey = secp.to_string().parse().unwrap();
        assert_eq!(parsed, secp);
        assert!(secp.to_string().starts_with("sppk"));
        assert!(secp.hash().as_str().starts_with("tz2"));

        let r1 = p256::ecdsa::SigningKey::random(&mut OsRng);
        let nist = PublicKey::P256(r1.verifying_key().clone());
        let parsed: PublicKey = nist.to_string().parse().unwrap();
        assert_eq!(parsed, nist);
        assert!(nist.to_string().starts_with("p2pk"));
        assert!(nist.hash().as_str().starts_with("tz3"));
    }

    #[test]
    fn test_hash_is_stable() {
        let (_, pk) = ed25519_pair();
        assert_eq!(pk.hash(), pk.hash());
        let reparsed: PublicKey = pk.to_string().parse().unwrap();
        assert_eq!(reparsed.hash(), pk.hash());
    }

    #[test]
    fn test_unknown_prefix_rejected() {
        let err = "tz1Wk1Wdczh5BzyZ1uz2DW9xdFg9B5cFuGFm".parse::<PublicKey>().unwrap_err();
        assert!(matches!(err, CryptoError::UnknownPrefix(_)));
    }

    #[test]
    fn test_coordinates_only_for_ecdsa() {
        let (_, ed) = ed25519_pair();
        assert!(ed.coordinates().is_none());

        let sk = p256::ecdsa::SigningKey::random(&mut OsRng);
        let (x, y) = PublicKey::P256(sk.verifying_key().clone()).coordinates().unwrap();
        assert_eq!(x.len(), 32);
        assert_eq!(y.len(), 32);
    }

    #[test]
    fn test_ed25519_verify() {
        let (sk, pk) = ed25519_pair();
        let message = b"\x03payload";
        let sig = Signature::new(Curve::Ed25519, sk.sign(&digest(message)).to_bytes());

        assert!(pk.verify(message, &sig).is_ok());
        assert_eq!(pk.verify(b"\x03other", &sig), Err(CryptoError::Verification));

        // Generic encoding is checked with the key's own scheme
        let generic = Signature::generic(*sig.as_bytes());
        assert!(pk.verify(message, &generic).is_ok());
    }

    #[test]
    fn test_ecdsa_verify() {
        let sk = k256::ecdsa::SigningKey::random(&mut OsRng);
        let pk = PublicKey::Secp256k1(sk.verifying_key().clone());
        let message = b"\x11block";
        let sig: k256::ecdsa::Signature = sk.sign_prehash(&digest(message)).unwrap();
        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes.copy_from_slice(&sig.to_bytes());
        let sig = Signature::new(Curve::Secp256k1, bytes);

        assert!(pk.verify(message, &sig).is_ok());
        assert!(pk.verify(b"\x11other", &sig).is_err());
    }

    #[test]
    fn test_signature_for_other_curve_never_verifies() {
        let (sk, pk) = ed25519_pair();
        let message = b"msg";
        let bytes = sk.sign(&digest(message)).to_bytes();

        let mislabelled = Signature::new(Curve::P256, bytes);
        assert_eq!(pk.verify(message, &mislabelled), Err(CryptoError::Verification));
    }

    #[test]
    fn test_signature_encoding_roundtrip() {
        for curve in [Curve::Ed25519, Curve::Secp256k1, Curve::P256] {
            let sig = Signature::new(curve, [9u8; SIGNATURE_LEN]);
            let parsed: Signature = sig.to_string().parse().unwrap();
            assert_eq!(parsed, sig);
        }
        let generic = Signature::generic([9u8; SIGNATURE_LEN]);
        assert!(generic.to_string().starts_with("sig"));
        assert_eq!(generic.to_string().parse::<Signature>().unwrap(), generic);
    }

    #[test]
    fn test_malformed_signature() {
        assert!(matches!(
            "hello".parse::<Signature>(),
            Err(CryptoError::InvalidSignature(_))
        ));
        assert!("edsigNOTBASE58!!".parse::<Signature>().is_err());
    }
}
