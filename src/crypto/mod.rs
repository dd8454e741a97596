//! Tezos key, hash and signature encodings

pub mod base58;
pub mod keypair;
pub mod keys;

pub use keypair::{KeyPair, KeyPairError};
pub use keys::{digest, CryptoError, Curve, KeyHash, PublicKey, Signature};
