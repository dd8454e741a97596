//! Base58check with Tezos binary prefixes.
//!
//! Every encoded value is `base58(prefix || payload || checksum)` where the
//! checksum is the first four bytes of a double SHA-256. The prefix bytes are
//! chosen so the encoded string starts with a readable tag (`tz1`, `edpk`...).

use zeroize::Zeroizing;

use super::keys::CryptoError;

// Key hashes
pub const TZ1: &[u8] = &[6, 161, 159];
pub const TZ2: &[u8] = &[6, 161, 161];
pub const TZ3: &[u8] = &[6, 161, 164];

// Public keys
pub const EDPK: &[u8] = &[13, 15, 37, 217];
pub const SPPK: &[u8] = &[3, 254, 226, 86];
pub const P2PK: &[u8] = &[3, 178, 139, 127];

// Secret keys
pub const SPSK: &[u8] = &[17, 162, 224, 201];
pub const P2SK: &[u8] = &[16, 81, 238, 189];

// Signatures
pub const EDSIG: &[u8] = &[9, 245, 205, 134, 18];
pub const SPSIG: &[u8] = &[13, 115, 101, 19, 63];
pub const P2SIG: &[u8] = &[54, 240, 44, 52];
pub const SIG: &[u8] = &[4, 130, 43];

/// Encode `payload` behind `prefix` with a checksum.
pub fn encode(prefix: &[u8], payload: &[u8]) -> String {
    let mut data = Zeroizing::new(Vec::with_capacity(prefix.len() + payload.len()));
    data.extend_from_slice(prefix);
    data.extend_from_slice(payload);
    bs58::encode(data.as_slice()).with_check().into_string()
}

/// Decode a checksummed string, strip `prefix` and check the payload length.
pub fn decode(encoded: &str, prefix: &[u8], len: usize) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let data = Zeroizing::new(
        bs58::decode(encoded)
            .with_check(None)
            .into_vec()
            .map_err(|e| CryptoError::Base58(e.to_string()))?,
    );

    let payload = data
        .strip_prefix(prefix)
        .ok_or_else(|| CryptoError::UnknownPrefix(tag(encoded)))?;

    if payload.len() != len {
        return Err(CryptoError::Length {
            expected: len,
            actual: payload.len(),
        });
    }

    Ok(Zeroizing::new(payload.to_vec()))
}

/// Readable leading tag of an encoded value, for error messages.
pub(crate) fn tag(encoded: &str) -> String {
    encoded.chars().take(6).collect()
}
