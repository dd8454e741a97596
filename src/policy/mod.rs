//! Signing policy
//!
//! Consulted by the signatory before any vault call. Watermark tracking
//! (refusing to sign twice for the same level/round) belongs to a policy
//! backend; the built-in policies only look at the message's magic byte.

use std::collections::HashSet;

use crate::crypto::KeyHash;
use crate::types::ErrorKind;

/// Policy denial or failure, reported to the caller verbatim
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PolicyError {
    pub message: String,
    pub kind: ErrorKind,
}

impl PolicyError {
    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::Temporary,
        }
    }

    /// Denial the caller should not retry
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::Permanent,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[async_trait::async_trait]
pub trait Policy: Send + Sync {
    async fn evaluate(&self, key_hash: &KeyHash, message: &[u8]) -> Result<(), PolicyError>;
}

/// Signs anything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait::async_trait]
impl Policy for AllowAll {
    async fn evaluate(&self, _key_hash: &KeyHash, _message: &[u8]) -> Result<(), PolicyError> {
        Ok(())
    }
}

/// Filter on the first byte of the message.
///
/// Blocked bytes take precedence over allowed ones. An empty allow list
/// allows every byte that is not blocked.
#[derive(Debug, Clone, Default)]
pub struct MagicBytePolicy {
    allowed: HashSet<u8>,
    blocked: HashSet<u8>,
}

impl MagicBytePolicy {
    pub fn new(allowed: impl IntoIterator<Item = u8>, blocked: impl IntoIterator<Item = u8>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            blocked: blocked.into_iter().collect(),
        }
    }

    fn check(&self, key_hash: &KeyHash, message: &[u8]) -> Result<(), PolicyError> {
        let Some(&magic) = message.first() else {
            return Err(PolicyError::denied(format!(
                "empty message refused for {}",
                key_hash
            )));
        };

        if self.blocked.contains(&magic) {
            return Err(PolicyError::denied(format!(
                "magic byte 0x{:02x} is blocked for {}",
                magic, key_hash
            )));
        }

        if !self.allowed.is_empty() && !self.allowed.contains(&magic) {
            return Err(PolicyError::denied(format!(
                "magic byte 0x{:02x} is not allowed for {}",
                magic, key_hash
            )));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl Policy for MagicBytePolicy {
    async fn evaluate(&self, key_hash: &KeyHash, message: &[u8]) -> Result<(), PolicyError> {
        self.check(key_hash, message)
    }
}

/// Parse a comma separated list of magic bytes (`0x11,0x12,3`).
pub fn parse_magic_bytes(text: &str) -> Result<Vec<u8>, String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => s.parse::<u8>(),
            };
            parsed.map_err(|_| format!("invalid magic byte {:?}", s))
        })
        .collect()
}
