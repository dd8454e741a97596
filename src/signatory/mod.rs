//! Signatory core
//!
//! Resolves key hashes to vaults, consults the policy and forwards signing
//! requests. Also drives key imports into a vault.

pub mod import;
pub mod service;

pub use import::{import_key, ImportError, ImportedKey};
pub use service::{Signatory, SignatoryError, Signer};

use tracing::{field, info_span, Span};

use crate::crypto::KeyHash;
use crate::vault::Vault;

/// Span carrying the audit fields for one operation on one key.
///
/// `vault_name` is only filled when the backend exposes an instance name.
/// `key_id` is left for the caller to record.
pub(crate) fn audit_span(key_hash: &KeyHash, vault: &dyn Vault) -> Span {
    let span = info_span!(
        "signatory",
        pkh = %key_hash,
        vault = vault.name(),
        vault_name = field::Empty,
        key_id = field::Empty,
    );
    if let Some(named) = vault.as_named() {
        span.record("vault_name", named.vault_name());
    }
    span
}
