//! Vault backends
//!
//! - `traits` - the capability set every backend implements
//! - `memory` - in-process backend for imported keys

pub mod memory;
pub mod traits;

pub use memory::MemoryVault;
pub use traits::{KeyMaterial, NamedVault, StoredKey, Vault, VaultError, JWK_KEY_TYPE};
