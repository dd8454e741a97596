//! Keystone - remote signing gateway for Tezos bakers
//!
//! Keystone sits between baker software and the vault holding its keys.
//! Bakers address keys by key hash over HTTP; Keystone authenticates the
//! caller, consults the signing policy and forwards the message to the vault
//! that owns the key.
//!
//! ## Components
//!
//! - **Auth**: authorized key set and request signature checks
//! - **Signatory**: key hash routing, policy check, vault delegation, key import
//! - **Vault**: backend capability set plus an in-memory backend
//! - **Policy**: magic byte filtering before anything is signed
//! - **Routes/Server**: hyper HTTP front end with a uniform error envelope

pub mod auth;
pub mod config;
pub mod crypto;
pub mod policy;
pub mod routes;
pub mod server;
pub mod signatory;
pub mod types;
pub mod vault;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{KeystoneError, Result};
