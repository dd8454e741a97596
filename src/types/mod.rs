//! Shared types for Keystone

pub mod error;

pub use error::{ErrorKind, KeystoneError, Result};
