//! HTTP routes for Keystone

pub mod health;
pub mod keys;
pub mod response;

pub use health::{authorized_keys, health_check};
pub use keys::{decode_sign_body, handle_get_public_key, handle_sign, PublicKeyRecord, SignResponse};
pub use response::{error_response, json_response, ErrorRecord};
