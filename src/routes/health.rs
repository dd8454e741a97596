//! Health and discovery endpoints
//!
//! - /health - liveness probe with the number of routable keys
//! - /authorized_keys - key hashes a caller may authenticate with; `{}` when
//!   authentication is off

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::response::json_response;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Keys the signatory can route to
    pub keys: usize,
}

#[derive(Serialize)]
pub struct AuthorizedKeysResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_keys: Option<Vec<String>>,
}

/// GET /health
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let response = HealthResponse {
        status: "ok",
        keys: state.signer.key_count(),
    };
    json_response(StatusCode::OK, &response)
}

/// GET /authorized_keys
pub fn authorized_keys(state: &AppState) -> Response<Full<Bytes>> {
    let authorized_keys = state.auth.authorized_keys().map(|keys| {
        keys.hashes()
            .into_iter()
            .map(|hash| hash.to_string())
            .collect()
    });
    json_response(StatusCode::OK, &AuthorizedKeysResponse { authorized_keys })
}
