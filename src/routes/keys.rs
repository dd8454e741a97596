//! Key routes
//!
//! - `POST /keys/{hash}` - sign a hex-encoded message
//! - `GET /keys/{hash}` - public key lookup
//!
//! Sign failures are checked in a fixed order: body decoding (400), then
//! authentication (401/403), then the signatory (500).

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::response::json_response;
use crate::auth::{AuthError, AuthRequest, AUTH_QUERY_PARAM};
use crate::server::AppState;
use crate::signatory::SignatoryError;
use crate::types::{KeystoneError, Result};

/// serde_json reports every premature end differently; callers see one message
const UNEXPECTED_EOF: &str = "unexpected end of JSON input";

#[derive(Debug, Serialize)]
pub struct SignResponse {
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct PublicKeyRecord {
    pub public_key: String,
}

/// First `authentication` value in the query string.
fn auth_signature(query: Option<&str>) -> std::result::Result<Option<String>, AuthError> {
    let Some(query) = query else {
        return Ok(None);
    };

    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(query).map_err(|e| AuthError::Invalid(format!("malformed query: {}", e)))?;

    Ok(pairs
        .into_iter()
        .find(|(key, _)| key == AUTH_QUERY_PARAM)
        .map(|(_, value)| value))
}

/// Decode a JSON string of hex into the message bytes.
pub fn decode_sign_body(body: &[u8]) -> Result<Vec<u8>> {
    let encoded: String = serde_json::from_slice(body).map_err(|e| {
        if e.is_eof() {
            KeystoneError::Decode(UNEXPECTED_EOF.to_string())
        } else {
            KeystoneError::Decode(e.to_string())
        }
    })?;

    hex::decode(encoded).map_err(|e| KeystoneError::Decode(e.to_string()))
}

/// Await a signatory call, cancelling `cancel` if `timeout` expires first.
pub(crate) async fn with_deadline<T, F>(timeout: Duration, cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, SignatoryError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(KeystoneError::from),
        Err(_) => {
            cancel.cancel();
            Err(KeystoneError::DeadlineExceeded)
        }
    }
}

/// POST /keys/{hash}
pub async fn handle_sign(
    state: &AppState,
    cancel: &CancellationToken,
    path: &str,
    key_hash: &str,
    query: Option<&str>,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>> {
    let message = decode_sign_body(body)?;

    let signature = match auth_signature(query) {
        Ok(signature) => signature,
        Err(err) if state.auth.is_enabled() => {
            warn!(pkh = key_hash, error = %err, "Rejected signing request");
            return Err(err.into());
        }
        Err(_) => None,
    };
    let auth_request = AuthRequest {
        method: "POST",
        path,
        body: body.as_ref(),
        signature: signature.as_deref(),
    };
    if let Err(err) = state.auth.authenticate(&auth_request) {
        warn!(pkh = key_hash, error = %err, "Rejected signing request");
        return Err(err.into());
    }

    let signature = with_deadline(
        state.request_timeout,
        cancel,
        state.signer.sign(cancel, key_hash, &message),
    )
    .await?;

    Ok(json_response(StatusCode::OK, &SignResponse { signature }))
}

/// GET /keys/{hash}
pub async fn handle_get_public_key(
    state: &AppState,
    cancel: &CancellationToken,
    key_hash: &str,
) -> Result<Response<Full<Bytes>>> {
    let public_key = with_deadline(
        state.request_timeout,
        cancel,
        state.signer.get_public_key(cancel, key_hash),
    )
    .await?;

    Ok(json_response(StatusCode::OK, &PublicKeyRecord { public_key }))
}
