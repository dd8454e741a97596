//! Response encoding
//!
//! Every body is JSON followed by a single newline. Failures always use the
//! error envelope: an array of `{id, kind, msg}` records.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::types::{ErrorKind, KeystoneError};

/// Envelope used when the response itself cannot be encoded
const SERIALIZATION_FAILURE: &[u8] =
    b"[{\"id\":\"failure\",\"kind\":\"temporary\",\"msg\":\"response serialization failed\"}]\n";

/// One entry of the error envelope
#[derive(Debug, Serialize)]
pub struct ErrorRecord {
    pub id: &'static str,
    pub kind: ErrorKind,
    pub msg: String,
}

impl From<&KeystoneError> for ErrorRecord {
    fn from(err: &KeystoneError) -> Self {
        Self {
            id: err.id(),
            kind: err.kind(),
            msg: err.to_string(),
        }
    }
}

fn with_body(status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Serialize `value` as the response body
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(mut body) => {
            body.push(b'\n');
            with_body(status, body)
        }
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            with_body(StatusCode::INTERNAL_SERVER_ERROR, SERIALIZATION_FAILURE.to_vec())
        }
    }
}

/// Single-record error envelope for `err`
pub fn error_response(err: &KeystoneError) -> Response<Full<Bytes>> {
    json_response(err.status_code(), &[ErrorRecord::from(err)])
}
