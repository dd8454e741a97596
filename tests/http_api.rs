//! End-to-end tests: HTTP dispatcher against the real signatory and the
//! in-memory vault.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ed25519_dalek::Signer as _;
use http_body_util::{BodyExt, Full};
use hyper::{Request, StatusCode};
use rand::rngs::OsRng;
use tokio_util::sync::CancellationToken;

use keystone::auth::{signing_bytes, AuthorizedKeys, Authenticator};
use keystone::crypto::{base58, digest, Curve, KeyHash, PublicKey, Signature};
use keystone::policy::{AllowAll, MagicBytePolicy, Policy};
use keystone::server::{handle_request, AppState};
use keystone::signatory::{import_key, Signatory};
use keystone::vault::{KeyMaterial, MemoryVault, StoredKey, Vault, VaultError};

struct Harness {
    state: Arc<AppState>,
    public_key: PublicKey,
    key_hash: KeyHash,
}

/// Memory vault whose signing never finishes unless cancelled
struct SlowVault(MemoryVault);

#[async_trait::async_trait]
impl Vault for SlowVault {
    fn name(&self) -> &str {
        "slow"
    }

    async fn list_public_keys(&self, cancel: &CancellationToken) -> Result<Vec<StoredKey>, VaultError> {
        self.0.list_public_keys(cancel).await
    }

    async fn get_public_key(&self, cancel: &CancellationToken, key_id: &str) -> Result<PublicKey, VaultError> {
        self.0.get_public_key(cancel, key_id).await
    }

    async fn sign(&self, cancel: &CancellationToken, _key_id: &str, _message: &[u8]) -> Result<Signature, VaultError> {
        cancel.cancelled().await;
        Err(VaultError::Cancelled)
    }

    async fn import(&self, cancel: &CancellationToken, material: &KeyMaterial) -> Result<String, VaultError> {
        self.0.import(cancel, material).await
    }
}

async fn import_p256(vault: &dyn Vault) -> PublicKey {
    let sk = p256::ecdsa::SigningKey::random(&mut OsRng);
    let public_key = PublicKey::P256(sk.verifying_key().clone());
    let secret = base58::encode(base58::P2SK, &sk.to_bytes());
    import_key(&CancellationToken::new(), &public_key.to_string(), &secret, vault)
        .await
        .unwrap();
    public_key
}

async fn harness_with(vault: Arc<dyn Vault>, auth: Authenticator, policy: Arc<dyn Policy>) -> Harness {
    let public_key = import_p256(vault.as_ref()).await;
    let signatory = Signatory::build(vec![vault], policy, &CancellationToken::new())
        .await
        .unwrap();
    let state = AppState::new(Arc::new(signatory), auth).with_timeout(Duration::from_millis(200));
    Harness {
        state: Arc::new(state),
        key_hash: public_key.hash(),
        public_key,
    }
}

async fn harness(auth: Authenticator) -> Harness {
    harness_with(Arc::new(MemoryVault::new("integration")), auth, Arc::new(AllowAll)).await
}

async fn send(state: &Arc<AppState>, method: &str, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    let response = handle_request(Arc::clone(state), req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.last(), Some(&b'\n'));
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn assert_envelope(body: &serde_json::Value, msg: &str) {
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], "failure");
    assert_eq!(records[0]["kind"], "temporary");
    assert_eq!(records[0]["msg"], msg);
}

#[tokio::test]
async fn test_sign_and_verify() {
    let h = harness(Authenticator::disabled()).await;

    let (status, body) = send(&h.state, "POST", &format!("/keys/{}", h.key_hash), "\"03aabbcc\"").await;
    assert_eq!(status, StatusCode::OK);

    let signature: Signature = body["signature"].as_str().unwrap().parse().unwrap();
    assert_eq!(signature.curve(), Some(Curve::P256));
    assert!(h.public_key.verify(&[0x03, 0xaa, 0xbb, 0xcc], &signature).is_ok());
}

#[tokio::test]
async fn test_get_public_key_and_health() {
    let h = harness(Authenticator::disabled()).await;

    let (status, body) = send(&h.state, "GET", &format!("/keys/{}", h.key_hash), "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["public_key"], h.public_key.to_string());

    let (status, body) = send(&h.state, "GET", "/health", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "ok", "keys": 1}));
}

#[tokio::test]
async fn test_unknown_key_hash() {
    let h = harness(Authenticator::disabled()).await;
    let other = PublicKey::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng).verifying_key()).hash();

    let (status, body) = send(&h.state, "POST", &format!("/keys/{}", other), "\"03\"").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&body, &format!("key {} is not available", other));

    let (status, body) = send(&h.state, "GET", &format!("/keys/{}", other), "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&body, &format!("key {} is not available", other));
}

#[tokio::test]
async fn test_authentication_flow() {
    let client = ed25519_dalek::SigningKey::generate(&mut OsRng);
    let intruder = ed25519_dalek::SigningKey::generate(&mut OsRng);
    let client_key = PublicKey::Ed25519(client.verifying_key());
    let auth = Authenticator::new(AuthorizedKeys::parse(&client_key.to_string()).unwrap());
    let h = harness(auth).await;

    let path = format!("/keys/{}", h.key_hash);
    let body = "\"03aabb\"";
    let message = signing_bytes("POST", &path, body.as_bytes());
    let sign_with = |key: &ed25519_dalek::SigningKey| {
        Signature::new(Curve::Ed25519, key.sign(&digest(&message)).to_bytes()).to_string()
    };

    let (status, body_json) = send(&h.state, "POST", &path, body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body_json, "missing authentication signature field");

    let forged = format!("{}?authentication={}", path, sign_with(&intruder));
    let (status, _) = send(&h.state, "POST", &forged, body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let signed = format!("{}?authentication={}", path, sign_with(&client));
    let (status, body_json) = send(&h.state, "POST", &signed, body).await;
    assert_eq!(status, StatusCode::OK);
    let signature: Signature = body_json["signature"].as_str().unwrap().parse().unwrap();
    assert!(h.public_key.verify(&[0x03, 0xaa, 0xbb], &signature).is_ok());

    // Only the first authentication value counts
    let repeated = format!("{}&authentication={}", signed, sign_with(&intruder));
    let (status, _) = send(&h.state, "POST", &repeated, body).await;
    assert_eq!(status, StatusCode::OK);

    // A valid signature does not carry over to another payload
    let (status, _) = send(&h.state, "POST", &signed, "\"03aabbcc\"").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Decoding is checked first
    let (status, body_json) = send(&h.state, "POST", &path, "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body_json, "unexpected end of JSON input");

    let (status, body_json) = send(&h.state, "GET", "/authorized_keys", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_json["authorized_keys"][0], client_key.hash().to_string());
}

#[tokio::test]
async fn test_policy_denial_is_backend_error() {
    let h = harness_with(
        Arc::new(MemoryVault::new("integration")),
        Authenticator::disabled(),
        Arc::new(MagicBytePolicy::new([0x11, 0x12, 0x13], [])),
    )
    .await;
    let path = format!("/keys/{}", h.key_hash);

    let (status, body) = send(&h.state, "POST", &path, "\"03aabb\"").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&body, &format!("magic byte 0x03 is not allowed for {}", h.key_hash));

    let (status, _) = send(&h.state, "POST", &path, "\"11aabb\"").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_deadline_exceeded() {
    let h = harness_with(
        Arc::new(SlowVault(MemoryVault::new("slow"))),
        Authenticator::disabled(),
        Arc::new(AllowAll),
    )
    .await;

    let (status, body) = send(&h.state, "POST", &format!("/keys/{}", h.key_hash), "\"03\"").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&body, "request deadline exceeded");
}
