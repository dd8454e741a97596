//! Keystone - remote signing gateway for Tezos bakers

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keystone::{
    auth::{AuthorizedKeys, Authenticator},
    config::{Args, LogFormat},
    server::{self, AppState},
    signatory::{import_key, Signatory},
    vault::{MemoryVault, Vault},
    KeystoneError,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Keystone - remote signer");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Vault: memory ({})", args.vault_name);
    info!("Request timeout: {} ms", args.request_timeout_ms);
    info!("======================================");

    let state = match build_state(&args).await {
        Ok(state) => state,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    server::run(Arc::new(state), args.listen).await?;

    info!("Keystone stopped");
    Ok(())
}

fn init_tracing(args: &Args) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("keystone={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);

    match args.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// Authenticator, vault with start-up keys, policy and routing table
async fn build_state(args: &Args) -> keystone::Result<AppState> {
    let auth = match args.authorized_keys.as_deref() {
        Some(text) => {
            let keys = AuthorizedKeys::parse(text).map_err(|e| KeystoneError::Config(e.to_string()))?;
            info!("Authentication enabled with {} authorized key(s)", keys.len());
            for hash in keys.hashes() {
                info!("  authorized: {}", hash);
            }
            Authenticator::new(keys)
        }
        None => {
            warn!("AUTHORIZED_KEYS not set - signing requests are not authenticated");
            Authenticator::disabled()
        }
    };

    let cancel = CancellationToken::new();
    let vault = Arc::new(MemoryVault::new(args.vault_name.clone()));

    for spec in args.key_specs().map_err(KeystoneError::Config)? {
        let imported = import_key(&cancel, &spec.public_key, &spec.secret_key, vault.as_ref())
            .await
            .map_err(|e| KeystoneError::Config(format!("importing {}: {}", spec.public_key, e)))?;
        info!(pkh = %imported.hash, key_id = %imported.key_id, "Imported start-up key");
    }

    let policy = args.policy().map_err(KeystoneError::Config)?;
    let vaults: Vec<Arc<dyn Vault>> = vec![vault];
    let signatory = Signatory::build(vaults, policy, &cancel)
        .await
        .map_err(|e| KeystoneError::Config(e.to_string()))?;

    Ok(AppState::new(Arc::new(signatory), auth).with_timeout(args.request_timeout()))
}
