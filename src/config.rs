//! Configuration for Keystone
//!
//! CLI arguments and environment variable handling using clap.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::warn;

use crate::policy::{parse_magic_bytes, AllowAll, MagicBytePolicy, Policy};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A key pair to import at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub public_key: String,
    pub secret_key: String,
}

/// Keystone - remote signing gateway for Tezos bakers
#[derive(Parser, Debug, Clone)]
#[command(name = "keystone")]
#[command(about = "Remote signer: keeps baking keys in a vault and signs over HTTP")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:6732")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Upper bound on one signing or lookup call, in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Public keys allowed to authenticate signing requests
    /// (comma or whitespace separated). Unset disables authentication.
    #[arg(long, env = "AUTHORIZED_KEYS")]
    pub authorized_keys: Option<String>,

    /// Instance name of the in-memory vault, shown in audit logs
    #[arg(long, env = "VAULT_NAME", default_value = "memory")]
    pub vault_name: String,

    /// Key pair to import at start-up, as PUBLIC:SECRET (repeatable)
    #[arg(long = "key", env = "KEYS", value_delimiter = ',')]
    pub keys: Vec<String>,

    /// Magic bytes allowed to be signed, e.g. 0x11,0x12,0x13 (unset = all)
    #[arg(long, env = "ALLOWED_MAGIC_BYTES")]
    pub allowed_magic_bytes: Option<String>,

    /// Magic bytes refused even when allowed
    #[arg(long, env = "BLOCKED_MAGIC_BYTES")]
    pub blocked_magic_bytes: Option<String>,
}

impl Args {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Start-up key pairs, in command-line order
    pub fn key_specs(&self) -> Result<Vec<KeySpec>, String> {
        self.keys
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(index, entry)| match entry.split_once(':') {
                Some((public, secret)) if !public.is_empty() && !secret.is_empty() => Ok(KeySpec {
                    public_key: public.trim().to_string(),
                    secret_key: secret.trim().to_string(),
                }),
                _ => Err(format!("--key entry #{} is not PUBLIC:SECRET", index + 1)),
            })
            .collect()
    }

    /// Build the signing policy from the magic byte filters
    pub fn policy(&self) -> Result<Arc<dyn Policy>, String> {
        let allowed = self.allowed_magic_bytes.as_deref().map(parse_magic_bytes).transpose()?;
        let blocked = self.blocked_magic_bytes.as_deref().map(parse_magic_bytes).transpose()?;

        if allowed.is_none() && blocked.is_none() {
            warn!("No magic byte filter configured - every message will be signed");
            return Ok(Arc::new(AllowAll));
        }

        Ok(Arc::new(MagicBytePolicy::new(
            allowed.unwrap_or_default(),
            blocked.unwrap_or_default(),
        )))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.vault_name.trim().is_empty() {
            return Err("VAULT_NAME must not be empty".to_string());
        }

        self.key_specs()?;

        for bytes in [&self.allowed_magic_bytes, &self.blocked_magic_bytes].into_iter().flatten() {
            parse_magic_bytes(bytes)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("keystone").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.listen, "0.0.0.0:6732".parse::<SocketAddr>().unwrap());
        assert_eq!(args.log_format, LogFormat::Text);
        assert_eq!(args.request_timeout(), Duration::from_secs(30));
        assert_eq!(args.vault_name, "memory");
        assert!(args.keys.is_empty());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_key_specs() {
        let args = parse(&["--key", "sppkA:spskB", "--key", "p2pkC:p2skD"]);
        assert_eq!(
            args.key_specs().unwrap(),
            vec![
                KeySpec {
                    public_key: "sppkA".into(),
                    secret_key: "spskB".into(),
                },
                KeySpec {
                    public_key: "p2pkC".into(),
                    secret_key: "p2skD".into(),
                },
            ]
        );

        let args = parse(&["--key", "sppk-no-secret"]);
        assert!(args.key_specs().is_err());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_key_error_does_not_echo_secret() {
        let args = parse(&["--key", ":spskVerySecretMaterial"]);
        let err = args.key_specs().unwrap_err();
        assert!(!err.contains("VerySecretMaterial"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let args = parse(&["--request-timeout-ms", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_magic_byte_validation() {
        let args = parse(&["--allowed-magic-bytes", "0x11,0x12", "--blocked-magic-bytes", "0x03"]);
        assert!(args.validate().is_ok());
        assert!(args.policy().is_ok());

        let args = parse(&["--allowed-magic-bytes", "0xzz"]);
        assert!(args.validate().is_err());
        assert!(args.policy().is_err());
    }

    #[test]
    fn test_json_log_format() {
        let args = parse(&["--log-format", "json"]);
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
