use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{SealgateError, SealgateResult};

/// Environment variable overriding `crypto.id_key`
pub const ENV_ID_KEY: &str = "SEALGATE_ID_KEY";
/// Environment variable overriding `crypto.id_nonce`
pub const ENV_ID_NONCE: &str = "SEALGATE_ID_NONCE";

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealgateConfig {
    pub daemon: DaemonConfig,
    pub crypto: CryptoConfig,
    pub backend: BackendConfig,
}

impl SealgateConfig {
    /// Apply environment overrides for secrets that should not live in the file.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a closure.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_ID_KEY) {
            self.crypto.id_key = Some(key);
        }
        if let Some(nonce) = lookup(ENV_ID_NONCE) {
            self.crypto.id_nonce = Some(nonce);
        }
        if self.backend.access_key_id.is_none() {
            self.backend.access_key_id = lookup("AWS_ACCESS_KEY_ID");
        }
        if self.backend.secret_access_key.is_none() {
            self.backend.secret_access_key = lookup("AWS_SECRET_ACCESS_KEY");
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// TCP listen address for the line protocol (default: 127.0.0.1:7777)
    pub listen: String,
    /// TCP listen address for the REST front end (disabled when unset)
    pub http_listen: Option<String>,
    /// Prometheus metrics endpoint (default: 127.0.0.1:9100)
    pub metrics_addr: Option<String>,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7777".into(),
            http_listen: None,
            metrics_addr: Some("127.0.0.1:9100".into()),
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

/// Identifier cipher secrets and record key sizing.
///
/// `id_key` and `id_nonce` are used as the raw bytes of the configured strings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Server-wide identifier cipher key (16, 24 or 32 bytes)
    pub id_key: Option<String>,
    /// Fixed identifier cipher nonce (12 bytes)
    pub id_nonce: Option<String>,
    /// Length in bytes of generated per-record keys (default: 32)
    pub key_size: usize,
}

impl CryptoConfig {
    pub fn id_key_bytes(&self) -> SealgateResult<&[u8]> {
        required(&self.id_key, "crypto.id_key")
    }

    pub fn id_nonce_bytes(&self) -> SealgateResult<&[u8]> {
        required(&self.id_nonce, "crypto.id_nonce")
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> SealgateResult<&'a [u8]> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.as_bytes()),
        _ => Err(SealgateError::Config(format!("missing required setting {name}"))),
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            id_key: None,
            id_nonce: None,
            key_size: 32,
        }
    }
}

impl std::fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("id_key", &self.id_key.as_ref().map(|_| "[REDACTED]"))
            .field("id_nonce", &self.id_nonce.as_ref().map(|_| "[REDACTED]"))
            .field("key_size", &self.key_size)
            .finish()
    }
}

/// Which storage backend the gateway talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process, non-persistent store
    #[default]
    Memory,
    /// Local filesystem under `root`
    Fs,
    /// S3-compatible object store (SeaweedFS, MinIO, AWS)
    S3,
    /// A `sealgated --mode backend` server reached over TCP
    Remote,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// Object path prefix for memory/fs/s3 backends
    pub prefix: String,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// S3 bucket name
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Enforce HTTPS for S3 connections
    pub enforce_tls: bool,
    /// Address of the remote backend server
    pub remote_addr: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            root: PathBuf::from("/var/lib/sealgate"),
            prefix: "records".into(),
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "sealgate".into(),
            access_key_id: None,
            secret_access_key: None,
            enforce_tls: false,
            remote_addr: "127.0.0.1:8888".into(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("root", &self.root)
            .field("prefix", &self.prefix)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("enforce_tls", &self.enforce_tls)
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}
