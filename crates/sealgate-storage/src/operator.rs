//! OpenDAL Operator factory for sealgate storage backends

use anyhow::{Context, Result};
use opendal::Operator;
use sealgate_core::config::{BackendConfig, BackendKind};
use secrecy::{ExposeSecret, SecretString};

/// Minimal config needed to build an S3 operator
#[derive(Debug)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: SecretString,
}

/// Build an OpenDAL Operator for SeaweedFS S3 (or any S3-compatible endpoint)
///
/// Uses path-style addressing (default in opendal 0.55), which is required by
/// SeaweedFS and MinIO.
pub fn build_s3_operator(cfg: &S3Config) -> Result<Operator> {
    let builder = opendal::services::S3::default()
        .endpoint(&cfg.endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket)
        .access_key_id(&cfg.access_key_id)
        .secret_access_key(cfg.secret_access_key.expose_secret());

    let op = Operator::new(builder)
        .context("creating OpenDAL S3 operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

/// In-process store. Contents vanish with the process.
pub fn build_memory_operator() -> Result<Operator> {
    Ok(Operator::new(opendal::services::Memory::default())
        .context("creating OpenDAL memory operator")?
        .finish())
}

/// Local filesystem store rooted at `root`.
pub fn build_fs_operator(root: &std::path::Path) -> Result<Operator> {
    let root = root
        .to_str()
        .with_context(|| format!("fs root is not valid UTF-8: {}", root.display()))?;
    let op = Operator::new(opendal::services::Fs::default().root(root))
        .context("creating OpenDAL fs operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();
    Ok(op)
}

/// Build the operator selected by `backend.kind`.
///
/// If `enforce_tls` is true and an S3 endpoint uses HTTP, this returns an error.
/// Otherwise, a warning is logged for non-HTTPS endpoints.
pub fn build_from_core_config(backend: &BackendConfig) -> Result<Operator> {
    match backend.kind {
        BackendKind::Memory => build_memory_operator(),
        BackendKind::Fs => build_fs_operator(&backend.root),
        BackendKind::S3 => {
            if backend.endpoint.starts_with("http://") {
                if backend.enforce_tls {
                    anyhow::bail!(
                        "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                         Use an HTTPS endpoint or set backend.enforce_tls = false for local development.",
                        backend.endpoint
                    );
                }
                tracing::warn!(
                    endpoint = %backend.endpoint,
                    "S3 endpoint uses plaintext HTTP; credentials are transmitted unencrypted"
                );
            }

            let access_key_id = backend
                .access_key_id
                .clone()
                .context("S3 credentials not set: backend.access_key_id or AWS_ACCESS_KEY_ID")?;
            let secret_access_key = backend
                .secret_access_key
                .clone()
                .context("backend.secret_access_key or AWS_SECRET_ACCESS_KEY not set")?;

            build_s3_operator(&S3Config {
                endpoint: backend.endpoint.clone(),
                region: backend.region.clone(),
                bucket: backend.bucket.clone(),
                access_key_id,
                secret_access_key: SecretString::from(secret_access_key),
            })
        }
        BackendKind::Remote => {
            anyhow::bail!("the remote backend is a TCP client, not an object store")
        }
    }
}
