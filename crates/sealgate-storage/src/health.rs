//! Backend health check

use anyhow::Result;
use sealgate_core::BackendError;

use crate::backend::Backend;

/// Raw backend key used for probing.
///
/// Sealed ids are always at least nonce + tag (28 bytes) long, so this short
/// key can never collide with a real entry.
pub const PROBE_ID: &[u8] = b"\0probe";

/// Verify the backend answers a lookup. A missing probe entry is healthy.
pub async fn check_health(backend: &dyn Backend) -> Result<()> {
    match backend.retrieve(PROBE_ID).await {
        Ok(_) | Err(BackendError::NotFound) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("{} backend health check failed: {e}", backend.kind())),
    }
}

/// Returns true if the backend is reachable, false otherwise (non-panicking)
pub async fn is_healthy(backend: &dyn Backend) -> bool {
    check_health(backend).await.is_ok()
}
