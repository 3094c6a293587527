//! sealgate-storage: the Backend Client capability and its variants
//!
//! Variants are picked once, at construction, from `[backend] kind`:
//! `memory`, `fs` and `s3` go through OpenDAL; `remote` speaks the backend
//! line protocol to another sealgated process.

pub mod backend;
pub mod health;
pub mod operator;
pub mod protocol;
pub mod remote;

pub use backend::{Backend, OpendalBackend};
pub use health::check_health;
pub use remote::RemoteBackend;

use anyhow::Result;
use sealgate_core::config::{BackendConfig, BackendKind};
use std::sync::Arc;

/// Build the backend selected by `cfg.kind`.
pub fn build_backend(cfg: &BackendConfig) -> Result<Arc<dyn Backend>> {
    match cfg.kind {
        BackendKind::Remote => Ok(Arc::new(RemoteBackend::new(cfg.remote_addr.clone()))),
        _ => build_store(cfg).map(|b| Arc::new(b) as Arc<dyn Backend>),
    }
}

/// Build an OpenDAL-backed store. Fails for `kind = "remote"`.
pub fn build_store(cfg: &BackendConfig) -> Result<OpendalBackend> {
    let op = operator::build_from_core_config(cfg)?;
    let kind = match cfg.kind {
        BackendKind::Memory => "memory",
        BackendKind::Fs => "fs",
        BackendKind::S3 => "s3",
        BackendKind::Remote => "remote",
    };
    Ok(OpendalBackend::new(op, &cfg.prefix, kind))
}
