//! Backend line-protocol server over a local store

use async_trait::async_trait;
use sealgate_core::line::error_line;
use sealgate_core::SealgateResult;
use sealgate_storage::protocol::{BackendRequest, SUCCESS};
use sealgate_storage::Backend;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::session::Responder;

/// Answers `STORE`/`RETRIEVE`/`DELETE` from a gateway's `RemoteBackend`.
///
/// Keys and values arrive already sealed; this side never holds secrets.
pub struct BackendResponder {
    store: Arc<dyn Backend>,
}

impl BackendResponder {
    pub fn new(store: Arc<dyn Backend>) -> Self {
        Self { store }
    }

    async fn handle(&self, request: BackendRequest) -> SealgateResult<String> {
        match request {
            BackendRequest::Store { id, envelope } => {
                self.store.store(&id, &envelope).await?;
                Ok(format!("{SUCCESS}\n"))
            }
            BackendRequest::Retrieve { id } => {
                let envelope = self.store.retrieve(&id).await?;
                Ok(format!("{}\n", hex::encode(envelope)))
            }
            BackendRequest::Delete { id } => {
                self.store.delete(&id).await?;
                Ok("\n".to_string())
            }
        }
    }
}

#[async_trait]
impl Responder for BackendResponder {
    async fn respond(&self, line: &str) -> String {
        let result = match BackendRequest::decode(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                debug!("backend entry not found");
                error_line(&e.to_string())
            }
            Err(e) => {
                warn!(backend = self.store.kind(), error = %e, "backend request failed");
                error_line(&e.to_string())
            }
        }
    }
}
