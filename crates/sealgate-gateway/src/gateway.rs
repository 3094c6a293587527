//! Record operations: seal on the way in, open on the way out.

use async_trait::async_trait;
use sealgate_core::config::CryptoConfig;
use sealgate_core::SealgateResult;
use sealgate_crypto::{build_cipher, open_with, seal_record, IdCipher, KeyGenerator, RecordKey};
use sealgate_storage::Backend;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::session::Responder;
use crate::wire::{encode_response, Command, Reply};

/// Stateless request handler shared by every connection.
///
/// Holds no per-record state: record keys go back to the client and the
/// backend only ever sees sealed ids and envelopes.
pub struct Gateway {
    keygen: KeyGenerator,
    id_cipher: IdCipher,
    backend: Arc<dyn Backend>,
}

impl Gateway {
    pub fn new(crypto: &CryptoConfig, backend: Arc<dyn Backend>) -> SealgateResult<Self> {
        let keygen = KeyGenerator::new(crypto.key_size)?;
        let id_cipher = IdCipher::new(crypto.id_key_bytes()?, crypto.id_nonce_bytes()?)?;
        Ok(Self::from_parts(keygen, id_cipher, backend))
    }

    pub fn from_parts(keygen: KeyGenerator, id_cipher: IdCipher, backend: Arc<dyn Backend>) -> Self {
        Self {
            keygen,
            id_cipher,
            backend,
        }
    }

    pub fn key_size(&self) -> usize {
        self.keygen.key_size()
    }

    /// Seal `record` under a fresh key, store it, and hand the key back.
    pub async fn store_record(&self, id: &[u8], record: &[u8]) -> SealgateResult<RecordKey> {
        let sealed_id = self.id_cipher.encrypt_id(id)?;
        let (key, envelope) = seal_record(&self.keygen, record)?;
        self.backend.store(&sealed_id, &envelope).await?;
        Ok(key)
    }

    pub async fn retrieve_record(&self, id: &[u8], key: &[u8]) -> SealgateResult<Vec<u8>> {
        let sealed_id = self.id_cipher.encrypt_id(id)?;
        // A bad key length fails here, before the backend is contacted.
        let cipher = build_cipher(key)?;
        let envelope = self.backend.retrieve(&sealed_id).await?;
        open_with(&cipher, &envelope)
    }

    pub async fn delete_record(&self, id: &[u8]) -> SealgateResult<()> {
        let sealed_id = self.id_cipher.encrypt_id(id)?;
        self.backend.delete(&sealed_id).await?;
        Ok(())
    }

    pub async fn execute(&self, command: Command) -> SealgateResult<Reply> {
        match command {
            Command::Store { id, data } => self.store_record(&id, &data).await.map(Reply::Stored),
            Command::Retrieve { id, key } => {
                self.retrieve_record(&id, &key).await.map(Reply::Retrieved)
            }
            Command::Delete { id } => self.delete_record(&id).await.map(|()| Reply::Deleted),
        }
    }

    /// Decode, execute and encode one front-end request line.
    pub async fn handle_line(&self, line: &str) -> String {
        let result = match Command::decode(line) {
            Ok(command) => {
                let name = command.name();
                debug!(command = name, "request");
                let result = self.execute(command).await;
                if let Err(e) = &result {
                    warn!(command = name, error = %e, "request failed");
                }
                result
            }
            Err(e) => {
                warn!(error = %e, "request rejected");
                Err(e)
            }
        };
        encode_response(&result)
    }
}

#[async_trait]
impl Responder for Gateway {
    async fn respond(&self, line: &str) -> String {
        self.handle_line(line).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealgate_core::{BackendError, SealgateError};
    use sealgate_crypto::{NONCE_SIZE, TAG_SIZE};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    const ID_KEY: &str = "vkAZAarLbZ6w0kmL2HJP3eU1ODCgVj4k";
    const ID_NONCE: &str = "9bc423909ac5";

    /// HashMap backend that counts calls and lets tests reach the raw entries.
    #[derive(Default)]
    struct MapBackend {
        entries: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Backend for MapBackend {
        async fn store(&self, id: &[u8], envelope: &[u8]) -> Result<(), BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entries.lock().await.insert(id.to_vec(), envelope.to_vec());
            Ok(())
        }

        async fn retrieve(&self, id: &[u8]) -> Result<Vec<u8>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entries
                .lock()
                .await
                .get(id)
                .cloned()
                .ok_or(BackendError::NotFound)
        }

        async fn delete(&self, id: &[u8]) -> Result<(), BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entries
                .lock()
                .await
                .remove(id)
                .map(|_| ())
                .ok_or(BackendError::NotFound)
        }

        fn kind(&self) -> &'static str {
            "map"
        }
    }

    struct DownBackend;

    #[async_trait]
    impl Backend for DownBackend {
        async fn store(&self, _: &[u8], _: &[u8]) -> Result<(), BackendError> {
            Err(BackendError::Storage("disk full".into()))
        }
        async fn retrieve(&self, _: &[u8]) -> Result<Vec<u8>, BackendError> {
            Err(BackendError::Storage("disk full".into()))
        }
        async fn delete(&self, _: &[u8]) -> Result<(), BackendError> {
            Err(BackendError::Storage("disk full".into()))
        }
        fn kind(&self) -> &'static str {
            "down"
        }
    }

    fn crypto_config(key_size: usize) -> CryptoConfig {
        CryptoConfig {
            id_key: Some(ID_KEY.into()),
            id_nonce: Some(ID_NONCE.into()),
            key_size,
        }
    }

    fn gateway() -> (Gateway, Arc<MapBackend>) {
        let backend = Arc::new(MapBackend::default());
        let gw = Gateway::new(&crypto_config(32), backend.clone()).unwrap();
        (gw, backend)
    }

    #[tokio::test]
    async fn test_store_then_retrieve() {
        let (gw, _) = gateway();
        let key = gw.store_record(b"JTH", b"PAY").await.unwrap();
        assert_eq!(key.len(), 32);
        assert_eq!(gw.retrieve_record(b"JTH", key.as_bytes()).await.unwrap(), b"PAY");
    }

    #[tokio::test]
    async fn test_backend_sees_only_ciphertext() {
        let (gw, backend) = gateway();
        let record = b"PAYLOADSPAYLOADSPAYLOADS";
        gw.store_record(b"JTH", record).await.unwrap();

        let entries = backend.entries.lock().await;
        let (sealed_id, envelope) = entries.iter().next().unwrap();
        let expected_id =
            hex::decode("396263343233393039616335acc30dd405c51d37675d4e0002a526ae113d56").unwrap();
        assert_eq!(sealed_id, &expected_id);
        assert_eq!(envelope.len(), NONCE_SIZE + record.len() + TAG_SIZE);
        assert!(!envelope.windows(8).any(|w| w == b"PAYLOADS"));
    }

    #[tokio::test]
    async fn test_store_overwrites_and_old_key_fails() {
        let (gw, _) = gateway();
        let first = gw.store_record(b"JTH", b"one").await.unwrap();
        let second = gw.store_record(b"JTH", b"two").await.unwrap();
        assert_ne!(first, second);

        assert_eq!(gw.retrieve_record(b"JTH", second.as_bytes()).await.unwrap(), b"two");
        assert!(matches!(
            gw.retrieve_record(b"JTH", first.as_bytes()).await,
            Err(SealgateError::Authentication)
        ));
    }

    #[tokio::test]
    async fn test_wrong_key_length_skips_backend() {
        let (gw, backend) = gateway();
        let err = gw.retrieve_record(b"JTH", &[0u8; 31]).await.unwrap_err();
        assert!(matches!(err, SealgateError::InvalidKeySize(31)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrieve_missing_is_not_found() {
        let (gw, _) = gateway();
        let err = gw.retrieve_record(b"nope", &[0u8; 32]).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "record not found");
    }

    #[tokio::test]
    async fn test_delete() {
        let (gw, _) = gateway();
        let key = gw.store_record(b"JTH", b"PAY").await.unwrap();
        gw.delete_record(b"JTH").await.unwrap();
        assert!(gw
            .retrieve_record(b"JTH", key.as_bytes())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(gw.delete_record(b"JTH").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_tampered_envelope_fails_authentication() {
        let (gw, backend) = gateway();
        let key = gw.store_record(b"JTH", b"PAY").await.unwrap();
        for envelope in backend.entries.lock().await.values_mut() {
            let last = envelope.len() - 1;
            envelope[last] ^= 0x01;
        }
        assert!(matches!(
            gw.retrieve_record(b"JTH", key.as_bytes()).await,
            Err(SealgateError::Authentication)
        ));
    }

    #[tokio::test]
    async fn test_truncated_envelope_is_malformed() {
        let (gw, backend) = gateway();
        let key = gw.store_record(b"JTH", b"PAY").await.unwrap();
        for envelope in backend.entries.lock().await.values_mut() {
            envelope.truncate(5);
        }
        assert!(matches!(
            gw.retrieve_record(b"JTH", key.as_bytes()).await,
            Err(SealgateError::MalformedEnvelope { len: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let gw = Gateway::new(&crypto_config(16), Arc::new(DownBackend)).unwrap();
        let err = gw.store_record(b"JTH", b"PAY").await.unwrap_err();
        assert!(matches!(err, SealgateError::Backend(BackendError::Storage(_))));
        assert_eq!(
            gw.handle_line("DELETE 4a5448\n").await,
            "ERROR storage error: disk full\n"
        );
    }

    #[tokio::test]
    async fn test_handle_line_sequence() {
        let (gw, _) = gateway();
        let key_line = gw.handle_line("STORE 4a5448 504159\n").await;
        assert_eq!(key_line.len(), 64 + 1);

        let retrieve = format!("RETRIEVE 4a5448 {}", key_line.trim_end());
        assert_eq!(gw.handle_line(&retrieve).await, "504159\n");
        assert_eq!(gw.handle_line("DELETE 4a5448\n").await, "\n");
        assert_eq!(gw.handle_line(&retrieve).await, "ERROR record not found\n");
    }

    #[tokio::test]
    async fn test_handle_line_errors() {
        let (gw, _) = gateway();
        assert_eq!(gw.handle_line("STORE 4a5448\n").await, "ERROR Malformed request\n");
        assert!(gw.handle_line("STORE gg 00\n").await.starts_with("ERROR "));
        assert_eq!(
            gw.handle_line("RETRIEVE 4a5448 00\n").await,
            "ERROR invalid key size: 1 bytes (expected 16, 24 or 32)\n"
        );
    }

    #[tokio::test]
    async fn test_key_size_follows_config() {
        for size in [16, 24, 32] {
            let gw = Gateway::new(&crypto_config(size), Arc::new(MapBackend::default())).unwrap();
            assert_eq!(gw.key_size(), size);
            let key = gw.store_record(b"id", b"x").await.unwrap();
            assert_eq!(key.len(), size);
        }
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let backend: Arc<dyn Backend> = Arc::new(MapBackend::default());
        assert!(matches!(
            Gateway::new(&crypto_config(20), backend.clone()),
            Err(SealgateError::Config(_))
        ));

        let mut missing = crypto_config(32);
        missing.id_key = None;
        assert!(matches!(
            Gateway::new(&missing, backend.clone()),
            Err(SealgateError::Config(_))
        ));

        let mut short_nonce = crypto_config(32);
        short_nonce.id_nonce = Some("short".into());
        assert!(matches!(
            Gateway::new(&short_nonce, backend),
            Err(SealgateError::Config(_))
        ));
    }
}
