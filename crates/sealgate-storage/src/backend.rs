//! The backend capability and its OpenDAL-backed implementation

use async_trait::async_trait;
use opendal::{ErrorKind, Operator};
use sealgate_core::BackendError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Exact-match key/value storage over opaque binary keys.
///
/// The gateway only ever hands a backend ciphertext: keys are sealed record
/// ids and values are record envelopes. Implementations must report a missing
/// entry on `retrieve` or `delete` as [`BackendError::NotFound`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Insert or replace the entry for `id`.
    async fn store(&self, id: &[u8], envelope: &[u8]) -> Result<(), BackendError>;

    async fn retrieve(&self, id: &[u8]) -> Result<Vec<u8>, BackendError>;

    async fn delete(&self, id: &[u8]) -> Result<(), BackendError>;

    /// Short name for logs and metrics
    fn kind(&self) -> &'static str;
}

/// Bytes of the big-endian id length that starts every stored object
const ID_LEN_SIZE: usize = 4;

/// Backend over any OpenDAL operator (memory, fs, S3).
///
/// Ids have no length limit, so objects are named by content hash:
/// `<prefix>/<hex(blake3(id))>`. The object body is
/// `u32 BE id length || id || envelope`, and the stored id is compared on
/// every lookup so a lookup only ever matches its own id.
///
/// Stores and deletes through one `OpendalBackend` (and its clones) are
/// serialised, so concurrent deletes of one id report `NotFound` to all but
/// one caller. Separate processes sharing a bucket or directory are not
/// coordinated.
#[derive(Debug, Clone)]
pub struct OpendalBackend {
    op: Operator,
    prefix: String,
    kind: &'static str,
    writes: Arc<Mutex<()>>,
}

impl OpendalBackend {
    pub fn new(op: Operator, prefix: &str, kind: &'static str) -> Self {
        Self {
            op,
            prefix: prefix.trim_matches('/').to_string(),
            kind,
            writes: Arc::new(Mutex::new(())),
        }
    }

    fn object_path(&self, id: &[u8]) -> Result<String, BackendError> {
        if id.is_empty() {
            return Err(BackendError::Protocol("empty record id".into()));
        }
        let name = blake3::hash(id).to_hex();
        if self.prefix.is_empty() {
            Ok(name.to_string())
        } else {
            Ok(format!("{}/{name}", self.prefix))
        }
    }

    /// Read the object at `path` and return its envelope if it belongs to `id`.
    async fn read_entry(&self, path: &str, id: &[u8]) -> Result<Vec<u8>, BackendError> {
        let buf = self.op.read(path).await.map_err(map_err)?.to_vec();
        match split_entry(&buf) {
            Some((stored, envelope)) if stored == id => Ok(envelope.to_vec()),
            Some(_) => {
                warn!(backend = self.kind, "object hash collision, treating as missing");
                Err(BackendError::NotFound)
            }
            None => {
                warn!(backend = self.kind, bytes = buf.len(), "corrupt object");
                Err(BackendError::Storage("corrupt entry".into()))
            }
        }
    }
}

fn encode_entry(id: &[u8], envelope: &[u8]) -> Result<Vec<u8>, BackendError> {
    let len = u32::try_from(id.len())
        .map_err(|_| BackendError::Protocol(format!("record id too long: {} bytes", id.len())))?;
    let mut buf = Vec::with_capacity(ID_LEN_SIZE + id.len() + envelope.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(id);
    buf.extend_from_slice(envelope);
    Ok(buf)
}

fn split_entry(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    let (len, rest) = buf.split_first_chunk::<ID_LEN_SIZE>()?;
    let len = u32::from_be_bytes(*len) as usize;
    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}

/// OpenDAL errors carry the service, path and operation; only the kind goes
/// back to clients.
fn map_err(e: opendal::Error) -> BackendError {
    match e.kind() {
        ErrorKind::NotFound => BackendError::NotFound,
        kind => {
            warn!(error = %e, "storage operation failed");
            BackendError::Storage(kind.to_string())
        }
    }
}

#[async_trait]
impl Backend for OpendalBackend {
    async fn store(&self, id: &[u8], envelope: &[u8]) -> Result<(), BackendError> {
        let path = self.object_path(id)?;
        let entry = encode_entry(id, envelope)?;
        let _guard = self.writes.lock().await;
        self.op.write(&path, entry).await.map_err(map_err)?;
        debug!(backend = self.kind, bytes = envelope.len(), "entry stored");
        Ok(())
    }

    async fn retrieve(&self, id: &[u8]) -> Result<Vec<u8>, BackendError> {
        let path = self.object_path(id)?;
        self.read_entry(&path, id).await
    }

    async fn delete(&self, id: &[u8]) -> Result<(), BackendError> {
        let path = self.object_path(id)?;
        // OpenDAL deletes are idempotent; a missing entry must still surface.
        let _guard = self.writes.lock().await;
        self.read_entry(&path, id).await?;
        self.op.delete(&path).await.map_err(map_err)?;
        debug!(backend = self.kind, "entry deleted");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_backend() -> OpendalBackend {
        let op = Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish();
        OpendalBackend::new(op, "records", "memory")
    }

    fn fs_backend(root: &std::path::Path) -> OpendalBackend {
        let builder = opendal::services::Fs::default().root(&root.to_string_lossy());
        let op = Operator::new(builder).expect("fs operator").finish();
        OpendalBackend::new(op, "records", "fs")
    }

    #[tokio::test]
    async fn test_store_retrieve_delete() {
        let backend = memory_backend();
        backend.store(b"\x01\x02", b"envelope").await.unwrap();
        assert_eq!(backend.retrieve(b"\x01\x02").await.unwrap(), b"envelope");

        backend.delete(b"\x01\x02").await.unwrap();
        assert!(matches!(
            backend.retrieve(b"\x01\x02").await,
            Err(BackendError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let backend = memory_backend();
        backend.store(b"id", b"first").await.unwrap();
        backend.store(b"id", b"second").await.unwrap();
        assert_eq!(backend.retrieve(b"id").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let backend = memory_backend();
        assert!(matches!(
            backend.delete(b"missing").await,
            Err(BackendError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_binary_keys_are_exact_match() {
        let backend = memory_backend();
        backend.store(&[0x00, 0xff], b"a").await.unwrap();
        backend.store(&[0x00, 0xfe], b"b").await.unwrap();
        assert_eq!(backend.retrieve(&[0x00, 0xff]).await.unwrap(), b"a");
        assert_eq!(backend.retrieve(&[0x00, 0xfe]).await.unwrap(), b"b");
        assert!(backend.retrieve(&[0x00]).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let backend = memory_backend();
        assert!(matches!(
            backend.store(b"", b"x").await,
            Err(BackendError::Protocol(_))
        ));
    }

    #[test]
    fn test_object_path_layout() {
        let backend = memory_backend();
        let expected = blake3::hash(b"JTH").to_hex().to_string();
        assert_eq!(
            backend.object_path(b"JTH").unwrap(),
            format!("records/{expected}")
        );

        let bare = OpendalBackend::new(backend.op.clone(), "/", "memory");
        assert_eq!(bare.object_path(b"JTH").unwrap(), expected);

        let long = vec![0xab; 4096];
        assert_eq!(backend.object_path(&long).unwrap().len(), "records/".len() + 64);
    }

    #[tokio::test]
    async fn test_stored_id_is_checked_on_lookup() {
        let backend = memory_backend();
        backend.store(b"id-a", b"envelope-a").await.unwrap();

        // Plant id-a's object where id-b's hash points.
        let path_a = backend.object_path(b"id-a").unwrap();
        let path_b = backend.object_path(b"id-b").unwrap();
        let raw = backend.op.read(&path_a).await.unwrap().to_vec();
        backend.op.write(&path_b, raw).await.unwrap();

        assert!(matches!(
            backend.retrieve(b"id-b").await,
            Err(BackendError::NotFound)
        ));
        assert!(matches!(
            backend.delete(b"id-b").await,
            Err(BackendError::NotFound)
        ));
        assert_eq!(backend.retrieve(b"id-a").await.unwrap(), b"envelope-a");
    }

    #[tokio::test]
    async fn test_truncated_object_is_storage_error() {
        let backend = memory_backend();
        let path = backend.object_path(b"id").unwrap();
        backend.op.write(&path, vec![0, 0, 0, 9, b'i']).await.unwrap();
        assert!(matches!(
            backend.retrieve(b"id").await,
            Err(BackendError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_long_id_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = fs_backend(tmp.path());

        for len in [1usize, 99, 100, 256, 600, 4096] {
            let id: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let envelope = format!("envelope-{len}").into_bytes();

            backend.store(&id, &envelope).await.unwrap();
            assert_eq!(backend.retrieve(&id).await.unwrap(), envelope, "len {len}");
            backend.delete(&id).await.unwrap();
            assert!(matches!(
                backend.retrieve(&id).await,
                Err(BackendError::NotFound)
            ));
        }
    }

    #[tokio::test]
    async fn test_fs_delete_missing_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = fs_backend(tmp.path());
        assert!(matches!(
            backend.delete(&[0x5a; 300]).await,
            Err(BackendError::NotFound)
        ));

        backend.store(b"once", b"x").await.unwrap();
        backend.delete(b"once").await.unwrap();
        assert!(matches!(
            backend.delete(b"once").await,
            Err(BackendError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_deletes_succeed_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = fs_backend(tmp.path());

        for round in 0..20u8 {
            let id = [round; 8];
            backend.store(&id, b"x").await.unwrap();

            let tasks: Vec<_> = (0..8)
                .map(|_| {
                    let backend = backend.clone();
                    tokio::spawn(async move { backend.delete(&id).await })
                })
                .collect();

            let mut removed = 0;
            for task in tasks {
                match task.await.unwrap() {
                    Ok(()) => removed += 1,
                    Err(BackendError::NotFound) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            assert_eq!(removed, 1, "round {round}");
        }
    }

    #[test]
    fn test_storage_errors_hide_paths() {
        let err = opendal::Error::new(
            ErrorKind::PermissionDenied,
            "write records/4a5448deadbeef failed",
        );
        let message = map_err(err).to_string();
        assert!(message.starts_with("storage error: "), "{message}");
        assert!(!message.contains("4a5448"), "{message}");
        assert!(!message.contains('\n'));
    }
}
