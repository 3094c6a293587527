//! sealgate-crypto: the two transforms that keep the storage backend blind
//!
//! ```text
//! RecordId ──IdCipher (server key, fixed nonce)──▶ lookup key     (deterministic)
//! Record   ──AES-GCM (fresh key, fresh nonce)───▶ RecordEnvelope (randomized)
//! ```
//!
//! Envelope format (binary), identical for both transforms:
//! ```text
//! [12 bytes: nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The per-record key is handed back to the caller and never stored.

pub mod envelope;
pub mod keygen;

pub use envelope::{open_record, open_with, seal_record, IdCipher};
pub use keygen::{build_cipher, random_bytes, random_nonce, KeyGenerator, RecordCipher, RecordKey};

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Key lengths accepted by the AES block cipher
pub const SUPPORTED_KEY_SIZES: [usize; 3] = [16, 24, 32];
