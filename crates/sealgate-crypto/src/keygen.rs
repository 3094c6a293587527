//! Key generation: CSPRNG keys and nonces, AES-GCM cipher construction

use aes_gcm::{
    aead::{consts::U12, generic_array::GenericArray, Aead, KeyInit},
    aes::Aes192,
    Aes128Gcm, Aes256Gcm, AesGcm,
};
use rand::{rngs::OsRng, RngCore};
use sealgate_core::{SealgateError, SealgateResult};
use zeroize::Zeroize;

use crate::{NONCE_SIZE, SUPPORTED_KEY_SIZES};

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Fill `size` bytes from the operating system CSPRNG.
pub fn random_bytes(size: usize) -> SealgateResult<Vec<u8>> {
    let mut buf = vec![0u8; size];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| SealgateError::Randomness(e.to_string()))?;
    Ok(buf)
}

/// Random nonce of `size` bytes, sized by the caller to the cipher's nonce length.
pub fn random_nonce(size: usize) -> SealgateResult<Vec<u8>> {
    random_bytes(size)
}

/// A per-record encryption key. Zeroized on drop.
///
/// Returned to the caller by a store and required again to retrieve; the
/// gateway never persists it.
#[derive(Clone, PartialEq, Eq)]
pub struct RecordKey {
    bytes: Vec<u8>,
}

impl RecordKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl Drop for RecordKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generates per-record keys of a fixed, configured size.
#[derive(Debug, Clone, Copy)]
pub struct KeyGenerator {
    key_size: usize,
}

impl KeyGenerator {
    /// Rejects sizes the block cipher cannot use, so a bad `key_size` fails at
    /// startup instead of on the first store.
    pub fn new(key_size: usize) -> SealgateResult<Self> {
        if !SUPPORTED_KEY_SIZES.contains(&key_size) {
            return Err(SealgateError::Config(format!(
                "key_size must be one of {SUPPORTED_KEY_SIZES:?}, got {key_size}"
            )));
        }
        Ok(Self { key_size })
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// Generate a fresh random record key.
    pub fn random_key(&self) -> SealgateResult<RecordKey> {
        random_bytes(self.key_size).map(RecordKey::from_bytes)
    }
}

/// AES-GCM (96-bit nonce, 128-bit tag) with the AES variant chosen by key length.
pub enum RecordCipher {
    Aes128(Box<Aes128Gcm>),
    Aes192(Box<Aes192Gcm>),
    Aes256(Box<Aes256Gcm>),
}

/// Build an AES-GCM cipher from `key`.
///
/// Fails with `InvalidKeySize` unless the key is 16, 24 or 32 bytes.
pub fn build_cipher(key: &[u8]) -> SealgateResult<RecordCipher> {
    let invalid = |_| SealgateError::InvalidKeySize(key.len());
    match key.len() {
        16 => Aes128Gcm::new_from_slice(key)
            .map(|c| RecordCipher::Aes128(Box::new(c)))
            .map_err(invalid),
        24 => Aes192Gcm::new_from_slice(key)
            .map(|c| RecordCipher::Aes192(Box::new(c)))
            .map_err(invalid),
        32 => Aes256Gcm::new_from_slice(key)
            .map(|c| RecordCipher::Aes256(Box::new(c)))
            .map_err(invalid),
        n => Err(SealgateError::InvalidKeySize(n)),
    }
}

impl RecordCipher {
    /// Nonce length this cipher requires.
    pub fn nonce_size(&self) -> usize {
        NONCE_SIZE
    }

    /// Encrypt `plaintext`, returning `ciphertext || tag`.
    pub fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> SealgateResult<Vec<u8>> {
        let nonce = GenericArray::from_slice(nonce);
        match self {
            RecordCipher::Aes128(c) => c.encrypt(nonce, plaintext),
            RecordCipher::Aes192(c) => c.encrypt(nonce, plaintext),
            RecordCipher::Aes256(c) => c.encrypt(nonce, plaintext),
        }
        .map_err(|_| SealgateError::Encryption)
    }

    /// Verify the tag on `ciphertext || tag` and decrypt.
    pub fn open(&self, nonce: &[u8; NONCE_SIZE], sealed: &[u8]) -> SealgateResult<Vec<u8>> {
        let nonce = GenericArray::from_slice(nonce);
        match self {
            RecordCipher::Aes128(c) => c.decrypt(nonce, sealed),
            RecordCipher::Aes192(c) => c.decrypt(nonce, sealed),
            RecordCipher::Aes256(c) => c.decrypt(nonce, sealed),
        }
        .map_err(|_| SealgateError::Authentication)
    }
}

impl std::fmt::Debug for RecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            RecordCipher::Aes128(_) => "AES-128-GCM",
            RecordCipher::Aes192(_) => "AES-192-GCM",
            RecordCipher::Aes256(_) => "AES-256-GCM",
        };
        f.write_str(variant)
    }
}
