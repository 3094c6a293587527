//! Record envelopes and the deterministic identifier transform
//!
//! Both transforms produce the same shape:
//! ```text
//! [12 bytes: nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! There is no version byte. Changing the cipher or nonce size makes every
//! envelope already in a backend unreadable.

use sealgate_core::{SealgateError, SealgateResult};

use crate::keygen::{build_cipher, random_nonce, KeyGenerator, RecordCipher, RecordKey};
use crate::NONCE_SIZE;

/// Deterministic identifier cipher: server-wide key, one fixed nonce.
///
/// The fixed nonce is deliberate. It turns AES-GCM into a keyed, collision-free
/// function of the record id, which is what lets the backend do exact-match
/// lookups on ids it cannot read. Randomizing the nonce per call would make
/// every stored record unreachable. Do not "fix" it.
///
/// The constant nonce is still written in front of the output so identifier
/// ciphertexts share the record envelope layout.
pub struct IdCipher {
    cipher: RecordCipher,
    nonce: [u8; NONCE_SIZE],
}

impl IdCipher {
    pub fn new(id_key: &[u8], id_nonce: &[u8]) -> SealgateResult<Self> {
        let cipher = build_cipher(id_key)?;
        let nonce: [u8; NONCE_SIZE] = id_nonce.try_into().map_err(|_| {
            SealgateError::Config(format!(
                "id_nonce must be exactly {NONCE_SIZE} bytes, got {}",
                id_nonce.len()
            ))
        })?;
        Ok(Self { cipher, nonce })
    }

    /// Seal `id` under the fixed nonce. Same id in, same bytes out.
    pub fn encrypt_id(&self, id: &[u8]) -> SealgateResult<Vec<u8>> {
        seal_with(&self.cipher, &self.nonce, id)
    }
}

impl std::fmt::Debug for IdCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdCipher")
            .field("cipher", &self.cipher)
            .field("nonce", &"[REDACTED]")
            .finish()
    }
}

/// Encrypt `record` under a freshly generated key and nonce.
///
/// Returns the key (the caller's to keep) and `nonce || ciphertext || tag`.
pub fn seal_record(
    keygen: &KeyGenerator,
    record: &[u8],
) -> SealgateResult<(RecordKey, Vec<u8>)> {
    let key = keygen.random_key()?;
    let cipher = build_cipher(key.as_bytes())?;
    let nonce = random_nonce(cipher.nonce_size())?;
    let nonce: [u8; NONCE_SIZE] = nonce
        .as_slice()
        .try_into()
        .map_err(|_| SealgateError::Randomness("short nonce".into()))?;
    let envelope = seal_with(&cipher, &nonce, record)?;
    Ok((key, envelope))
}

/// Decrypt an envelope produced by [`seal_record`] with the caller's key.
pub fn open_record(key: &[u8], envelope: &[u8]) -> SealgateResult<Vec<u8>> {
    let cipher = build_cipher(key)?;
    open_with(&cipher, envelope)
}

/// Split `envelope` into nonce and sealed remainder, then verify and decrypt.
///
/// Envelopes shorter than a nonce are rejected before any slicing.
pub fn open_with(cipher: &RecordCipher, envelope: &[u8]) -> SealgateResult<Vec<u8>> {
    let nonce_size = cipher.nonce_size();
    if envelope.len() < nonce_size {
        return Err(SealgateError::MalformedEnvelope {
            len: envelope.len(),
            min: nonce_size,
        });
    }
    let (nonce, sealed) = envelope.split_at(nonce_size);
    let nonce: &[u8; NONCE_SIZE] = nonce.try_into().map_err(|_| {
        SealgateError::MalformedEnvelope {
            len: envelope.len(),
            min: nonce_size,
        }
    })?;
    cipher.open(nonce, sealed)
}

fn seal_with(
    cipher: &RecordCipher,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> SealgateResult<Vec<u8>> {
    let sealed = cipher.seal(nonce, plaintext)?;
    let mut envelope = Vec::with_capacity(NONCE_SIZE + sealed.len());
    envelope.extend_from_slice(nonce);
    envelope.extend_from_slice(&sealed);
    Ok(envelope)
}
