//! Line protocol spoken between the gateway and a remote backend server
//!
//! ```text
//! STORE    <idHex> <envelopeHex>   -> SUCCESS
//! RETRIEVE <idHex>                 -> <envelopeHex>
//! DELETE   <idHex>                 -> (empty line)
//! any failure                      -> ERROR <message>
//! ```
//!
//! A missing entry is reported as `ERROR record not found` so the client can
//! map it back to `BackendError::NotFound`.

use sealgate_core::line::{decode_hex_fields, split_fields};
use sealgate_core::{BackendError, SealgateError, SealgateResult};

/// Response body for a successful STORE
pub const SUCCESS: &str = "SUCCESS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendRequest {
    Store { id: Vec<u8>, envelope: Vec<u8> },
    Retrieve { id: Vec<u8> },
    Delete { id: Vec<u8> },
}

impl BackendRequest {
    /// Render as a newline-terminated request line.
    pub fn encode(&self) -> String {
        match self {
            BackendRequest::Store { id, envelope } => {
                format!("STORE {} {}\n", hex::encode(id), hex::encode(envelope))
            }
            BackendRequest::Retrieve { id } => format!("RETRIEVE {}\n", hex::encode(id)),
            BackendRequest::Delete { id } => format!("DELETE {}\n", hex::encode(id)),
        }
    }

    pub fn decode(line: &str) -> SealgateResult<Self> {
        let fields = split_fields(line);
        let arity = match fields[0] {
            "STORE" => 3,
            "RETRIEVE" | "DELETE" => 2,
            _ => return Err(SealgateError::MalformedRequest),
        };
        if fields.len() != arity {
            return Err(SealgateError::MalformedRequest);
        }

        let mut decoded = decode_hex_fields(&fields[1..])?.into_iter();
        let mut next = || decoded.next().ok_or(SealgateError::MalformedRequest);
        match fields[0] {
            "STORE" => Ok(BackendRequest::Store {
                id: next()?,
                envelope: next()?,
            }),
            "RETRIEVE" => Ok(BackendRequest::Retrieve { id: next()? }),
            _ => Ok(BackendRequest::Delete { id: next()? }),
        }
    }
}

/// Interpret an `ERROR` line from a backend server.
pub fn parse_error(message: &str) -> BackendError {
    if message == BackendError::NotFound.to_string() {
        BackendError::NotFound
    } else {
        BackendError::Remote(message.to_string())
    }
}

/// Keep unexpected responses short in error messages.
pub(crate) fn preview(line: &str) -> String {
    const MAX: usize = 64;
    if line.len() <= MAX {
        line.to_string()
    } else {
        let cut = (0..=MAX).rev().find(|&i| line.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &line[..cut])
    }
}
