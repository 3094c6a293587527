//! Front-end line protocol
//!
//! ```text
//! STORE    <idHex> <dataHex>   -> <keyHex>
//! RETRIEVE <idHex> <keyHex>    -> <dataHex>
//! DELETE   <idHex>             -> (empty line)
//! any failure                  -> ERROR <message>
//! ```

use sealgate_core::line::{decode_hex_fields, error_line, error_message, split_fields};
use sealgate_core::{SealgateError, SealgateResult};
use sealgate_crypto::RecordKey;

/// A decoded front-end request with binary fields.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    Store { id: Vec<u8>, data: Vec<u8> },
    Retrieve { id: Vec<u8>, key: Vec<u8> },
    Delete { id: Vec<u8> },
}

// Hand-written so keys and payloads never reach the logs.
impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Store { id, data } => f
                .debug_struct("Store")
                .field("id_len", &id.len())
                .field("data_len", &data.len())
                .finish(),
            Command::Retrieve { id, .. } => f
                .debug_struct("Retrieve")
                .field("id_len", &id.len())
                .finish_non_exhaustive(),
            Command::Delete { id } => f.debug_struct("Delete").field("id_len", &id.len()).finish(),
        }
    }
}

/// Expected token count (verb included) for a verb, or None if unknown.
fn arity(verb: &str) -> Option<usize> {
    match verb {
        "STORE" | "RETRIEVE" => Some(3),
        "DELETE" => Some(2),
        _ => None,
    }
}

/// Verb of a raw request line, for logs and metric labels.
pub fn command_name(line: &str) -> &'static str {
    match split_fields(line)[0] {
        "STORE" => "STORE",
        "RETRIEVE" => "RETRIEVE",
        "DELETE" => "DELETE",
        _ => "UNKNOWN",
    }
}

impl Command {
    /// Parse one request line.
    ///
    /// Arity is checked before any hex decoding; the first bad hex token
    /// aborts with its decode error.
    pub fn decode(line: &str) -> SealgateResult<Self> {
        let fields = split_fields(line);
        match arity(fields[0]) {
            Some(n) if n == fields.len() => {}
            _ => return Err(SealgateError::MalformedRequest),
        }

        let mut decoded = decode_hex_fields(&fields[1..])?.into_iter();
        let mut next = || decoded.next().ok_or(SealgateError::MalformedRequest);
        match fields[0] {
            "STORE" => Ok(Command::Store {
                id: next()?,
                data: next()?,
            }),
            "RETRIEVE" => Ok(Command::Retrieve {
                id: next()?,
                key: next()?,
            }),
            _ => Ok(Command::Delete { id: next()? }),
        }
    }

    /// Render as a newline-terminated request line (client side).
    pub fn encode(&self) -> String {
        match self {
            Command::Store { id, data } => {
                format!("STORE {} {}\n", hex::encode(id), hex::encode(data))
            }
            Command::Retrieve { id, key } => {
                format!("RETRIEVE {} {}\n", hex::encode(id), hex::encode(key))
            }
            Command::Delete { id } => format!("DELETE {}\n", hex::encode(id)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Store { .. } => "STORE",
            Command::Retrieve { .. } => "RETRIEVE",
            Command::Delete { .. } => "DELETE",
        }
    }
}

/// Successful outcome of a command.
#[derive(Debug)]
pub enum Reply {
    Stored(RecordKey),
    Retrieved(Vec<u8>),
    Deleted,
}

impl Reply {
    pub fn encode(&self) -> String {
        match self {
            Reply::Stored(key) => format!("{}\n", key.to_hex()),
            Reply::Retrieved(record) => format!("{}\n", hex::encode(record)),
            Reply::Deleted => "\n".to_string(),
        }
    }
}

/// Encode the result of a command as exactly one response line.
pub fn encode_response(result: &SealgateResult<Reply>) -> String {
    match result {
        Ok(reply) => reply.encode(),
        Err(e) => error_line(&e.to_string()),
    }
}

/// Client-side view of a response line: hex payload or the server's message.
pub fn decode_response(line: &str) -> Result<Vec<u8>, String> {
    let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
    if let Some(message) = error_message(line) {
        return Err(message.to_string());
    }
    hex::decode(line).map_err(|e| format!("response is not hex: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_store() {
        let cmd = Command::decode("STORE 4a5448 504159\n").unwrap();
        assert_eq!(
            cmd,
            Command::Store {
                id: b"JTH".to_vec(),
                data: b"PAY".to_vec()
            }
        );
        assert_eq!(cmd.name(), "STORE");
    }

    #[test]
    fn test_decode_retrieve_and_delete() {
        assert_eq!(
            Command::decode("RETRIEVE 4A5448 00ff").unwrap(),
            Command::Retrieve {
                id: b"JTH".to_vec(),
                key: vec![0x00, 0xff]
            }
        );
        assert_eq!(
            Command::decode("DELETE 4a5448 \n").unwrap(),
            Command::Delete { id: b"JTH".to_vec() }
        );
    }

    #[test]
    fn test_malformed_arity() {
        for line in [
            "STORE 4a5448\n",
            "STORE 4a5448 504159 00\n",
            "RETRIEVE 4a5448\n",
            "DELETE\n",
            "DELETE 4a5448 00\n",
            "STORE  4a5448 504159\n",
        ] {
            let err = Command::decode(line).unwrap_err();
            assert!(matches!(err, SealgateError::MalformedRequest), "{line:?}");
        }
    }

    #[test]
    fn test_unknown_verb() {
        for line in ["FETCH 00\n", "store 4a5448 504159\n", "\n", ""] {
            assert!(matches!(
                Command::decode(line),
                Err(SealgateError::MalformedRequest)
            ));
        }
    }

    #[test]
    fn test_arity_checked_before_hex() {
        // Bad hex AND wrong arity: arity wins
        assert!(matches!(
            Command::decode("STORE gg"),
            Err(SealgateError::MalformedRequest)
        ));
    }

    #[test]
    fn test_invalid_hex() {
        let err = Command::decode("STORE gg 00\n").unwrap_err();
        assert!(matches!(err, SealgateError::Decode(_)));
        assert_eq!(
            encode_response(&Err(err)),
            format!("ERROR {}\n", hex::decode("gg").unwrap_err())
        );
    }

    #[test]
    fn test_encode_responses() {
        let key = RecordKey::from_bytes(vec![0xab; 4]);
        assert_eq!(encode_response(&Ok(Reply::Stored(key))), "abababab\n");
        assert_eq!(
            encode_response(&Ok(Reply::Retrieved(b"PAY".to_vec()))),
            "504159\n"
        );
        assert_eq!(encode_response(&Ok(Reply::Deleted)), "\n");
        assert_eq!(
            encode_response(&Err(SealgateError::MalformedRequest)),
            "ERROR Malformed request\n"
        );
    }

    #[test]
    fn test_encode_matches_decode() {
        let cmd = Command::Retrieve {
            id: b"JTH".to_vec(),
            key: vec![1, 2, 3],
        };
        assert_eq!(cmd.encode(), "RETRIEVE 4a5448 010203\n");
        assert_eq!(Command::decode(&cmd.encode()).unwrap(), cmd);
    }

    #[test]
    fn test_decode_response() {
        assert_eq!(decode_response("504159\n").unwrap(), b"PAY");
        assert_eq!(decode_response("\n").unwrap(), b"");
        assert_eq!(
            decode_response("ERROR record not found\n").unwrap_err(),
            "record not found"
        );
    }

    #[test]
    fn test_command_name() {
        assert_eq!(command_name("STORE 00 00\n"), "STORE");
        assert_eq!(command_name("DELETE\n"), "DELETE");
        assert_eq!(command_name("HELLO\n"), "UNKNOWN");
    }

    #[test]
    fn test_debug_hides_payload() {
        let cmd = Command::Retrieve {
            id: b"JTH".to_vec(),
            key: vec![0x99; 32],
        };
        let rendered = format!("{cmd:?}");
        assert!(!rendered.contains("153"));
        assert!(rendered.contains("id_len"));
    }

    proptest::proptest! {
        #[test]
        fn prop_decode_never_panics(line in "\\PC{0,80}") {
            let _ = Command::decode(&line);
        }

        #[test]
        fn prop_store_line_decodes(
            id in proptest::collection::vec(proptest::num::u8::ANY, 1..40),
            data in proptest::collection::vec(proptest::num::u8::ANY, 1..200),
        ) {
            let cmd = Command::Store { id, data };
            proptest::prop_assert_eq!(Command::decode(&cmd.encode()).unwrap(), cmd);
        }
    }
}
