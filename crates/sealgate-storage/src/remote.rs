//! Backend client for a `sealgated --mode backend` server

use async_trait::async_trait;
use sealgate_core::line::error_message;
use sealgate_core::BackendError;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::backend::Backend;
use crate::protocol::{parse_error, preview, BackendRequest, SUCCESS};

/// Send one request line on a fresh connection and read one response line.
///
/// The returned line has its terminator stripped.
pub async fn request_line(addr: &str, request: &str) -> io::Result<String> {
    let stream = TcpStream::connect(addr).await?;
    let (reader, mut writer) = stream.into_split();
    writer.write_all(request.as_bytes()).await?;
    writer.flush().await?;

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before a response line",
        ));
    }
    let trimmed = line.trim_end_matches(|c: char| c == '\n' || c == '\r').len();
    line.truncate(trimmed);
    Ok(line)
}

/// Talks the backend line protocol, one TCP connection per call.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    addr: String,
}

impl RemoteBackend {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    async fn call(&self, request: BackendRequest) -> Result<String, BackendError> {
        let response = request_line(&self.addr, &request.encode()).await?;
        match error_message(&response) {
            Some(message) => Err(parse_error(message)),
            None => Ok(response),
        }
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    async fn store(&self, id: &[u8], envelope: &[u8]) -> Result<(), BackendError> {
        let response = self
            .call(BackendRequest::Store {
                id: id.to_vec(),
                envelope: envelope.to_vec(),
            })
            .await?;
        if response != SUCCESS {
            return Err(BackendError::Protocol(format!(
                "unexpected STORE response: {}",
                preview(&response)
            )));
        }
        Ok(())
    }

    async fn retrieve(&self, id: &[u8]) -> Result<Vec<u8>, BackendError> {
        let response = self.call(BackendRequest::Retrieve { id: id.to_vec() }).await?;
        hex::decode(&response)
            .map_err(|e| BackendError::Protocol(format!("RETRIEVE response is not hex: {e}")))
    }

    async fn delete(&self, id: &[u8]) -> Result<(), BackendError> {
        let response = self.call(BackendRequest::Delete { id: id.to_vec() }).await?;
        if !response.is_empty() {
            return Err(BackendError::Protocol(format!(
                "unexpected DELETE response: {}",
                preview(&response)
            )));
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "remote"
    }
}
