//! Line-protocol client for a running gateway

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::wire::{decode_response, Command};

/// One persistent session; requests are answered strictly in order.
pub struct GatewayClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl GatewayClient {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connecting to gateway at {addr}"))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Store `data` under `id`; returns the record key.
    pub async fn store(&mut self, id: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        self.call(&Command::Store {
            id: id.to_vec(),
            data: data.to_vec(),
        })
        .await
    }

    pub async fn retrieve(&mut self, id: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        self.call(&Command::Retrieve {
            id: id.to_vec(),
            key: key.to_vec(),
        })
        .await
    }

    pub async fn delete(&mut self, id: &[u8]) -> Result<()> {
        let body = self.call(&Command::Delete { id: id.to_vec() }).await?;
        anyhow::ensure!(body.is_empty(), "unexpected DELETE response");
        Ok(())
    }

    /// Send a raw request line and return the raw response line.
    pub async fn send_line(&mut self, line: &str) -> Result<String> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;

        let mut response = String::new();
        if self.reader.read_line(&mut response).await? == 0 {
            anyhow::bail!("gateway closed the connection");
        }
        Ok(response)
    }

    async fn call(&mut self, command: &Command) -> Result<Vec<u8>> {
        let response = self.send_line(&command.encode()).await?;
        decode_response(&response)
            .map_err(|message| anyhow::anyhow!("{} failed: {message}", command.name()))
    }
}
