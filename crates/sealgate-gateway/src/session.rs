//! TCP session transport shared by the gateway and backend servers
//!
//! Each accepted connection gets its own task. Within a connection requests
//! are read one line at a time and every response is written before the next
//! line is read, so responses always come back in request order.

use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::wire::command_name;

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before retrying `accept` after a failure, doubling up to a ceiling.
fn accept_backoff(previous: Option<Duration>) -> Duration {
    match previous {
        None => ACCEPT_BACKOFF_MIN,
        Some(d) => (d * 2).min(ACCEPT_BACKOFF_MAX),
    }
}

/// Turns one request line into one newline-terminated response line.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, line: &str) -> String;
}

/// Accept connections until `shutdown` resolves.
///
/// Sessions already running are left to finish on their own. Accept errors
/// (for example descriptor exhaustion) are retried after a growing delay.
pub async fn serve<F>(
    listener: TcpListener,
    responder: Arc<dyn Responder>,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);
    let mut backoff = None;
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => {
                        backoff = None;
                        conn
                    }
                    Err(e) => {
                        let delay = accept_backoff(backoff);
                        backoff = Some(delay);
                        warn!(error = %e, retry_in = ?delay, "accept failed");
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => continue,
                            _ = &mut shutdown => {
                                info!("listener shutting down");
                                return Ok(());
                            }
                        }
                    }
                };
                let responder = responder.clone();
                tokio::spawn(async move {
                    if let Err(e) = run_session(stream, peer, responder).await {
                        warn!(peer = %peer, error = %e, "session ended with error");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("listener shutting down");
                return Ok(());
            }
        }
    }
}

/// Serve one connection until the peer closes it.
///
/// Lines are read as bytes; invalid UTF-8 is replaced rather than ending the
/// session, and then fails hex decoding like any other bad field.
pub async fn run_session<S>(
    stream: S,
    peer: SocketAddr,
    responder: Arc<dyn Responder>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!(peer = %peer, "session opened");
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut handled = 0u64;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        debug!(peer = %peer, command = command_name(&line), "request received");

        let response = responder.respond(&line).await;
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
        handled += 1;
    }

    info!(peer = %peer, requests = handled, "session closed");
    Ok(())
}
