//! IPC tool loop
//!
//! Length-prefixed JSON over any byte stream (stdin/stdout in `serve` mode).
//! Each frame is a u32 little-endian length followed by the JSON payload.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::constants::ipc::MAX_MESSAGE_SIZE;
use crate::notify::Notifier;
use crate::switcher::ModeSwitcher;

mod messages;
pub use messages::{ToolRequest, ToolResponse};

/// Write length-prefixed message to stream
pub async fn write_message<W, T>(stream: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", json.len(), MAX_MESSAGE_SIZE));
    }

    // Write length prefix (u32 little-endian)
    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .await
        .context("Failed to write message length")?;

    stream
        .write_all(&json)
        .await
        .context("Failed to write message payload")?;

    stream.flush().await.context("Failed to flush stream")?;

    Ok(())
}

/// Raw payload of the next frame; `None` on a clean end of input
pub async fn read_frame<R>(stream: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).context("Failed to read message length"),
    }
    let len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check (prevent DoS via huge allocation)
    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, MAX_MESSAGE_SIZE));
    }

    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .await
        .context("Failed to read message payload")?;
    Ok(Some(json_buf))
}

/// Answer requests one at a time until `Shutdown` or end of input.
/// A request that does not decode gets an `Error` response and the loop continues.
pub async fn serve<N, R, W>(switcher: &mut ModeSwitcher<N>, reader: &mut R, writer: &mut W) -> Result<()>
where
    N: Notifier,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Tool loop started");
    while let Some(payload) = read_frame(reader).await? {
        let request: ToolRequest = match serde_json::from_slice(&payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Malformed tool request");
                write_message(writer, &ToolResponse::Error(format!("malformed request: {e}"))).await?;
                continue;
            }
        };
        debug!(?request, "Tool request");

        let response = match request {
            ToolRequest::Switch { mode } => ToolResponse::Text(switcher.switch(&mode).await),
            ToolRequest::Status => ToolResponse::Text(switcher.status().await),
            ToolRequest::List => ToolResponse::Text(switcher.list().await),
            ToolRequest::Ping => ToolResponse::Pong,
            ToolRequest::Shutdown => {
                info!("Tool loop shutting down");
                return Ok(());
            }
        };
        write_message(writer, &response).await?;
    }
    info!("Tool loop input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use crate::notify::LogNotifier;
    use crate::persistence::DocumentStore;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::io::duplex;

    const OPENCODE: &str = "{\n  \"model\": \"anthropic/claude-opus-4\",\n  \"agent\": {\n    \"build\": { \"model\": \"anthropic/claude-sonnet-4\" }\n  }\n}\n";

    fn new_switcher(dir: &TempDir) -> ModeSwitcher<LogNotifier> {
        std::fs::write(dir.path().join("opencode.json"), OPENCODE).unwrap();
        ModeSwitcher::new(Paths::new(dir.path()), DocumentStore::default(), Arc::new(LogNotifier))
    }

    /// Read and decode the next message; `None` on a clean end of input
    async fn read_message<R, T>(stream: &mut R) -> Result<Option<T>>
    where
        R: AsyncRead + Unpin,
        T: for<'de> serde::Deserialize<'de>,
    {
        match read_frame(stream).await? {
            Some(payload) => serde_json::from_slice(&payload)
                .map(Some)
                .context("Failed to deserialize message from JSON"),
            None => Ok(None),
        }
    }

    async fn write_raw<W: AsyncWrite + Unpin>(stream: &mut W, payload: &[u8]) {
        stream.write_all(&(payload.len() as u32).to_le_bytes()).await.unwrap();
        stream.write_all(payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_message_framing() {
        let (mut client, mut server) = duplex(1024);
        let request = ToolRequest::Switch { mode: "economy".to_string() };

        write_message(&mut client, &request).await.unwrap();
        let received: Option<ToolRequest> = read_message(&mut server).await.unwrap();
        assert_eq!(received, Some(request));

        drop(client);
        let closed: Option<ToolRequest> = read_message(&mut server).await.unwrap();
        assert_eq!(closed, None);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = duplex(64);
        client
            .write_all(&((MAX_MESSAGE_SIZE as u32) + 1).to_le_bytes())
            .await
            .unwrap();

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(err.to_string().contains("Message too large"));
    }

    #[tokio::test]
    async fn test_serve_answers_until_shutdown() {
        let dir = TempDir::new().unwrap();
        let mut switcher = new_switcher(&dir);
        let (mut requests, mut server_read) = duplex(64 * 1024);
        let (mut server_write, mut responses) = duplex(64 * 1024);

        write_message(&mut requests, &ToolRequest::Ping).await.unwrap();
        write_raw(&mut requests, b"{\"Frobnicate\": 1}").await;
        write_message(&mut requests, &ToolRequest::List).await.unwrap();
        write_message(&mut requests, &ToolRequest::Switch { mode: "economy".to_string() })
            .await
            .unwrap();
        write_message(&mut requests, &ToolRequest::Shutdown).await.unwrap();
        // Never answered: the loop stops at Shutdown
        write_message(&mut requests, &ToolRequest::Ping).await.unwrap();

        serve(&mut switcher, &mut server_read, &mut server_write).await.unwrap();
        drop(server_write);

        let pong: Option<ToolResponse> = read_message(&mut responses).await.unwrap();
        assert_eq!(pong, Some(ToolResponse::Pong));

        let malformed: Option<ToolResponse> = read_message(&mut responses).await.unwrap();
        assert!(matches!(malformed, Some(ToolResponse::Error(msg)) if msg.starts_with("malformed request")));

        let Some(ToolResponse::Text(list)) = read_message(&mut responses).await.unwrap() else {
            panic!("expected list text");
        };
        assert!(list.starts_with("Available modes:"));
        assert!(list.contains("- performance (current)"));

        let Some(ToolResponse::Text(switched)) = read_message(&mut responses).await.unwrap() else {
            panic!("expected switch text");
        };
        assert!(switched.starts_with("Switched to economy mode"));
        let after: Option<ToolResponse> = read_message(&mut responses).await.unwrap();
        assert_eq!(after, None);

        let opencode = std::fs::read_to_string(dir.path().join("opencode.json")).unwrap();
        assert!(opencode.contains("\"model\": \"opencode/grok-code\""));
        assert!(!opencode.contains("claude"));
    }

    #[tokio::test]
    async fn test_serve_stops_at_end_of_input() {
        let dir = TempDir::new().unwrap();
        let mut switcher = new_switcher(&dir);
        let (mut requests, mut server_read) = duplex(64 * 1024);
        let (mut server_write, mut responses) = duplex(64 * 1024);

        write_message(&mut requests, &ToolRequest::Status).await.unwrap();
        drop(requests);

        serve(&mut switcher, &mut server_read, &mut server_write).await.unwrap();

        let Some(ToolResponse::Text(status)) = read_message(&mut responses).await.unwrap() else {
            panic!("expected status text");
        };
        assert!(status.starts_with("Current mode: performance"));
    }
}
