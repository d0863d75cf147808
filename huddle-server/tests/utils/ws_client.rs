use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use huddle_core::{ClientEvent, ServerEvent};
use huddle_server::{AppState, Coordinator, router};

use super::EVENT_TIMEOUT_MS;

pub const INTERNAL_KEY: &str = "internal-test-key";

/// Serves the coordinator's router on an ephemeral local port.
pub async fn spawn_server(coordinator: Coordinator) -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = router(AppState::new(coordinator, Some(INTERNAL_KEY.to_owned())));

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Test server stopped: {}", e);
        }
    });
    Ok(addr)
}

pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(addr: SocketAddr, token: &str) -> Result<Self> {
        let url = format!("ws://{addr}/ws?token={token}");
        let (stream, _) = connect_async(url).await.context("WebSocket handshake failed")?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, event: &ClientEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        self.stream.send(Message::Text(json.into())).await?;
        Ok(())
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.stream.send(Message::Text(text.to_owned().into())).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<ServerEvent> {
        let timeout = Duration::from_millis(EVENT_TIMEOUT_MS);
        loop {
            let msg = match tokio::time::timeout(timeout, self.stream.next()).await {
                Ok(Some(msg)) => msg?,
                Ok(None) => bail!("WebSocket closed"),
                Err(_) => bail!("Timeout waiting for server event"),
            };
            match msg {
                Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
                Message::Close(_) => bail!("WebSocket closed by server"),
                _ => continue,
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
