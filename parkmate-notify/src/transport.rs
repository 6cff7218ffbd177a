use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::{NotifyError, NotifyResult};

/// Opens push channels addressed by user id
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn open(&self, user_id: &str) -> NotifyResult<Box<dyn PushChannel>>;
}

/// An open bidirectional text channel
#[async_trait]
pub trait PushChannel: Send {
    /// Next text frame, `None` once the peer has closed the channel
    async fn next_text(&mut self) -> Option<NotifyResult<String>>;

    async fn close(&mut self);
}

/// WebSocket transport connecting to `{base_url}/{user_id}`
#[derive(Debug, Clone)]
pub struct WsTransport {
    base_url: String,
}

impl WsTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn endpoint(&self, user_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), user_id)
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    async fn open(&self, user_id: &str) -> NotifyResult<Box<dyn PushChannel>> {
        let url = self.endpoint(user_id);
        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| NotifyError::Connect(e.to_string()))?;
        debug!("WebSocket handshake with {} returned {}", url, response.status());
        Ok(Box::new(WsChannel { stream }))
    }
}

struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushChannel for WsChannel {
    async fn next_text(&mut self) -> Option<NotifyResult<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite itself
                Ok(_) => continue,
                Err(e) => return Some(Err(NotifyError::Channel(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Error while closing WebSocket: {}", e);
        }
    }
}
