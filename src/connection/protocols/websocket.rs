//! WebSocket transport: owns a split sink guarded by a mutex and spawns a
//! reader task that feeds inbound frames back through a broadcast channel.

use crate::connection::adapter::Transport;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

pub struct WebSocketTransport {
    url: String,
    sink: Mutex<Option<futures::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        Message,
    >>>,
    on_message: tokio::sync::broadcast::Sender<String>,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        let (tx, _rx) = tokio::sync::broadcast::channel(256);
        Self {
            url: url.into(),
            sink: Mutex::new(None),
            on_message: tx,
        }
    }

    pub fn subscribe_messages(&self) -> tokio::sync::broadcast::Receiver<String> {
        self.on_message.subscribe()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn do_connect(&self) -> anyhow::Result<()> {
        let (stream, _response) = tokio_tungstenite::connect_async(&self.url).await?;
        let (sink, mut stream) = stream.split();
        *self.sink.lock().await = Some(sink);

        let on_message = self.on_message.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let _ = on_message.send(text);
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
        });
        Ok(())
    }

    async fn do_disconnect(&self) -> anyhow::Result<()> {
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }
        Ok(())
    }

    async fn do_send(&self, _topic: &str, payload: &Value) -> anyhow::Result<()> {
        let mut guard = self.sink.lock().await;
        let sink = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("websocket not connected"))?;
        sink.send(Message::Text(payload.to_string())).await?;
        Ok(())
    }
}
