//! OSC transport, carried over WebSocket per the manager's protocol spec.
//! Payloads are encoded as OSC packets with `rosc` before being framed as
//! binary WebSocket messages.

use crate::connection::adapter::Transport;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use rosc::{OscMessage, OscPacket, OscType};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

pub struct OscTransport {
    url: String,
    sink: Mutex<Option<futures::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        Message,
    >>>,
    on_message: tokio::sync::broadcast::Sender<OscMessage>,
}

impl OscTransport {
    pub fn new(url: impl Into<String>) -> Self {
        let (tx, _rx) = tokio::sync::broadcast::channel(256);
        Self {
            url: url.into(),
            sink: Mutex::new(None),
            on_message: tx,
        }
    }

    pub fn subscribe_messages(&self) -> tokio::sync::broadcast::Receiver<OscMessage> {
        self.on_message.subscribe()
    }
}

/// Maps a `serde_json::Value` to the nearest OSC argument type: numbers to
/// float, booleans/strings passed through, everything else stringified.
fn json_to_osc_args(payload: &Value) -> Vec<OscType> {
    match payload {
        Value::Array(items) => items.iter().map(json_to_osc_arg).collect(),
        other => vec![json_to_osc_arg(other)],
    }
}

fn json_to_osc_arg(value: &Value) -> OscType {
    match value {
        Value::Number(n) => OscType::Float(n.as_f64().unwrap_or(0.0) as f32),
        Value::Bool(b) => OscType::Bool(*b),
        Value::String(s) => OscType::String(s.clone()),
        other => OscType::String(other.to_string()),
    }
}

#[async_trait]
impl Transport for OscTransport {
    async fn do_connect(&self) -> anyhow::Result<()> {
        let (stream, _response) = tokio_tungstenite::connect_async(&self.url).await?;
        let (sink, mut stream) = stream.split();
        *self.sink.lock().await = Some(sink);

        let on_message = self.on_message.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let Ok(Message::Binary(bytes)) = msg else {
                    break;
                };
                if let Ok((_, OscPacket::Message(m))) = rosc::decoder::decode_udp(&bytes) {
                    let _ = on_message.send(m);
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

    async fn do_send(&self, topic: &str, payload: &Value) -> anyhow::Result<()> {
        let packet = OscPacket::Message(OscMessage {
            addr: topic.to_string(),
            args: json_to_osc_args(payload),
        });
        let bytes = rosc::encoder::encode(&packet)?;
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or_else(|| anyhow::anyhow!("osc transport not connected"))?;
        sink.send(Message::Binary(bytes)).await?;
        Ok(())
    }
}
