//! CLASP transport: a parameter-oriented protocol layered on a WebSocket
//! connection, exposing `set`/`get`/`emit`/`subscribe`/`stream`/`sendBundle`
//! in addition to the base `Transport` contract. Maintains a session-scoped
//! cache of last-known parameter values so `get_param` can answer from
//! cache between round trips.

use crate::connection::adapter::Transport;
use crate::connection::protocols::websocket::WebSocketTransport;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct ClaspTransport {
    ws: WebSocketTransport,
    token: Option<String>,
    last_known: Arc<DashMap<String, Value>>,
}

pub struct ClaspSubscription {
    pub pattern: String,
}

impl ClaspTransport {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            ws: WebSocketTransport::new(url),
            token,
            last_known: Arc::new(DashMap::new()),
        }
    }

    async fn send_envelope(&self, op: &str, path: &str, value: Option<Value>) -> anyhow::Result<()> {
        let envelope = json!({ "op": op, "path": path, "value": value, "token": self.token });
        self.ws.do_send(path, &envelope).await
    }

    pub async fn set_param(&self, path: &str, value: Value) -> anyhow::Result<()> {
        self.last_known.insert(path.to_string(), value.clone());
        self.send_envelope("set", path, Some(value)).await
    }

    pub fn get_param(&self, path: &str) -> Option<Value> {
        self.last_known.get(path).map(|v| v.clone())
    }

    pub async fn emit(&self, path: &str, value: Value) -> anyhow::Result<()> {
        self.send_envelope("emit", path, Some(value)).await
    }

    pub async fn subscribe(&self, pattern: &str) -> anyhow::Result<ClaspSubscription> {
        self.send_envelope("subscribe", pattern, None).await?;
        Ok(ClaspSubscription { pattern: pattern.to_string() })
    }

    pub async fn unsubscribe(&self, subscription: ClaspSubscription) -> anyhow::Result<()> {
        self.send_envelope("unsubscribe", &subscription.pattern, None).await
    }

    pub async fn stream(&self, path: &str, enabled: bool) -> anyhow::Result<()> {
        self.send_envelope("stream", path, Some(json!(enabled))).await
    }

    pub async fn send_bundle(&self, entries: Vec<(String, Value)>) -> anyhow::Result<()> {
        for (path, value) in &entries {
            self.last_known.insert(path.clone(), value.clone());
        }
        let payload = json!({
            "op": "bundle",
            "entries": entries.into_iter().map(|(path, value)| json!({"path": path, "value": value})).collect::<Vec<_>>(),
            "token": self.token,
        });
        self.ws.do_send("__bundle__", &payload).await
    }

    pub fn ingest(&self, path: &str, value: Value) {
        self.last_known.insert(path.to_string(), value);
    }
}

#[async_trait]
impl Transport for ClaspTransport {
    async fn do_connect(&self) -> anyhow::Result<()> {
        self.ws.do_connect().await
    }

    async fn do_disconnect(&self) -> anyhow::Result<()> {
        self.ws.do_disconnect().await
    }

    async fn do_send(&self, topic: &str, payload: &Value) -> anyhow::Result<()> {
        self.ws.do_send(topic, payload).await
    }
}
