//! Observability event bus: a broadcast channel of engine-lifecycle events.
//!
//! `onError`/`onFrame`-style host callbacks are thin filters over this bus
//! rather than bespoke callback lists.

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    /// One node's execution outcome this tick.
    NodeTelemetry {
        node_id: NodeId,
        node_type: String,
        frame_count: u64,
        success: bool,
        error: Option<String>,
    },
    /// A full tick finished (successfully or with a cycle error).
    FrameCompleted {
        frame_count: u64,
        total_time: f64,
        node_count: usize,
        errored: bool,
    },
    /// A connection adapter changed state.
    ConnectionStatusChange {
        connection_id: String,
        state: String,
        error: Option<String>,
    },
    GraphValidation {
        message: String,
        details: Option<Value>,
    },
    ConnectionAdded { connection_id: String, protocol: String },
    ConnectionRemoved { connection_id: String },
    ConnectionUpdated { connection_id: String },
    ProtocolTypeRegistered { protocol: String },
    ProtocolTypeUnregistered { protocol: String },
}

/// A cloneable broadcast bus wrapper.
#[derive(Clone)]
pub struct EventBus(pub tokio::sync::broadcast::Sender<EngineEvent>);

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self(tx)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.0.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        tracing::trace!(at = %chrono::Utc::now().to_rfc3339(), ?event, "engine event");
        // A broadcast send fails only when there are no subscribers; that is
        // not an error condition for the engine.
        let _ = self.0.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl bevy_ecs::prelude::Resource for EventBus {}
