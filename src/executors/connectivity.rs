//! Connectivity family: `http-request`, `websocket`, and `mqtt` executors,
//! each a thin wrapper over the connection manager (§ connection). They
//! resolve a connection by the `connectionId` control, lazily auto-connect,
//! dispatch a protocol operation, and either acknowledge synchronously or
//! cache the last received value for a subscription-style node.

use crate::connection::{ConnectionManager, SendOptions};
use crate::executor::{BoxFuture, ExecutionContext, Executor, ExecutorOutcome, ValueMap};
use crate::resource_manager::ResourceTable;
use serde_json::{json, Value};
use std::sync::Arc;

/// `publish`/`send`/`request`: resolves the connection, auto-connects if
/// not yet connected, and sends `payload` to `topic`. Synchronous
/// acknowledgement (`sent`/`error`) is produced once the future resolves.
pub struct SendExecutor {
    manager: Arc<ConnectionManager>,
}

impl SendExecutor {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

impl Executor for SendExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let connection_id = ctx.control_str("connectionId", "");
        let topic = ctx.control_str("topic", "");
        let payload = ctx.input("payload");
        let manager = self.manager.clone();

        let fut: BoxFuture<'static, anyhow::Result<ValueMap>> = Box::pin(async move {
            if manager.state(&connection_id).await.is_none() {
                manager.connect(&connection_id).await?;
            }
            match manager
                .send(&connection_id, &topic, payload, SendOptions::default())
                .await
            {
                Ok(()) => Ok(ValueMap::from([("sent".into(), json!(true))])),
                Err(e) => Ok(ValueMap::from([
                    ("sent".into(), json!(false)),
                    ("error".into(), json!(e.to_string())),
                ])),
            }
        });
        Ok(ExecutorOutcome::Pending(fut))
    }
}

/// `subscribe`: installs a subscription on first frame for a given
/// `(connectionId, pattern)` pair and replaces it if either changes.
/// Per-tick output is the last cached value, read synchronously; the
/// install itself runs detached since subscription setup is not on the
/// per-frame critical path.
pub struct SubscribeExecutor {
    manager: Arc<ConnectionManager>,
    installed: Arc<ResourceTable<(String, String)>>,
    last_received: Arc<ResourceTable<Value>>,
}

impl SubscribeExecutor {
    pub fn new(
        manager: Arc<ConnectionManager>,
        installed: Arc<ResourceTable<(String, String)>>,
        last_received: Arc<ResourceTable<Value>>,
    ) -> Self {
        Self {
            manager,
            installed,
            last_received,
        }
    }
}

impl Executor for SubscribeExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let connection_id = ctx.control_str("connectionId", "");
        let pattern = ctx.control_str("pattern", "#");
        let key = (connection_id.clone(), pattern.clone());

        let needs_install = self
            .installed
            .get(ctx.node_id)
            .map(|existing| *existing != key)
            .unwrap_or(true);

        if needs_install {
            self.installed.insert(ctx.node_id, key);
            let manager = self.manager.clone();
            tokio::spawn(async move {
                if manager.state(&connection_id).await.is_none() {
                    if let Err(e) = manager.connect(&connection_id).await {
                        tracing::warn!(connection = %connection_id, error = %e, "subscribe auto-connect failed");
                        return;
                    }
                }
                if let Ok(handle) = manager.get_or_create(&connection_id) {
                    if let Err(e) = handle.subscribe(&pattern).await {
                        tracing::warn!(connection = %connection_id, pattern = %pattern, error = %e, "subscribe failed");
                    }
                }
            });
        }

        let value = self
            .last_received
            .get(ctx.node_id)
            .map(|v| v.clone())
            .unwrap_or(Value::Null);
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "value".into(),
            value,
        )])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::GatheredInput;
    use crate::graph::NodeId;
    use std::collections::HashMap;

    fn ctx(node: NodeId, controls: ValueMap) -> ExecutionContext<'static> {
        ExecutionContext::new(node, HashMap::<String, GatheredInput>::new(), controls, 0.016, 0.0, 1, None, |_| None)
    }

    #[test]
    fn subscribe_reads_cached_value_without_reinstalling() {
        let manager = Arc::new(ConnectionManager::new(None));
        let last_received = Arc::new(ResourceTable::new());
        let installed = Arc::new(ResourceTable::new());
        let node = NodeId::new();
        last_received.insert(node, json!(42));
        // Pre-install the (connectionId, pattern) pair so execute() takes
        // the cache-read path rather than spawning a task (no runtime here).
        installed.insert(node, ("c1".to_string(), "topic/#".to_string()));

        let exec = SubscribeExecutor::new(manager, installed, last_received);
        let controls = ValueMap::from([
            ("connectionId".into(), json!("c1")),
            ("pattern".into(), json!("topic/#")),
        ]);
        let ExecutorOutcome::Ready(out) = exec.execute(&ctx(node, controls)).unwrap() else {
            panic!("expected synchronous outcome")
        };
        assert_eq!(out["value"], json!(42));
    }
}
