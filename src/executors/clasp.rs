//! CLASP family: connection, subscribe, set, emit, get, stream, bundle.
//! Follows the connectivity family's thin-wrapper pattern but targets a
//! protocol that exposes set/emit/get/stream/bundle operations and a
//! pattern subscription with an unsubscribe handle, plus a session-scoped
//! cache of last-known parameter values keyed by `(connectionId, path)`.

use crate::connection::{ConnectionManager, SendOptions};
use crate::executor::{BoxFuture, ExecutionContext, Executor, ExecutorOutcome, ValueMap};
use crate::resource_manager::ResourceTable;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::Arc;

pub type ClaspCache = Arc<DashMap<(String, String), Value>>;

fn envelope(op: &str, path: &str, value: Option<Value>) -> Value {
    json!({ "op": op, "path": path, "value": value })
}

pub struct ClaspConnectionExecutor {
    manager: Arc<ConnectionManager>,
}

impl ClaspConnectionExecutor {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

impl Executor for ClaspConnectionExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let connection_id = ctx.control_str("connectionId", "");
        let manager = self.manager.clone();
        let fut: BoxFuture<'static, anyhow::Result<ValueMap>> = Box::pin(async move {
            match manager.connect(&connection_id).await {
                Ok(()) => Ok(ValueMap::from([("connected".into(), json!(true))])),
                Err(e) => Ok(ValueMap::from([
                    ("connected".into(), json!(false)),
                    ("error".into(), json!(e.to_string())),
                ])),
            }
        });
        Ok(ExecutorOutcome::Pending(fut))
    }
}

pub struct ClaspSetExecutor {
    manager: Arc<ConnectionManager>,
    cache: ClaspCache,
}

impl ClaspSetExecutor {
    pub fn new(manager: Arc<ConnectionManager>, cache: ClaspCache) -> Self {
        Self { manager, cache }
    }
}

impl Executor for ClaspSetExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let connection_id = ctx.control_str("connectionId", "");
        let path = ctx.control_str("path", "");
        let value = ctx.input("value");
        let manager = self.manager.clone();
        let cache = self.cache.clone();

        let fut: BoxFuture<'static, anyhow::Result<ValueMap>> = Box::pin(async move {
            cache.insert((connection_id.clone(), path.clone()), value.clone());
            let payload = envelope("set", &path, Some(value));
            match manager.send(&connection_id, &path, payload, SendOptions::default()).await {
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

pub struct ClaspEmitExecutor {
    manager: Arc<ConnectionManager>,
}

impl ClaspEmitExecutor {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

impl Executor for ClaspEmitExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let connection_id = ctx.control_str("connectionId", "");
        let path = ctx.control_str("path", "");
        let value = ctx.input("value");
        let manager = self.manager.clone();

        let fut: BoxFuture<'static, anyhow::Result<ValueMap>> = Box::pin(async move {
            let payload = envelope("emit", &path, Some(value));
            match manager.send(&connection_id, &path, payload, SendOptions::default()).await {
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

/// Pure cache read against the session-scoped last-known-value table — no
/// network round trip, matching the "get" operation's contract.
pub struct ClaspGetExecutor {
    cache: ClaspCache,
}

impl ClaspGetExecutor {
    pub fn new(cache: ClaspCache) -> Self {
        Self { cache }
    }
}

impl Executor for ClaspGetExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let connection_id = ctx.control_str("connectionId", "");
        let path = ctx.control_str("path", "");
        let value = self
            .cache
            .get(&(connection_id, path))
            .map(|v| v.clone())
            .unwrap_or(Value::Null);
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "value".into(),
            value,
        )])))
    }
}

pub struct ClaspSubscribeExecutor {
    manager: Arc<ConnectionManager>,
    installed: Arc<ResourceTable<(String, String)>>,
}

impl ClaspSubscribeExecutor {
    pub fn new(manager: Arc<ConnectionManager>, installed: Arc<ResourceTable<(String, String)>>) -> Self {
        Self { manager, installed }
    }
}

impl Executor for ClaspSubscribeExecutor {
    /// Installs the subscription on first frame for a given
    /// `(connectionId, pattern)` and replaces it if either changes.
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let connection_id = ctx.control_str("connectionId", "");
        let pattern = ctx.control_str("pattern", "*");
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
                if let Ok(handle) = manager.get_or_create(&connection_id) {
                    if let Err(e) = handle.subscribe(&pattern).await {
                        tracing::warn!(connection = %connection_id, pattern = %pattern, error = %e, "clasp subscribe failed");
                    }
                }
            });
        }
        Ok(ExecutorOutcome::ready(ValueMap::new()))
    }
}

pub struct ClaspStreamExecutor {
    manager: Arc<ConnectionManager>,
}

impl ClaspStreamExecutor {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

impl Executor for ClaspStreamExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let connection_id = ctx.control_str("connectionId", "");
        let path = ctx.control_str("path", "");
        let enabled = ctx.control_bool("enabled", true);
        let manager = self.manager.clone();

        let fut: BoxFuture<'static, anyhow::Result<ValueMap>> = Box::pin(async move {
            let payload = envelope("stream", &path, Some(json!(enabled)));
            match manager.send(&connection_id, &path, payload, SendOptions::default()).await {
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

pub struct ClaspBundleExecutor {
    manager: Arc<ConnectionManager>,
    cache: ClaspCache,
}

impl ClaspBundleExecutor {
    pub fn new(manager: Arc<ConnectionManager>, cache: ClaspCache) -> Self {
        Self { manager, cache }
    }
}

impl Executor for ClaspBundleExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let connection_id = ctx.control_str("connectionId", "");
        let entries = ctx.input("entries");
        let manager = self.manager.clone();
        let cache = self.cache.clone();

        let fut: BoxFuture<'static, anyhow::Result<ValueMap>> = Box::pin(async move {
            let pairs: Vec<(String, Value)> = match &entries {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|e| {
                        let path = e.get("path")?.as_str()?.to_string();
                        let value = e.get("value").cloned().unwrap_or(Value::Null);
                        Some((path, value))
                    })
                    .collect(),
                _ => Vec::new(),
            };
            for (path, value) in &pairs {
                cache.insert((connection_id.clone(), path.clone()), value.clone());
            }
            let payload = json!({
                "op": "bundle",
                "entries": pairs.iter().map(|(p, v)| json!({"path": p, "value": v})).collect::<Vec<_>>(),
            });
            match manager.send(&connection_id, "__bundle__", payload, SendOptions::default()).await {
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
    fn get_reads_cache_without_network_call() {
        let cache: ClaspCache = Arc::new(DashMap::new());
        cache.insert(("c1".into(), "/foo".into()), json!(7));
        let exec = ClaspGetExecutor::new(cache);
        let controls = ValueMap::from([
            ("connectionId".into(), json!("c1")),
            ("path".into(), json!("/foo")),
        ]);
        let ExecutorOutcome::Ready(out) = exec.execute(&ctx(NodeId::new(), controls)).unwrap() else {
            panic!("get must be synchronous")
        };
        assert_eq!(out["value"], json!(7));
    }
}
