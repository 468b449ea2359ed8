//! Debug family: monitor, oscilloscope, equalizer, graph, console.
//!
//! `monitor` is a sticky display cache: absent input leaves the last
//! defined value in place rather than clearing it. `console` logs only on
//! change (previous value memoized per node id).

use crate::executor::{ExecutionContext, Executor, ExecutorOutcome, ValueMap};
use crate::resource_manager::{Disposable, ResourceTable};
use serde_json::Value;
use std::sync::Arc;

pub struct MonitorExecutor {
    last_value: Arc<ResourceTable<Value>>,
}

impl MonitorExecutor {
    pub fn new(last_value: Arc<ResourceTable<Value>>) -> Self {
        Self { last_value }
    }
}

impl Executor for MonitorExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let incoming = ctx.input("value");
        let display = if incoming.is_null() {
            self.last_value
                .get(ctx.node_id)
                .map(|v| v.clone())
                .unwrap_or(Value::Null)
        } else {
            self.last_value.insert(ctx.node_id, incoming.clone());
            incoming
        };
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "display".into(),
            display,
        )])))
    }
}

/// Attaches a waveform analyzer to an incoming audio handle, re-attaching
/// whenever the handle's identity changes (tracked by a string tag since
/// this crate has no real audio backend to key on object identity).
pub struct OscilloscopeExecutor {
    attached_handle: Arc<ResourceTable<String>>,
}

impl OscilloscopeExecutor {
    pub fn new(attached_handle: Arc<ResourceTable<String>>) -> Self {
        Self { attached_handle }
    }
}

impl Executor for OscilloscopeExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let handle = ctx.input("audio");
        let tag = handle.as_str().map(str::to_string);
        let current = self.attached_handle.get(ctx.node_id).map(|v| v.clone());
        let reattached = tag != current;
        match &tag {
            Some(t) => self.attached_handle.insert(ctx.node_id, t.clone()),
            None => self.attached_handle.dispose_node(ctx.node_id),
        }
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "attached".into(),
            serde_json::json!(tag.is_some()),
        ), (
            "reattached".into(),
            serde_json::json!(reattached),
        )])))
    }
}

pub struct EqualizerExecutor {
    attached_handle: Arc<ResourceTable<String>>,
}

impl EqualizerExecutor {
    pub fn new(attached_handle: Arc<ResourceTable<String>>) -> Self {
        Self { attached_handle }
    }
}

impl Executor for EqualizerExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let handle = ctx.input("audio");
        let tag = handle.as_str().map(str::to_string);
        match &tag {
            Some(t) => self.attached_handle.insert(ctx.node_id, t.clone()),
            None => self.attached_handle.dispose_node(ctx.node_id),
        }
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "attached".into(),
            serde_json::json!(tag.is_some()),
        )])))
    }
}

pub fn graph(ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
    Ok(ExecutorOutcome::ready(ValueMap::from([(
        "value".into(),
        ctx.input("value"),
    )])))
}

pub struct ConsoleExecutor {
    last_value: Arc<ResourceTable<Value>>,
}

impl ConsoleExecutor {
    pub fn new(last_value: Arc<ResourceTable<Value>>) -> Self {
        Self { last_value }
    }
}

impl Executor for ConsoleExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let value = ctx.input("value");
        let changed = self
            .last_value
            .get(ctx.node_id)
            .map(|v| *v != value)
            .unwrap_or(true);
        if changed {
            tracing::info!(node = %ctx.node_id, value = %value, "console node");
            self.last_value.insert(ctx.node_id, value.clone());
        }
        Ok(ExecutorOutcome::ready(ValueMap::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::GatheredInput;
    use crate::graph::NodeId;
    use std::collections::HashMap;

    fn ctx_with_value(node: NodeId, value: Value) -> ExecutionContext<'static> {
        let inputs = if value.is_null() {
            HashMap::new()
        } else {
            HashMap::from([("value".into(), GatheredInput::Single(value))])
        };
        ExecutionContext::new(node, inputs, ValueMap::new(), 0.016, 0.0, 1, None, |_| None)
    }

    #[test]
    fn monitor_is_sticky_across_absent_input() {
        let table = Arc::new(ResourceTable::new());
        let exec = MonitorExecutor::new(table);
        let node = NodeId::new();

        let ExecutorOutcome::Ready(out1) = exec.execute(&ctx_with_value(node, serde_json::json!(42))).unwrap() else {
            panic!()
        };
        assert_eq!(out1["display"], serde_json::json!(42));

        let ExecutorOutcome::Ready(out2) = exec.execute(&ctx_with_value(node, Value::Null)).unwrap() else {
            panic!()
        };
        assert_eq!(out2["display"], serde_json::json!(42));
    }
}
