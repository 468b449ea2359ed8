//! Trigger family: rising-edge detection over a per-node "was pressed" table.

use crate::executor::{ExecutionContext, Executor, ExecutorOutcome, ValueMap};
use crate::resource_manager::ResourceTable;
use std::sync::Arc;

/// Fires only on `false -> true` transitions of the `value` control; emits
/// no output slot at all (not even `false`) when not firing, so downstream
/// one-shot consumers can distinguish "no event" from "fired false".
pub struct TriggerExecutor {
    prev_pressed: Arc<ResourceTable<bool>>,
}

impl TriggerExecutor {
    pub fn new(prev_pressed: Arc<ResourceTable<bool>>) -> Self {
        Self { prev_pressed }
    }
}

impl Executor for TriggerExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let pressed = ctx.control_bool("value", false);
        let was_pressed = self
            .prev_pressed
            .get(ctx.node_id)
            .map(|v| *v)
            .unwrap_or(false);
        self.prev_pressed.insert(ctx.node_id, pressed);

        let mut outputs = ValueMap::new();
        if pressed && !was_pressed {
            outputs.insert("triggered".into(), serde_json::json!(true));
        }
        Ok(ExecutorOutcome::ready(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use std::collections::HashMap;

    fn ctx(node: NodeId, pressed: bool) -> ExecutionContext<'static> {
        ExecutionContext::new(
            node,
            HashMap::new(),
            ValueMap::from([("value".into(), serde_json::json!(pressed))]),
            0.016,
            0.0,
            1,
            None,
            |_| None,
        )
    }

    #[test]
    fn fires_only_on_rising_edge() {
        let table = Arc::new(ResourceTable::new());
        let exec = TriggerExecutor::new(table);
        let node = NodeId::new();

        let ExecutorOutcome::Ready(out1) = exec.execute(&ctx(node, false)).unwrap() else {
            panic!()
        };
        assert!(!out1.contains_key("triggered"));

        let ExecutorOutcome::Ready(out2) = exec.execute(&ctx(node, true)).unwrap() else {
            panic!()
        };
        assert_eq!(out2["triggered"], serde_json::json!(true));

        let ExecutorOutcome::Ready(out3) = exec.execute(&ctx(node, true)).unwrap() else {
            panic!()
        };
        assert!(!out3.contains_key("triggered"));
    }
}
