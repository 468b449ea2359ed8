//! `subflow-input`/`subflow-output`: read/write a scoped context keyed by
//! `(instanceId, "input:"|"output:" + portId)`, deposited and collected by
//! the scheduler's subflow-instance handling. Emit the control default when
//! run outside a subflow context (no ambient instance id).

use crate::executor::{ExecutionContext, Executor, ExecutorOutcome, ValueMap};
use crate::graph::NodeId;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

pub struct SubflowInputExecutor {
    scope: Arc<DashMap<(NodeId, String), Value>>,
}

impl SubflowInputExecutor {
    pub fn new(scope: Arc<DashMap<(NodeId, String), Value>>) -> Self {
        Self { scope }
    }
}

impl Executor for SubflowInputExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let port_id = ctx.control_str("portId", "");
        let value = match ctx.subflow_instance {
            Some(instance) => self
                .scope
                .get(&(instance, format!("input:{port_id}")))
                .map(|v| v.clone())
                .unwrap_or_else(|| ctx.control("default").cloned().unwrap_or(Value::Null)),
            None => ctx.control("default").cloned().unwrap_or(Value::Null),
        };
        Ok(ExecutorOutcome::ready(ValueMap::from([(
            "value".into(),
            value,
        )])))
    }
}

pub struct SubflowOutputExecutor {
    scope: Arc<DashMap<(NodeId, String), Value>>,
}

impl SubflowOutputExecutor {
    pub fn new(scope: Arc<DashMap<(NodeId, String), Value>>) -> Self {
        Self { scope }
    }
}

impl Executor for SubflowOutputExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        let port_id = ctx.control_str("portId", "");
        let value = ctx.input("value");
        if let Some(instance) = ctx.subflow_instance {
            self.scope.insert((instance, format!("output:{port_id}")), value);
        }
        Ok(ExecutorOutcome::ready(ValueMap::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn input_falls_back_to_default_outside_subflow_context() {
        let scope = Arc::new(DashMap::new());
        let exec = SubflowInputExecutor::new(scope);
        let ctx = ExecutionContext::new(
            NodeId::new(),
            HashMap::new(),
            ValueMap::from([
                ("portId".into(), json!("x")),
                ("default".into(), json!(7)),
            ]),
            0.016,
            0.0,
            1,
            None,
            |_| None,
        );
        let ExecutorOutcome::Ready(out) = exec.execute(&ctx).unwrap() else {
            panic!()
        };
        assert_eq!(out["value"], json!(7));
    }

    #[test]
    fn output_writes_into_scope_keyed_by_instance() {
        let scope = Arc::new(DashMap::new());
        let exec = SubflowOutputExecutor::new(scope.clone());
        let instance = NodeId::new();
        let ctx = ExecutionContext::new(
            NodeId::new(),
            HashMap::from([(
                "value".into(),
                crate::executor::GatheredInput::Single(json!(10)),
            )]),
            ValueMap::from([("portId".into(), json!("y"))]),
            0.016,
            0.0,
            1,
            Some(instance),
            |_| None,
        );
        exec.execute(&ctx).unwrap();
        assert_eq!(
            scope.get(&(instance, "output:y".to_string())).map(|v| v.clone()),
            Some(json!(10))
        );
    }
}
