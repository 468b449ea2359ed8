//! Executor registry: a `Resource`-backed `HashMap<String, Arc<dyn Executor>>`
//! with additive registration — a later `register` call for the same node
//! type overrides the earlier one.

use super::context::{ExecutionContext, ExecutorOutcome};
use bevy_ecs::prelude::Resource;
use std::collections::HashMap;
use std::sync::Arc;

/// A node-type executor: synchronous or asynchronous, returning a fresh
/// `portId -> value` mapping either way.
pub trait Executor: Send + Sync {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome>;
}

/// Allows plain closures to serve as synchronous executors, for terse
/// built-in registrations (see `executors::math`).
impl<F> Executor for F
where
    F: Fn(&ExecutionContext<'_>) -> anyhow::Result<super::context::ValueMap> + Send + Sync,
{
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        Ok(ExecutorOutcome::Ready(self(ctx)?))
    }
}

/// Wraps a free function that already returns a full `ExecutorOutcome`
/// (e.g. one that may go `Pending`) so it can be registered the same way
/// as a plain closure, without overlapping the `ValueMap`-returning blanket
/// impl above.
pub struct FnExecutor(pub fn(&ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome>);

impl Executor for FnExecutor {
    fn execute(&self, ctx: &ExecutionContext<'_>) -> anyhow::Result<ExecutorOutcome> {
        (self.0)(ctx)
    }
}

#[derive(Resource, Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node_type: impl Into<String>, executor: Arc<dyn Executor>) {
        let node_type = node_type.into();
        tracing::debug!(node_type = %node_type, "registered executor");
        self.executors.insert(node_type, executor);
    }

    pub fn get(&self, node_type: &str) -> Option<Arc<dyn Executor>> {
        self.executors.get(node_type).cloned()
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.executors.contains_key(node_type)
    }

    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::context::ValueMap;

    #[test]
    fn later_registration_overrides() {
        let mut reg = ExecutorRegistry::new();
        reg.register(
            "add",
            Arc::new(|_: &ExecutionContext<'_>| -> anyhow::Result<ValueMap> {
                Ok(ValueMap::from([("result".into(), 1.into())]))
            }),
        );
        reg.register(
            "add",
            Arc::new(|_: &ExecutionContext<'_>| -> anyhow::Result<ValueMap> {
                Ok(ValueMap::from([("result".into(), 2.into())]))
            }),
        );
        assert_eq!(reg.executors.len(), 1);
    }
}
