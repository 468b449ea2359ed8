//! Executor contract: what a node executor receives and returns each tick.

use crate::graph::NodeId;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// A mapping from port/control id to value. Fresh each call; executors must
/// not mutate what they're handed and must return a fresh mapping.
pub type ValueMap = HashMap<String, Value>;

/// Input gathered for a single port: a single value, or — when the port
/// declares `multiple: true` — an ordered sequence.
#[derive(Debug, Clone)]
pub enum GatheredInput {
    Single(Value),
    Multiple(Vec<Value>),
}

impl GatheredInput {
    pub fn as_single(&self) -> Option<&Value> {
        match self {
            GatheredInput::Single(v) => Some(v),
            GatheredInput::Multiple(vs) => vs.first(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            GatheredInput::Single(v) => v,
            GatheredInput::Multiple(vs) => Value::Array(vs),
        }
    }
}

/// Everything an executor needs to produce outputs for one node in one tick.
pub struct ExecutionContext<'a> {
    pub node_id: NodeId,
    pub inputs: HashMap<String, GatheredInput>,
    pub controls: ValueMap,
    pub delta_time: f64,
    pub total_time: f64,
    pub frame_count: u64,
    /// Which subflow instance this execution is scoped to, if any. Set by
    /// the scheduler when running nodes inside a subflow's inner flow;
    /// `None` for the main flow.
    pub subflow_instance: Option<NodeId>,
    /// Resolves which upstream node id (if any) currently feeds `port_id`.
    get_input_node: Box<dyn Fn(&str) -> Option<NodeId> + 'a>,
}

impl<'a> ExecutionContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_id: NodeId,
        inputs: HashMap<String, GatheredInput>,
        controls: ValueMap,
        delta_time: f64,
        total_time: f64,
        frame_count: u64,
        subflow_instance: Option<NodeId>,
        get_input_node: impl Fn(&str) -> Option<NodeId> + 'a,
    ) -> Self {
        Self {
            node_id,
            inputs,
            controls,
            delta_time,
            total_time,
            frame_count,
            subflow_instance,
            get_input_node: Box::new(get_input_node),
        }
    }

    pub fn get_input_node(&self, port_id: &str) -> Option<NodeId> {
        (self.get_input_node)(port_id)
    }

    /// Returns the raw value at `port_id`, flattening `multiple` inputs into
    /// a JSON array. Absent inputs return `Value::Null` (engine's rendering
    /// of "undefined").
    pub fn input(&self, port_id: &str) -> Value {
        self.inputs
            .get(port_id)
            .map(|g| g.clone().into_value())
            .unwrap_or(Value::Null)
    }

    pub fn input_f64(&self, port_id: &str, default: f64) -> f64 {
        self.inputs
            .get(port_id)
            .and_then(|g| g.as_single().and_then(|v| v.as_f64()))
            .unwrap_or(default)
    }

    pub fn control(&self, id: &str) -> Option<&Value> {
        self.controls.get(id)
    }

    pub fn control_f64(&self, id: &str, default: f64) -> f64 {
        self.controls
            .get(id)
            .and_then(|v| v.as_f64())
            .unwrap_or(default)
    }

    pub fn control_str(&self, id: &str, default: &str) -> String {
        self.controls
            .get(id)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    }

    pub fn control_bool(&self, id: &str, default: bool) -> bool {
        self.controls
            .get(id)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What an executor invocation yields: immediate outputs, or a future the
/// scheduler awaits before moving to the next node.
pub enum ExecutorOutcome {
    Ready(ValueMap),
    Pending(BoxFuture<'static, anyhow::Result<ValueMap>>),
}

impl ExecutorOutcome {
    pub fn ready(map: ValueMap) -> Self {
        ExecutorOutcome::Ready(map)
    }
}
