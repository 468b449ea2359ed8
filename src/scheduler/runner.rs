//! The tick loop: gathers inputs, dispatches executors in topological order,
//! and special-cases subflow instances (which need to recurse into an inner
//! flow with their own scoped input/output context).

use crate::events::{EngineEvent, EventBus};
use crate::executor::{ExecutionContext, ExecutorOutcome, ExecutorRegistry, GatheredInput, ValueMap};
use crate::graph::{Flow, FlowId, FlowStore, Node, NodeId};
use crate::nodes::NodeCatalog;
use crate::types::{coerce, compatible, DataType};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::clock::Clock;
use super::topo::{topological_order, CycleDetected};

/// Per-tick node output cache, keyed by node id.
#[derive(Default)]
pub struct FrameCache(HashMap<NodeId, ValueMap>);

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, node: NodeId, outputs: ValueMap) {
        self.0.insert(node, outputs);
    }

    pub fn get(&self, node: NodeId, port: &str) -> Option<&Value> {
        self.0.get(&node).and_then(|outputs| outputs.get(port))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Per-node error bookkeeping, surfaced to hosts via [`EngineEvent::NodeTelemetry`]
/// and accumulated so a host can ask "how many times has this node failed".
#[derive(Debug, Clone, Default)]
pub struct NodeErrorInfo {
    pub last_error: String,
    pub failure_count: u64,
}

/// Outcome of a single `tick()` call.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub frame_count: u64,
    pub total_time: f64,
    pub cycle_detected: bool,
    /// `(node_id, message)` for every node that failed this tick.
    pub errors: Vec<(NodeId, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Paused,
}

/// Drives one flow's execution over time: owns the clock, the per-node error
/// ledger, the subflow scratch context, and a generation counter used to
/// discard async results that complete after `stop()`.
pub struct Scheduler {
    clock: Clock,
    state: RunState,
    cache: FrameCache,
    subflow_scope: Arc<DashMap<(NodeId, String), Value>>,
    error_counts: HashMap<NodeId, NodeErrorInfo>,
    generation: Arc<AtomicU64>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            clock: Clock::new(),
            state: RunState::Idle,
            cache: FrameCache::new(),
            subflow_scope: Arc::new(DashMap::new()),
            error_counts: HashMap::new(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// A handle subflow-input/subflow-output executors close over at
    /// registration time, so they can read/write the scoped context for
    /// whichever instance they are currently running under.
    pub fn subflow_scope(&self) -> Arc<DashMap<(NodeId, String), Value>> {
        self.subflow_scope.clone()
    }

    pub fn start(&mut self) {
        self.clock.reset();
        self.cache.clear();
        self.subflow_scope.clear();
        self.error_counts.clear();
        self.state = RunState::Running;
    }

    pub fn pause(&mut self) {
        self.clock.pause();
        self.state = RunState::Paused;
    }

    pub fn resume(&mut self) {
        self.clock.resume();
        self.state = RunState::Running;
    }

    /// Stops the run and bumps the generation counter so any async executor
    /// result still in flight is discarded on arrival instead of written
    /// into a cache nobody will read.
    pub fn stop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state = RunState::Idle;
        self.cache.clear();
        self.subflow_scope.clear();
    }

    pub fn error_counts(&self) -> &HashMap<NodeId, NodeErrorInfo> {
        &self.error_counts
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    /// Runs one tick of the active flow in `flows`, advancing the clock by
    /// `delta_time`. Returns a report of what happened; does not panic on a
    /// cyclic graph or a failing node — both are captured as data.
    pub async fn tick(
        &mut self,
        flows: &FlowStore,
        catalog: &NodeCatalog,
        executors: &ExecutorRegistry,
        events: Option<&EventBus>,
        delta_time: f64,
    ) -> anyhow::Result<TickReport> {
        let (dt, total_time, frame_count) = self.clock.advance(delta_time);

        let flow_id = match flows.active_id() {
            Some(id) => id,
            None => {
                return Ok(TickReport {
                    frame_count,
                    total_time,
                    cycle_detected: false,
                    errors: Vec::new(),
                })
            }
        };
        let flow = flows
            .get(flow_id)
            .ok_or_else(|| anyhow::anyhow!("active flow {flow_id:?} missing from store"))?;

        let order = match topological_order(flow, flow.insertion_rank()) {
            Ok(order) => order,
            Err(CycleDetected) => {
                if let Some(bus) = events {
                    bus.emit(EngineEvent::GraphValidation {
                        message: "cycle detected; flow not executed this tick".into(),
                        details: None,
                    });
                    bus.emit(EngineEvent::FrameCompleted {
                        frame_count,
                        total_time,
                        node_count: flow.node_count(),
                        errored: true,
                    });
                }
                return Ok(TickReport {
                    frame_count,
                    total_time,
                    cycle_detected: true,
                    errors: Vec::new(),
                });
            }
        };

        let my_generation = self.generation.load(Ordering::SeqCst);
        let mut errors = Vec::new();
        self.cache.clear();

        execute_nodes_in_order(ExecuteArgs {
            flows,
            flow,
            order: &order,
            catalog,
            executors,
            events,
            cache: &mut self.cache,
            subflow_scope: &self.subflow_scope,
            instance_id: None,
            dt,
            total_time,
            frame_count,
            generation: &self.generation,
            my_generation,
            errors: &mut errors,
        })
        .await;

        for (node_id, message) in &errors {
            let entry = self.error_counts.entry(*node_id).or_default();
            entry.last_error = message.clone();
            entry.failure_count += 1;
        }

        if let Some(bus) = events {
            bus.emit(EngineEvent::FrameCompleted {
                frame_count,
                total_time,
                node_count: flow.node_count(),
                errored: !errors.is_empty(),
            });
        }

        Ok(TickReport {
            frame_count,
            total_time,
            cycle_detected: false,
            errors,
        })
    }
}

struct ExecuteArgs<'a> {
    flows: &'a FlowStore,
    flow: &'a Flow,
    order: &'a [NodeId],
    catalog: &'a NodeCatalog,
    executors: &'a ExecutorRegistry,
    events: Option<&'a EventBus>,
    cache: &'a mut FrameCache,
    subflow_scope: &'a DashMap<(NodeId, String), Value>,
    instance_id: Option<NodeId>,
    dt: f64,
    total_time: f64,
    frame_count: u64,
    generation: &'a Arc<AtomicU64>,
    my_generation: u64,
    errors: &'a mut Vec<(NodeId, String)>,
}

type BoxedUnit<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Runs `order` against `flow`, dispatching each node through `executors`
/// except for `subflow`, which recurses into its referenced inner flow.
///
/// Written as a free function (not a `Scheduler` method) and boxed at its
/// one recursive call site, since an `&mut self`-recursive async method
/// would fight the borrow checker over the shared cache and scope map.
fn execute_nodes_in_order(args: ExecuteArgs<'_>) -> BoxedUnit<'_> {
    Box::pin(async move {
        let ExecuteArgs {
            flows,
            flow,
            order,
            catalog,
            executors,
            events,
            cache,
            subflow_scope,
            instance_id,
            dt,
            total_time,
            frame_count,
            generation,
            my_generation,
            errors,
        } = args;

        for &node_id in order {
            if generation.load(Ordering::SeqCst) != my_generation {
                return;
            }
            let node = match flow.get_node(node_id) {
                Some(n) => n,
                None => continue,
            };

            if node.node_type == "subflow" {
                run_subflow_instance(
                    flows, flow, node, catalog, executors, events, cache, subflow_scope,
                    dt, total_time, frame_count, generation, my_generation, errors,
                )
                .await;
                continue;
            }

            let inputs = gather_inputs(flow, catalog, node, cache);
            let controls = node.data.clone();
            let flow_ref = flow;
            let this_node = node_id;
            let ctx = ExecutionContext::new(
                node_id,
                inputs,
                controls,
                dt,
                total_time,
                frame_count,
                instance_id,
                move |port_id| {
                    flow_ref
                        .incoming_edges(this_node, port_id)
                        .last()
                        .map(|e| e.source)
                },
            );

            match executors.get(&node.node_type) {
                None => {
                    cache.set(node_id, ValueMap::new());
                }
                Some(executor) => match executor.execute(&ctx) {
                    Ok(ExecutorOutcome::Ready(outputs)) => {
                        emit_telemetry(events, node, frame_count, true, None);
                        cache.set(node_id, outputs);
                    }
                    Ok(ExecutorOutcome::Pending(fut)) => match fut.await {
                        Ok(outputs) => {
                            if generation.load(Ordering::SeqCst) == my_generation {
                                emit_telemetry(events, node, frame_count, true, None);
                                cache.set(node_id, outputs);
                            }
                        }
                        Err(e) => {
                            if generation.load(Ordering::SeqCst) == my_generation {
                                emit_telemetry(events, node, frame_count, false, Some(e.to_string()));
                                errors.push((node_id, e.to_string()));
                            }
                        }
                    },
                    Err(e) => {
                        emit_telemetry(events, node, frame_count, false, Some(e.to_string()));
                        errors.push((node_id, e.to_string()));
                    }
                },
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_subflow_instance<'a>(
    flows: &'a FlowStore,
    outer_flow: &'a Flow,
    node: &'a Node,
    catalog: &'a NodeCatalog,
    executors: &'a ExecutorRegistry,
    events: Option<&'a EventBus>,
    cache: &mut FrameCache,
    subflow_scope: &'a DashMap<(NodeId, String), Value>,
    dt: f64,
    total_time: f64,
    frame_count: u64,
    generation: &'a Arc<AtomicU64>,
    my_generation: u64,
    errors: &mut Vec<(NodeId, String)>,
) {
    let node_id = node.id;
    let subflow_id = node
        .data
        .get("subflowId")
        .and_then(|v| v.as_str())
        .and_then(|s| uuid::Uuid::parse_str(s).ok())
        .map(crate::graph::FlowId);

    let inner_flow = match subflow_id.and_then(|id: FlowId| flows.get(id)) {
        Some(flow) => flow,
        None => {
            errors.push((node_id, "subflow: missing or invalid subflowId".into()));
            cache.set(node_id, ValueMap::new());
            return;
        }
    };

    let inputs = gather_inputs(outer_flow, catalog, node, cache);
    for (port, value) in &inputs {
        subflow_scope.insert((node_id, format!("input:{port}")), value.clone().into_value());
    }

    let inner_order = match topological_order(inner_flow, inner_flow.insertion_rank()) {
        Ok(order) => order,
        Err(CycleDetected) => {
            errors.push((node_id, "cycle detected in referenced subflow".into()));
            cache.set(node_id, ValueMap::new());
            return;
        }
    };

    execute_nodes_in_order(ExecuteArgs {
        flows,
        flow: inner_flow,
        order: &inner_order,
        catalog,
        executors,
        events,
        cache,
        subflow_scope,
        instance_id: Some(node_id),
        dt,
        total_time,
        frame_count,
        generation,
        my_generation,
        errors,
    })
    .await;

    let mut outputs = ValueMap::new();
    for port in &inner_flow.subflow_outputs {
        if let Some(entry) = subflow_scope.get(&(node_id, format!("output:{port}"))) {
            outputs.insert(port.clone(), entry.value().clone());
        }
    }
    emit_telemetry(events, node, frame_count, true, None);
    cache.set(node_id, outputs);
}

fn emit_telemetry(
    events: Option<&EventBus>,
    node: &Node,
    frame_count: u64,
    success: bool,
    error: Option<String>,
) {
    if let Some(bus) = events {
        bus.emit(EngineEvent::NodeTelemetry {
            node_id: node.id,
            node_type: node.node_type.clone(),
            frame_count,
            success,
            error,
        });
    }
}

/// Gathers every declared input port's value for `node`, coercing producer
/// output type to consumer input type and warning (non-fatally) on multiple
/// edges feeding a non-`multiple` port — the last edge by insertion order wins.
fn gather_inputs(
    flow: &Flow,
    catalog: &NodeCatalog,
    node: &Node,
    cache: &FrameCache,
) -> HashMap<String, GatheredInput> {
    let definition = catalog.get(&node.node_type);
    let mut result = HashMap::new();

    let port_ids: Vec<String> = match definition {
        Some(def) => def.ports.inputs.iter().map(|p| p.id.clone()).collect(),
        None => flow.incoming_edges_any_port(node.id),
    };

    for port_id in port_ids {
        let edges = flow.incoming_edges(node.id, &port_id);
        if edges.is_empty() {
            continue;
        }
        let port_def = definition.and_then(|d| d.input(&port_id));
        let consumer_type = port_def.map(|p| p.data_type).unwrap_or(DataType::Any);
        let multiple = port_def.map(|p| p.multiple).unwrap_or(false);

        let resolved: Vec<Value> = edges
            .iter()
            .filter_map(|edge| {
                cache.get(edge.source, &edge.source_handle).map(|v| {
                    let producer_type = catalog
                        .get(&flow.get_node(edge.source).map(|n| n.node_type.clone()).unwrap_or_default())
                        .and_then(|d| d.output(&edge.source_handle))
                        .map(|p| p.data_type)
                        .unwrap_or(DataType::Any);
                    if !compatible(producer_type, consumer_type) {
                        tracing::warn!(
                            node = %node.id,
                            port = %port_id,
                            "incompatible edge type {:?} -> {:?}; coercing",
                            producer_type,
                            consumer_type
                        );
                    }
                    coerce(v, producer_type, consumer_type)
                })
            })
            .collect();

        if resolved.is_empty() {
            continue;
        }

        if multiple {
            result.insert(port_id, GatheredInput::Multiple(resolved));
        } else {
            if resolved.len() > 1 {
                tracing::warn!(
                    node = %node.id,
                    port = %port_id,
                    "multiple edges feed a single-value port; last by insertion order wins"
                );
            }
            result.insert(port_id, GatheredInput::Single(resolved.into_iter().last().unwrap()));
        }
    }

    result
}
