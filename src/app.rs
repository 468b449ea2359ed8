//! The host-facing engine: wires graph storage, the node catalog, the
//! executor registry, the resource manager, the connection manager, the
//! event bus, and the scheduler into one struct, and exposes the surface
//! an editor/host drives (`registerExecutor`, `startFlow`/`stopFlow`,
//! `tickOnce`, `onError`/`onFrame`).

use crate::config::EngineConfig;
use crate::connection::ConnectionManager;
use crate::events::{EngineEvent, EventBus};
use crate::executor::{Executor, ExecutorRegistry};
use crate::executors::register_builtins;
use crate::graph::{Flow, FlowId, FlowStore, Node, NodeId};
use crate::nodes::{NodeCatalog, NodeDefinition, Platform};
use crate::resource_manager::{Disposable, ResourceManager};
use crate::scheduler::{RunState, Scheduler, TickReport};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;

/// The engine: one per running flow session. Not `Clone` — hosts own a
/// single instance and drive it from their own event loop.
pub struct Engine {
    flows: FlowStore,
    catalog: NodeCatalog,
    executors: ExecutorRegistry,
    resources: ResourceManager,
    connections: Arc<ConnectionManager>,
    events: EventBus,
    scheduler: Scheduler,
    config: EngineConfig,
    platform: Platform,
}

impl Engine {
    pub fn new(config: EngineConfig, platform: Platform) -> Self {
        let events = EventBus::new(config.event_bus_capacity);
        let resources = ResourceManager::new();
        let mut connection_manager = ConnectionManager::new(Some(events.clone()));
        crate::connection::register_builtin_protocol_types(
            &mut connection_manager,
            config.reconnect.clone(),
            config.buffer.clone(),
        );
        let connections = Arc::new(connection_manager);
        let mut executors = ExecutorRegistry::new();

        let scheduler = Scheduler::new();
        register_builtins(&mut executors, &resources, scheduler.subflow_scope(), connections.clone());

        Self {
            flows: FlowStore::default(),
            catalog: NodeCatalog::new(),
            executors,
            resources,
            connections,
            events,
            scheduler,
            config,
            platform,
        }
    }

    pub fn catalog_mut(&mut self) -> &mut NodeCatalog {
        &mut self.catalog
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn register_node_type(&mut self, def: NodeDefinition) {
        self.catalog.register(def);
    }

    /// `registerExecutor(nodeType, executor)`: later registrations for the
    /// same node type override earlier ones.
    pub fn register_executor(&mut self, node_type: impl Into<String>, executor: Arc<dyn Executor>) {
        self.executors.register(node_type, executor);
    }

    /// `registerDispose(family, fn)`: installs a custom disposal family
    /// alongside the built-in ones (shader programs, timing state, …).
    pub fn register_dispose(&mut self, family: impl Into<String>, table: Arc<dyn Disposable>) {
        self.resources.register_family(family, table);
    }

    pub fn insert_flow(&mut self, flow: Flow) -> FlowId {
        self.flows.insert(flow)
    }

    /// Removes a node from a flow and disposes its resources across every
    /// registered family. This is the only path that keeps graph mutation
    /// and resource disposal in sync; callers must not call `Flow::remove_node`
    /// directly on a flow owned by an `Engine`.
    pub fn remove_node(&mut self, flow_id: FlowId, node_id: NodeId) -> Option<Node> {
        let removed = self.flows.get_mut(flow_id)?.remove_node(node_id);
        if removed.is_some() {
            self.resources.dispose_node(node_id);
        }
        removed
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// `startFlow(flowId)`.
    pub fn start_flow(&mut self, flow_id: FlowId) {
        self.flows.set_active(flow_id);
        self.scheduler.start();
    }

    /// `stopFlow()`: stops the scheduler and disposes every resource family.
    pub fn stop_flow(&mut self) {
        self.scheduler.stop();
        self.resources.dispose_all();
    }

    /// `pauseFlow()`.
    pub fn pause_flow(&mut self) {
        self.scheduler.pause();
    }

    pub fn resume_flow(&mut self) {
        self.scheduler.resume();
    }

    pub fn run_state(&self) -> RunState {
        self.scheduler.state()
    }

    /// `tickOnce()`: advances by `delta_time` seconds and runs the active
    /// flow's graph once.
    pub async fn tick_once(&mut self, delta_time: f64) -> anyhow::Result<TickReport> {
        self.scheduler
            .tick(&self.flows, &self.catalog, &self.executors, Some(&self.events), delta_time)
            .await
    }

    /// `onFrame(handler)` / `onError(handler)`: both are thin filters over
    /// the same event bus, since the editor only needs a subscription.
    pub fn subscribe_events(&self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Reads a node's cached output port value from the most recent tick.
    /// `None` if the node didn't run this tick (absent, disposed, skipped
    /// due to a cycle) or never produced that port.
    pub fn output(&self, node_id: NodeId, port: &str) -> Option<Value> {
        self.scheduler.cache().get(node_id, port).cloned()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Flow, Node};
    use serde_json::json;

    #[tokio::test]
    async fn tick_once_runs_constant_node() {
        let mut engine = Engine::new(EngineConfig::default(), Platform::Web);
        let mut flow = Flow::new("test");
        let mut node = Node::new("constant");
        node.data.insert("value".into(), json!(5.0));
        let node_id = node.id;
        flow.add_node(node);
        let flow_id = engine.insert_flow(flow);
        engine.start_flow(flow_id);

        let report = engine.tick_once(0.016).await.unwrap();
        assert!(!report.cycle_detected);
        assert_eq!(engine.scheduler.cache().get(node_id, "value"), Some(&json!(5.0)));
    }

    #[tokio::test]
    async fn remove_node_disposes_its_family_state() {
        let mut engine = Engine::new(EngineConfig::default(), Platform::Web);
        let mut flow = Flow::new("test");
        let mut source = Node::new("constant");
        source.data.insert("value".into(), json!(1.0));
        let source_id = source.id;
        let monitor = Node::new("monitor");
        let monitor_id = monitor.id;
        flow.add_node(source);
        flow.add_node(monitor);
        flow.add_edge(crate::graph::Edge::new(source_id, "value", monitor_id, "value"))
            .unwrap();
        let flow_id = engine.insert_flow(flow);
        engine.start_flow(flow_id);

        engine.tick_once(0.016).await.unwrap();
        assert_eq!(engine.resources.family_len("debug.monitor"), Some(1));

        let removed = engine.remove_node(flow_id, monitor_id);
        assert!(removed.is_some());
        assert_eq!(engine.resources.family_len("debug.monitor"), Some(0));

        // The node is also gone from the flow itself, not just disposed.
        assert!(engine.flows.get(flow_id).unwrap().get_node(monitor_id).is_none());
    }
}
