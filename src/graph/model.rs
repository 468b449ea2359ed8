//! Graph storage: nodes, edges, and flow documents.
//!
//! Node and edge storage is plain data rather than ECS components — node
//! types are resolved dynamically by string id through the executor
//! registry, so a node instance is uniformly `{id, nodeType, data}}`
//! regardless of type. The adjacency map is a cache invalidated on mutation
//! rather than recomputed eagerly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A node instance: static identity plus mutable `data` (controls + the
/// engine-private `_dynamicInputs` key, etc). Cached outputs are NOT part of
/// `data` — they live in the scheduler's per-frame cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

impl Node {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            node_type: node_type.into(),
            position: Position::default(),
            data: HashMap::new(),
        }
    }
}

/// A directed edge from `(source, source_handle)` to `(target, target_handle)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub source_handle: String,
    pub target: NodeId,
    pub target_handle: String,
}

impl Edge {
    pub fn new(
        source: NodeId,
        source_handle: impl Into<String>,
        target: NodeId,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            source_handle: source_handle.into(),
            target,
            target_handle: target_handle.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub Uuid);

impl FlowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

/// A flow document: the main graph, or a subflow usable as a single node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub name: String,
    #[serde(default)]
    pub is_subflow: bool,
    #[serde(default)]
    pub subflow_inputs: Vec<String>,
    #[serde(default)]
    pub subflow_outputs: Vec<String>,
    nodes: HashMap<NodeId, Node>,
    /// Preserves edge-insertion order for stable multi-input gather ordering.
    edges: Vec<Edge>,
    /// Node insertion rank, used by the scheduler to tie-break topological order.
    #[serde(skip)]
    insertion_rank: HashMap<NodeId, usize>,
    #[serde(skip)]
    next_rank: usize,
    #[serde(skip)]
    adjacency: Option<HashMap<NodeId, Vec<EdgeId>>>,
}

#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    #[error("edge source node {0} does not exist")]
    DanglingSource(NodeId),
    #[error("edge target node {0} does not exist")]
    DanglingTarget(NodeId),
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: FlowId::new(),
            name: name.into(),
            is_subflow: false,
            subflow_inputs: Vec::new(),
            subflow_outputs: Vec::new(),
            nodes: HashMap::new(),
            edges: Vec::new(),
            insertion_rank: HashMap::new(),
            next_rank: 0,
            adjacency: None,
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        self.insertion_rank.insert(id, self.next_rank);
        self.next_rank += 1;
        self.adjacency = None;
        id
    }

    /// Drops the node and any edge touching it. Pure graph storage — this
    /// does not know about side-effect resources; callers going through
    /// `Engine::remove_node` get resource disposal too.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        self.edges
            .retain(|e| e.source != id && e.target != id);
        self.insertion_rank.remove(&id);
        self.adjacency = None;
        self.nodes.remove(&id)
    }

    pub fn insertion_rank(&self) -> &HashMap<NodeId, usize> {
        &self.insertion_rank
    }

    /// Validates both endpoints exist before inserting.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId, GraphError> {
        if !self.nodes.contains_key(&edge.source) {
            return Err(GraphError::DanglingSource(edge.source));
        }
        if !self.nodes.contains_key(&edge.target) {
            return Err(GraphError::DanglingTarget(edge.target));
        }
        let id = edge.id;
        self.edges.push(edge);
        self.adjacency = None;
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) {
        self.edges.retain(|e| e.id != id);
        self.adjacency = None;
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn valid_node_ids(&self) -> HashSet<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Edges targeting `(node, handle)`, in edge-insertion order.
    pub fn incoming_edges(&self, node: NodeId, handle: &str) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.target == node && e.target_handle == handle)
            .collect()
    }

    /// Distinct target handles among edges feeding `node`, in edge-insertion
    /// order. Used when no static port schema is known for a node type.
    pub fn incoming_edges_any_port(&self, node: NodeId) -> Vec<String> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .filter(|e| e.target == node)
            .filter_map(|e| {
                if seen.insert(e.target_handle.clone()) {
                    Some(e.target_handle.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn outgoing_edges(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source == node)
    }

    /// Source -> outgoing edge ids, rebuilt lazily and cached until the next mutation.
    pub fn adjacency(&mut self) -> &HashMap<NodeId, Vec<EdgeId>> {
        if self.adjacency.is_none() {
            let mut map: HashMap<NodeId, Vec<EdgeId>> = HashMap::new();
            for edge in &self.edges {
                map.entry(edge.source).or_default().push(edge.id);
            }
            self.adjacency = Some(map);
        }
        self.adjacency.as_ref().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_edge_rejects_dangling_endpoints() {
        let mut flow = Flow::new("f");
        let a = flow.add_node(Node::new("constant"));
        let ghost = NodeId::new();
        let err = flow
            .add_edge(Edge::new(a, "out", ghost, "in"))
            .unwrap_err();
        assert!(matches!(err, GraphError::DanglingTarget(_)));
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut flow = Flow::new("f");
        let a = flow.add_node(Node::new("constant"));
        let b = flow.add_node(Node::new("monitor"));
        flow.add_edge(Edge::new(a, "value", b, "value")).unwrap();
        flow.remove_node(a);
        assert_eq!(flow.edges().len(), 0);
    }

    #[test]
    fn incoming_edges_preserve_insertion_order() {
        let mut flow = Flow::new("f");
        let a = flow.add_node(Node::new("constant"));
        let b = flow.add_node(Node::new("constant"));
        let c = flow.add_node(Node::new("mixer"));
        let e1 = flow.add_edge(Edge::new(a, "value", c, "in")).unwrap();
        let e2 = flow.add_edge(Edge::new(b, "value", c, "in")).unwrap();
        let incoming = flow.incoming_edges(c, "in");
        assert_eq!(incoming[0].id, e1);
        assert_eq!(incoming[1].id, e2);
    }
}
