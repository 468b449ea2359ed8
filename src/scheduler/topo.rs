//! Topological ordering via Kahn's algorithm.
//!
//! `petgraph::algo::toposort` is DFS-based and does not guarantee a specific
//! tie-break among simultaneously-ready nodes, so this hand-rolls Kahn's
//! algorithm directly to get a deterministic insertion-order tie-break.

use crate::graph::{Flow, NodeId};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDetected;

/// Returns nodes in topological order, tie-broken by insertion order
/// (the order `flow.nodes()` yields them in is not guaranteed stable across
/// a `HashMap`, so callers must supply `insertion_rank`).
pub fn topological_order(
    flow: &Flow,
    insertion_rank: &HashMap<NodeId, usize>,
) -> Result<Vec<NodeId>, CycleDetected> {
    let mut indegree: HashMap<NodeId, usize> = flow.node_ids().map(|id| (id, 0)).collect();
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

    for edge in flow.edges() {
        *indegree.entry(edge.target).or_insert(0) += 1;
        adjacency.entry(edge.source).or_default().push(edge.target);
    }

    let rank_of = |id: &NodeId| -> usize { *insertion_rank.get(id).unwrap_or(&usize::MAX) };

    // Ready set ordered by (insertion_rank, id) for a deterministic tie-break.
    let mut ready: BTreeSet<(usize, NodeId)> = indegree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| (rank_of(&id), id))
        .collect();

    let mut order = Vec::with_capacity(indegree.len());
    let mut remaining = indegree.clone();

    while let Some(&(rank, node)) = ready.iter().next() {
        ready.remove(&(rank, node));
        order.push(node);

        if let Some(targets) = adjacency.get(&node) {
            for &target in targets {
                let deg = remaining.get_mut(&target).expect("target tracked");
                *deg -= 1;
                if *deg == 0 {
                    ready.insert((rank_of(&target), target));
                }
            }
        }
    }

    if order.len() != indegree.len() {
        return Err(CycleDetected);
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

    fn rank_map(flow: &Flow, order: &[NodeId]) -> HashMap<NodeId, usize> {
        order.iter().enumerate().map(|(i, id)| (*id, i)).collect()
    }

    #[test]
    fn linear_chain_orders_upstream_first() {
        let mut flow = Flow::new("f");
        let a = flow.add_node(Node::new("constant"));
        let b = flow.add_node(Node::new("add"));
        let c = flow.add_node(Node::new("monitor"));
        flow.add_edge(Edge::new(a, "value", b, "a")).unwrap();
        flow.add_edge(Edge::new(b, "result", c, "value")).unwrap();

        let ids = [a, b, c];
        let ranks = rank_map(&flow, &ids);
        let order = topological_order(&flow, &ranks).unwrap();

        let pos = |id: NodeId| order.iter().position(|&n| n == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }

    #[test]
    fn cycle_is_detected() {
        let mut flow = Flow::new("f");
        let a = flow.add_node(Node::new("add"));
        let b = flow.add_node(Node::new("add"));
        flow.add_edge(Edge::new(a, "result", b, "a")).unwrap();
        flow.add_edge(Edge::new(b, "result", a, "a")).unwrap();

        let ranks = rank_map(&flow, &[a, b]);
        assert_eq!(topological_order(&flow, &ranks), Err(CycleDetected));
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut flow = Flow::new("f");
        let a = flow.add_node(Node::new("constant"));
        let b = flow.add_node(Node::new("constant"));
        // No edges: both are independent roots, tie-break must be insertion order.
        let ranks = rank_map(&flow, &[a, b]);
        let order = topological_order(&flow, &ranks).unwrap();
        assert_eq!(order, vec![a, b]);
    }
}
