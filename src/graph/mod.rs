pub mod model;
pub mod store;

pub use model::{Edge, EdgeId, Flow, FlowId, GraphError, Node, NodeId, Position};
pub use store::FlowStore;
