pub mod clock;
pub mod runner;
pub mod topo;

pub use clock::Clock;
pub use runner::{FrameCache, NodeErrorInfo, RunState, Scheduler, TickReport};
pub use topo::{topological_order, CycleDetected};
