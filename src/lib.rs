//! # dataflow_engine
//!
//! A headless, host-embeddable dataflow graph execution engine: a node
//! catalog, a pluggable executor registry, per-tick scheduling over a
//! topologically ordered graph, a resource lifecycle manager, a
//! multi-protocol connection manager, and an observability event bus.

pub mod app;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod executor;
pub mod executors;
pub mod graph;
pub mod nodes;
pub mod resource_manager;
pub mod scheduler;
pub mod types;

pub use app::Engine;
pub use config::EngineConfig;
pub use error::EngineError;
pub use events::{EngineEvent, EventBus};
