pub mod context;
pub mod registry;

pub use context::{BoxFuture, ExecutionContext, ExecutorOutcome, GatheredInput, ValueMap};
pub use registry::{Executor, ExecutorRegistry, FnExecutor};
