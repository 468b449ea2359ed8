pub mod catalog;
pub mod definition;

pub use catalog::NodeCatalog;
pub use definition::{ConnectionRequirement, NodeDefinition, Platform, PortSchema};
