//! Connection subsystem: state machine, message buffer, generic adapter
//! base, the singleton manager, and protocol-specific transports.

pub mod adapter;
pub mod buffer;
pub mod builtin;
pub mod manager;
pub mod protocols;
pub mod state_machine;

pub use adapter::{reconnect_delay, AdapterBase, ConnectionHandle, SendOptions, Transport};
pub use buffer::{BufferedMessage, MessageBuffer, Priority};
pub use builtin::register_builtin_protocol_types;
pub use manager::{ConnectionConfig, ConnectionManager, ProtocolType};
pub use state_machine::{ConnectionContext, ConnectionEvent, ConnectionState, StateMachine};
