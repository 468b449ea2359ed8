//! Concrete `Transport` implementations, one per supported protocol.

pub mod ble;
pub mod clasp;
pub mod http;
pub mod mqtt;
pub mod osc;
pub mod websocket;
