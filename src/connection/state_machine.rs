//! Connection state machine: normative transition table, context, and the
//! `send(event) -> bool` entry point every adapter drives itself through.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Reconnecting,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connect,
    Connected,
    Disconnect,
    Disconnected,
    Error(String),
    ReconnectScheduled,
    ReconnectStart,
    Reset,
}

impl ConnectionEvent {
    fn kind(&self) -> &'static str {
        match self {
            ConnectionEvent::Connect => "connect",
            ConnectionEvent::Connected => "connected",
            ConnectionEvent::Disconnect => "disconnect",
            ConnectionEvent::Disconnected => "disconnected",
            ConnectionEvent::Error(_) => "error",
            ConnectionEvent::ReconnectScheduled => "reconnect_scheduled",
            ConnectionEvent::ReconnectStart => "reconnect_start",
            ConnectionEvent::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    pub error: Option<String>,
    pub reconnect_attempts: u32,
    pub last_connected: Option<f64>,
    pub state_changed_at: f64,
}

/// Normative transition table from the connection state-machine spec: a
/// `(from, event) -> to` lookup. Returns `None` for any pair not listed,
/// meaning the event is ignored in that state.
fn transition(state: ConnectionState, event: &str) -> Option<ConnectionState> {
    use ConnectionState::*;
    match (state, event) {
        (Idle, "connect") => Some(Connecting),
        (Connecting, "connected") => Some(Connected),
        (Connecting, "disconnect") => Some(Disconnecting),
        (Connecting, "error") => Some(Error),
        (Connected, "disconnect") => Some(Disconnecting),
        (Connected, "error") => Some(Error),
        (Disconnecting, "disconnected") => Some(Disconnected),
        (Disconnecting, "error") => Some(Error),
        (Disconnected, "connect") => Some(Connecting),
        (Disconnected, "reconnect_scheduled") => Some(Reconnecting),
        (Disconnected, "reset") => Some(Idle),
        (Reconnecting, "disconnect") => Some(Disconnected),
        (Reconnecting, "reconnect_start") => Some(Connecting),
        (Reconnecting, "reset") => Some(Idle),
        (Error, "connect") => Some(Connecting),
        (Error, "disconnect") => Some(Disconnected),
        (Error, "reconnect_scheduled") => Some(Reconnecting),
        (Error, "reset") => Some(Idle),
        _ => None,
    }
}

pub struct StateMachine {
    state: ConnectionState,
    context: ConnectionContext,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            context: ConnectionContext::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    pub fn can(&self, event: &ConnectionEvent) -> bool {
        transition(self.state, event.kind()).is_some()
    }

    /// Applies `event`. Returns `true` and mutates state on a listed
    /// transition; returns `false` and leaves state untouched otherwise
    /// (an invalid-transition warning is the caller's responsibility to log).
    pub fn send(&mut self, event: ConnectionEvent, now: f64) -> bool {
        let Some(next) = transition(self.state, event.kind()) else {
            return false;
        };

        match &event {
            ConnectionEvent::Connected => {
                self.context.reconnect_attempts = 0;
                self.context.error = None;
                self.context.last_connected = Some(now);
            }
            ConnectionEvent::Error(msg) => {
                self.context.error = Some(msg.clone());
            }
            ConnectionEvent::ReconnectScheduled => {
                self.context.reconnect_attempts += 1;
            }
            ConnectionEvent::Reset => {
                self.context = ConnectionContext::default();
            }
            _ => {}
        }

        self.state = next;
        self.context.state_changed_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_5_walkthrough() {
        let mut sm = StateMachine::new();
        assert!(sm.send(ConnectionEvent::Connect, 0.0));
        assert_eq!(sm.state(), ConnectionState::Connecting);

        assert!(sm.send(ConnectionEvent::Error("boom".into()), 1.0));
        assert_eq!(sm.state(), ConnectionState::Error);
        assert_eq!(sm.context().error.as_deref(), Some("boom"));

        assert!(sm.send(ConnectionEvent::ReconnectScheduled, 2.0));
        assert_eq!(sm.state(), ConnectionState::Reconnecting);
        assert_eq!(sm.context().reconnect_attempts, 1);

        assert!(sm.send(ConnectionEvent::ReconnectStart, 3.0));
        assert_eq!(sm.state(), ConnectionState::Connecting);

        assert!(sm.send(ConnectionEvent::Connected, 4.0));
        assert_eq!(sm.state(), ConnectionState::Connected);
        assert_eq!(sm.context().reconnect_attempts, 0);
    }

    #[test]
    fn invalid_transition_is_rejected_and_state_unchanged() {
        let mut sm = StateMachine::new();
        assert!(!sm.send(ConnectionEvent::Connected, 0.0));
        assert_eq!(sm.state(), ConnectionState::Idle);
    }
}
