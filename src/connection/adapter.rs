//! Adapter base contract: owns the state machine and message buffer;
//! protocol-specific adapters supply `doConnect`/`doDisconnect`/`doSend`.
//! Composition over inheritance — the base holds shared machinery,
//! subclasses contribute three functions.

use super::buffer::{BufferedMessage, MessageBuffer, Priority};
use super::state_machine::{ConnectionEvent, ConnectionState, StateMachine};
use crate::config::ReconnectConfig;
use crate::events::{EngineEvent, EventBus};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn do_connect(&self) -> anyhow::Result<()>;
    async fn do_disconnect(&self) -> anyhow::Result<()>;
    async fn do_send(&self, topic: &str, payload: &Value) -> anyhow::Result<()>;
}

pub struct SendOptions {
    pub priority: Priority,
    pub ttl: Option<f64>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            priority: Priority::Normal,
            ttl: None,
        }
    }
}

/// Linear backoff capped at `reconnect_cap` attempts:
/// `baseDelay * min(attempts, reconnect_cap)`.
pub fn reconnect_delay(config: &ReconnectConfig, attempts: u32) -> std::time::Duration {
    let capped = attempts.min(config.reconnect_cap).max(1);
    std::time::Duration::from_millis(config.base_delay_ms * capped as u64)
}

/// `reconnect_delay` plus up to 20% jitter, so a burst of adapters that
/// dropped at the same instant don't all retry in lockstep.
fn jittered_reconnect_delay(config: &ReconnectConfig, attempts: u32) -> std::time::Duration {
    let base = reconnect_delay(config, attempts);
    let jitter_frac: f64 = rand::random::<f64>() * 0.2;
    base + std::time::Duration::from_secs_f64(base.as_secs_f64() * jitter_frac)
}

/// Object-safe façade over `AdapterBase<T>` so a manager can hold adapters
/// of different protocols behind one `Arc<dyn ConnectionHandle>` map.
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    async fn connect(&self) -> anyhow::Result<()>;
    async fn disconnect(&self) -> anyhow::Result<()>;
    async fn send(&self, topic: &str, payload: Value, options: SendOptions) -> anyhow::Result<()>;
    async fn dispose(&self);
    async fn state(&self) -> ConnectionState;

    /// Installs a pattern subscription. Protocols that don't support one
    /// (HTTP) keep the default, which errors.
    async fn subscribe(&self, _pattern: &str) -> anyhow::Result<()> {
        anyhow::bail!("this protocol does not support subscriptions")
    }
}

#[async_trait]
impl<T: Transport + 'static> ConnectionHandle for AdapterBase<T> {
    async fn connect(&self) -> anyhow::Result<()> {
        AdapterBase::connect(self).await
    }
    async fn disconnect(&self) -> anyhow::Result<()> {
        AdapterBase::disconnect(self).await
    }
    async fn send(&self, topic: &str, payload: Value, options: SendOptions) -> anyhow::Result<()> {
        AdapterBase::send(self, topic, payload, options).await
    }
    async fn dispose(&self) {
        AdapterBase::dispose(self).await
    }
    async fn state(&self) -> ConnectionState {
        AdapterBase::state(self).await
    }
}

pub struct AdapterBase<T: Transport> {
    pub connection_id: String,
    transport: T,
    state: Mutex<StateMachine>,
    buffer: Mutex<MessageBuffer>,
    reconnect: ReconnectConfig,
    buffering_enabled: bool,
    disposed: AtomicBool,
    clock_now: AtomicU64,
    events: Option<EventBus>,
}

impl<T: Transport> AdapterBase<T> {
    pub fn new(
        connection_id: impl Into<String>,
        transport: T,
        reconnect: ReconnectConfig,
        buffer_capacity: usize,
        buffering_enabled: bool,
        events: Option<EventBus>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            transport,
            state: Mutex::new(StateMachine::new()),
            buffer: Mutex::new(MessageBuffer::new(buffer_capacity, reconnect.reconnect_cap.max(3))),
            reconnect,
            buffering_enabled,
            disposed: AtomicBool::new(false),
            clock_now: AtomicU64::new(0),
            events,
        }
    }

    fn now(&self) -> f64 {
        self.clock_now.fetch_add(1, Ordering::SeqCst) as f64
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.lock().await.state()
    }

    fn emit_status(&self, state: ConnectionState, error: Option<String>) {
        if let Some(bus) = &self.events {
            bus.emit(EngineEvent::ConnectionStatusChange {
                connection_id: self.connection_id.clone(),
                state: format!("{state:?}"),
                error,
            });
        }
    }

    /// Validates the transition via `can(event)` first; idempotent no-op if
    /// already connected, errors if the transition is otherwise invalid.
    pub async fn connect(&self) -> anyhow::Result<()> {
        let now = self.now();
        let mut sm = self.state.lock().await;
        if sm.state() == ConnectionState::Connected {
            return Ok(());
        }
        if !sm.can(&ConnectionEvent::Connect) {
            anyhow::bail!(
                "cannot connect from state {:?}",
                sm.state()
            );
        }
        sm.send(ConnectionEvent::Connect, now);
        self.emit_status(sm.state(), None);
        drop(sm);

        match self.transport.do_connect().await {
            Ok(()) => {
                let now = self.now();
                let mut sm = self.state.lock().await;
                sm.send(ConnectionEvent::Connected, now);
                self.emit_status(sm.state(), None);
                drop(sm);
                self.flush_buffer().await;
                Ok(())
            }
            Err(e) => {
                let now = self.now();
                let mut sm = self.state.lock().await;
                sm.send(ConnectionEvent::Error(e.to_string()), now);
                self.emit_status(sm.state(), Some(e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn disconnect(&self) -> anyhow::Result<()> {
        let now = self.now();
        let mut sm = self.state.lock().await;
        if !sm.can(&ConnectionEvent::Disconnect) {
            return Ok(());
        }
        sm.send(ConnectionEvent::Disconnect, now);
        self.emit_status(sm.state(), None);
        drop(sm);

        let result = self.transport.do_disconnect().await;
        let now = self.now();
        let mut sm = self.state.lock().await;
        sm.send(ConnectionEvent::Disconnected, now);
        self.emit_status(sm.state(), None);
        result
    }

    pub async fn send(&self, topic: &str, payload: Value, options: SendOptions) -> anyhow::Result<()> {
        let connected = self.state.lock().await.state() == ConnectionState::Connected;
        if !connected {
            if self.buffering_enabled {
                let now = self.now();
                self.buffer.lock().await.enqueue(BufferedMessage {
                    topic: topic.to_string(),
                    payload,
                    priority: options.priority,
                    enqueued_at: now,
                    ttl: options.ttl,
                    retries: 0,
                });
                return Ok(());
            }
            anyhow::bail!("not connected");
        }
        self.transport.do_send(topic, &payload).await
    }

    async fn flush_buffer(&self) {
        let now = self.now();
        let messages = self.buffer.lock().await.flush(now);
        for message in messages {
            if let Err(e) = self.transport.do_send(&message.topic, &message.payload).await {
                tracing::warn!(topic = %message.topic, error = %e, "resend failed; requeueing");
                self.buffer.lock().await.requeue_failed(message);
            }
        }
    }

    /// Called when the transport observes a connection drop it did not
    /// initiate. Dispatches whichever of `ERROR`/`DISCONNECTED` is valid
    /// from the current state, then schedules a reconnect unless the
    /// attempt cap has been reached.
    pub async fn handle_unexpected_disconnect(self: &Arc<Self>, error: Option<String>) {
        let now = self.now();
        let mut sm = self.state.lock().await;
        let event = match &error {
            Some(msg) if sm.can(&ConnectionEvent::Error(msg.clone())) => {
                ConnectionEvent::Error(msg.clone())
            }
            _ => ConnectionEvent::Disconnected,
        };
        sm.send(event, now);
        self.emit_status(sm.state(), error);
        let attempts = sm.context().reconnect_attempts;
        drop(sm);

        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.reconnect.max_attempts != 0 && attempts >= self.reconnect.max_attempts {
            tracing::warn!(connection = %self.connection_id, "reconnect attempts exhausted");
            return;
        }

        let now = self.now();
        let mut sm = self.state.lock().await;
        if sm.can(&ConnectionEvent::ReconnectScheduled) {
            sm.send(ConnectionEvent::ReconnectScheduled, now);
            let attempts = sm.context().reconnect_attempts;
            drop(sm);

            let delay = jittered_reconnect_delay(&self.reconnect, attempts);
            let this = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if this.disposed.load(Ordering::SeqCst) {
                    return;
                }
                let now = this.now();
                let mut sm = this.state.lock().await;
                if sm.can(&ConnectionEvent::ReconnectStart) {
                    sm.send(ConnectionEvent::ReconnectStart, now);
                    drop(sm);
                    let _ = this.connect().await;
                }
            });
        }
    }

    /// Cancels any pending reconnect and tears the transport down.
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let _ = self.transport.do_disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FlakyTransport {
        connect_calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn do_connect(&self) -> anyhow::Result<()> {
            let n = self.connect_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                anyhow::bail!("simulated failure");
            }
            Ok(())
        }
        async fn do_disconnect(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn do_send(&self, _topic: &str, _payload: &Value) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn connect_transitions_to_connected_on_success() {
        let adapter = AdapterBase::new(
            "c1",
            FlakyTransport {
                connect_calls: AtomicUsize::new(0),
                fail_first: false,
            },
            ReconnectConfig::default(),
            16,
            true,
            None,
        );
        adapter.connect().await.unwrap();
        assert_eq!(adapter.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn send_while_disconnected_buffers_when_enabled() {
        let adapter = AdapterBase::new(
            "c1",
            FlakyTransport {
                connect_calls: AtomicUsize::new(0),
                fail_first: false,
            },
            ReconnectConfig::default(),
            16,
            true,
            None,
        );
        adapter
            .send("topic", serde_json::json!({"x": 1}), SendOptions::default())
            .await
            .unwrap();
        assert_eq!(adapter.buffer.lock().await.len(), 1);
    }

    #[test]
    fn reconnect_delay_caps_linearly() {
        let cfg = ReconnectConfig {
            base_delay_ms: 100,
            reconnect_cap: 5,
            max_attempts: 0,
        };
        assert_eq!(reconnect_delay(&cfg, 1).as_millis(), 100);
        assert_eq!(reconnect_delay(&cfg, 5).as_millis(), 500);
        assert_eq!(reconnect_delay(&cfg, 9).as_millis(), 500);
    }
}
