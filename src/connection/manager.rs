//! Connection manager (singleton): a protocol type registry, saved
//! connection configurations, lazy adapter lifecycle, and cross-cutting
//! lifecycle events.

use super::adapter::{ConnectionHandle, SendOptions};
use super::state_machine::ConnectionState;
use crate::events::{EngineEvent, EventBus};
use crate::nodes::Platform;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub id: String,
    pub protocol: String,
    pub options: Value,
    pub auto_connect: bool,
    pub auto_reconnect: bool,
}

/// A registered protocol: metadata plus a factory the manager treats as an
/// opaque closure producing a fresh adapter for a given configuration.
pub struct ProtocolType {
    pub protocol: String,
    pub platforms: Vec<Platform>,
    pub default_config: Value,
    pub factory: Arc<dyn Fn(&ConnectionConfig, Option<EventBus>) -> Arc<dyn ConnectionHandle> + Send + Sync>,
}

pub struct ConnectionManager {
    types: HashMap<String, ProtocolType>,
    configs: DashMap<String, ConnectionConfig>,
    adapters: DashMap<String, Arc<dyn ConnectionHandle>>,
    events: Option<EventBus>,
}

impl ConnectionManager {
    pub fn new(events: Option<EventBus>) -> Self {
        Self {
            types: HashMap::new(),
            configs: DashMap::new(),
            adapters: DashMap::new(),
            events,
        }
    }

    pub fn register_type(&mut self, protocol_type: ProtocolType) {
        let protocol = protocol_type.protocol.clone();
        tracing::info!(protocol = %protocol, "registered connection protocol type");
        self.emit(EngineEvent::ProtocolTypeRegistered { protocol: protocol.clone() });
        self.types.insert(protocol, protocol_type);
    }

    pub fn unregister_type(&mut self, protocol: &str) {
        if self.types.remove(protocol).is_some() {
            self.emit(EngineEvent::ProtocolTypeUnregistered { protocol: protocol.to_string() });
        }
    }

    pub fn upsert_config(&self, config: ConnectionConfig) {
        let added = !self.configs.contains_key(&config.id);
        let id = config.id.clone();
        let protocol = config.protocol.clone();
        self.configs.insert(id.clone(), config);
        if added {
            self.emit(EngineEvent::ConnectionAdded { connection_id: id, protocol });
        } else {
            self.emit(EngineEvent::ConnectionUpdated { connection_id: id });
        }
    }

    pub fn remove_config(&self, id: &str) {
        self.configs.remove(id);
        self.adapters.remove(id);
        self.emit(EngineEvent::ConnectionRemoved { connection_id: id.to_string() });
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }

    /// Returns the adapter for `id`, creating it lazily from its saved
    /// configuration and registered protocol factory on first access.
    pub fn get_or_create(&self, id: &str) -> anyhow::Result<Arc<dyn ConnectionHandle>> {
        if let Some(adapter) = self.adapters.get(id) {
            return Ok(adapter.clone());
        }
        let config = self
            .configs
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("no connection configuration for '{id}'"))?
            .clone();
        let protocol_type = self
            .types
            .get(&config.protocol)
            .ok_or_else(|| anyhow::anyhow!("protocol '{}' not registered", config.protocol))?;
        let adapter = (protocol_type.factory)(&config, self.events.clone());
        self.adapters.insert(id.to_string(), adapter.clone());
        Ok(adapter)
    }

    pub async fn connect(&self, id: &str) -> anyhow::Result<()> {
        self.get_or_create(id)?.connect().await
    }

    pub async fn disconnect(&self, id: &str) -> anyhow::Result<()> {
        if let Some(adapter) = self.adapters.get(id) {
            adapter.disconnect().await
        } else {
            Ok(())
        }
    }

    pub async fn send(&self, id: &str, topic: &str, payload: Value, options: SendOptions) -> anyhow::Result<()> {
        self.get_or_create(id)?.send(topic, payload, options).await
    }

    pub async fn state(&self, id: &str) -> Option<ConnectionState> {
        match self.adapters.get(id) {
            Some(adapter) => Some(adapter.state().await),
            None => None,
        }
    }

    /// Connects every saved configuration marked `auto_connect`.
    pub async fn connect_all(&self) {
        let ids: Vec<String> = self
            .configs
            .iter()
            .filter(|e| e.value().auto_connect)
            .map(|e| e.key().clone())
            .collect();
        for id in ids {
            if let Err(e) = self.connect(&id).await {
                tracing::warn!(connection = %id, error = %e, "auto-connect failed");
            }
        }
    }

    pub async fn disconnect_all(&self) {
        let ids: Vec<String> = self.adapters.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            let _ = self.disconnect(&id).await;
        }
        for adapter in self.adapters.iter() {
            adapter.value().dispose().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::adapter::{AdapterBase, Transport};
    use async_trait::async_trait;

    struct NoopTransport;

    #[async_trait]
    impl Transport for NoopTransport {
        async fn do_connect(&self) -> anyhow::Result<()> {
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
    async fn lazily_creates_adapter_from_registered_factory() {
        let mut manager = ConnectionManager::new(None);
        manager.register_type(ProtocolType {
            protocol: "noop".into(),
            platforms: vec![Platform::Web],
            default_config: Value::Null,
            factory: Arc::new(|config, events| {
                Arc::new(AdapterBase::new(
                    config.id.clone(),
                    NoopTransport,
                    crate::config::ReconnectConfig::default(),
                    16,
                    true,
                    events,
                ))
            }),
        });
        manager.upsert_config(ConnectionConfig {
            id: "c1".into(),
            protocol: "noop".into(),
            options: Value::Null,
            auto_connect: false,
            auto_reconnect: false,
        });

        manager.connect("c1").await.unwrap();
        assert_eq!(manager.state("c1").await, Some(ConnectionState::Connected));
    }
}
