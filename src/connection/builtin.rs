//! Registers the six protocol types this crate ships as `ConnectionManager`
//! factories, so a host gets working connectivity out of the box and only
//! needs to call `upsert_config` with per-connection options. A host that
//! wants a custom protocol still calls `register_type` directly — this is
//! additive, not exclusive.

use super::adapter::{AdapterBase, ConnectionHandle};
use super::manager::{ConnectionConfig, ConnectionManager, ProtocolType};
use super::protocols::{
    ble::BleTransport,
    clasp::ClaspTransport,
    http::HttpTransport,
    mqtt::{MqttConfig, MqttTransport},
    osc::OscTransport,
    websocket::WebSocketTransport,
};
use crate::config::{BufferConfig, ReconnectConfig};
use crate::nodes::Platform;
use serde_json::Value;
use std::sync::Arc;

fn opt_str(options: &Value, key: &str, default: &str) -> String {
    options
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Installs `websocket`, `osc`, `mqtt`, `http`, `ble`, and `clasp` as
/// registered protocol types. Each connection's `options` JSON supplies the
/// protocol-specific fields (`url`, `host`/`port`, `baseUrl`,
/// `serviceUuid`/`characteristicUuids`, `token`).
pub fn register_builtin_protocol_types(
    manager: &mut ConnectionManager,
    reconnect: ReconnectConfig,
    buffer: BufferConfig,
) {
    manager.register_type(ProtocolType {
        protocol: "websocket".into(),
        platforms: vec![Platform::Web, Platform::Electron],
        default_config: serde_json::json!({ "url": "" }),
        factory: Arc::new({
            let reconnect = reconnect.clone();
            move |config: &ConnectionConfig, events| -> Arc<dyn ConnectionHandle> {
                let url = opt_str(&config.options, "url", "");
                Arc::new(AdapterBase::new(
                    config.id.clone(),
                    WebSocketTransport::new(url),
                    reconnect.clone(),
                    buffer.capacity,
                    true,
                    events,
                ))
            }
        }),
    });

    manager.register_type(ProtocolType {
        protocol: "osc".into(),
        platforms: vec![Platform::Web, Platform::Electron],
        default_config: serde_json::json!({ "url": "" }),
        factory: Arc::new({
            let reconnect = reconnect.clone();
            move |config: &ConnectionConfig, events| -> Arc<dyn ConnectionHandle> {
                let url = opt_str(&config.options, "url", "");
                Arc::new(AdapterBase::new(
                    config.id.clone(),
                    OscTransport::new(url),
                    reconnect.clone(),
                    buffer.capacity,
                    true,
                    events,
                ))
            }
        }),
    });

    manager.register_type(ProtocolType {
        protocol: "mqtt".into(),
        platforms: vec![Platform::Web, Platform::Electron],
        default_config: serde_json::json!({ "host": "localhost", "port": 1883 }),
        factory: Arc::new({
            let reconnect = reconnect.clone();
            move |config: &ConnectionConfig, events| -> Arc<dyn ConnectionHandle> {
                let mqtt_config = MqttConfig {
                    host: opt_str(&config.options, "host", "localhost"),
                    port: config.options.get("port").and_then(Value::as_u64).unwrap_or(1883) as u16,
                    client_id: opt_str(&config.options, "clientId", &config.id),
                    username: config.options.get("username").and_then(Value::as_str).map(String::from),
                    password: config.options.get("password").and_then(Value::as_str).map(String::from),
                    keep_alive_secs: config
                        .options
                        .get("keepAliveSecs")
                        .and_then(Value::as_u64)
                        .unwrap_or(30) as u16,
                    clean_session: config
                        .options
                        .get("cleanSession")
                        .and_then(Value::as_bool)
                        .unwrap_or(true),
                };
                Arc::new(AdapterBase::new(
                    config.id.clone(),
                    MqttTransport::new(mqtt_config),
                    reconnect.clone(),
                    buffer.capacity,
                    true,
                    events,
                ))
            }
        }),
    });

    manager.register_type(ProtocolType {
        protocol: "http".into(),
        platforms: vec![Platform::Web, Platform::Electron],
        default_config: serde_json::json!({ "baseUrl": "" }),
        factory: Arc::new({
            let reconnect = reconnect.clone();
            move |config: &ConnectionConfig, events| -> Arc<dyn ConnectionHandle> {
                let base_url = opt_str(&config.options, "baseUrl", "http://localhost");
                let transport = HttpTransport::new(&base_url).unwrap_or_else(|e| {
                    tracing::warn!(connection = %config.id, error = %e, "invalid HTTP base URL, falling back");
                    HttpTransport::new("http://localhost").expect("static fallback URL parses")
                });
                // HTTP is stateless; buffering a queue behind a disconnected
                // adapter makes no sense for request/response semantics.
                Arc::new(AdapterBase::new(
                    config.id.clone(),
                    transport,
                    reconnect.clone(),
                    0,
                    false,
                    events,
                ))
            }
        }),
    });

    manager.register_type(ProtocolType {
        protocol: "ble".into(),
        platforms: vec![Platform::Web, Platform::Electron],
        default_config: serde_json::json!({ "serviceUuid": "", "characteristicUuids": [] }),
        factory: Arc::new({
            let reconnect = reconnect.clone();
            move |config: &ConnectionConfig, events| -> Arc<dyn ConnectionHandle> {
                let service_uuid = opt_str(&config.options, "serviceUuid", "");
                let characteristic_uuids: Vec<String> = config
                    .options
                    .get("characteristicUuids")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                match BleTransport::new(&service_uuid, &characteristic_uuids) {
                    Ok(transport) => Arc::new(AdapterBase::new(
                        config.id.clone(),
                        transport,
                        reconnect.clone(),
                        buffer.capacity,
                        true,
                        events,
                    )),
                    Err(e) => {
                        tracing::error!(connection = %config.id, error = %e, "invalid BLE service/characteristic uuid");
                        Arc::new(AdapterBase::new(
                            config.id.clone(),
                            UnreachableTransport,
                            reconnect.clone(),
                            0,
                            false,
                            events,
                        ))
                    }
                }
            }
        }),
    });

    manager.register_type(ProtocolType {
        protocol: "clasp".into(),
        platforms: vec![Platform::Web, Platform::Electron],
        default_config: serde_json::json!({ "url": "", "token": null }),
        factory: Arc::new(move |config: &ConnectionConfig, events| -> Arc<dyn ConnectionHandle> {
            let url = opt_str(&config.options, "url", "");
            let token = config.options.get("token").and_then(Value::as_str).map(String::from);
            Arc::new(AdapterBase::new(
                config.id.clone(),
                ClaspTransport::new(url, token),
                reconnect.clone(),
                buffer.capacity,
                true,
                events,
            ))
        }),
    });
}

/// Stand-in transport for a malformed BLE configuration: every operation
/// fails so the adapter surfaces a clear connection error instead of a
/// factory-time panic reaching into the scheduler.
struct UnreachableTransport;

#[async_trait::async_trait]
impl super::adapter::Transport for UnreachableTransport {
    async fn do_connect(&self) -> anyhow::Result<()> {
        anyhow::bail!("connection misconfigured: invalid BLE service/characteristic uuid")
    }
    async fn do_disconnect(&self) -> anyhow::Result<()> {
        Ok(())
    }
    async fn do_send(&self, _topic: &str, _payload: &Value) -> anyhow::Result<()> {
        anyhow::bail!("connection misconfigured: invalid BLE service/characteristic uuid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_six_shipped_protocols() {
        let mut manager = ConnectionManager::new(None);
        register_builtin_protocol_types(&mut manager, ReconnectConfig::default(), BufferConfig::default());
        for protocol in ["websocket", "osc", "mqtt", "http", "ble", "clasp"] {
            manager.upsert_config(ConnectionConfig {
                id: format!("{protocol}-conn"),
                protocol: protocol.into(),
                options: Value::Null,
                auto_connect: false,
                auto_reconnect: false,
            });
            assert!(
                manager.get_or_create(&format!("{protocol}-conn")).is_ok(),
                "expected a factory for '{protocol}'"
            );
        }
    }
}
