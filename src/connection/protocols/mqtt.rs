//! MQTT transport built on `rumqttc`: a client handle plus a background
//! task driving the event loop and forwarding inbound publishes.

use crate::connection::adapter::Transport;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u16,
    pub clean_session: bool,
}

pub struct MqttTransport {
    config: MqttConfig,
    client: Mutex<Option<AsyncClient>>,
    on_message: tokio::sync::broadcast::Sender<(String, Vec<u8>)>,
}

impl MqttTransport {
    pub fn new(config: MqttConfig) -> Self {
        let (tx, _rx) = tokio::sync::broadcast::channel(256);
        Self {
            config,
            client: Mutex::new(None),
            on_message: tx,
        }
    }

    pub fn subscribe_messages(&self) -> tokio::sync::broadcast::Receiver<(String, Vec<u8>)> {
        self.on_message.subscribe()
    }

    pub async fn subscribe_topic(&self, topic: &str, qos: QoS) -> anyhow::Result<()> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(|| anyhow::anyhow!("mqtt not connected"))?;
        client.subscribe(topic, qos).await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn do_connect(&self) -> anyhow::Result<()> {
        let mut opts = MqttOptions::new(&self.config.client_id, &self.config.host, self.config.port);
        opts.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs as u64));
        opts.set_clean_session(self.config.clean_session);
        if let (Some(u), Some(p)) = (&self.config.username, &self.config.password) {
            opts.set_credentials(u, p);
        }

        let (client, mut event_loop) = AsyncClient::new(opts, 64);
        *self.client.lock().await = Some(client);

        let on_message = self.on_message.clone();
        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let _ = on_message.send((publish.topic, publish.payload.to_vec()));
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        });
        Ok(())
    }

    async fn do_disconnect(&self) -> anyhow::Result<()> {
        if let Some(client) = self.client.lock().await.take() {
            client.disconnect().await?;
        }
        Ok(())
    }

    async fn do_send(&self, topic: &str, payload: &Value) -> anyhow::Result<()> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(|| anyhow::anyhow!("mqtt not connected"))?;
        client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_string())
            .await?;
        Ok(())
    }
}
