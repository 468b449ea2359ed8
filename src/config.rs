//! Engine-level configuration: tick cadence, default reconnect policy, and
//! buffer defaults, loaded from a YAML file or built programmatically.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Best-effort tick rate hint in Hz, for hosts that drive their own loop.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    /// Capacity of the broadcast event bus.
    #[serde(default = "default_event_capacity")]
    pub event_bus_capacity: usize,
}

fn default_tick_hz() -> f64 {
    60.0
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            reconnect: ReconnectConfig::default(),
            buffer: BufferConfig::default(),
            event_bus_capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Linear backoff cap: delay is `base_delay * min(attempts, reconnect_cap)`.
    #[serde(default = "default_reconnect_cap")]
    pub reconnect_cap: u32,
    /// 0 = unlimited.
    #[serde(default)]
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_cap() -> u32 {
    5
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            reconnect_cap: default_reconnect_cap(),
            max_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_buffer_capacity")]
    pub capacity: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_buffer_capacity() -> usize {
    1024
}

fn default_max_retries() -> u32 {
    3
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_buffer_capacity(),
            max_retries: default_max_retries(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(s: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Loads `.env` (if present) and falls back to defaults; convenience for
    /// the example binary and integration tests.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.tick_hz, 60.0);
        assert_eq!(cfg.reconnect.reconnect_cap, 5);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let cfg = EngineConfig::from_yaml_str("tick_hz: 30.0\n").unwrap();
        assert_eq!(cfg.tick_hz, 30.0);
        assert_eq!(cfg.buffer.capacity, 1024);
    }
}
