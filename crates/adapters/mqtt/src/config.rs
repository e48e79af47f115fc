//! MQTT bus configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the MQTT bus.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// Client identifier prefix; the host name is appended per process.
    pub client_id: String,
    /// Topic namespace of the device channel.
    pub base_topic: String,
    /// Group shared by every backend replica.
    pub sender_group: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Pause after a connection error before polling again, in seconds.
    pub reconnect_delay_secs: u16,
    /// Capacity of the client request channel.
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "smarthub-backend".to_string(),
            base_topic: "smarthub/devices".to_string(),
            sender_group: "backend".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_secs: 5,
            channel_capacity: 64,
        }
    }
}

impl MqttConfig {
    /// Per-process identity, also used as the MQTT client id.
    ///
    /// Falls back to a random suffix when no host name is known.
    #[must_use]
    pub fn sender_id(&self, hostname: Option<&str>) -> String {
        match hostname.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => format!("{}-{name}", self.client_id),
            None => format!("{}-{}", self.client_id, uuid::Uuid::new_v4().simple()),
        }
    }

    pub(crate) fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive_secs.max(5)))
    }

    pub(crate) fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.reconnect_delay_secs))
    }
}
