use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static broker session parameters, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub keep_alive_secs: u64,
    /// Root of outbound key press topics (`{publish_root}/{x}{y}`)
    pub publish_root: String,
    /// Wildcard filter covering every inbound control message
    pub subscribe_topic: String,
    /// 0 or 1
    pub qos: u8,
    pub connect_timeout_ms: u64,
    pub receive_timeout_ms: u64,
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn qos(&self) -> rumqttc::QoS {
        match self.qos {
            0 => rumqttc::QoS::AtMostOnce,
            _ => rumqttc::QoS::AtLeastOnce,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "RGB_KEY".to_string(),
            username: String::new(),
            password: String::new(),
            keep_alive_secs: 30,
            publish_root: "RGBKEY".to_string(),
            subscribe_topic: "RGBHA/#".to_string(),
            qos: 0,
            connect_timeout_ms: 10_000,
            receive_timeout_ms: 5_000,
        }
    }
}
