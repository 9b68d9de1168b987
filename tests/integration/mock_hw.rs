//! Mock broker and network adapters for integration tests.
//!
//! The transport is scripted through a shared handle so a test can keep
//! steering it after the `SessionManager` has taken ownership.

use mqttkeypad::config::KeypadConfig;
use mqttkeypad::keypad::{GridSize, HeadlessSurface, KeypadBoard, Ready};
use mqttkeypad::mqtt::{
    ConnectError, MqttConfig, PubSubTransport, PublishError, RawMessage, ReceiveError,
};
use mqttkeypad::network::{LinkError, NetworkLink};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

// ── Broker script ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct BrokerScript {
    /// Remaining `open` calls that fail before one succeeds
    pub open_failures: usize,
    pub opens: usize,
    pub subscriptions: Vec<String>,
    pub inbound: VecDeque<RawMessage>,
    pub published: Vec<(String, String)>,
    pub fail_publish: bool,
    pub fail_receive: bool,
    /// Block inside `try_receive` for this long
    pub receive_stall: Option<Duration>,
    /// Time a successful `open` takes
    pub open_delay: Option<Duration>,
    pub open: bool,
    pub closes: usize,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<BrokerScript>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_opens(count: usize) -> Self {
        let transport = Self::default();
        transport.script().open_failures = count;
        transport
    }

    pub fn script(&self) -> MutexGuard<'_, BrokerScript> {
        self.script.lock().unwrap()
    }

    pub fn push_inbound(&self, topic: &str, payload: &str) {
        self.script().inbound.push_back(RawMessage {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
        });
    }

    /// Simulate the broker dropping the socket.
    pub fn drop_connection(&self) {
        self.script().open = false;
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.script().published.clone()
    }

    pub fn opens(&self) -> usize {
        self.script().opens
    }
}

impl PubSubTransport for ScriptedTransport {
    async fn open(&mut self, _config: &MqttConfig) -> Result<(), ConnectError> {
        let delay = {
            let mut script = self.script();
            script.opens += 1;
            if script.open_failures > 0 {
                script.open_failures -= 1;
                return Err(ConnectError::Transport("connection refused".to_string()));
            }
            script.open_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.script().open = true;
        Ok(())
    }

    async fn subscribe(&mut self, filter: &str) -> Result<(), ConnectError> {
        self.script().subscriptions.push(filter.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let mut script = self.script();
        if script.fail_publish {
            return Err(PublishError::Transport {
                topic: topic.to_string(),
                reason: "outgoing queue full".to_string(),
            });
        }
        script
            .published
            .push((topic.to_string(), String::from_utf8_lossy(payload).into_owned()));
        Ok(())
    }

    fn try_receive(&mut self) -> Result<Option<RawMessage>, ReceiveError> {
        let mut script = self.script();
        if let Some(stall) = script.receive_stall {
            std::thread::sleep(stall);
        }
        if script.fail_receive {
            script.fail_receive = false;
            return Err(ReceiveError::Transport("connection reset".to_string()));
        }
        Ok(script.inbound.pop_front())
    }

    fn is_open(&self) -> bool {
        self.script().open
    }

    fn close(&mut self) {
        let mut script = self.script();
        script.open = false;
        script.closes += 1;
    }
}

// ── Network link ──────────────────────────────────────────────

pub struct UpLink;

impl NetworkLink for UpLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

// ── Fixtures ──────────────────────────────────────────────────

#[allow(dead_code)]
pub fn test_config() -> KeypadConfig {
    let mut config = KeypadConfig::default();
    config.mqtt.connect_timeout_ms = 1000;
    config
}

#[allow(dead_code)]
pub async fn ready_board(config: &KeypadConfig) -> (KeypadBoard<Ready>, HeadlessSurface) {
    let surface = HeadlessSurface::new(GridSize::new(config.keypad.columns, config.keypad.rows));
    let board = KeypadBoard::create(Box::new(surface.clone()), config.keypad.idle_color)
        .wait_for_link(&mut UpLink, Duration::from_millis(1))
        .await
        .unwrap();
    (board, surface)
}
