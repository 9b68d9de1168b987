//! Session Manager
//!
//! Owns the one authoritative broker session and its state machine:
//!
//! ```text
//!                 connect()            open + subscribe acked
//! Disconnected ─────────────► Connecting ─────────────────────► Connected
//!      ▲                          │ failure                         │
//!      │                          ▼                                 │ receive error,
//!      └──────────── reconnect() ◄──── Degraded ◄───────────────────┘ timeout or
//!                                                                     liveness failure
//! ```
//!
//! A degraded session is never repaired: the [`Session`] record is
//! dropped, the transport closed, and the next `reconnect()` builds a new
//! one from scratch. Callers only ever see fully subscribed sessions.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use super::config::MqttConfig;
use super::error::{ConnectError, PublishError, ReceiveError};
use super::message::InboundMessage;
use super::transport::PubSubTransport;

const MAX_ERROR_MESSAGES: usize = 16;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Degraded,
}

/// One logical broker connection.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: u64,
    pub topic: String,
    pub opened_at: Instant,
    pub last_activity: Instant,
    pub last_health_check: Instant,
}

#[derive(Clone, Debug, Default)]
pub struct SessionStatus {
    pub connection_state: ConnectionState,
    pub connect_attempts: usize,
    pub error_messages: VecDeque<String>,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub publish_failures: usize,
    pub last_activity: Option<DateTime<Local>>,
}

impl SessionStatus {
    fn record_error(&mut self, message: String) {
        if self.error_messages.len() == MAX_ERROR_MESSAGES {
            self.error_messages.pop_front();
        }
        self.error_messages.push_back(message);
    }
}

pub struct SessionManager<T: PubSubTransport> {
    transport: T,
    config: MqttConfig,
    session: Option<Session>,
    status: SessionStatus,
    next_session_id: u64,
}

impl<T: PubSubTransport> SessionManager<T> {
    pub fn new(transport: T, config: MqttConfig) -> Self {
        Self {
            transport,
            config,
            session: None,
            status: SessionStatus::default(),
            next_session_id: 1,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.connection_state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Open, subscribe and wait for the acknowledgement. Any existing
    /// session is discarded first.
    pub async fn connect(&mut self) -> Result<&Session, ConnectError> {
        self.invalidate();
        self.status.connection_state = ConnectionState::Connecting;
        self.status.connect_attempts += 1;
        debug!("Starting MQTT connection...");

        if let Err(e) = self.open_and_subscribe().await {
            error!("Error in connect: {}", e);
            self.transport.close();
            self.status.connection_state = ConnectionState::Disconnected;
            self.status.record_error(e.to_string());
            return Err(e);
        }

        let now = Instant::now();
        let id = self.next_session_id;
        self.next_session_id += 1;
        self.status.connection_state = ConnectionState::Connected;
        self.status.last_activity = Some(Local::now());
        info!(
            "Connected and subscribed to {} (session {})",
            self.config.subscribe_topic, id
        );

        Ok(self.session.insert(Session {
            id,
            topic: self.config.subscribe_topic.clone(),
            opened_at: now,
            last_activity: now,
            last_health_check: now,
        }))
    }

    async fn open_and_subscribe(&mut self) -> Result<(), ConnectError> {
        let limit = self.config.connect_timeout();
        let timeout_ms = limit.as_millis() as u64;

        timeout(limit, self.transport.open(&self.config))
            .await
            .map_err(|_| ConnectError::Timeout {
                stage: "connect",
                timeout_ms,
            })??;

        let topic = self.config.subscribe_topic.clone();
        timeout(limit, self.transport.subscribe(&topic))
            .await
            .map_err(|_| ConnectError::Timeout {
                stage: "subscribe",
                timeout_ms,
            })??;
        Ok(())
    }

    /// Replace whatever session exists with a fresh one.
    pub async fn reconnect(&mut self) -> Result<&Session, ConnectError> {
        if let Some(session) = &self.session {
            info!("Replacing session {}", session.id);
        }
        self.connect().await
    }

    /// Publish on the live session. Failures are reported, never retried.
    pub fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        if !self.is_connected() {
            self.status.publish_failures += 1;
            return Err(PublishError::NotConnected);
        }
        match self.transport.publish(topic, payload.as_bytes()) {
            Ok(()) => {
                self.status.messages_sent += 1;
                self.touch();
                Ok(())
            }
            Err(e) => {
                self.status.publish_failures += 1;
                self.status.record_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Fetch one pending inbound message without waiting.
    ///
    /// Any failure, including the call itself taking longer than the
    /// receive timeout, degrades the session.
    pub fn receive_nonblocking(&mut self) -> Result<Option<InboundMessage>, ReceiveError> {
        if !self.is_connected() {
            return Err(ReceiveError::NotConnected);
        }

        let started = Instant::now();
        let result = self.transport.try_receive();
        let elapsed = started.elapsed();
        let limit = self.config.receive_timeout();

        if elapsed > limit {
            let err = ReceiveError::Timeout {
                elapsed_ms: elapsed.as_millis() as u64,
                limit_ms: limit.as_millis() as u64,
            };
            warn!("Warning: Message check timeout");
            self.degrade(&err.to_string());
            return Err(err);
        }

        match result {
            Ok(Some(raw)) => {
                let message = InboundMessage::from_raw(raw);
                self.status.messages_received += 1;
                self.touch();
                Ok(Some(message))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.degrade(&e.to_string());
                Err(e)
            }
        }
    }

    /// Liveness predicate: the session exists and its connection is open.
    /// A dead connection degrades the session even without an error.
    pub fn check_liveness(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.last_health_check = Instant::now();
        if self.transport.is_open() {
            return true;
        }
        self.degrade("connection handle gone");
        false
    }

    /// Close the session for good (shutdown).
    pub fn close(&mut self) {
        self.invalidate();
        info!("MQTT session closed");
    }

    fn degrade(&mut self, reason: &str) {
        let id = self.session.as_ref().map(|s| s.id).unwrap_or_default();
        warn!("Session {} degraded: {}", id, reason);
        self.status.record_error(reason.to_string());
        self.session = None;
        self.transport.close();
        self.status.connection_state = ConnectionState::Degraded;
    }

    fn invalidate(&mut self) {
        if self.session.take().is_some() {
            self.transport.close();
        }
        self.status.connection_state = ConnectionState::Disconnected;
    }

    fn touch(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.last_activity = Instant::now();
        }
        self.status.last_activity = Some(Local::now());
    }
}
