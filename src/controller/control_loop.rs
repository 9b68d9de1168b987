//! Control Loop
//!
//! Cooperative, run-to-completion ticks on one task. Each tick, in order:
//!
//! ```text
//! 1. receive ──► decode ──► (powered?) ──► ColorPolicy ──► LED
//! 2. every check_interval: liveness ──► reconnect
//! 3. every scan_interval:  poll keys ──► debounce ──► publish | toggle
//! ```
//!
//! [`ControlLoop::step`] wraps a tick with the recovery policy and the
//! yield quantum; [`ControlLoop::run`] repeats steps until cancelled.

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cadence::Cadence;
use super::debounce::DebounceTracker;
use super::event_collector::{KeyEventSource, KeyRole};
use super::ControllerError;
use crate::config::{KeypadConfig, TimingConfig};
use crate::keypad::{KeyId, KeypadBoard, Ready, Rgb};
use crate::mapping::ColorPolicy;
use crate::mqtt::{
    InboundMessage, KeyCommand, KeyStatus, PayloadLayout, PubSubTransport, SessionManager,
    PRESS_PAYLOAD,
};

/// Mutable keypad state that is not owned by the board itself.
#[derive(Debug, Clone)]
pub struct KeypadContext {
    /// Active color table for outbound topics
    pub button_set: u8,
    pub debounce: DebounceTracker,
}

pub struct ControlLoop<T: PubSubTransport> {
    session: SessionManager<T>,
    board: KeypadBoard<Ready>,
    policy: ColorPolicy,
    layout: PayloadLayout,
    keys: KeyEventSource,
    health: Cadence,
    context: KeypadContext,
    timing: TimingConfig,
    publish_root: String,
}

impl<T: PubSubTransport> ControlLoop<T> {
    pub fn new(
        session: SessionManager<T>,
        board: KeypadBoard<Ready>,
        policy: ColorPolicy,
        config: &KeypadConfig,
    ) -> Self {
        let timing = config.timing.clone();
        let keys = KeyEventSource::new(
            board.grid(),
            timing.scan_interval(),
            config.keypad.power_key,
            config.keypad.button_set_key,
        );
        Self {
            session,
            board,
            policy,
            layout: config.keypad.layout,
            keys,
            health: Cadence::new(timing.check_interval()),
            context: KeypadContext {
                button_set: 0,
                debounce: DebounceTracker::new(timing.debounce()),
            },
            publish_root: config.mqtt.publish_root.clone(),
            timing,
        }
    }

    pub fn session(&self) -> &SessionManager<T> {
        &self.session
    }

    pub fn board(&self) -> &KeypadBoard<Ready> {
        &self.board
    }

    pub fn context(&self) -> &KeypadContext {
        &self.context
    }

    /// Initial connection. Retries with back-off until the broker accepts.
    pub async fn connect_until_ready(&mut self) {
        loop {
            match self.session.connect().await {
                Ok(session) => {
                    info!("Session {} ready on {}", session.id, session.topic);
                    return;
                }
                Err(e) => {
                    error!(
                        "Initial MQTT connection failed: {}, retrying in {:?}",
                        e,
                        self.timing.reconnect_backoff()
                    );
                    sleep(self.timing.reconnect_backoff()).await;
                }
            }
        }
    }

    /// One pass over inbound, liveness and key scanning.
    ///
    /// `now` is the tick's start. Phases after a reconnect read the clock
    /// again, so press timestamps never predate the scan that produced them.
    pub async fn tick(&mut self, mut now: Instant) -> Result<(), ControllerError> {
        if let Err(e) = self.process_inbound() {
            match e {
                ControllerError::Receive(e) => {
                    warn!("Message check error: {}", e);
                    self.session.reconnect().await?;
                    now = now.max(Instant::now());
                }
                other => return Err(other),
            }
        }

        if self.health.due(now) && !self.session.check_liveness() {
            warn!("Connection lost, reconnecting...");
            self.session.reconnect().await?;
            now = now.max(Instant::now());
        }

        if self.keys.due(now) {
            self.scan_keys(now)?;
        }
        Ok(())
    }

    /// Tick with recovery, then yield for the tick quantum.
    pub async fn step(&mut self) {
        if let Err(e) = self.tick(Instant::now()).await {
            error!("Main loop error: {}", e);
            self.recover().await;
        }
        sleep(self.timing.tick()).await;
    }

    /// Run until `cancel` fires, then close the session and darken the keys.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), ControllerError> {
        info!("Starting main loop...");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.step() => {}
            }
        }
        info!("Main loop stopped");
        self.session.close();
        self.board.paint_all(Rgb::OFF)?;
        Ok(())
    }

    async fn recover(&mut self) {
        info!("Attempting to reconnect...");
        if let Err(e) = self.session.reconnect().await {
            error!("Reconnection failed: {}", e);
            sleep(self.timing.reconnect_backoff()).await;
        }
    }

    fn process_inbound(&mut self) -> Result<(), ControllerError> {
        let Some(message) = self.session.receive_nonblocking()? else {
            return Ok(());
        };
        info!("Received MQTT message - {}", message);

        let command = match self.layout.decode(&message.payload, self.board.grid()) {
            Ok(command) => command,
            Err(e) => {
                error!(
                    "Error processing MQTT message on {} with payload {:?}: {}",
                    message.topic,
                    message.payload_text(),
                    e
                );
                return Ok(());
            }
        };

        if !self.board.is_powered() {
            debug!("Keypad is off, ignoring {} on {}", command.key, message.topic);
            return Ok(());
        }
        self.apply(command, &message)
    }

    fn apply(&mut self, command: KeyCommand, message: &InboundMessage) -> Result<(), ControllerError> {
        let KeyId { x, y } = command.key;
        match command.status {
            KeyStatus::On => {
                let target = match self.policy.resolve(command.button_set, x, y) {
                    Ok(target) => target,
                    Err(e) => {
                        error!(
                            "No color for {} on {} (payload {:?}): {}",
                            command.key,
                            message.topic,
                            message.payload_text(),
                            e
                        );
                        return Ok(());
                    }
                };
                debug!("Updated key {} to {}", command.key, target.label);
                self.board.set_key_color(command.key, target.color)?;
            }
            KeyStatus::Off => {
                debug!("Updated key {} to idle", command.key);
                self.board.restore_idle(command.key)?;
            }
        }
        Ok(())
    }

    fn scan_keys(&mut self, now: Instant) -> Result<(), ControllerError> {
        let snapshot = self.keys.poll(&mut self.board)?;
        let presses = self
            .keys
            .presses(&snapshot, &mut self.context.debounce, now);

        for press in presses {
            match press.role {
                KeyRole::Publish => self.publish_press(press.key),
                KeyRole::PowerToggle => {
                    self.board.toggle_power()?;
                }
                KeyRole::ButtonSetToggle => self.toggle_button_set(),
                KeyRole::Inert => debug!("Key {} has no action", press.key),
            }
        }
        Ok(())
    }

    fn publish_press(&mut self, key: KeyId) {
        let topic = self
            .layout
            .publish_topic(&self.publish_root, self.context.button_set, key);
        info!(
            "Key pressed at {}, publishing to topic: {}, payload: {}",
            key, topic, PRESS_PAYLOAD
        );
        if let Err(e) = self.session.publish(&topic, PRESS_PAYLOAD) {
            error!("Failed to publish message to {}: {}", topic, e);
        }
    }

    fn toggle_button_set(&mut self) {
        let sets = self.layout.button_sets();
        if sets < 2 {
            debug!("Layout {} has a single button set, toggle ignored", self.layout);
            return;
        }
        self.context.button_set = (self.context.button_set + 1) % sets as u8;
        info!("Button set {} active", self.context.button_set);
    }
}
