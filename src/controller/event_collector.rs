use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::cadence::Cadence;
use super::debounce::DebounceTracker;
use crate::keypad::{GridSize, KeyId, KeypadBoard, Ready, SurfaceError};

/// What an accepted press of a key does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyRole {
    /// Publish `1` on the key's topic
    Publish,
    PowerToggle,
    ButtonSetToggle,
    /// Bottom-row key without a control action
    Inert,
}

/// One key in a scan snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyState {
    pub key: KeyId,
    pub pressed: bool,
}

/// Debounced press ready for dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPress {
    pub key: KeyId,
    pub role: KeyRole,
}

/// Key Event Source
///
/// Scans the board on its own cadence, independent of the loop's
/// message-processing period. The hardware snapshot is only read here, on
/// the control loop's thread.
#[derive(Debug, Clone)]
pub struct KeyEventSource {
    grid: GridSize,
    cadence: Cadence,
    power_key: KeyId,
    button_set_key: KeyId,
}

impl KeyEventSource {
    pub fn new(
        grid: GridSize,
        scan_interval: Duration,
        power_key: KeyId,
        button_set_key: KeyId,
    ) -> Self {
        debug!(
            "Key scanning every {:?}, power key {}, button set key {}",
            scan_interval, power_key, button_set_key
        );
        Self {
            grid,
            cadence: Cadence::new(scan_interval),
            power_key,
            button_set_key,
        }
    }

    pub fn due(&mut self, now: Instant) -> bool {
        self.cadence.due(now)
    }

    pub fn role(&self, key: KeyId) -> KeyRole {
        if key == self.power_key {
            KeyRole::PowerToggle
        } else if key == self.button_set_key {
            KeyRole::ButtonSetToggle
        } else if key.y < self.grid.bottom_row() {
            KeyRole::Publish
        } else {
            KeyRole::Inert
        }
    }

    /// Full snapshot of every key, read synchronously from the board.
    pub fn poll(&self, board: &mut KeypadBoard<Ready>) -> Result<Vec<KeyState>, SurfaceError> {
        let mask = board.scan()?;
        trace!("Key mask {:#010b}", mask);
        Ok(self
            .grid
            .keys()
            .enumerate()
            .map(|(index, key)| KeyState {
                key,
                pressed: mask & (1 << index) != 0,
            })
            .collect())
    }

    /// Held keys that pass the debounce window, with their roles.
    pub fn presses(
        &self,
        snapshot: &[KeyState],
        debounce: &mut DebounceTracker,
        now: Instant,
    ) -> Vec<KeyPress> {
        snapshot
            .iter()
            .filter(|state| state.pressed)
            .filter(|state| debounce.accept(state.key, now))
            .map(|state| KeyPress {
                key: state.key,
                role: self.role(state.key),
            })
            .collect()
    }
}
