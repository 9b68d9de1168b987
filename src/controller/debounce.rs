use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::keypad::KeyId;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Last accepted press per key.
///
/// Entries live for the whole process; the grid is small and fixed so
/// nothing is ever evicted. Timestamps are monotonic `Instant`s, so there
/// is no wraparound to handle.
#[derive(Debug, Clone)]
pub struct DebounceTracker {
    window: Duration,
    last_accepted: HashMap<KeyId, Instant>,
}

impl DebounceTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: HashMap::new(),
        }
    }

    /// Accept a press of `key` at `now` unless the previous accepted press
    /// is less than one window ago.
    pub fn accept(&mut self, key: KeyId, now: Instant) -> bool {
        match self.last_accepted.get(&key) {
            Some(last) if now.saturating_duration_since(*last) < self.window => {
                debug!("Debounced press of {}", key);
                false
            }
            _ => {
                self.last_accepted.insert(key, now);
                true
            }
        }
    }
}

impl Default for DebounceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
