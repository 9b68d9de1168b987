//! In-memory key surface for hosts without keypad hardware.
//!
//! Clones share state, so one handle can be given to the board while
//! another injects presses or inspects LEDs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

use super::{GridSize, KeyId, KeySurface, Rgb, SurfaceError};

#[derive(Debug)]
struct HeadlessState {
    pressed: u32,
    leds: Vec<Rgb>,
    writes: usize,
}

#[derive(Clone, Debug)]
pub struct HeadlessSurface {
    grid: GridSize,
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessSurface {
    pub fn new(grid: GridSize) -> Self {
        Self {
            grid,
            state: Arc::new(Mutex::new(HeadlessState {
                pressed: 0,
                leds: vec![Rgb::OFF; grid.len()],
                writes: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the set of held keys.
    pub fn hold(&self, keys: &[KeyId]) {
        let mask = keys
            .iter()
            .filter_map(|k| self.grid.index(*k))
            .fold(0u32, |mask, i| mask | (1 << i));
        self.state().pressed = mask;
    }

    pub fn release_all(&self) {
        self.state().pressed = 0;
    }

    /// Color last written to `key`'s LED.
    pub fn led(&self, key: KeyId) -> Option<Rgb> {
        let index = self.grid.index(key)?;
        self.state().leds.get(index).copied()
    }

    /// Total number of LED writes so far.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }
}

impl KeySurface for HeadlessSurface {
    fn grid(&self) -> GridSize {
        self.grid
    }

    fn read_pressed(&mut self) -> Result<u32, SurfaceError> {
        Ok(self.state().pressed)
    }

    fn set_led(&mut self, key: KeyId, color: Rgb) -> Result<(), SurfaceError> {
        let index = self.grid.index(key).ok_or(SurfaceError::UnknownKey(key))?;
        let mut state = self.state();
        state.leds[index] = color;
        state.writes += 1;
        trace!("LED {} -> {}", key, color);
        Ok(())
    }
}
