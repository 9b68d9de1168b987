use statum::{machine, state};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{GridSize, Key, KeyId, KeySurface, Rgb, SurfaceError};
use crate::network::NetworkLink;

/// Keypad power flag, toggled by the power control key.
///
/// While `Off` every LED is dark and inbound color updates are ignored.
/// Publishing and connection upkeep are unaffected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PowerState {
    #[default]
    On,
    Off,
}

impl PowerState {
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }
}

// Board lifecycle: LEDs stay untouched until the network link is up
#[state]
#[derive(Debug, Clone)]
pub enum BoardState {
    Unlit,
    Ready,
}

#[machine]
pub struct KeypadBoard<S: BoardState> {
    surface: Box<dyn KeySurface>,

    // One entry per physical key, row-major
    keys: Vec<Key>,

    idle_color: Rgb,

    power: PowerState,
}

impl<S: BoardState> KeypadBoard<S> {
    pub fn grid(&self) -> GridSize {
        self.surface.grid()
    }

    pub fn idle_color(&self) -> Rgb {
        self.idle_color
    }
}

impl KeypadBoard<Unlit> {
    pub fn create(surface: Box<dyn KeySurface>, idle_color: Rgb) -> Self {
        let grid = surface.grid();
        debug!("Creating keypad board for {}x{} grid", grid.columns, grid.rows);
        let keys = grid
            .keys()
            .map(|id| Key {
                id,
                color: Rgb::OFF,
            })
            .collect();
        Self::new(surface, keys, idle_color, PowerState::On)
    }

    /// Bring up the network link, then paint every key with the idle
    /// color as the visible "connected" signal.
    pub async fn wait_for_link(
        self,
        link: &mut dyn NetworkLink,
        poll: Duration,
    ) -> Result<KeypadBoard<Ready>, SurfaceError> {
        let mut associated = false;
        loop {
            if !associated {
                match link.connect() {
                    Ok(()) => associated = true,
                    Err(e) => warn!("Network link connect failed: {}", e),
                }
            }
            if associated && link.is_connected() {
                break;
            }
            info!("Waiting for connection...");
            tokio::time::sleep(poll).await;
        }
        info!("Connected to network");

        let mut ready: KeypadBoard<Ready> = self.transition();
        ready.paint_all(ready.idle_color)?;
        Ok(ready)
    }
}

impl KeypadBoard<Ready> {
    pub fn key(&self, id: KeyId) -> Option<&Key> {
        let index = self.grid().index(id)?;
        self.keys.get(index)
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn power(&self) -> PowerState {
        self.power
    }

    pub fn is_powered(&self) -> bool {
        self.power == PowerState::On
    }

    /// Snapshot of held keys, straight from the surface.
    pub fn scan(&mut self) -> Result<u32, SurfaceError> {
        self.surface.read_pressed()
    }

    /// Drive one LED and remember the color as displayed.
    pub fn set_key_color(&mut self, id: KeyId, color: Rgb) -> Result<(), SurfaceError> {
        let index = self.grid().index(id).ok_or(SurfaceError::UnknownKey(id))?;
        self.surface.set_led(id, color)?;
        self.keys[index].color = color;
        Ok(())
    }

    pub fn restore_idle(&mut self, id: KeyId) -> Result<(), SurfaceError> {
        self.set_key_color(id, self.idle_color)
    }

    pub fn paint_all(&mut self, color: Rgb) -> Result<(), SurfaceError> {
        for id in self.grid().keys() {
            self.set_key_color(id, color)?;
        }
        Ok(())
    }

    pub fn power_off(&mut self) -> Result<(), SurfaceError> {
        info!("Keypad power OFF");
        self.power = PowerState::Off;
        self.paint_all(Rgb::OFF)
    }

    pub fn power_on(&mut self) -> Result<(), SurfaceError> {
        info!("Keypad power ON");
        self.power = PowerState::On;
        self.paint_all(self.idle_color)
    }

    pub fn toggle_power(&mut self) -> Result<PowerState, SurfaceError> {
        match self.power.toggled() {
            PowerState::Off => self.power_off()?,
            PowerState::On => self.power_on()?,
        }
        Ok(self.power)
    }
}
