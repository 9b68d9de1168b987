//! Keypad hardware subsystem
//!
//! Models the physical key grid and its per-key LEDs:
//!
//! 1. [`surface`] - The [`KeySurface`] seam between the controller and real hardware
//! 2. [`board`] - Keypad board state (displayed colors, power flag) as a typestate
//! 3. [`rgb_keypad`] - Raspberry Pi driver for I2C key matrix + APA102 LED chain
//! 4. [`headless`] - In-memory surface for hosts without the keypad attached
//!
//! # Architecture
//!
//! ```text
//! KeySurface ──► KeypadBoard<Unlit> ──(link up)──► KeypadBoard<Ready>
//!  (raw bits,        (LEDs untouched)               (idle painted,
//!   LED writes)                                      colors tracked)
//! ```

pub mod board;
pub mod headless;
pub mod rgb_keypad;
pub mod surface;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use board::{KeypadBoard, PowerState, Ready, Unlit};
pub use headless::HeadlessSurface;
pub use rgb_keypad::RgbKeypad;
pub use surface::{KeySurface, SurfaceError};

/// 3-channel LED intensity triple.
///
/// Serialized as a plain `[r, g, b]` array so config files stay readable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const OFF: Rgb = Rgb(0, 0, 0);

    pub fn is_off(&self) -> bool {
        *self == Self::OFF
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0, self.1, self.2)
    }
}

/// Zero-based key coordinates; `x` is the column, `y` the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId {
    pub x: u8,
    pub y: u8,
}

impl KeyId {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Physical key with its currently displayed color.
#[derive(Clone, Debug, PartialEq)]
pub struct Key {
    pub id: KeyId,
    pub color: Rgb,
}

/// Dimensions of the key grid.
///
/// Keys are indexed row-major (`y * columns + x`), which is also the bit
/// order of the pressed mask returned by [`KeySurface::read_pressed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub columns: u8,
    pub rows: u8,
}

impl GridSize {
    /// Largest grid a 32-bit pressed mask can describe.
    pub const MAX_KEYS: usize = 32;

    pub const fn new(columns: u8, rows: u8) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: KeyId) -> bool {
        key.x < self.columns && key.y < self.rows
    }

    /// Row-major index of `key`, or `None` when it lies outside the grid.
    pub fn index(&self, key: KeyId) -> Option<usize> {
        self.contains(key)
            .then(|| key.y as usize * self.columns as usize + key.x as usize)
    }

    /// Every key position in row-major order.
    pub fn keys(&self) -> impl Iterator<Item = KeyId> {
        let columns = self.columns;
        (0..self.rows).flat_map(move |y| (0..columns).map(move |x| KeyId::new(x, y)))
    }

    /// Row reserved for local control actions.
    pub fn bottom_row(&self) -> u8 {
        self.rows.saturating_sub(1)
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(4, 4)
    }
}
