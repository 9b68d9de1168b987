//! Key surface abstraction
//!
//! The controller never touches GPIO, I2C or SPI directly. Everything it
//! needs from the hardware is a synchronous, non-blocking snapshot of
//! which keys are held plus the ability to set one LED.

use super::{GridSize, KeyId, Rgb};

/// Errors raised by a key surface implementation
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// I2C transfer to the key matrix expander failed
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    /// SPI transfer to the LED chain failed
    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),

    /// The key does not exist on this surface
    #[error("Key {0} is outside the key grid")]
    UnknownKey(KeyId),

    /// Any other hardware fault
    #[error("Hardware error: {0}")]
    Hardware(String),
}

/// Physical button/LED grid.
///
/// Implementations must return immediately from both calls. Interrupt or
/// timer driven hardware may update an internal snapshot in the
/// background, but `read_pressed` only ever hands that snapshot out.
pub trait KeySurface: Send {
    /// Grid dimensions of this surface.
    fn grid(&self) -> GridSize;

    /// Currently held keys as a row-major bit mask (bit `y * columns + x`).
    fn read_pressed(&mut self) -> Result<u32, SurfaceError>;

    /// Drive the LED under `key`.
    fn set_led(&mut self, key: KeyId, color: Rgb) -> Result<(), SurfaceError>;
}
