//! Raspberry Pi driver for a 4x4 RGB keypad.
//!
//! ## Hardware
//!
//! Keys are read through a TCA9555 16-bit I/O expander on I2C. Both
//! input ports are read in one transfer (register auto-increment); a held
//! key pulls its line low. Key `i` (row-major) sits on expander bit `i`.
//!
//! LEDs are an APA102 chain on SPI0 in the same row-major order. The chain
//! has no addressing, so the driver keeps a frame buffer and rewrites the
//! whole chain on every update:
//!
//! | Part        | Bytes                                        |
//! |-------------|----------------------------------------------|
//! | Start frame | `00 00 00 00`                                |
//! | Per LED     | `111bbbbb`, blue, green, red                 |
//! | End frame   | `ff` x max(4, n / 16 + 1)                    |

use rppal::i2c::I2c;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::{debug, info};

use super::{GridSize, KeyId, KeySurface, Rgb, SurfaceError};

const INPUT_PORT_0: u8 = 0x00;
const KEYPAD_GRID: GridSize = GridSize::new(4, 4);

/// Bus parameters for [`RgbKeypad::open`].
#[derive(Clone, Debug)]
pub struct RgbKeypadSettings {
    pub i2c_bus: u8,
    pub i2c_address: u16,
    pub spi_clock_hz: u32,
    /// Global LED brightness, 0.0-1.0
    pub brightness: f32,
}

impl Default for RgbKeypadSettings {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            i2c_address: 0x20,
            spi_clock_hz: 4_000_000,
            brightness: 0.5,
        }
    }
}

pub struct RgbKeypad {
    i2c: I2c,
    spi: Spi,
    brightness: u8,
    frame: Vec<Rgb>,
}

impl RgbKeypad {
    pub fn open(settings: &RgbKeypadSettings) -> Result<Self, SurfaceError> {
        info!(
            "Opening RGB keypad: i2c bus {} addr {:#04x}, spi {} Hz",
            settings.i2c_bus, settings.i2c_address, settings.spi_clock_hz
        );

        let mut i2c = I2c::with_bus(settings.i2c_bus)?;
        i2c.set_slave_address(settings.i2c_address)?;
        let spi = Spi::new(
            Bus::Spi0,
            SlaveSelect::Ss0,
            settings.spi_clock_hz,
            Mode::Mode0,
        )?;

        let brightness = brightness_bits(settings.brightness);
        debug!("APA102 global brightness: {}/31", brightness);

        Ok(Self {
            i2c,
            spi,
            brightness,
            frame: vec![Rgb::OFF; KEYPAD_GRID.len()],
        })
    }

    fn write_frame(&mut self) -> Result<(), SurfaceError> {
        let buffer = encode_apa102(&self.frame, self.brightness);
        self.spi.write(&buffer)?;
        Ok(())
    }
}

impl KeySurface for RgbKeypad {
    fn grid(&self) -> GridSize {
        KEYPAD_GRID
    }

    fn read_pressed(&mut self) -> Result<u32, SurfaceError> {
        let mut ports = [0u8; 2];
        self.i2c.write_read(&[INPUT_PORT_0], &mut ports)?;
        Ok(decode_ports(ports))
    }

    fn set_led(&mut self, key: KeyId, color: Rgb) -> Result<(), SurfaceError> {
        let index = KEYPAD_GRID
            .index(key)
            .ok_or(SurfaceError::UnknownKey(key))?;
        self.frame[index] = color;
        self.write_frame()
    }
}

// Active-low input ports to a pressed mask
fn decode_ports(ports: [u8; 2]) -> u32 {
    let raw = u16::from_le_bytes(ports);
    u32::from(!raw)
}

fn brightness_bits(brightness: f32) -> u8 {
    (brightness.clamp(0.0, 1.0) * 31.0).round() as u8
}

fn encode_apa102(frame: &[Rgb], brightness: u8) -> Vec<u8> {
    let end_len = (frame.len() / 16 + 1).max(4);
    let mut buffer = Vec::with_capacity(4 + frame.len() * 4 + end_len);
    buffer.extend_from_slice(&[0x00; 4]);
    for Rgb(r, g, b) in frame {
        buffer.extend_from_slice(&[0b1110_0000 | (brightness & 0x1f), *b, *g, *r]);
    }
    buffer.extend(std::iter::repeat(0xff).take(end_len));
    buffer
}
