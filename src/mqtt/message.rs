//! Wire format of the keypad topics.
//!
//! Inbound payloads are fixed-width ASCII digit strings:
//!
//! | Layout   | Payload | Fields                                 |
//! |----------|---------|----------------------------------------|
//! | `single` | `XYS`   | key x, key y, status                   |
//! | `dual`   | `BXYS`  | button set, key x, key y, status       |
//!
//! Status `1` lights the key with its policy color, any other digit
//! returns it to the idle color.
//!
//! Outbound presses go to `{root}/{x}{y}` (single) or
//! `{root}/{set}/{x}{y}` (dual) with the literal payload `1`.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::DecodeError;
use crate::keypad::{GridSize, KeyId};

pub const PRESS_PAYLOAD: &str = "1";

const PREVIEW_LEN: usize = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadLayout {
    #[default]
    Single,
    Dual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyStatus {
    On,
    Off,
}

/// Decoded inbound key state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyCommand {
    pub button_set: u8,
    pub key: KeyId,
    pub status: KeyStatus,
}

impl PayloadLayout {
    /// Payload width in characters.
    pub fn width(&self) -> usize {
        match self {
            Self::Single => 3,
            Self::Dual => 4,
        }
    }

    /// Number of button sets this layout can address.
    pub fn button_sets(&self) -> usize {
        match self {
            Self::Single => 1,
            Self::Dual => 2,
        }
    }

    pub fn decode(&self, payload: &[u8], grid: GridSize) -> Result<KeyCommand, DecodeError> {
        if payload.len() != self.width() {
            return Err(DecodeError::WrongLength {
                expected: self.width(),
                actual: payload.len(),
            });
        }

        let mut digits = [0u8; 4];
        for (position, byte) in payload.iter().enumerate() {
            if !byte.is_ascii_digit() {
                return Err(DecodeError::NonDigit {
                    position,
                    byte: *byte,
                });
            }
            digits[position] = byte - b'0';
        }

        let (button_set, x, y, status) = match self {
            Self::Single => (0, digits[0], digits[1], digits[2]),
            Self::Dual => (digits[0], digits[1], digits[2], digits[3]),
        };

        if button_set as usize >= self.button_sets() {
            return Err(DecodeError::UnknownButtonSet(button_set));
        }
        let key = KeyId::new(x, y);
        if !grid.contains(key) {
            return Err(DecodeError::KeyOutOfRange { x, y });
        }

        Ok(KeyCommand {
            button_set,
            key,
            status: if status == 1 {
                KeyStatus::On
            } else {
                KeyStatus::Off
            },
        })
    }

    pub fn publish_topic(&self, root: &str, button_set: u8, key: KeyId) -> String {
        match self {
            Self::Single => format!("{}/{}{}", root, key.x, key.y),
            Self::Dual => format!("{}/{}/{}{}", root, button_set, key.x, key.y),
        }
    }
}

impl fmt::Display for PayloadLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Dual => write!(f, "dual"),
        }
    }
}

/// Raw message as handed over by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Inbound message stamped with its local arrival time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: DateTime<Local>,
}

impl InboundMessage {
    pub fn from_raw(raw: RawMessage) -> Self {
        InboundMessage {
            topic: raw.topic,
            payload: raw.payload,
            received_at: Local::now(),
        }
    }

    /// Payload for logs; invalid UTF-8 is replaced, not rejected.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = self.payload_text();
        let preview: String = text.chars().take(PREVIEW_LEN).collect();
        write!(
            f,
            "{} - Topic: {}, Payload: {}",
            self.received_at.format("%H:%M:%S%.3f"),
            self.topic,
            preview
        )
    }
}
