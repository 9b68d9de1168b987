//! Controller subsystem for the keypad control loop
//!
//! 1. [`debounce`] - Per-key press suppression window
//! 2. [`cadence`] - Fixed-period scheduling inside the cooperative loop
//! 3. [`event_collector`] - Key scanning and press classification
//! 4. [`control_loop`] - Tick orchestration and recovery policy
//!
//! # Architecture
//!
//! ```text
//! KeySurface ──► KeyEventSource ──► DebounceTracker ──► publish / toggle
//!                                                          │
//! Broker ◄──────────────── SessionManager ◄────────────────┘
//!    │
//!    └──► inbound ──► decode ──► ColorPolicy ──► KeypadBoard LEDs
//! ```
//!
//! Everything runs on the control loop's task; nothing here is shared.

pub mod cadence;
pub mod control_loop;
pub mod debounce;
pub mod event_collector;

use thiserror::Error;

use crate::keypad::SurfaceError;
use crate::mqtt::{ConnectError, ReceiveError};

pub use cadence::Cadence;
pub use control_loop::{ControlLoop, KeypadContext};
pub use debounce::{DebounceTracker, DEFAULT_DEBOUNCE};
pub use event_collector::{KeyEventSource, KeyPress, KeyRole, KeyState};

/// Failures that end a tick early. All are recoverable.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Reconnect failed: {0}")]
    Connect(#[from] ConnectError),

    #[error("Receive failed: {0}")]
    Receive(#[from] ReceiveError),

    #[error("Keypad hardware error: {0}")]
    Surface(#[from] SurfaceError),
}
