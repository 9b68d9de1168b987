//! # MQTT Session Module
//!
//! Everything between the keypad and the broker: the static session
//! parameters, the payload/topic codec, the transport seam and the
//! session state machine that keeps exactly one subscribed broker
//! connection alive over an unreliable link.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs        - Broker, credential and timeout parameters
//! ├── error.rs         - Connect / publish / receive / decode errors
//! ├── message.rs       - Inbound payload decoding, outbound topics
//! ├── transport.rs     - PubSubTransport trait
//! ├── mqtt_handler.rs  - rumqttc implementation of the transport
//! └── session.rs       - Session Manager state machine
//! ```
//!
//! ## Failure Policy
//!
//! - Connect failures propagate to the control loop, which retries with
//!   back-off.
//! - Receive failures and liveness failures degrade the session; the
//!   control loop replaces it on the same tick.
//! - Publish failures are logged and the key press is dropped. A stale
//!   press replayed later would be wrong, so there is no retry queue.
//! - Decode failures drop the single message; the session is unaffected.

pub mod config;
pub mod error;
pub mod message;
pub mod mqtt_handler;
pub mod session;
pub mod transport;

pub use config::MqttConfig;
pub use error::{ConnectError, DecodeError, PublishError, ReceiveError};
pub use message::{InboundMessage, KeyCommand, KeyStatus, PayloadLayout, RawMessage, PRESS_PAYLOAD};
pub use mqtt_handler::MqttHandler;
pub use session::{ConnectionState, Session, SessionManager, SessionStatus};
pub use transport::PubSubTransport;
