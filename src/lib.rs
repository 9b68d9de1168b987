//! MQTT keypad controller.
//!
//! Maps physical key presses to MQTT publishes and inbound MQTT messages
//! to per-key LED colors, keeping one broker session alive over an
//! unreliable link.

pub mod config;
pub mod controller;
pub mod keypad;
pub mod mapping;
pub mod mqtt;
pub mod network;
