//! Network link seam.
//!
//! Wireless association itself is owned by the platform. The controller
//! only needs to start it once and ask whether it is up.

use std::net::UdpSocket;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Failed to bring up network link: {0}")]
    Association(String),
}

pub trait NetworkLink {
    /// Start association. Returns once the request is issued, not once
    /// the link is up; poll [`NetworkLink::is_connected`] for that.
    fn connect(&mut self) -> Result<(), LinkError>;

    fn is_connected(&self) -> bool;
}

/// Link managed by the host OS.
///
/// Reports the link as up once the kernel has a route to the broker.
/// Connecting a UDP socket only consults the routing table, nothing is
/// sent on the wire.
#[derive(Clone, Debug)]
pub struct HostLink {
    broker_host: String,
    broker_port: u16,
}

impl HostLink {
    pub fn new(broker_host: impl Into<String>, broker_port: u16) -> Self {
        Self {
            broker_host: broker_host.into(),
            broker_port,
        }
    }
}

impl NetworkLink for HostLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        debug!("Host network is managed by the OS, nothing to associate");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        let socket = match UdpSocket::bind(("0.0.0.0", 0)) {
            Ok(socket) => socket,
            Err(e) => {
                debug!("Could not bind probe socket: {}", e);
                return false;
            }
        };
        match socket.connect((self.broker_host.as_str(), self.broker_port)) {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    "No route to {}:{}: {}",
                    self.broker_host, self.broker_port, e
                );
                false
            }
        }
    }
}
