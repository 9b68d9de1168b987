use super::config::MqttConfig;
use super::error::{ConnectError, PublishError, ReceiveError};
use super::message::RawMessage;

/// Pub/sub broker connection primitives.
///
/// The [`SessionManager`](super::session::SessionManager) sequences these
/// into a full session; implementations only move bytes. Everything except
/// `open` and `subscribe` must return without waiting on the network.
#[allow(async_fn_in_trait)]
pub trait PubSubTransport {
    /// Open the broker connection with credentials and client id, and
    /// start routing inbound publishes into the receive queue. Returns
    /// once the broker has accepted the connection.
    async fn open(&mut self, config: &MqttConfig) -> Result<(), ConnectError>;

    /// Subscribe to `filter`. Returns once the broker acknowledged it.
    async fn subscribe(&mut self, filter: &str) -> Result<(), ConnectError>;

    /// Queue one publish. Never waits for delivery.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;

    /// Next queued inbound message, `None` if nothing is pending.
    fn try_receive(&mut self) -> Result<Option<RawMessage>, ReceiveError>;

    /// Liveness: the underlying connection still exists.
    fn is_open(&self) -> bool;

    /// Drop the connection. Safe to call on a closed transport.
    fn close(&mut self);
}
