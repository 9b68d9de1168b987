//! Session Manager state machine against a scripted broker.

use crate::mock_hw::{test_config, ScriptedTransport};
use mqttkeypad::mqtt::{
    ConnectError, ConnectionState, MqttConfig, PubSubTransport, PublishError, RawMessage,
    ReceiveError, SessionManager,
};
use std::time::Duration;

fn manager(transport: &ScriptedTransport) -> SessionManager<ScriptedTransport> {
    SessionManager::new(transport.clone(), test_config().mqtt)
}

// ── Connect / reconnect ───────────────────────────────────────

#[tokio::test]
async fn connect_subscribes_before_reporting_connected() {
    let transport = ScriptedTransport::new();
    let mut session = manager(&transport);
    assert_eq!(session.state(), ConnectionState::Disconnected);

    let id = session.connect().await.unwrap().id;

    assert_eq!(id, 1);
    assert_eq!(session.state(), ConnectionState::Connected);
    assert_eq!(transport.script().subscriptions, vec!["RGBHA/#".to_string()]);
    assert_eq!(session.session().unwrap().topic, "RGBHA/#");
}

#[tokio::test]
async fn two_failed_connects_then_success_ends_connected() {
    let transport = ScriptedTransport::failing_opens(2);
    let mut session = manager(&transport);

    assert!(matches!(
        session.connect().await,
        Err(ConnectError::Transport(_))
    ));
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.session().is_none());
    assert!(session.reconnect().await.is_err());
    assert!(session.reconnect().await.is_ok());

    assert_eq!(session.state(), ConnectionState::Connected);
    assert_eq!(session.status().connect_attempts, 3);
    assert_eq!(session.status().error_messages.len(), 2);
    assert_eq!(transport.opens(), 3);
}

#[tokio::test]
async fn reconnect_replaces_session_with_new_id() {
    let transport = ScriptedTransport::new();
    let mut session = manager(&transport);
    session.connect().await.unwrap();

    let replacement = session.reconnect().await.unwrap().id;

    assert_eq!(replacement, 2);
    assert_eq!(transport.script().closes, 1);
    assert_eq!(transport.script().subscriptions.len(), 2);
}

struct HangingTransport;

impl PubSubTransport for HangingTransport {
    async fn open(&mut self, _config: &MqttConfig) -> Result<(), ConnectError> {
        std::future::pending().await
    }

    async fn subscribe(&mut self, _filter: &str) -> Result<(), ConnectError> {
        Ok(())
    }

    fn publish(&mut self, _topic: &str, _payload: &[u8]) -> Result<(), PublishError> {
        Ok(())
    }

    fn try_receive(&mut self) -> Result<Option<RawMessage>, ReceiveError> {
        Ok(None)
    }

    fn is_open(&self) -> bool {
        false
    }

    fn close(&mut self) {}
}

#[tokio::test(start_paused = true)]
async fn hung_open_times_out() {
    let mut session = SessionManager::new(HangingTransport, test_config().mqtt);

    let err = session.connect().await.unwrap_err();

    assert!(matches!(
        err,
        ConnectError::Timeout {
            stage: "connect",
            timeout_ms: 1000
        }
    ));
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

// ── Publish ───────────────────────────────────────────────────

#[tokio::test]
async fn publish_without_session_is_rejected() {
    let transport = ScriptedTransport::new();
    let mut session = manager(&transport);

    assert!(matches!(
        session.publish("RGBKEY/00", "1"),
        Err(PublishError::NotConnected)
    ));
    assert_eq!(session.status().publish_failures, 1);
    assert!(transport.published().is_empty());
}

#[tokio::test]
async fn publish_failure_is_counted_and_session_survives() {
    let transport = ScriptedTransport::new();
    let mut session = manager(&transport);
    session.connect().await.unwrap();
    transport.script().fail_publish = true;

    assert!(session.publish("RGBKEY/00", "1").is_err());

    assert_eq!(session.state(), ConnectionState::Connected);
    assert_eq!(session.status().publish_failures, 1);
    assert_eq!(session.status().messages_sent, 0);
}

// ── Receive / liveness ────────────────────────────────────────

#[tokio::test]
async fn receive_returns_pending_message_then_nothing() {
    let transport = ScriptedTransport::new();
    let mut session = manager(&transport);
    session.connect().await.unwrap();
    transport.push_inbound("RGBHA/keys", "101");

    let message = session.receive_nonblocking().unwrap().unwrap();
    assert_eq!(message.topic, "RGBHA/keys");
    assert_eq!(message.payload, b"101");
    assert!(session.receive_nonblocking().unwrap().is_none());
    assert_eq!(session.status().messages_received, 1);
    assert!(session.status().last_activity.is_some());
}

#[tokio::test]
async fn receive_error_degrades_and_drops_session() {
    let transport = ScriptedTransport::new();
    let mut session = manager(&transport);
    session.connect().await.unwrap();
    transport.script().fail_receive = true;

    assert!(matches!(
        session.receive_nonblocking(),
        Err(ReceiveError::Transport(_))
    ));
    assert_eq!(session.state(), ConnectionState::Degraded);
    assert!(session.session().is_none());
    assert!(!transport.script().open);
    assert!(matches!(
        session.receive_nonblocking(),
        Err(ReceiveError::NotConnected)
    ));
}

#[tokio::test]
async fn slow_receive_counts_as_timeout() {
    let transport = ScriptedTransport::new();
    let mut config = test_config().mqtt;
    config.receive_timeout_ms = 5;
    let mut session = SessionManager::new(transport.clone(), config);
    session.connect().await.unwrap();
    transport.script().receive_stall = Some(Duration::from_millis(20));

    let err = session.receive_nonblocking().unwrap_err();

    assert!(matches!(err, ReceiveError::Timeout { limit_ms: 5, .. }));
    assert_eq!(session.state(), ConnectionState::Degraded);
}

#[tokio::test]
async fn dead_connection_fails_liveness() {
    let transport = ScriptedTransport::new();
    let mut session = manager(&transport);
    assert!(!session.check_liveness());

    session.connect().await.unwrap();
    assert!(session.check_liveness());

    transport.drop_connection();
    assert!(!session.check_liveness());
    assert_eq!(session.state(), ConnectionState::Degraded);
}

#[tokio::test]
async fn close_invalidates_session() {
    let transport = ScriptedTransport::new();
    let mut session = manager(&transport);
    session.connect().await.unwrap();

    session.close();

    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.session().is_none());
    assert!(!transport.script().open);
}
