//! Control loop ticks against the headless surface and a scripted broker.

use crate::mock_hw::{ready_board, test_config, ScriptedTransport};
use mqttkeypad::config::KeypadConfig;
use mqttkeypad::controller::ControlLoop;
use mqttkeypad::keypad::{HeadlessSurface, KeyId, PowerState, Rgb};
use mqttkeypad::mapping::ColorPolicy;
use mqttkeypad::mqtt::{ConnectionState, PayloadLayout, SessionManager};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const IDLE: Rgb = Rgb(6, 6, 6);

struct Harness {
    control: ControlLoop<ScriptedTransport>,
    surface: HeadlessSurface,
    transport: ScriptedTransport,
}

async fn harness_with(config: KeypadConfig, transport: ScriptedTransport) -> Harness {
    let (board, surface) = ready_board(&config).await;
    let policy = ColorPolicy::from_config(&config.colors).unwrap();
    let session = SessionManager::new(transport.clone(), config.mqtt.clone());
    let control = ControlLoop::new(session, board, policy, &config);
    Harness {
        control,
        surface,
        transport,
    }
}

async fn connected(config: KeypadConfig) -> Harness {
    let mut harness = harness_with(config, ScriptedTransport::new()).await;
    harness.control.connect_until_ready().await;
    harness
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

// ── Inbound color updates ─────────────────────────────────────

#[tokio::test]
async fn status_on_applies_policy_color_and_off_restores_idle() {
    let mut h = connected(test_config()).await;
    let t0 = Instant::now();

    h.transport.push_inbound("RGBHA/kitchen", "101");
    h.control.tick(t0).await.unwrap();
    assert_eq!(h.surface.led(KeyId::new(1, 0)), Some(Rgb(0, 0, 255)));
    assert_eq!(
        h.control.board().key(KeyId::new(1, 0)).unwrap().color,
        Rgb(0, 0, 255)
    );

    h.transport.push_inbound("RGBHA/kitchen", "100");
    h.control.tick(t0 + ms(10)).await.unwrap();
    assert_eq!(h.surface.led(KeyId::new(1, 0)), Some(IDLE));
}

#[tokio::test]
async fn malformed_payload_is_dropped_without_side_effects() {
    let mut h = connected(test_config()).await;
    let writes = h.surface.write_count();

    for payload in ["ab", "1x1", "991", "1011"] {
        h.transport.push_inbound("RGBHA/kitchen", payload);
        h.control.tick(Instant::now()).await.unwrap();
    }

    assert_eq!(h.surface.write_count(), writes);
    assert!(h.control.board().keys().iter().all(|k| k.color == IDLE));
    assert_eq!(h.control.session().state(), ConnectionState::Connected);
    assert_eq!(h.transport.opens(), 1);
}

#[tokio::test]
async fn power_off_suppresses_inbound_and_power_on_restores_idle() {
    let mut h = connected(test_config()).await;
    let power_key = KeyId::new(0, 3);
    let t0 = Instant::now();

    h.surface.hold(&[power_key]);
    h.control.tick(t0).await.unwrap();
    assert_eq!(h.control.board().power(), PowerState::Off);
    assert_eq!(h.surface.led(KeyId::new(2, 2)), Some(Rgb::OFF));

    h.surface.release_all();
    h.transport.push_inbound("RGBHA/kitchen", "101");
    h.control.tick(t0 + ms(10)).await.unwrap();
    assert_eq!(h.control.board().key(KeyId::new(1, 0)).unwrap().color, Rgb::OFF);
    assert_eq!(h.surface.led(KeyId::new(1, 0)), Some(Rgb::OFF));

    h.surface.hold(&[power_key]);
    h.control.tick(t0 + ms(300)).await.unwrap();
    assert_eq!(h.control.board().power(), PowerState::On);
    assert!(h.control.board().keys().iter().all(|k| k.color == IDLE));
    // power toggles never publish
    assert!(h.transport.published().is_empty());
}

// ── Key presses ───────────────────────────────────────────────

#[tokio::test]
async fn held_key_publishes_once_per_debounce_window() {
    let mut h = connected(test_config()).await;
    let t0 = Instant::now();
    h.surface.hold(&[KeyId::new(2, 1)]);

    h.control.tick(t0).await.unwrap();
    h.control.tick(t0 + ms(100)).await.unwrap();
    h.control.tick(t0 + ms(200)).await.unwrap();

    assert_eq!(
        h.transport.published(),
        vec![
            ("RGBKEY/21".to_string(), "1".to_string()),
            ("RGBKEY/21".to_string(), "1".to_string()),
        ]
    );
}

#[tokio::test]
async fn keys_are_scanned_on_their_own_cadence() {
    let mut h = connected(test_config()).await;
    let t0 = Instant::now();
    h.control.tick(t0).await.unwrap();

    // held after the first scan; next scan is not due before t0 + 100ms
    h.surface.hold(&[KeyId::new(0, 0)]);
    h.control.tick(t0 + ms(50)).await.unwrap();
    assert!(h.transport.published().is_empty());

    h.control.tick(t0 + ms(100)).await.unwrap();
    assert_eq!(h.transport.published().len(), 1);
}

#[tokio::test]
async fn bottom_row_keys_never_publish() {
    let mut h = connected(test_config()).await;
    h.surface.hold(&[KeyId::new(1, 3), KeyId::new(2, 3)]);

    h.control.tick(Instant::now()).await.unwrap();

    assert!(h.transport.published().is_empty());
    assert_eq!(h.control.board().power(), PowerState::On);
}

#[tokio::test]
async fn failed_publish_is_dropped_not_retried() {
    let mut h = connected(test_config()).await;
    let t0 = Instant::now();
    h.transport.script().fail_publish = true;
    h.surface.hold(&[KeyId::new(0, 0)]);

    h.control.tick(t0).await.unwrap();
    h.transport.script().fail_publish = false;
    h.surface.release_all();
    h.control.tick(t0 + ms(300)).await.unwrap();

    assert!(h.transport.published().is_empty());
    assert_eq!(h.control.session().status().publish_failures, 1);
    assert_eq!(h.control.session().state(), ConnectionState::Connected);
}

#[tokio::test]
async fn single_layout_ignores_button_set_toggle() {
    let mut h = connected(test_config()).await;
    h.surface.hold(&[KeyId::new(3, 3)]);

    h.control.tick(Instant::now()).await.unwrap();

    assert_eq!(h.control.context().button_set, 0);
}

#[tokio::test]
async fn dual_layout_press_and_inbound_agree_on_button_set() {
    let mut config = test_config();
    config.keypad.layout = PayloadLayout::Dual;
    let mut h = connected(config).await;
    let t0 = Instant::now();

    h.surface.hold(&[KeyId::new(3, 3)]);
    h.control.tick(t0).await.unwrap();
    assert_eq!(h.control.context().button_set, 1);

    h.surface.hold(&[KeyId::new(2, 1)]);
    h.control.tick(t0 + ms(100)).await.unwrap();
    assert_eq!(
        h.transport.published(),
        vec![("RGBKEY/1/21".to_string(), "1".to_string())]
    );

    h.transport.push_inbound("RGBHA/kitchen", "1211");
    h.control.tick(t0 + ms(110)).await.unwrap();
    let expected = ColorPolicy::reference().resolve(1, 2, 1).unwrap().color;
    assert_eq!(h.surface.led(KeyId::new(2, 1)), Some(expected));
}

// ── Recovery ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn initial_connect_retries_until_broker_accepts() {
    let mut h = harness_with(test_config(), ScriptedTransport::failing_opens(2)).await;
    let started = Instant::now();

    h.control.connect_until_ready().await;

    assert_eq!(h.control.session().state(), ConnectionState::Connected);
    assert_eq!(h.control.session().status().connect_attempts, 3);
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test]
async fn receive_error_reconnects_within_the_tick() {
    let mut h = connected(test_config()).await;
    h.transport.script().fail_receive = true;

    h.control.tick(Instant::now()).await.unwrap();

    assert_eq!(h.transport.opens(), 2);
    assert_eq!(h.control.session().state(), ConnectionState::Connected);
    assert_eq!(h.control.session().session().unwrap().id, 2);
}

#[tokio::test]
async fn lost_connection_is_replaced_on_health_check() {
    let mut h = connected(test_config()).await;
    h.transport.drop_connection();

    h.control.tick(Instant::now()).await.unwrap();

    assert_eq!(h.transport.opens(), 2);
    assert_eq!(h.control.session().state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn failed_reconnect_backs_off_and_loop_keeps_going() {
    let mut h = connected(test_config()).await;
    h.transport.script().open_failures = 2;
    h.transport.drop_connection();

    let started = Instant::now();
    h.control.step().await;
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(h.control.session().state(), ConnectionState::Disconnected);
    assert_eq!(h.transport.opens(), 3);

    h.control.step().await;
    assert_eq!(h.control.session().state(), ConnectionState::Connected);
    assert_eq!(h.transport.opens(), 4);
}

#[tokio::test(start_paused = true)]
async fn slow_reconnect_does_not_shorten_debounce_window() {
    let mut h = connected(test_config()).await;
    h.transport.script().open_delay = Some(ms(500));
    h.transport.script().fail_receive = true;
    h.surface.hold(&[KeyId::new(2, 1)]);
    let started = Instant::now();

    // first step reconnects for 500ms, then scans and publishes
    h.control.step().await;
    assert_eq!(h.transport.opens(), 2);
    assert_eq!(h.transport.published().len(), 1);

    while started.elapsed() < ms(650) {
        h.control.step().await;
    }
    assert_eq!(h.transport.published().len(), 1);

    while started.elapsed() < ms(750) {
        h.control.step().await;
    }
    assert_eq!(h.transport.published().len(), 2);
}

// ── Shutdown ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn run_stops_on_cancel_and_darkens_keys() {
    let mut h = connected(test_config()).await;
    h.surface.hold(&[KeyId::new(1, 1)]);
    let cancel = CancellationToken::new();

    let (result, ()) = tokio::join!(h.control.run(cancel.clone()), async {
        tokio::time::sleep(Duration::from_millis(250)).await;
        cancel.cancel();
    });

    result.unwrap();
    assert!(!h.transport.published().is_empty());
    assert_eq!(h.control.session().state(), ConnectionState::Disconnected);
    assert_eq!(h.surface.led(KeyId::new(1, 1)), Some(Rgb::OFF));
}
