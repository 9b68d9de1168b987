//! rumqttc-backed transport
//!
//! `open` and `subscribe` drive the rumqttc event loop inline until the
//! CONNACK and SUBACK arrive. After that the event loop moves into a
//! driver task that keeps the connection serviced (pings, acks) and
//! forwards every inbound publish into a single-consumer channel. The
//! control loop is the only reader of that channel.
//!
//! rumqttc would transparently reconnect if polled after an error. The
//! driver stops at the first error instead: the session manager discards
//! the whole session and opens a fresh one.

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS,
    SubscribeReasonCode,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::MqttConfig;
use super::error::{ConnectError, PublishError, ReceiveError};
use super::message::RawMessage;
use super::transport::PubSubTransport;

// rumqttc request queue depth
const REQUEST_CAPACITY: usize = 16;

type Inbound = Result<RawMessage, String>;

pub struct MqttHandler {
    inbound_capacity: usize,
    qos: QoS,
    client: Option<AsyncClient>,
    // Only held between open() and subscribe(); afterwards owned by the driver
    event_loop: Option<EventLoop>,
    inbound: Option<mpsc::Receiver<Inbound>>,
    inbound_tx: Option<mpsc::Sender<Inbound>>,
    driver: Option<JoinHandle<()>>,
}

impl MqttHandler {
    pub fn new(inbound_capacity: usize) -> Self {
        Self {
            inbound_capacity,
            qos: QoS::AtMostOnce,
            client: None,
            event_loop: None,
            inbound: None,
            inbound_tx: None,
            driver: None,
        }
    }
}

impl Default for MqttHandler {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PubSubTransport for MqttHandler {
    async fn open(&mut self, config: &MqttConfig) -> Result<(), ConnectError> {
        self.close();

        let mut mqtt_options = MqttOptions::new(&config.client_id, &config.host, config.port);
        mqtt_options
            .set_keep_alive(config.keep_alive())
            .set_clean_session(true);
        if !config.username.is_empty() {
            mqtt_options.set_credentials(&config.username, &config.password);
        }
        self.qos = config.qos();

        debug!(
            "Opening MQTT connection to {}:{} as {}",
            config.host, config.port, config.client_id
        );
        let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        break;
                    }
                    return Err(ConnectError::Refused(format!("{:?}", ack.code)));
                }
                Ok(event) => debug!("Event before CONNACK: {:?}", event),
                Err(e) => return Err(ConnectError::Transport(e.to_string())),
            }
        }
        info!("MQTT connection accepted by {}:{}", config.host, config.port);

        let (tx, rx) = mpsc::channel(self.inbound_capacity);
        self.client = Some(client);
        self.event_loop = Some(event_loop);
        self.inbound = Some(rx);
        self.inbound_tx = Some(tx);
        Ok(())
    }

    async fn subscribe(&mut self, filter: &str) -> Result<(), ConnectError> {
        let (Some(client), Some(mut event_loop), Some(tx)) = (
            self.client.clone(),
            self.event_loop.take(),
            self.inbound_tx.take(),
        ) else {
            return Err(ConnectError::Transport(
                "subscribe called without an open connection".to_string(),
            ));
        };

        client
            .subscribe(filter, self.qos)
            .await
            .map_err(|e| ConnectError::Transport(e.to_string()))?;

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(ConnectError::SubscribeRejected(filter.to_string()));
                    }
                    break;
                }
                // Retained messages may overtake the SUBACK
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let raw = RawMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    if tx.try_send(Ok(raw)).is_err() {
                        warn!("Inbound queue full, dropping message on {}", publish.topic);
                    }
                }
                Ok(event) => debug!("Event before SUBACK: {:?}", event),
                Err(e) => return Err(ConnectError::Transport(e.to_string())),
            }
        }
        debug!("Subscription to {} acknowledged", filter);

        self.driver = Some(tokio::spawn(drive_event_loop(event_loop, tx)));
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let client = self.client.as_ref().ok_or(PublishError::NotConnected)?;
        client
            .try_publish(topic, self.qos, false, payload.to_vec())
            .map_err(|e| PublishError::Transport {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn try_receive(&mut self) -> Result<Option<RawMessage>, ReceiveError> {
        let inbound = self.inbound.as_mut().ok_or(ReceiveError::NotConnected)?;
        match inbound.try_recv() {
            Ok(Ok(raw)) => Ok(Some(raw)),
            Ok(Err(reason)) => Err(ReceiveError::Transport(reason)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(ReceiveError::Closed),
        }
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
            && self
                .driver
                .as_ref()
                .is_some_and(|driver| !driver.is_finished())
    }

    fn close(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        if let Some(client) = self.client.take() {
            if let Err(e) = client.try_disconnect() {
                debug!("Disconnect request not queued: {}", e);
            }
        }
        self.event_loop = None;
        self.inbound = None;
        self.inbound_tx = None;
    }
}

impl Drop for MqttHandler {
    fn drop(&mut self) {
        self.close();
    }
}

async fn drive_event_loop(mut event_loop: EventLoop, tx: mpsc::Sender<Inbound>) {
    debug!("MQTT driver task started");
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let raw = RawMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                };
                if tx.send(Ok(raw)).await.is_err() {
                    debug!("Inbound receiver dropped, stopping driver");
                    return;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker sent DISCONNECT");
                let _ = tx.send(Err("broker disconnected".to_string())).await;
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {}", e);
                let _ = tx.send(Err(e.to_string())).await;
                return;
            }
        }
    }
}
