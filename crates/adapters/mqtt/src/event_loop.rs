//! Connection driver: polls the broker and feeds a [`BusHandler`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::v5::mqttbytes::QoS as MqttQoS;
use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet, PublishProperties};
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};

use smarthub_app::ports::{BusHandler, InboundMessage};

use crate::config::MqttConfig;
use crate::error::MqttError;
use crate::transport::{MqttTransport, SENDER_GROUP_PROPERTY, SENDER_ID_PROPERTY};

/// Create the client for `sender_id` without touching the network.
///
/// The connection is only attempted once the returned [`MqttEventLoop`] runs.
#[must_use]
pub fn connect(config: &MqttConfig, sender_id: &str) -> (MqttTransport, MqttEventLoop) {
    let mut options = MqttOptions::new(sender_id, &config.broker_host, config.broker_port);
    options.set_keep_alive(config.keep_alive());
    options.set_clean_start(true);

    let (client, eventloop) = AsyncClient::new(options, config.channel_capacity.max(1));
    let connected = Arc::new(AtomicBool::new(false));

    let transport = MqttTransport::new(client.clone(), Arc::clone(&connected));
    let event_loop = MqttEventLoop {
        client,
        eventloop,
        connected,
        reconnect_delay: config.reconnect_delay(),
    };
    (transport, event_loop)
}

/// Receiving half of the MQTT connection.
pub struct MqttEventLoop {
    client: AsyncClient,
    eventloop: EventLoop,
    connected: Arc<AtomicBool>,
    reconnect_delay: Duration,
}

impl MqttEventLoop {
    /// Poll the broker forever, reconnecting after failures.
    ///
    /// Every successful `ConnAck` re-subscribes to the handler's topic filter
    /// and spawns [`BusHandler::on_connected`]. Received publishes are handed
    /// over one at a time.
    pub async fn run<H>(mut self, handler: Arc<H>)
    where
        H: BusHandler + 'static,
    {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if matches!(ack.code, ConnectReturnCode::Success) {
                        self.on_connected(&handler);
                    } else {
                        tracing::error!(code = ?ack.code, "broker refused the connection");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = inbound_message(
                        &publish.topic,
                        &publish.payload,
                        publish.properties.as_ref(),
                    );
                    match message {
                        Some(message) => handler.on_message(message).await,
                        None => tracing::warn!("dropping publish with a non UTF-8 topic"),
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect(_))) => {
                    self.connected.store(false, Ordering::Release);
                    tracing::warn!("broker closed the connection");
                }
                Ok(_) => {}
                Err(err) => {
                    self.connected.store(false, Ordering::Release);
                    let err = MqttError::Connection(err);
                    tracing::warn!(
                        error = ?err,
                        delay_secs = self.reconnect_delay.as_secs(),
                        "mqtt connection lost, reconnecting"
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    fn on_connected<H>(&self, handler: &Arc<H>)
    where
        H: BusHandler + 'static,
    {
        self.connected.store(true, Ordering::Release);
        let filter = handler.subscription();
        // The request channel is drained by this loop, so never await on it here.
        match self.client.try_subscribe(filter.as_str(), MqttQoS::ExactlyOnce) {
            Ok(()) => tracing::info!(%filter, "connected to broker, subscribed"),
            Err(err) => {
                let err = MqttError::Client(err);
                tracing::error!(%filter, error = %err, "failed to subscribe");
            }
        }
        let handler = Arc::clone(handler);
        tokio::spawn(async move {
            handler.on_connected().await;
        });
    }
}

fn user_property(properties: Option<&PublishProperties>, key: &str) -> Option<String> {
    properties?
        .user_properties
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.clone())
}

/// Convert a received publish. `None` when the topic is not UTF-8.
fn inbound_message(
    topic: &[u8],
    payload: &[u8],
    properties: Option<&PublishProperties>,
) -> Option<InboundMessage> {
    let topic = std::str::from_utf8(topic).ok()?;
    Some(InboundMessage {
        topic: topic.to_string(),
        payload: payload.to_vec(),
        sender_id: user_property(properties, SENDER_ID_PROPERTY),
        sender_group: user_property(properties, SENDER_GROUP_PROPERTY),
    })
}
