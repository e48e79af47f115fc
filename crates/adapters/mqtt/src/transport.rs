//! [`BusTransport`] over a rumqttc v5 client.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rumqttc::v5::AsyncClient;
use rumqttc::v5::mqttbytes::QoS as MqttQoS;
use rumqttc::v5::mqttbytes::v5::PublishProperties;

use smarthub_app::ports::{BusTransport, OutboundMessage, QoS, SendError};

use crate::error::MqttError;

pub(crate) const SENDER_ID_PROPERTY: &str = "sender_id";
pub(crate) const SENDER_GROUP_PROPERTY: &str = "sender_group";

/// Publishing half of the MQTT connection.
///
/// Cheap to share; the connection flag is owned by the matching
/// [`MqttEventLoop`](crate::MqttEventLoop).
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttTransport {
    pub(crate) fn new(client: AsyncClient, connected: Arc<AtomicBool>) -> Self {
        Self { client, connected }
    }
}

pub(crate) fn to_mqtt_qos(qos: QoS) -> MqttQoS {
    match qos {
        QoS::AtMostOnce => MqttQoS::AtMostOnce,
        QoS::AtLeastOnce => MqttQoS::AtLeastOnce,
        QoS::ExactlyOnce => MqttQoS::ExactlyOnce,
    }
}

/// Origin tags carried as MQTT v5 user properties.
pub(crate) fn origin_properties(message: &OutboundMessage) -> PublishProperties {
    PublishProperties {
        user_properties: vec![
            (SENDER_ID_PROPERTY.to_string(), message.sender_id.clone()),
            (SENDER_GROUP_PROPERTY.to_string(), message.sender_group.clone()),
        ],
        ..PublishProperties::default()
    }
}

impl BusTransport for MqttTransport {
    fn send(&self, message: &OutboundMessage) -> impl Future<Output = Result<(), SendError>> + Send {
        let client = self.client.clone();
        let connected = self.is_connected();
        let topic = message.topic.clone();
        let payload = message.payload.clone();
        let qos = to_mqtt_qos(message.qos);
        let properties = origin_properties(message);
        async move {
            if !connected {
                return Err(MqttError::NotConnected.into());
            }
            client
                .publish_with_properties(topic, qos, false, payload, properties)
                .await
                .map_err(|err| MqttError::Client(err).into())
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
