//! MQTT adapter error types.

use smarthub_app::ports::SendError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The broker connection is down.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The rumqttc client refused the request.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::v5::ClientError),

    /// The connection to the broker failed.
    #[error("MQTT connection error")]
    Connection(#[source] rumqttc::v5::ConnectionError),
}

impl From<MqttError> for SendError {
    fn from(err: MqttError) -> Self {
        match err {
            MqttError::NotConnected => Self::Disconnected,
            other => Self::Transport(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_connected_error() {
        let err = MqttError::NotConnected;
        assert_eq!(err.to_string(), "MQTT client not connected");
    }

    #[test]
    fn should_convert_not_connected_to_disconnected() {
        let err: SendError = MqttError::NotConnected.into();
        assert!(matches!(err, SendError::Disconnected));
    }
}
