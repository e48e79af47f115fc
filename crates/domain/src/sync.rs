//! Bus synchronization vocabulary: topics, methods, envelopes and origin tags.
//!
//! Topics have the shape `<namespace>/<device_id>/<method>`, where the
//! namespace may itself span several levels.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::DeviceId;

/// User property carrying the publishing process identity.
pub const SENDER_ID: &str = "sender_id";
/// User property carrying the publishing process group.
pub const SENDER_GROUP: &str = "sender_group";

/// Kind of change carried by a bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Post,
    Update,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a topic names a method that is not understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(Self::Post),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(UnknownMethod(other.to_string())),
        }
    }
}

/// Topic for a change of `device_id`.
#[must_use]
pub fn topic_for(namespace: &str, device_id: &DeviceId, method: Method) -> String {
    format!("{namespace}/{device_id}/{method}")
}

/// Shared subscription covering every device under `namespace`.
#[must_use]
pub fn shared_subscription(group: &str, namespace: &str) -> String {
    format!("$share/{group}/{namespace}/#")
}

/// Device and raw method extracted from an inbound topic.
///
/// The method is kept raw so an unknown method can be told apart from a
/// malformed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPath {
    pub device_id: DeviceId,
    pub method: String,
}

/// Returned when an inbound topic does not match `<namespace>/<id>/<method>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("topic '{0}' does not match <namespace>/<device_id>/<method>")]
pub struct InvalidTopic(pub String);

/// Split an inbound topic into device id and method.
///
/// # Errors
///
/// Returns [`InvalidTopic`] if the topic is outside `namespace` or does not
/// have exactly two levels below it.
pub fn parse_topic(namespace: &str, topic: &str) -> Result<TopicPath, InvalidTopic> {
    let invalid = || InvalidTopic(topic.to_string());
    let rest = topic
        .strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(invalid)?;
    let (device_id, method) = rest.split_once('/').ok_or_else(invalid)?;
    if device_id.is_empty() || method.is_empty() || method.contains('/') {
        return Err(invalid());
    }
    Ok(TopicPath {
        device_id: DeviceId::from(device_id),
        method: method.to_string(),
    })
}

/// Payload of every bus message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub contents: Value,
}

/// Identity of a publishing process, attached to every outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub sender_id: String,
    pub sender_group: String,
}

impl Origin {
    #[must_use]
    pub fn new(sender_id: impl Into<String>, sender_group: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            sender_group: sender_group.into(),
        }
    }

    /// Whether a message tagged with these values came from this process or
    /// one of its replicas.
    #[must_use]
    pub fn is_own(&self, sender_id: Option<&str>, sender_group: Option<&str>) -> bool {
        sender_id == Some(self.sender_id.as_str())
            || sender_group == Some(self.sender_group.as_str())
    }
}
