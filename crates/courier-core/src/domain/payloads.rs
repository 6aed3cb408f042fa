//! Typed payloads for the five task types.
//!
//! These are the shapes stored inside a task's `data` field and handed to
//! the remote runner after decoding. Field names match the persisted JSON
//! of existing queue files, so a queue written by an older install keeps
//! draining after an upgrade.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyProfilePayload {
    pub identifier: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Event,
    Screen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Unix timestamp; older records may lack it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEventPayload {
    pub identifier: String,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub token: String,
    pub platform: String,
    pub last_used: i64,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceTokenPayload {
    pub profile_identified: String,
    pub device: Device,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePushTokenPayload {
    pub profile_identified: String,
    pub device_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricEvent {
    Delivered,
    Opened,
    Converted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPushMetricPayload {
    #[serde(rename = "deliveryID")]
    pub delivery_id: String,
    pub device_token: String,
    pub event: MetricEvent,
    pub timestamp: i64,
}
