//! Inbound identity-provider events.
//!
//! Events arrive as a JSON envelope `{ "type": "user.created", "data": { ... } }`.
//! Only the envelope is validated up front; the typed view of `data` is parsed
//! when the event is dispatched, so a malformed user payload is a processing
//! failure recorded in the audit ledger rather than a rejected request.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VerificationError;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    UserCreated,
    UserUpdated,
    UserDeleted,
    /// Any other event type. Accepted and logged, never applied.
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::UserCreated => "user.created",
            EventType::UserUpdated => "user.updated",
            EventType::UserDeleted => "user.deleted",
            EventType::Other(tag) => tag.as_str(),
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "user.created" => EventType::UserCreated,
            "user.updated" => EventType::UserUpdated,
            "user.deleted" => EventType::UserDeleted,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    data: serde_json::Map<String, Value>,
}

/// A verified event, ready to be logged and dispatched.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundEvent {
    pub event_type: EventType,
    /// `data.id` when it is a non-empty string.
    pub external_user_id: Option<String>,
    /// Raw `data` object, kept verbatim for the audit ledger.
    pub payload: Value,
}

impl InboundEvent {
    pub fn new(event_type: EventType, payload: Value) -> Self {
        let external_user_id = payload
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        Self {
            event_type,
            external_user_id,
            payload,
        }
    }

    pub fn from_json(body: &[u8]) -> Result<Self, VerificationError> {
        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| VerificationError::InvalidEnvelope(e.to_string()))?;
        Ok(Self::new(
            EventType::from_tag(&envelope.event_type),
            Value::Object(envelope.data),
        ))
    }

    /// External user id used in update filters; absent ids match as the empty string.
    pub fn filter_user_id(&self) -> &str {
        self.external_user_id.as_deref().unwrap_or("")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}

/// Typed view of `data` for `user.created` / `user.updated`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEventData {
    pub id: String,
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Profile fields written to the user table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

impl UserEventData {
    pub fn primary_email(&self) -> Option<&str> {
        let primary_id = self.primary_email_address_id.as_deref()?;
        self.email_addresses
            .iter()
            .find(|e| e.id == primary_id)
            .map(|e| e.email_address.as_str())
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            email: self.primary_email().unwrap_or_default().to_string(),
            first_name: non_empty(&self.first_name),
            last_name: non_empty(&self.last_name),
            image_url: non_empty(&self.image_url),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_data(primary: Option<&str>) -> UserEventData {
        serde_json::from_value(json!({
            "id": "user_1",
            "email_addresses": [
                { "id": "idn_a", "email_address": "a@example.com" },
                { "id": "idn_b", "email_address": "b@example.com" }
            ],
            "primary_email_address_id": primary,
            "first_name": "Ada",
            "last_name": "",
            "image_url": null
        }))
        .unwrap()
    }

    #[test]
    fn event_tags_map_to_variants() {
        assert_eq!(EventType::from_tag("user.created"), EventType::UserCreated);
        assert_eq!(EventType::from_tag("user.updated"), EventType::UserUpdated);
        assert_eq!(EventType::from_tag("user.deleted"), EventType::UserDeleted);
        let other = EventType::from_tag("session.created");
        assert_eq!(other, EventType::Other("session.created".into()));
        assert_eq!(other.as_str(), "session.created");
    }

    #[test]
    fn parses_envelope_and_keeps_raw_data() {
        let body = br#"{"object":"event","type":"user.deleted","data":{"id":"user_9","deleted":true}}"#;
        let event = InboundEvent::from_json(body).unwrap();
        assert_eq!(event.event_type, EventType::UserDeleted);
        assert_eq!(event.external_user_id.as_deref(), Some("user_9"));
        assert_eq!(event.payload, json!({"id": "user_9", "deleted": true}));
    }

    #[test]
    fn missing_id_is_absent_and_filters_as_empty() {
        let event = InboundEvent::from_json(br#"{"type":"user.deleted","data":{}}"#).unwrap();
        assert_eq!(event.external_user_id, None);
        assert_eq!(event.filter_user_id(), "");
    }

    #[test]
    fn rejects_bodies_that_are_not_envelopes() {
        assert!(InboundEvent::from_json(b"not json").is_err());
        assert!(InboundEvent::from_json(br#"{"type":"user.created"}"#).is_err());
        assert!(InboundEvent::from_json(br#"{"type":"user.created","data":[1,2]}"#).is_err());
        assert!(InboundEvent::from_json(br#"[{"type":"user.created","data":{}}]"#).is_err());
    }

    #[test]
    fn profile_uses_primary_email_and_drops_empty_names() {
        let profile = user_data(Some("idn_b")).profile();
        assert_eq!(profile.email, "b@example.com");
        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert_eq!(profile.last_name, None);
        assert_eq!(profile.image_url, None);
    }

    #[test]
    fn unmatched_primary_reference_yields_empty_email() {
        assert_eq!(user_data(Some("idn_missing")).profile().email, "");
        assert_eq!(user_data(None).profile().email, "");
    }
}
