//! Rows of the `clerk_webhook_events` audit ledger and the `users` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

use super::event::{EventType, InboundEvent, UserProfile};
use super::ids::{AuditId, UserId};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub event_type: String,
    pub external_user_id: Option<String>,
    pub payload: Value,
    pub processed: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Rebuild the event this row was logged for.
    pub fn to_event(&self) -> InboundEvent {
        InboundEvent::new(
            EventType::from_tag(&self.event_type),
            self.payload.clone(),
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewAuditRecord {
    pub event_type: String,
    pub external_user_id: Option<String>,
    pub payload: Value,
}

impl From<&InboundEvent> for NewAuditRecord {
    fn from(event: &InboundEvent) -> Self {
        Self {
            event_type: event.event_type.as_str().to_string(),
            external_user_id: event.external_user_id.clone(),
            payload: event.payload.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, FromRow)]
pub struct UserRecord {
    pub id: UserId,
    #[sqlx(rename = "clerk_user_id")]
    pub external_user_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub external_user_id: String,
    pub profile: UserProfile,
}
