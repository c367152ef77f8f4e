//! Applies verified user events to the user table.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::database::UserDirectory;
use crate::error::DispatchError;
use crate::models::{EventType, InboundEvent, NewUser, UserEventData};
use crate::utils::redact::redact_email;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Created,
    /// `rows` is zero when no user matched; that is still a success.
    Updated { rows: u64 },
    Deleted { rows: u64 },
    /// Event type with no user-table mutation.
    Ignored,
}

#[derive(Clone)]
pub struct EventDispatcher {
    users: Arc<dyn UserDirectory>,
}

impl EventDispatcher {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    pub async fn dispatch(&self, event: &InboundEvent) -> Result<DispatchOutcome, DispatchError> {
        match &event.event_type {
            EventType::UserCreated => self.user_created(event).await,
            EventType::UserUpdated => self.user_updated(event).await,
            EventType::UserDeleted => self.user_deleted(event).await,
            EventType::Other(tag) => {
                info!(event_type = %tag, "Unhandled webhook event type");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    async fn user_created(&self, event: &InboundEvent) -> Result<DispatchOutcome, DispatchError> {
        let data = user_data(event)?;
        let profile = data.profile();
        debug!(
            external_user_id = %data.id,
            email = %redact_email(&profile.email),
            "Creating user"
        );

        let user = self
            .users
            .insert_user(NewUser {
                external_user_id: data.id,
                profile,
            })
            .await?;

        info!(external_user_id = %user.external_user_id, user_id = %user.id, "User created");
        Ok(DispatchOutcome::Created)
    }

    async fn user_updated(&self, event: &InboundEvent) -> Result<DispatchOutcome, DispatchError> {
        let data = user_data(event)?;
        let profile = data.profile();

        let rows = self.users.update_user(&data.id, &profile, Utc::now()).await?;
        if rows == 0 {
            debug!(external_user_id = %data.id, "No user row matched update");
        }

        info!(external_user_id = %data.id, rows, "User updated");
        Ok(DispatchOutcome::Updated { rows })
    }

    async fn user_deleted(&self, event: &InboundEvent) -> Result<DispatchOutcome, DispatchError> {
        let external_user_id = event.filter_user_id();

        let rows = self.users.soft_delete_user(external_user_id, Utc::now()).await?;
        if rows == 0 {
            debug!(external_user_id, "No user row matched delete");
        }

        info!(external_user_id, rows, "User soft-deleted");
        Ok(DispatchOutcome::Deleted { rows })
    }
}

fn user_data(event: &InboundEvent) -> Result<UserEventData, DispatchError> {
    serde_json::from_value(event.payload.clone()).map_err(|source| DispatchError::Payload {
        event_type: event.event_type.as_str().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemorySyncStore;
    use serde_json::json;

    fn event(event_type: EventType, data: serde_json::Value) -> InboundEvent {
        InboundEvent::new(event_type, data)
    }

    fn created_data(id: &str, email: &str) -> serde_json::Value {
        json!({
            "id": id,
            "email_addresses": [{ "id": "idn_1", "email_address": email }],
            "primary_email_address_id": "idn_1",
            "first_name": "Grace",
            "last_name": "Hopper",
            "image_url": "https://img.example.com/u.png"
        })
    }

    #[tokio::test]
    async fn created_event_inserts_user() {
        let store = Arc::new(InMemorySyncStore::new());
        let dispatcher = EventDispatcher::new(store.clone());

        let outcome = dispatcher
            .dispatch(&event(EventType::UserCreated, created_data("user_1", "g@example.com")))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Created);
        let users = store.user_records().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].external_user_id, "user_1");
        assert_eq!(users[0].email, "g@example.com");
        assert_eq!(users[0].last_name.as_deref(), Some("Hopper"));
    }

    #[tokio::test]
    async fn malformed_user_payload_is_a_dispatch_error() {
        let store = Arc::new(InMemorySyncStore::new());
        let dispatcher = EventDispatcher::new(store.clone());

        let err = dispatcher
            .dispatch(&event(EventType::UserCreated, json!({ "id": "user_1" })))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Payload { .. }));
        assert!(store.user_records().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_event_is_ignored() {
        let store = Arc::new(InMemorySyncStore::new());
        let dispatcher = EventDispatcher::new(store.clone());

        let outcome = dispatcher
            .dispatch(&event(EventType::Other("session.created".into()), json!({ "id": "sess_1" })))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert!(store.user_records().await.is_empty());
    }

    #[tokio::test]
    async fn delete_without_id_matches_nothing() {
        let store = Arc::new(InMemorySyncStore::new());
        let dispatcher = EventDispatcher::new(store.clone());
        dispatcher
            .dispatch(&event(EventType::UserCreated, created_data("user_1", "g@example.com")))
            .await
            .unwrap();

        let outcome = dispatcher
            .dispatch(&event(EventType::UserDeleted, json!({ "deleted": true })))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Deleted { rows: 0 });
        assert!(!store.user_records().await[0].is_deleted());
    }
}
