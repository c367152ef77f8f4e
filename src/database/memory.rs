//! In-memory storage implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuditLedger, StoreResult, UserDirectory};
use crate::error::StoreError;
use crate::models::{AuditId, AuditRecord, NewAuditRecord, NewUser, UserProfile, UserRecord};

/// Process-local audit ledger and user table with the same semantics as the
/// Postgres schema, including the one-live-row-per-external-id rule.
#[derive(Default)]
pub struct InMemorySyncStore {
    audit: RwLock<Vec<AuditRecord>>,
    users: RwLock<Vec<UserRecord>>,
}

impl InMemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every audit row in insertion order.
    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit.read().await.clone()
    }

    /// Snapshot of every user row, deleted ones included.
    pub async fn user_records(&self) -> Vec<UserRecord> {
        self.users.read().await.clone()
    }
}

fn matches_filter(record: &AuditRecord, external_user_id: &str, event_type: &str) -> bool {
    // A NULL user id never equals the filter value, as in SQL.
    record.external_user_id.as_deref() == Some(external_user_id) && record.event_type == event_type
}

#[async_trait]
impl AuditLedger for InMemorySyncStore {
    async fn insert(&self, record: NewAuditRecord) -> StoreResult<AuditRecord> {
        let row = AuditRecord {
            id: Uuid::new_v4(),
            event_type: record.event_type,
            external_user_id: record.external_user_id,
            payload: record.payload,
            processed: false,
            error: None,
            created_at: Utc::now(),
        };
        self.audit.write().await.push(row.clone());
        Ok(row)
    }

    async fn mark_processed(&self, external_user_id: &str, event_type: &str) -> StoreResult<u64> {
        let mut audit = self.audit.write().await;
        let mut rows = 0;
        for record in audit
            .iter_mut()
            .filter(|r| matches_filter(r, external_user_id, event_type))
        {
            record.processed = true;
            rows += 1;
        }
        Ok(rows)
    }

    async fn mark_failed(
        &self,
        external_user_id: &str,
        event_type: &str,
        error: &str,
    ) -> StoreResult<u64> {
        let mut audit = self.audit.write().await;
        let mut rows = 0;
        for record in audit
            .iter_mut()
            .filter(|r| matches_filter(r, external_user_id, event_type))
        {
            record.processed = false;
            record.error = Some(error.to_string());
            rows += 1;
        }
        Ok(rows)
    }

    async fn list_unprocessed(
        &self,
        limit: i64,
        event_type: Option<String>,
    ) -> StoreResult<Vec<AuditRecord>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let audit = self.audit.read().await;
        Ok(audit
            .iter()
            .filter(|r| !r.processed)
            .filter(|r| event_type.as_deref().map_or(true, |t| r.event_type == t))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_processed_by_id(&self, id: AuditId) -> StoreResult<u64> {
        let mut audit = self.audit.write().await;
        match audit.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.processed = true;
                record.error = None;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn mark_failed_by_id(&self, id: AuditId, error: &str) -> StoreResult<u64> {
        let mut audit = self.audit.write().await;
        match audit.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.processed = false;
                record.error = Some(error.to_string());
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl UserDirectory for InMemorySyncStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|u| u.external_user_id == user.external_user_id && !u.is_deleted())
        {
            return Err(StoreError::UniqueViolation("users_clerk_user_id_active".to_string()));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            external_user_id: user.external_user_id,
            email: user.profile.email,
            first_name: user.profile.first_name,
            last_name: user.profile.last_name,
            image_url: user.profile.image_url,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        users.push(record.clone());
        Ok(record)
    }

    async fn update_user(
        &self,
        external_user_id: &str,
        profile: &UserProfile,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut users = self.users.write().await;
        let mut rows = 0;
        for user in users.iter_mut().filter(|u| u.external_user_id == external_user_id) {
            user.email = profile.email.clone();
            user.first_name = profile.first_name.clone();
            user.last_name = profile.last_name.clone();
            user.image_url = profile.image_url.clone();
            user.updated_at = updated_at;
            rows += 1;
        }
        Ok(rows)
    }

    async fn soft_delete_user(
        &self,
        external_user_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut users = self.users.write().await;
        let mut rows = 0;
        for user in users.iter_mut().filter(|u| u.external_user_id == external_user_id) {
            user.deleted_at = Some(deleted_at);
            rows += 1;
        }
        Ok(rows)
    }

    async fn find_by_external_id(&self, external_user_id: &str) -> StoreResult<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .rev()
            .find(|u| u.external_user_id == external_user_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_user(id: &str, email: &str) -> NewUser {
        NewUser {
            external_user_id: id.to_string(),
            profile: UserProfile {
                email: email.to_string(),
                first_name: None,
                last_name: None,
                image_url: None,
            },
        }
    }

    #[tokio::test]
    async fn rejects_second_live_user_with_same_external_id() {
        let store = InMemorySyncStore::new();
        store.insert_user(new_user("user_1", "a@example.com")).await.unwrap();

        let err = store
            .insert_user(new_user("user_1", "b@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn allows_recreate_after_soft_delete() {
        let store = InMemorySyncStore::new();
        store.insert_user(new_user("user_1", "a@example.com")).await.unwrap();
        assert_eq!(store.soft_delete_user("user_1", Utc::now()).await.unwrap(), 1);

        let recreated = store.insert_user(new_user("user_1", "b@example.com")).await.unwrap();
        let found = store.find_by_external_id("user_1").await.unwrap().unwrap();
        assert_eq!(found.id, recreated.id);
        assert!(!found.is_deleted());
        assert_eq!(store.user_records().await.len(), 2);
    }

    #[tokio::test]
    async fn updates_report_zero_rows_when_unmatched() {
        let store = InMemorySyncStore::new();
        let profile = new_user("ghost", "g@example.com").profile;
        assert_eq!(store.update_user("ghost", &profile, Utc::now()).await.unwrap(), 0);
        assert_eq!(store.soft_delete_user("ghost", Utc::now()).await.unwrap(), 0);
        assert!(store.user_records().await.is_empty());
    }

    #[tokio::test]
    async fn audit_filter_never_matches_null_user_id() {
        let store = InMemorySyncStore::new();
        store
            .insert(NewAuditRecord {
                event_type: "user.deleted".into(),
                external_user_id: None,
                payload: json!({}),
            })
            .await
            .unwrap();

        assert_eq!(store.mark_processed("", "user.deleted").await.unwrap(), 0);
        assert!(!store.audit_records().await[0].processed);
    }

    #[tokio::test]
    async fn list_unprocessed_filters_by_type_and_limit() {
        let store = InMemorySyncStore::new();
        for (event_type, user) in [("user.created", "u1"), ("user.updated", "u1"), ("user.created", "u2")] {
            store
                .insert(NewAuditRecord {
                    event_type: event_type.into(),
                    external_user_id: Some(user.into()),
                    payload: json!({ "id": user }),
                })
                .await
                .unwrap();
        }
        store.mark_processed("u1", "user.created").await.unwrap();

        let pending = store.list_unprocessed(10, None).await.unwrap();
        assert_eq!(pending.len(), 2);

        let created = store.list_unprocessed(10, Some("user.created".to_string())).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].external_user_id.as_deref(), Some("u2"));

        assert_eq!(store.list_unprocessed(1, None).await.unwrap().len(), 1);
    }
}
