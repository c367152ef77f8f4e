use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;

use super::{AuditLedger, DatabasePool, StoreResult, UserDirectory};
use crate::error::StoreError;
use crate::models::{AuditId, AuditRecord, NewAuditRecord, NewUser, UserProfile, UserRecord};

const AUDIT_COLUMNS: &str = "id, event_type, clerk_user_id, payload, processed, error, created_at";
const USER_COLUMNS: &str =
    "id, clerk_user_id, email, first_name, last_name, image_url, created_at, updated_at, deleted_at";

/// Postgres-backed audit ledger and user table (see `migrations/`).
#[derive(Clone)]
pub struct PgSyncStore {
    pool: DatabasePool,
}

impl PgSyncStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn audit_from_row(row: PgRow) -> Result<AuditRecord, sqlx::Error> {
    Ok(AuditRecord {
        id: row.try_get("id")?,
        event_type: row.try_get("event_type")?,
        external_user_id: row.try_get("clerk_user_id")?,
        payload: row.try_get::<Json<Value>, _>("payload")?.0,
        processed: row.try_get("processed")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("users").to_string();
            return StoreError::UniqueViolation(constraint);
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl AuditLedger for PgSyncStore {
    async fn insert(&self, record: NewAuditRecord) -> StoreResult<AuditRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO clerk_webhook_events (event_type, clerk_user_id, payload, processed)
             VALUES ($1, $2, $3, false)
             RETURNING {}",
            AUDIT_COLUMNS
        ))
        .bind(&record.event_type)
        .bind(&record.external_user_id)
        .bind(Json(&record.payload))
        .fetch_one(&*self.pool)
        .await?;

        Ok(audit_from_row(row)?)
    }

    async fn mark_processed(&self, external_user_id: &str, event_type: &str) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE clerk_webhook_events SET processed = true
             WHERE clerk_user_id = $1 AND event_type = $2",
        )
        .bind(external_user_id)
        .bind(event_type)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_failed(
        &self,
        external_user_id: &str,
        event_type: &str,
        error: &str,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE clerk_webhook_events SET processed = false, error = $3
             WHERE clerk_user_id = $1 AND event_type = $2",
        )
        .bind(external_user_id)
        .bind(event_type)
        .bind(error)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_unprocessed(
        &self,
        limit: i64,
        event_type: Option<String>,
    ) -> StoreResult<Vec<AuditRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM clerk_webhook_events
             WHERE processed = false AND ($1::TEXT IS NULL OR event_type = $1)
             ORDER BY created_at ASC
             LIMIT $2",
            AUDIT_COLUMNS
        ))
        .bind(event_type)
        .bind(limit)
        .fetch_all(&*self.pool)
        .await?;

        rows.into_iter()
            .map(|row| audit_from_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn mark_processed_by_id(&self, id: AuditId) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE clerk_webhook_events SET processed = true, error = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_failed_by_id(&self, id: AuditId, error: &str) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE clerk_webhook_events SET processed = false, error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserDirectory for PgSyncStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        let profile = &user.profile;
        sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (clerk_user_id, email, first_name, last_name, image_url)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.external_user_id)
        .bind(&profile.email)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.image_url)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn update_user(
        &self,
        external_user_id: &str,
        profile: &UserProfile,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE users
             SET email = $2, first_name = $3, last_name = $4, image_url = $5, updated_at = $6
             WHERE clerk_user_id = $1",
        )
        .bind(external_user_id)
        .bind(&profile.email)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.image_url)
        .bind(updated_at)
        .execute(&*self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(result.rows_affected())
    }

    async fn soft_delete_user(
        &self,
        external_user_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE users SET deleted_at = $2 WHERE clerk_user_id = $1")
            .bind(external_user_id)
            .bind(deleted_at)
            .execute(&*self.pool)
            .await
            .map_err(map_write_error)?;

        Ok(result.rows_affected())
    }

    async fn find_by_external_id(&self, external_user_id: &str) -> StoreResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE clerk_user_id = $1 ORDER BY created_at DESC LIMIT 1",
            USER_COLUMNS
        ))
        .bind(external_user_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(user)
    }
}
