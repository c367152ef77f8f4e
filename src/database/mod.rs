//! Storage for the audit ledger and the user table.
//!
//! Both tables are reached through traits so the webhook handler can be wired
//! to Postgres in production and to [`InMemorySyncStore`] in tests and local
//! development. Update-by-filter operations report the number of rows they
//! touched; zero is not an error.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::error::StoreError;
use crate::models::{AuditId, AuditRecord, NewAuditRecord, NewUser, UserProfile, UserRecord};

pub use memory::InMemorySyncStore;
pub use postgres::PgSyncStore;

pub type DatabasePool = Arc<PgPool>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Append/update-only ledger of inbound webhook events.
#[async_trait]
pub trait AuditLedger: Send + Sync {
    /// Log a freshly verified event with `processed = false`.
    async fn insert(&self, record: NewAuditRecord) -> StoreResult<AuditRecord>;

    /// Set `processed = true` on every row matching the user id and event type.
    async fn mark_processed(&self, external_user_id: &str, event_type: &str) -> StoreResult<u64>;

    /// Set `processed = false` and `error` on every row matching the user id and event type.
    async fn mark_failed(
        &self,
        external_user_id: &str,
        event_type: &str,
        error: &str,
    ) -> StoreResult<u64>;

    /// Unprocessed rows, oldest first, optionally limited to one event type.
    async fn list_unprocessed(
        &self,
        limit: i64,
        event_type: Option<String>,
    ) -> StoreResult<Vec<AuditRecord>>;

    async fn mark_processed_by_id(&self, id: AuditId) -> StoreResult<u64>;

    async fn mark_failed_by_id(&self, id: AuditId, error: &str) -> StoreResult<u64>;
}

/// The local copy of identity-provider users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fails with [`StoreError::UniqueViolation`] if a non-deleted row already has this external id.
    async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord>;

    async fn update_user(
        &self,
        external_user_id: &str,
        profile: &UserProfile,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn soft_delete_user(
        &self,
        external_user_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Most recently created row for the external id, deleted or not.
    async fn find_by_external_id(&self, external_user_id: &str) -> StoreResult<Option<UserRecord>>;
}

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    // TLS is negotiated by sqlx (native-tls) when the URL asks for it via sslmode.
    let pool = PgPool::connect(database_url).await?;

    if database_url.contains("sslmode=require") || database_url.contains("sslmode=prefer") {
        tracing::info!("Database connection configured to use TLS");
    } else if !database_url.contains("localhost") && !database_url.contains("127.0.0.1") {
        tracing::warn!("Connecting to remote database without explicit sslmode. Consider adding sslmode=require");
    }

    Ok(pool)
}

pub async fn new_pool(database_url: &str) -> anyhow::Result<DatabasePool> {
    let pool = create_pool(database_url).await?;
    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
