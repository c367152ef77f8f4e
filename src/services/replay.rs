//! Re-dispatch of audit rows that were never marked processed.
//!
//! Rows are replayed from their stored payload without a signature check;
//! they were verified when first received. Each row is finalized by id.

use tracing::{error, info, warn};

use super::dispatch::EventDispatcher;
use crate::database::AuditLedger;
use crate::error::StoreError;

#[derive(Clone, Debug)]
pub struct ReplayOptions {
    pub limit: i64,
    pub event_type: Option<String>,
    pub dry_run: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            event_type: None,
            dry_run: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub examined: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub async fn replay_unprocessed(
    audit: &dyn AuditLedger,
    dispatcher: &EventDispatcher,
    options: &ReplayOptions,
) -> Result<ReplaySummary, StoreError> {
    let pending = audit
        .list_unprocessed(options.limit, options.event_type.clone())
        .await?;

    let mut summary = ReplaySummary {
        examined: pending.len(),
        ..Default::default()
    };

    for record in pending {
        if options.dry_run {
            info!(
                audit_id = %record.id,
                event_type = %record.event_type,
                external_user_id = record.external_user_id.as_deref().unwrap_or(""),
                "Would replay"
            );
            continue;
        }

        let event = record.to_event();
        match dispatcher.dispatch(&event).await {
            Ok(outcome) => match audit.mark_processed_by_id(record.id).await {
                Ok(_) => {
                    info!(audit_id = %record.id, ?outcome, "Replayed webhook event");
                    summary.succeeded += 1;
                }
                Err(e) => {
                    error!(audit_id = %record.id, ?outcome, error = %e, "Replayed but could not mark processed");
                    summary.failed += 1;
                }
            },
            Err(e) => {
                warn!(audit_id = %record.id, error = %e, "Replay failed");
                if let Err(store_err) = audit.mark_failed_by_id(record.id, &e.to_string()).await {
                    error!(audit_id = %record.id, error = %store_err, "Error recording replay failure");
                }
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{InMemorySyncStore, UserDirectory};
    use crate::models::NewAuditRecord;
    use serde_json::json;
    use std::sync::Arc;

    async fn log(store: &InMemorySyncStore, event_type: &str, data: serde_json::Value) {
        store
            .insert(NewAuditRecord {
                event_type: event_type.to_string(),
                external_user_id: data.get("id").and_then(|v| v.as_str()).map(str::to_string),
                payload: data,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn replays_pending_rows_and_marks_them_by_id() {
        let store = Arc::new(InMemorySyncStore::new());
        let dispatcher = EventDispatcher::new(store.clone());
        log(
            &store,
            "user.created",
            json!({
                "id": "user_7",
                "email_addresses": [{ "id": "e1", "email_address": "s@example.com" }],
                "primary_email_address_id": "e1"
            }),
        )
        .await;
        log(&store, "user.created", json!({ "id": "user_8" })).await;

        let summary = replay_unprocessed(store.as_ref(), &dispatcher, &ReplayOptions::default())
            .await
            .unwrap();

        assert_eq!(summary, ReplaySummary { examined: 2, succeeded: 1, failed: 1 });
        let audit = store.audit_records().await;
        assert!(audit[0].processed);
        assert!(!audit[1].processed);
        assert!(audit[1].error.as_deref().unwrap_or("").contains("malformed"));
        let user = store.find_by_external_id("user_7").await.unwrap().unwrap();
        assert_eq!(user.email, "s@example.com");
    }

    #[tokio::test]
    async fn dry_run_changes_nothing() {
        let store = Arc::new(InMemorySyncStore::new());
        let dispatcher = EventDispatcher::new(store.clone());
        log(&store, "user.deleted", json!({ "id": "user_1" })).await;

        let options = ReplayOptions {
            dry_run: true,
            ..Default::default()
        };
        let summary = replay_unprocessed(store.as_ref(), &dispatcher, &options).await.unwrap();

        assert_eq!(summary.examined, 1);
        assert_eq!(summary.succeeded, 0);
        assert!(!store.audit_records().await[0].processed);
    }
}
