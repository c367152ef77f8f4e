//! The webhook sync handler: verify, log, dispatch, finalize.
//!
//! Per request the flow is `Received -> Verified -> Logged -> Dispatched`.
//! Missing headers and failed verification stop before anything is written.
//! Once verified, every request writes one audit row and then updates the
//! rows matching its `(user id, event type)` with the outcome. Audit writes
//! are best effort: their failures are logged and never change the response.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::dispatch::{DispatchOutcome, EventDispatcher};
use super::verifier::{SignatureHeaders, WebhookVerifier};
use crate::database::{AuditLedger, UserDirectory};
use crate::error::SyncError;
use crate::models::{InboundEvent, NewAuditRecord};

#[derive(Clone)]
pub struct WebhookSyncService {
    verifier: Arc<dyn WebhookVerifier>,
    audit: Arc<dyn AuditLedger>,
    dispatcher: EventDispatcher,
}

impl WebhookSyncService {
    pub fn new(
        verifier: Arc<dyn WebhookVerifier>,
        audit: Arc<dyn AuditLedger>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            verifier,
            audit,
            dispatcher: EventDispatcher::new(users),
        }
    }

    pub async fn handle(
        &self,
        body: &[u8],
        headers: Option<SignatureHeaders>,
    ) -> Result<DispatchOutcome, SyncError> {
        let headers = headers.ok_or(SyncError::MissingHeaders)?;

        let event = self.verifier.verify(body, &headers).map_err(|e| {
            warn!(msg_id = %headers.id, error = %e, "Could not verify webhook");
            SyncError::Verification(e)
        })?;

        info!(
            msg_id = %headers.id,
            event_type = %event.event_type,
            external_user_id = event.external_user_id.as_deref().unwrap_or(""),
            "Webhook verified"
        );

        self.log_event(&event).await;

        match self.dispatcher.dispatch(&event).await {
            Ok(outcome) => {
                self.finalize_success(&event).await;
                Ok(outcome)
            }
            Err(e) => {
                error!(event_type = %event.event_type, error = %e, "Error processing webhook");
                self.finalize_failure(&event, &e.to_string()).await;
                Err(SyncError::Processing(e))
            }
        }
    }

    async fn log_event(&self, event: &InboundEvent) {
        match self.audit.insert(NewAuditRecord::from(event)).await {
            Ok(record) => {
                info!(audit_id = %record.id, event_type = %record.event_type, "Webhook event logged");
            }
            Err(e) => {
                error!(event_type = %event.event_type, error = %e, "Error logging webhook event");
            }
        }
    }

    async fn finalize_success(&self, event: &InboundEvent) {
        let result = self
            .audit
            .mark_processed(event.filter_user_id(), event.event_type.as_str())
            .await;
        match result {
            Ok(rows) => info!(event_type = %event.event_type, rows, "Webhook marked processed"),
            Err(e) => error!(event_type = %event.event_type, error = %e, "Error marking webhook processed"),
        }
    }

    async fn finalize_failure(&self, event: &InboundEvent, message: &str) {
        let result = self
            .audit
            .mark_failed(event.filter_user_id(), event.event_type.as_str(), message)
            .await;
        if let Err(e) = result {
            error!(event_type = %event.event_type, error = %e, "Error recording webhook failure");
        }
    }
}
