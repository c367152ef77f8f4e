//! User sync API
//!
//! Receives signed user lifecycle webhooks from the identity provider,
//! records each one in an audit ledger and mirrors the change into the
//! local `users` table.

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{ConfigError, DispatchError, StoreError, SyncError, VerificationError};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use database::{AuditLedger, UserDirectory};
use services::{WebhookSyncService, WebhookVerifier};

pub const WEBHOOK_PATH: &str = "/api/webhooks/clerk";

/// Default request body cap for the router when no config is at hand.
pub const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub webhook_sync: WebhookSyncService,
}

impl AppState {
    pub fn new(
        verifier: Arc<dyn WebhookVerifier>,
        audit: Arc<dyn AuditLedger>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            webhook_sync: WebhookSyncService::new(verifier, audit, users),
        }
    }
}

pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(WEBHOOK_PATH, post(handlers::clerk_webhook))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
