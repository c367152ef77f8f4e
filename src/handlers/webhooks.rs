use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::error::SyncError;
use crate::services::SignatureHeaders;
use crate::AppState;

// Identity-provider webhook. Always answers with one of four plain-text responses.
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), SyncError> {
    state
        .webhook_sync
        .handle(&body, SignatureHeaders::from_headers(&headers))
        .await?;

    Ok((StatusCode::OK, "Webhook processed successfully"))
}
