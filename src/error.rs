//! Error types, one enum per layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Startup configuration problems. Never produced per request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Failures reported by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("duplicate key value violates unique constraint \"{0}\"")]
    UniqueViolation(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// The webhook could not be authenticated or its envelope is unusable.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("timestamp header is not a unix timestamp")]
    InvalidTimestamp,

    #[error("message timestamp too old")]
    TimestampTooOld,

    #[error("message timestamp too new")]
    TimestampTooNew,

    #[error("no matching signature found")]
    NoMatchingSignature,

    #[error("invalid event envelope: {0}")]
    InvalidEnvelope(String),
}

/// A verified event could not be applied to the user table.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed {event_type} payload: {source}")]
    Payload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Request-level outcome of the webhook handler other than success.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Missing svix headers")]
    MissingHeaders,

    #[error("Verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("Webhook processing failed: {0}")]
    Processing(#[from] DispatchError),
}

impl SyncError {
    pub fn status(&self) -> StatusCode {
        match self {
            SyncError::MissingHeaders | SyncError::Verification(_) => StatusCode::BAD_REQUEST,
            SyncError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let body = match &self {
            SyncError::MissingHeaders => "Error: Missing svix headers",
            SyncError::Verification(_) => "Error: Verification failed",
            SyncError::Processing(_) => "Error: Webhook processing failed",
        };
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_class() {
        assert_eq!(SyncError::MissingHeaders.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            SyncError::Verification(VerificationError::NoMatchingSignature).status(),
            StatusCode::BAD_REQUEST
        );
        let err = SyncError::Processing(DispatchError::Store(StoreError::Unavailable(
            "connection reset".into(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn store_error_message_is_kept_for_audit_trail() {
        let err = DispatchError::from(StoreError::UniqueViolation("users_clerk_user_id_active".into()));
        assert_eq!(
            err.to_string(),
            "duplicate key value violates unique constraint \"users_clerk_user_id_active\""
        );
    }
}
