pub mod dispatch;
pub mod replay;
pub mod verifier;
pub mod webhook_sync;

pub use dispatch::{DispatchOutcome, EventDispatcher};
pub use replay::{replay_unprocessed, ReplayOptions, ReplaySummary};
pub use verifier::{SignatureHeaders, SvixVerifier, WebhookVerifier};
pub use webhook_sync::WebhookSyncService;
