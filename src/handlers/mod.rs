pub mod health;
pub mod webhooks;

pub use health::health_check;
pub use webhooks::clerk_webhook;
