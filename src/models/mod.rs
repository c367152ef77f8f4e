//! Shared types: inbound webhook events and the rows they are synced into.

pub mod event;
pub mod ids;
pub mod records;

pub use event::{EmailAddress, EventType, InboundEvent, UserEventData, UserProfile};
pub use ids::{AuditId, UserId};
pub use records::{AuditRecord, NewAuditRecord, NewUser, UserRecord};
