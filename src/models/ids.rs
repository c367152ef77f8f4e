//! Type aliases for row IDs. Both are UUIDs generated by the store that owns the row.
//! External (identity provider) user IDs are plain strings and never parsed as UUIDs.

use uuid::Uuid;

pub type AuditId = Uuid;
pub type UserId = Uuid;
