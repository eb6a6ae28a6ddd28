use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::close::state_machine::CloseStatus;

/// Append-only audit record of a month-end status transition.
///
/// Maps to the `status_audit_log` table. Exactly one entry is written per
/// transition, reverts included; entries are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogEntry {
    /// Unique identifier for the audit entry
    pub id: Uuid,

    /// Property whose close status changed
    pub property_id: Uuid,

    /// Calendar year of the close month
    pub year: i32,

    /// Month number, 1-12
    pub month_number: i32,

    /// Status before the transition
    pub previous_status: CloseStatus,

    /// Status after the transition
    pub new_status: CloseStatus,

    /// Operator (JWT subject) who made the change
    pub changed_by: String,

    /// When the transition happened
    pub changed_at: DateTime<Utc>,
}
