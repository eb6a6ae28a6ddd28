use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::close::state_machine::CloseStatus;
use crate::models::audit::AuditLogEntry;
use crate::models::month_end::MonthEndStatus;

/// Single status transition request from the operator UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CloseStatus,
}

/// Response to a single transition: the updated record plus the audit
/// entry that recorded it.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionResponse {
    pub record: MonthEndStatus,
    pub audit: AuditLogEntry,
}

/// Batch transition request: the same target status applied to many
/// properties for one year/month.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchStatusRequest {
    pub property_ids: Vec<Uuid>,
    pub status: CloseStatus,
}

/// Per-property outcome of a batch transition. One property failing never
/// blocks or rolls back the others.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub property_id: Uuid,
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CloseStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchStatusResponse {
    pub results: Vec<BatchItemResult>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Workflow-step flag updates reported by the external invoice/email
/// collaborators. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStepsRequest {
    pub inventory_invoice_generated: Option<bool>,
    pub revenue_updated: Option<bool>,
    pub owner_email_sent: Option<bool>,
}
