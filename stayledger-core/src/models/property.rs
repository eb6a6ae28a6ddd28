use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Property model: the minimal record the close pipeline needs.
///
/// Property management itself lives outside this service; rows are only
/// looked up here, to address the external ledger and compute the owner's
/// share. An unknown property surfaces as a NotFound error.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Property {
    /// Unique identifier for the property
    pub id: Uuid,

    /// Display name; also keys the ledger layout descriptor
    pub name: String,

    /// Opaque id of the property's ledger document
    pub ledger_document_id: String,

    /// Named sheet inside the ledger document
    pub ledger_sheet: String,

    /// Owner's share of the net amount, in percent (0-100)
    pub owner_percentage: Decimal,

    /// Timestamp when the property was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the property was last updated
    pub updated_at: DateTime<Utc>,
}
