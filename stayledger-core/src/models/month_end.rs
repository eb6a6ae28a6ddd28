use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::close::state_machine::CloseStatus;

/// Month-end close record, keyed by (property, year, month).
///
/// Maps to the `month_end_statuses` table. The row is created lazily on the
/// first status write for a property/month and never deleted in normal
/// operation; until then readers see an in-memory draft default.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonthEndStatus {
    /// Property this close record belongs to
    pub property_id: Uuid,

    /// Calendar year of the close month
    pub year: i32,

    /// Month number, 1-12
    pub month_number: i32,

    /// Workflow status (draft/ready/complete)
    pub status: CloseStatus,

    /// Whether the inventory invoice step has completed
    pub inventory_invoice_generated: bool,

    /// When the inventory invoice step completed
    pub inventory_invoice_generated_at: Option<DateTime<Utc>>,

    /// Whether a ledger sync has written revenue for this month
    pub revenue_updated: bool,

    /// When revenue was last written
    pub revenue_updated_at: Option<DateTime<Utc>>,

    /// Whether the owner statement email went out
    pub owner_email_sent: bool,

    /// When the owner statement email went out
    pub owner_email_sent_at: Option<DateTime<Utc>>,

    /// Snapshot: allocated revenue for the month
    pub revenue_amount: Decimal,

    /// Snapshot: cleaning fees attributed to the month
    pub cleaning_fees_amount: Decimal,

    /// Snapshot: expenses passed through from the expenses source
    pub expenses_amount: Decimal,

    /// Snapshot: revenue - cleaning fees - expenses
    pub net_amount: Decimal,

    /// Snapshot: number of bookings with allocation in the month
    pub bookings_count: i32,

    /// Snapshot: owner's share of the net amount
    pub owner_profit: Decimal,

    /// Snapshot: owner percentage used for the profit figure
    pub owner_percentage: Decimal,

    /// Timestamp when the row was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the row was last updated
    pub updated_at: DateTime<Utc>,
}

impl MonthEndStatus {
    /// The record readers see before the first status write: draft, no
    /// steps completed, zeroed snapshot.
    pub fn draft_default(property_id: Uuid, year: i32, month_number: i32) -> Self {
        let now = Utc::now();
        MonthEndStatus {
            property_id,
            year,
            month_number,
            status: CloseStatus::Draft,
            inventory_invoice_generated: false,
            inventory_invoice_generated_at: None,
            revenue_updated: false,
            revenue_updated_at: None,
            owner_email_sent: false,
            owner_email_sent_at: None,
            revenue_amount: Decimal::ZERO,
            cleaning_fees_amount: Decimal::ZERO,
            expenses_amount: Decimal::ZERO,
            net_amount: Decimal::ZERO,
            bookings_count: 0,
            owner_profit: Decimal::ZERO,
            owner_percentage: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Aggregate snapshot written back to the close record by a successful
/// ledger sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub revenue_amount: Decimal,
    pub cleaning_fees_amount: Decimal,
    pub expenses_amount: Decimal,
    pub net_amount: Decimal,
    pub bookings_count: i32,
    pub owner_profit: Decimal,
    pub owner_percentage: Decimal,
}
