use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::close::state_machine::{check_transition, CloseStatus};
use crate::error::AppError;
use crate::models::audit::AuditLogEntry;
use crate::models::month_end::{MonthEndStatus, SyncSnapshot};

const STATUS_COLUMNS: &str = "property_id, year, month_number, status, \
     inventory_invoice_generated, inventory_invoice_generated_at, \
     revenue_updated, revenue_updated_at, owner_email_sent, owner_email_sent_at, \
     revenue_amount, cleaning_fees_amount, expenses_amount, net_amount, \
     bookings_count, owner_profit, owner_percentage, created_at, updated_at";

const AUDIT_COLUMNS: &str =
    "id, property_id, year, month_number, previous_status, new_status, changed_by, changed_at";

/// Workflow steps tracked as independent flag/timestamp pairs on the close
/// record. The steps themselves (invoice rendering, owner email) run in
/// external collaborators that report completion through the status API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    InventoryInvoice,
    RevenueUpdated,
    OwnerEmail,
}

impl WorkflowStep {
    fn columns(&self) -> (&'static str, &'static str) {
        match self {
            WorkflowStep::InventoryInvoice => (
                "inventory_invoice_generated",
                "inventory_invoice_generated_at",
            ),
            WorkflowStep::RevenueUpdated => ("revenue_updated", "revenue_updated_at"),
            WorkflowStep::OwnerEmail => ("owner_email_sent", "owner_email_sent_at"),
        }
    }
}

/// Reads the close record for a property/month.
///
/// Before the first status write there is no row; readers see a draft
/// default instead of an error.
pub async fn get_status(
    pool: &PgPool,
    property_id: Uuid,
    year: i32,
    month_number: i32,
) -> Result<MonthEndStatus, AppError> {
    let record = sqlx::query_as::<_, MonthEndStatus>(&format!(
        "SELECT {STATUS_COLUMNS} FROM month_end_statuses
         WHERE property_id = $1 AND year = $2 AND month_number = $3"
    ))
    .bind(property_id)
    .bind(year)
    .bind(month_number)
    .fetch_optional(pool)
    .await?;

    Ok(record.unwrap_or_else(|| MonthEndStatus::draft_default(property_id, year, month_number)))
}

/// Applies a guarded status transition and records it in the audit trail.
///
/// The status upsert and its audit entry commit in one transaction; every
/// transition - reverts included - produces exactly one audit row. Illegal
/// edges are rejected with a precondition error echoing the current status
/// and leave no trace.
pub async fn transition_status(
    pool: &PgPool,
    property_id: Uuid,
    year: i32,
    month_number: i32,
    new_status: CloseStatus,
    changed_by: &str,
) -> Result<(MonthEndStatus, AuditLogEntry), AppError> {
    let mut tx = pool.begin().await?;

    let previous = fetch_status_tx(&mut tx, property_id, year, month_number)
        .await?
        .map(|record| record.status)
        .unwrap_or(CloseStatus::Draft);

    check_transition(previous, new_status)?;

    let record = sqlx::query_as::<_, MonthEndStatus>(&format!(
        "INSERT INTO month_end_statuses (property_id, year, month_number, status)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (property_id, year, month_number)
         DO UPDATE SET status = EXCLUDED.status, updated_at = NOW()
         RETURNING {STATUS_COLUMNS}"
    ))
    .bind(property_id)
    .bind(year)
    .bind(month_number)
    .bind(new_status)
    .fetch_one(&mut *tx)
    .await?;

    let audit = insert_audit_tx(
        &mut tx,
        property_id,
        year,
        month_number,
        previous,
        new_status,
        changed_by,
    )
    .await?;

    tx.commit().await?;

    info!(
        "Status transition for property {} {}-{:02}: {} -> {} (by {})",
        property_id, year, month_number, previous, new_status, changed_by
    );

    Ok((record, audit))
}

/// Sets or clears a workflow-step flag with its timestamp.
///
/// `revenue_updated` is guarded: it may only be set while the month is
/// ready or complete.
pub async fn mark_step(
    pool: &PgPool,
    property_id: Uuid,
    year: i32,
    month_number: i32,
    step: WorkflowStep,
    done: bool,
) -> Result<MonthEndStatus, AppError> {
    if step == WorkflowStep::RevenueUpdated && done {
        let current = get_status(pool, property_id, year, month_number).await?;
        if !current.status.allows_revenue_write() {
            return Err(AppError::precondition(
                "revenue can only be marked updated while the month is ready or complete",
                current.status,
            ));
        }
    }

    let (flag_column, timestamp_column) = step.columns();
    let record = sqlx::query_as::<_, MonthEndStatus>(&format!(
        "INSERT INTO month_end_statuses (property_id, year, month_number, {flag_column}, {timestamp_column})
         VALUES ($1, $2, $3, $4, CASE WHEN $4 THEN NOW() ELSE NULL END)
         ON CONFLICT (property_id, year, month_number)
         DO UPDATE SET {flag_column} = $4,
                       {timestamp_column} = CASE WHEN $4 THEN NOW() ELSE NULL END,
                       updated_at = NOW()
         RETURNING {STATUS_COLUMNS}"
    ))
    .bind(property_id)
    .bind(year)
    .bind(month_number)
    .bind(done)
    .fetch_one(pool)
    .await?;

    Ok(record)
}

/// Persists the aggregate snapshot of a successful sync run and advances
/// `ready -> complete`, with an audit entry for the advance.
///
/// The snapshot, the `revenue_updated` flag and the status advance commit
/// in one transaction. A month that has already completed stays complete
/// (no audit entry); a month not yet ready is rejected.
pub async fn save_sync_snapshot(
    pool: &PgPool,
    property_id: Uuid,
    year: i32,
    month_number: i32,
    snapshot: &SyncSnapshot,
    changed_by: &str,
) -> Result<(MonthEndStatus, Option<AuditLogEntry>), AppError> {
    let mut tx = pool.begin().await?;

    let previous = fetch_status_tx(&mut tx, property_id, year, month_number)
        .await?
        .map(|record| record.status)
        .unwrap_or(CloseStatus::Draft);

    if !previous.allows_revenue_write() {
        return Err(AppError::precondition(
            "revenue write attempted outside ready/complete",
            previous,
        ));
    }

    let new_status = if previous == CloseStatus::Ready {
        CloseStatus::Complete
    } else {
        previous
    };

    let record = sqlx::query_as::<_, MonthEndStatus>(&format!(
        "INSERT INTO month_end_statuses (
            property_id, year, month_number, status,
            revenue_updated, revenue_updated_at,
            revenue_amount, cleaning_fees_amount, expenses_amount, net_amount,
            bookings_count, owner_profit, owner_percentage
        ) VALUES ($1, $2, $3, $4, TRUE, NOW(), $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (property_id, year, month_number)
         DO UPDATE SET status = EXCLUDED.status,
                       revenue_updated = TRUE,
                       revenue_updated_at = NOW(),
                       revenue_amount = EXCLUDED.revenue_amount,
                       cleaning_fees_amount = EXCLUDED.cleaning_fees_amount,
                       expenses_amount = EXCLUDED.expenses_amount,
                       net_amount = EXCLUDED.net_amount,
                       bookings_count = EXCLUDED.bookings_count,
                       owner_profit = EXCLUDED.owner_profit,
                       owner_percentage = EXCLUDED.owner_percentage,
                       updated_at = NOW()
         RETURNING {STATUS_COLUMNS}"
    ))
    .bind(property_id)
    .bind(year)
    .bind(month_number)
    .bind(new_status)
    .bind(snapshot.revenue_amount)
    .bind(snapshot.cleaning_fees_amount)
    .bind(snapshot.expenses_amount)
    .bind(snapshot.net_amount)
    .bind(snapshot.bookings_count)
    .bind(snapshot.owner_profit)
    .bind(snapshot.owner_percentage)
    .fetch_one(&mut *tx)
    .await?;

    let audit = if new_status != previous {
        Some(
            insert_audit_tx(
                &mut tx,
                property_id,
                year,
                month_number,
                previous,
                new_status,
                changed_by,
            )
            .await?,
        )
    } else {
        None
    };

    tx.commit().await?;

    info!(
        "Saved sync snapshot for property {} {}-{:02} (status {})",
        property_id, year, month_number, record.status
    );

    Ok((record, audit))
}

/// The audit trail for a property/month, oldest first.
pub async fn audit_trail(
    pool: &PgPool,
    property_id: Uuid,
    year: i32,
    month_number: i32,
) -> Result<Vec<AuditLogEntry>, AppError> {
    let entries = sqlx::query_as::<_, AuditLogEntry>(&format!(
        "SELECT {AUDIT_COLUMNS} FROM status_audit_log
         WHERE property_id = $1 AND year = $2 AND month_number = $3
         ORDER BY changed_at, id"
    ))
    .bind(property_id)
    .bind(year)
    .bind(month_number)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

async fn fetch_status_tx(
    tx: &mut Transaction<'_, Postgres>,
    property_id: Uuid,
    year: i32,
    month_number: i32,
) -> Result<Option<MonthEndStatus>, AppError> {
    let record = sqlx::query_as::<_, MonthEndStatus>(&format!(
        "SELECT {STATUS_COLUMNS} FROM month_end_statuses
         WHERE property_id = $1 AND year = $2 AND month_number = $3"
    ))
    .bind(property_id)
    .bind(year)
    .bind(month_number)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(record)
}

async fn insert_audit_tx(
    tx: &mut Transaction<'_, Postgres>,
    property_id: Uuid,
    year: i32,
    month_number: i32,
    previous_status: CloseStatus,
    new_status: CloseStatus,
    changed_by: &str,
) -> Result<AuditLogEntry, AppError> {
    let entry = sqlx::query_as::<_, AuditLogEntry>(&format!(
        "INSERT INTO status_audit_log (
            id, property_id, year, month_number, previous_status, new_status, changed_by
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {AUDIT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(property_id)
    .bind(year)
    .bind(month_number)
    .bind(previous_status)
    .bind(new_status)
    .bind(changed_by)
    .fetch_one(&mut **tx)
    .await?;
    Ok(entry)
}
