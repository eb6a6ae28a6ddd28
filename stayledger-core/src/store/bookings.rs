use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::allocation::{allocate, Allocation, MonthKey};
use crate::error::AppError;
use crate::models::booking::{Booking, BookingMonth, CreateBooking, UpdateBooking};

const BOOKING_COLUMNS: &str = "id, booking_code, property_id, guest_name, platform, \
     check_in, check_out, total_amount, cleaning_fee, total_nights, nightly_rate, \
     cleaning_fee_month, created_at, updated_at";

/// Result of an idempotent persistence attempt.
///
/// Re-ingesting a booking code that already exists is a no-op by contract;
/// callers distinguish the two outcomes for reporting only.
#[derive(Debug, Clone)]
pub enum PersistOutcome {
    Created(Booking),
    AlreadyExists(Booking),
}

/// Persists a booking together with its per-month breakdown rows.
///
/// The booking row and all of its `booking_months` rows are written inside
/// one transaction: the booking and its allocation land atomically or not
/// at all. If the booking code is already present the existing row is
/// returned untouched - never overwritten.
///
/// # Errors
///
/// Returns a validation error for missing identifiers (before any write),
/// or a database error if any statement fails (the transaction rolls back).
pub async fn insert_booking(
    pool: &PgPool,
    request: &CreateBooking,
    allocation: &Allocation,
) -> Result<PersistOutcome, AppError> {
    if request.booking_code.trim().is_empty() {
        return Err(AppError::Validation("booking code must not be empty".to_string()));
    }
    if request.guest_name.trim().is_empty() {
        return Err(AppError::Validation("guest name must not be empty".to_string()));
    }

    if let Some(existing) = find_booking(pool, &request.booking_code).await? {
        info!(
            "Booking {} already stored; re-ingestion is a no-op",
            request.booking_code
        );
        return Ok(PersistOutcome::AlreadyExists(existing));
    }

    let mut tx = pool.begin().await?;

    let booking = sqlx::query_as::<_, Booking>(&format!(
        "INSERT INTO bookings (
            id, booking_code, property_id, guest_name, platform,
            check_in, check_out, total_amount, cleaning_fee,
            total_nights, nightly_rate, cleaning_fee_month
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {BOOKING_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&request.booking_code)
    .bind(request.property_id)
    .bind(&request.guest_name)
    .bind(&request.platform)
    .bind(request.check_in)
    .bind(request.check_out)
    .bind(request.total_amount)
    .bind(request.cleaning_fee)
    .bind(allocation.total_nights)
    .bind(allocation.nightly_rate)
    .bind(allocation.cleaning_fee_month.to_string())
    .fetch_one(&mut *tx)
    .await?;

    insert_month_rows(&mut tx, booking.id, allocation).await?;

    tx.commit().await?;

    info!(
        "Stored booking {} for property {} ({} nights across {} month(s))",
        booking.booking_code,
        booking.property_id,
        allocation.total_nights,
        allocation.nights_by_month.len()
    );

    Ok(PersistOutcome::Created(booking))
}

/// Applies an explicit edit: merges the changed fields and recomputes the
/// whole allocation from scratch, replacing every breakdown row.
pub async fn update_booking(
    pool: &PgPool,
    booking_code: &str,
    changes: &UpdateBooking,
) -> Result<(Booking, Allocation), AppError> {
    let existing = get_booking(pool, booking_code).await?;

    let guest_name = changes.guest_name.clone().unwrap_or(existing.guest_name);
    let platform = changes.platform.clone().unwrap_or(existing.platform);
    let check_in = changes.check_in.unwrap_or(existing.check_in);
    let check_out = changes.check_out.unwrap_or(existing.check_out);
    let total_amount = changes.total_amount.unwrap_or(existing.total_amount);
    let cleaning_fee = changes.cleaning_fee.unwrap_or(existing.cleaning_fee);

    let allocation = allocate(check_in, check_out, total_amount, cleaning_fee)?;

    let mut tx = pool.begin().await?;

    let booking = sqlx::query_as::<_, Booking>(&format!(
        "UPDATE bookings SET
            guest_name = $2, platform = $3, check_in = $4, check_out = $5,
            total_amount = $6, cleaning_fee = $7, total_nights = $8,
            nightly_rate = $9, cleaning_fee_month = $10, updated_at = NOW()
        WHERE booking_code = $1
        RETURNING {BOOKING_COLUMNS}"
    ))
    .bind(booking_code)
    .bind(&guest_name)
    .bind(&platform)
    .bind(check_in)
    .bind(check_out)
    .bind(total_amount)
    .bind(cleaning_fee)
    .bind(allocation.total_nights)
    .bind(allocation.nightly_rate)
    .bind(allocation.cleaning_fee_month.to_string())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM booking_months WHERE booking_id = $1")
        .bind(booking.id)
        .execute(&mut *tx)
        .await?;
    insert_month_rows(&mut tx, booking.id, &allocation).await?;

    tx.commit().await?;

    info!("Recomputed allocation for booking {}", booking_code);

    Ok((booking, allocation))
}

/// Deletes a booking; the per-month breakdown rows cascade away with it.
pub async fn delete_booking(pool: &PgPool, booking_code: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM bookings WHERE booking_code = $1")
        .bind(booking_code)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "booking {} not found",
            booking_code
        )));
    }

    info!("Deleted booking {}", booking_code);
    Ok(())
}

/// Looks up a booking by its immutable code.
pub async fn find_booking(pool: &PgPool, booking_code: &str) -> Result<Option<Booking>, AppError> {
    let booking = sqlx::query_as::<_, Booking>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_code = $1"
    ))
    .bind(booking_code)
    .fetch_optional(pool)
    .await?;
    Ok(booking)
}

/// Like [`find_booking`] but absence is an error.
pub async fn get_booking(pool: &PgPool, booking_code: &str) -> Result<Booking, AppError> {
    find_booking(pool, booking_code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("booking {} not found", booking_code)))
}

/// The stored per-month breakdown of one booking.
pub async fn booking_months(
    pool: &PgPool,
    booking_id: Uuid,
) -> Result<Vec<BookingMonth>, AppError> {
    let rows = sqlx::query_as::<_, BookingMonth>(
        "SELECT id, booking_id, month_key, nights, revenue
         FROM booking_months WHERE booking_id = $1 ORDER BY month_key",
    )
    .bind(booking_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Lists a property's bookings, optionally restricted to those with any
/// allocation in the given month.
pub async fn list_bookings(
    pool: &PgPool,
    property_id: Uuid,
    month: Option<&MonthKey>,
) -> Result<Vec<Booking>, AppError> {
    let bookings = match month {
        Some(key) => {
            sqlx::query_as::<_, Booking>(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings b
                 WHERE b.property_id = $1
                   AND EXISTS (
                       SELECT 1 FROM booking_months bm
                       WHERE bm.booking_id = b.id AND bm.month_key = $2
                   )
                 ORDER BY b.check_in, b.booking_code"
            ))
            .bind(property_id)
            .bind(key.to_string())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Booking>(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE property_id = $1 ORDER BY check_in, booking_code"
            ))
            .bind(property_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(bookings)
}

/// A property's bookings whose stay overlaps the given date window. Used by
/// reconciliation against the upstream feed.
pub async fn bookings_in_range(
    pool: &PgPool,
    property_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Booking>, AppError> {
    let bookings = sqlx::query_as::<_, Booking>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE property_id = $1 AND check_in < $3 AND check_out > $2
         ORDER BY check_in, booking_code"
    ))
    .bind(property_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;
    Ok(bookings)
}

/// One booking's slice of a given month, as needed for ledger detail rows.
#[derive(Debug, Clone, FromRow)]
pub struct MonthAllocationRow {
    pub booking_code: String,
    pub guest_name: String,
    pub platform: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i32,
    pub revenue: Decimal,
}

/// The bookings with allocation in a month, joined with their slice.
pub async fn bookings_for_month(
    pool: &PgPool,
    property_id: Uuid,
    month: &MonthKey,
) -> Result<Vec<MonthAllocationRow>, AppError> {
    let rows = sqlx::query_as::<_, MonthAllocationRow>(
        "SELECT b.booking_code, b.guest_name, b.platform, b.check_in, b.check_out,
                bm.nights, bm.revenue
         FROM booking_months bm
         JOIN bookings b ON b.id = bm.booking_id
         WHERE b.property_id = $1 AND bm.month_key = $2
         ORDER BY b.check_in, b.booking_code",
    )
    .bind(property_id)
    .bind(month.to_string())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Monthly aggregates over the allocated bookings of one property.
#[derive(Debug, Clone, FromRow)]
pub struct MonthAggregates {
    /// Sum of per-month revenue allocated to the month
    pub revenue_total: Decimal,

    /// Sum of cleaning fees whose fee month is the month
    pub cleaning_total: Decimal,

    /// Number of bookings contributing allocation to the month
    pub bookings_count: i64,
}

/// Computes the aggregates the ledger sync writes for a property/month.
pub async fn month_aggregates(
    pool: &PgPool,
    property_id: Uuid,
    month: &MonthKey,
) -> Result<MonthAggregates, AppError> {
    let aggregates = sqlx::query_as::<_, MonthAggregates>(
        "SELECT
            COALESCE((SELECT SUM(bm.revenue) FROM booking_months bm
                      JOIN bookings b ON b.id = bm.booking_id
                      WHERE b.property_id = $1 AND bm.month_key = $2), 0) AS revenue_total,
            COALESCE((SELECT SUM(b.cleaning_fee) FROM bookings b
                      WHERE b.property_id = $1 AND b.cleaning_fee_month = $2), 0) AS cleaning_total,
            COALESCE((SELECT COUNT(DISTINCT bm.booking_id) FROM booking_months bm
                      JOIN bookings b ON b.id = bm.booking_id
                      WHERE b.property_id = $1 AND bm.month_key = $2), 0) AS bookings_count",
    )
    .bind(property_id)
    .bind(month.to_string())
    .fetch_one(pool)
    .await?;
    Ok(aggregates)
}

/// Looks up the property record a sync run addresses its ledger through.
pub async fn get_property(pool: &PgPool, property_id: Uuid) -> Result<crate::models::Property, AppError> {
    sqlx::query_as::<_, crate::models::Property>(
        "SELECT id, name, ledger_document_id, ledger_sheet, owner_percentage,
                created_at, updated_at
         FROM properties WHERE id = $1",
    )
    .bind(property_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("property {} not found", property_id)))
}

async fn insert_month_rows(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    booking_id: Uuid,
    allocation: &Allocation,
) -> Result<(), AppError> {
    for (key, nights) in &allocation.nights_by_month {
        let revenue = allocation
            .revenue_by_month
            .get(key)
            .copied()
            .unwrap_or(Decimal::ZERO);
        sqlx::query(
            "INSERT INTO booking_months (id, booking_id, month_key, nights, revenue)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(booking_id)
        .bind(key.to_string())
        .bind(*nights)
        .bind(revenue)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
