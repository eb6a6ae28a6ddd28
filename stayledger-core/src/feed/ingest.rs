use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::allocation::allocate;
use crate::error::AppError;
use crate::feed::client::{FeedBooking, ReservationFeed};
use crate::models::booking::CreateBooking;
use crate::store::bookings::{insert_booking, PersistOutcome};

/// Summary of one ingestion run over the reservation feed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Bookings returned by the feed across all pages
    pub fetched: usize,

    /// Newly persisted bookings
    pub created: usize,

    /// Codes already stored; re-ingestion was a no-op
    pub skipped_existing: usize,

    /// Entries rejected by validation before persistence
    pub rejected: usize,
}

/// Fetches the feed for a property/date window and persists what is new.
///
/// Each booking is validated and allocated before persistence; a booking
/// that fails validation is logged and counted, not fatal to the run. An
/// upstream page fetch or database failure aborts the whole run and the
/// caller re-invokes it - already-persisted bookings are safe because
/// persistence is idempotent by booking code.
pub async fn ingest_bookings<F: ReservationFeed>(
    pool: &PgPool,
    feed: &F,
    property_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<IngestReport, AppError> {
    info!(
        "Ingesting feed bookings for property {} ({} .. {})",
        property_id, from, to
    );

    let mut report = IngestReport::default();
    let mut page = 1;
    loop {
        let batch = feed.fetch_page(property_id, from, to, page).await?;

        for feed_booking in &batch.bookings {
            report.fetched += 1;
            match ingest_one(pool, property_id, feed_booking).await {
                Ok(PersistOutcome::Created(_)) => report.created += 1,
                Ok(PersistOutcome::AlreadyExists(_)) => report.skipped_existing += 1,
                Err(AppError::Validation(reason)) => {
                    warn!(
                        "Rejected feed booking {}: {}",
                        feed_booking.booking_code, reason
                    );
                    report.rejected += 1;
                }
                Err(other) => return Err(other),
            }
        }

        match batch.next_page {
            Some(next) if next > page => page = next,
            _ => break,
        }
    }

    info!(
        "Ingestion for property {} done: {} fetched, {} created, {} already stored, {} rejected",
        property_id, report.fetched, report.created, report.skipped_existing, report.rejected
    );

    Ok(report)
}

async fn ingest_one(
    pool: &PgPool,
    property_id: Uuid,
    feed_booking: &FeedBooking,
) -> Result<PersistOutcome, AppError> {
    let check_in = feed_booking.check_in.ok_or_else(|| {
        AppError::Validation(format!(
            "booking {} is missing a check-in date",
            feed_booking.booking_code
        ))
    })?;
    let check_out = feed_booking.check_out.ok_or_else(|| {
        AppError::Validation(format!(
            "booking {} is missing a check-out date",
            feed_booking.booking_code
        ))
    })?;

    let total_amount = feed_booking.total_amount();
    let allocation = allocate(check_in, check_out, total_amount, feed_booking.cleaning_fee)?;

    let request = CreateBooking {
        booking_code: feed_booking.booking_code.clone(),
        property_id,
        guest_name: feed_booking.guest_name.clone(),
        platform: feed_booking.platform.clone(),
        check_in,
        check_out,
        total_amount,
        cleaning_fee: feed_booking.cleaning_fee,
    };

    insert_booking(pool, &request, &allocation).await
}
