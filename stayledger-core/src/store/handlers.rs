use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::allocation::{allocate, MonthKey};
use crate::error::AppError;
use crate::models::booking::{Booking, BookingResponse, CreateBooking, UpdateBooking};
use crate::store::bookings::{
    self, booking_months, delete_booking, get_booking, insert_booking, list_bookings,
    update_booking, PersistOutcome,
};
use crate::AppState;

/// Manual booking entry.
///
/// Runs the same allocation as platform ingestion; a duplicate booking
/// code returns the stored booking untouched instead of overwriting it.
pub async fn create_booking_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateBooking>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let allocation = allocate(
        request.check_in,
        request.check_out,
        request.total_amount,
        request.cleaning_fee,
    )?;

    match insert_booking(&state.db, &request, &allocation).await? {
        PersistOutcome::Created(booking) => Ok((
            StatusCode::CREATED,
            Json(BookingResponse::from_allocation(booking, &allocation)),
        )),
        PersistOutcome::AlreadyExists(booking) => {
            let months = booking_months(&state.db, booking.id).await?;
            Ok((StatusCode::OK, Json(BookingResponse::from_parts(booking, months))))
        }
    }
}

/// A single booking with its per-month breakdown.
pub async fn get_booking_handler(
    State(state): State<AppState>,
    Path(booking_code): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = get_booking(&state.db, &booking_code).await?;
    let months = booking_months(&state.db, booking.id).await?;
    Ok(Json(BookingResponse::from_parts(booking, months)))
}

/// Explicit booking edit; the full allocation is recomputed from scratch.
pub async fn update_booking_handler(
    State(state): State<AppState>,
    Path(booking_code): Path<String>,
    Json(changes): Json<UpdateBooking>,
) -> Result<Json<BookingResponse>, AppError> {
    let (booking, allocation) = update_booking(&state.db, &booking_code, &changes).await?;
    Ok(Json(BookingResponse::from_allocation(booking, &allocation)))
}

/// Operator-initiated delete; cascades to the breakdown rows.
pub async fn delete_booking_handler(
    State(state): State<AppState>,
    Path(booking_code): Path<String>,
) -> Result<StatusCode, AppError> {
    delete_booking(&state.db, &booking_code).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListBookingsQuery {
    /// Restrict to bookings with allocation in this month (`YYYY-MM`).
    pub month: Option<String>,
}

/// Lists a property's bookings, optionally filtered by allocation month.
pub async fn list_bookings_handler(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let month = query
        .month
        .as_deref()
        .map(str::parse::<MonthKey>)
        .transpose()?;

    let rows = list_bookings(&state.db, property_id, month.as_ref()).await?;
    Ok(Json(rows))
}

/// The stored per-month aggregates for a property/month, for operator
/// inspection ahead of a sync run.
pub async fn month_summary_handler(
    State(state): State<AppState>,
    Path((property_id, year, month)): Path<(Uuid, i32, u32)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let key = MonthKey::new(year, month)?;
    let aggregates = bookings::month_aggregates(&state.db, property_id, &key).await?;
    Ok(Json(serde_json::json!({
        "month": key,
        "revenue_total": aggregates.revenue_total,
        "cleaning_total": aggregates.cleaning_total,
        "bookings_count": aggregates.bookings_count,
    })))
}
