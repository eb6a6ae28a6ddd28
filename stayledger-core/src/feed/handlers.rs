use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::feed::client::fetch_all_bookings;
use crate::feed::ingest::{ingest_bookings, IngestReport};
use crate::reconcile::{compare, ComparisonReport};
use crate::store::bookings::bookings_in_range;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Runs a feed ingestion for one property and date window.
pub async fn ingest_handler(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestReport>, AppError> {
    let report =
        ingest_bookings(&state.db, &state.feed, property_id, request.from, request.to).await?;
    Ok(Json(report))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Diffs the upstream feed against the internal store for operator review.
///
/// Read-only on both sides; nothing is persisted or written upstream.
pub async fn reconcile_handler(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    Query(query): Query<ReconcileQuery>,
) -> Result<Json<ComparisonReport>, AppError> {
    let external = fetch_all_bookings(&state.feed, property_id, query.from, query.to).await?;
    let internal = bookings_in_range(&state.db, property_id, query.from, query.to).await?;
    let report = compare(&external, &internal);
    Ok(Json(report))
}
