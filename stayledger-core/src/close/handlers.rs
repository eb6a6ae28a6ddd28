use axum::extract::{Path, State};
use axum::response::Json;
use axum::Extension;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::close::state_machine::CloseStatus;
use crate::close::types::{
    BatchItemResult, BatchStatusRequest, BatchStatusResponse, TransitionResponse,
    UpdateStatusRequest, UpdateStepsRequest,
};
use crate::error::AppError;
use crate::models::audit::AuditLogEntry;
use crate::models::month_end::MonthEndStatus;
use crate::store::month_end::{
    audit_trail, get_status, mark_step, transition_status, WorkflowStep,
};
use crate::AppState;

fn validate_month(month: u32) -> Result<i32, AppError> {
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation(format!(
            "month number must be between 1 and 12, got {}",
            month
        )));
    }
    Ok(month as i32)
}

/// The close record for a property/month (a draft default before the first
/// status write).
pub async fn get_status_handler(
    State(state): State<AppState>,
    Path((property_id, year, month)): Path<(Uuid, i32, u32)>,
) -> Result<Json<MonthEndStatus>, AppError> {
    let month_number = validate_month(month)?;
    let record = get_status(&state.db, property_id, year, month_number).await?;
    Ok(Json(record))
}

// Complete is reached only through a successful sync run; the operator API
// never sets it directly.
fn reject_direct_complete(status: CloseStatus) -> Result<(), AppError> {
    if status == CloseStatus::Complete {
        return Err(AppError::Validation(
            "complete is set by a successful ledger sync, not directly".to_string(),
        ));
    }
    Ok(())
}

/// Applies a guarded status transition for one property/month.
pub async fn put_status_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((property_id, year, month)): Path<(Uuid, i32, u32)>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let month_number = validate_month(month)?;
    reject_direct_complete(request.status)?;
    let (record, audit) = transition_status(
        &state.db,
        property_id,
        year,
        month_number,
        request.status,
        &user_id.to_string(),
    )
    .await?;
    Ok(Json(TransitionResponse { record, audit }))
}

/// Applies the same transition to many properties, isolating failures per
/// item: one property hitting an illegal edge or a database error is
/// reported in its slot and the rest proceed.
pub async fn batch_transition(
    pool: &PgPool,
    property_ids: &[Uuid],
    year: i32,
    month_number: i32,
    new_status: CloseStatus,
    changed_by: &str,
) -> BatchStatusResponse {
    let mut results = Vec::with_capacity(property_ids.len());

    for &property_id in property_ids {
        match transition_status(pool, property_id, year, month_number, new_status, changed_by).await
        {
            Ok((record, _)) => results.push(BatchItemResult {
                property_id,
                ok: true,
                status: Some(record.status),
                error: None,
            }),
            Err(err) => {
                warn!(
                    "Batch transition to {} failed for property {}: {}",
                    new_status, property_id, err
                );
                results.push(BatchItemResult {
                    property_id,
                    ok: false,
                    status: None,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    let succeeded = results.iter().filter(|r| r.ok).count();
    let failed = results.len() - succeeded;
    BatchStatusResponse {
        results,
        succeeded,
        failed,
    }
}

/// Batch transition endpoint (PATCH).
pub async fn batch_status_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((year, month)): Path<(i32, u32)>,
    Json(request): Json<BatchStatusRequest>,
) -> Result<Json<BatchStatusResponse>, AppError> {
    let month_number = validate_month(month)?;
    reject_direct_complete(request.status)?;
    if request.property_ids.is_empty() {
        return Err(AppError::Validation(
            "property_ids must not be empty".to_string(),
        ));
    }

    let response = batch_transition(
        &state.db,
        &request.property_ids,
        year,
        month_number,
        request.status,
        &user_id.to_string(),
    )
    .await;
    Ok(Json(response))
}

/// Updates the workflow-step flags on the close record.
///
/// `revenue_updated` is guarded by the store: it can only be set while the
/// month is ready or complete.
pub async fn put_steps_handler(
    State(state): State<AppState>,
    Path((property_id, year, month)): Path<(Uuid, i32, u32)>,
    Json(request): Json<UpdateStepsRequest>,
) -> Result<Json<MonthEndStatus>, AppError> {
    let month_number = validate_month(month)?;

    let steps = [
        (WorkflowStep::InventoryInvoice, request.inventory_invoice_generated),
        (WorkflowStep::RevenueUpdated, request.revenue_updated),
        (WorkflowStep::OwnerEmail, request.owner_email_sent),
    ];

    let mut updated = None;
    for (step, value) in steps {
        if let Some(done) = value {
            updated =
                Some(mark_step(&state.db, property_id, year, month_number, step, done).await?);
        }
    }

    let record = updated.ok_or_else(|| {
        AppError::Validation("at least one step flag must be provided".to_string())
    })?;
    Ok(Json(record))
}

/// The append-only audit trail for a property/month, oldest first.
pub async fn audit_trail_handler(
    State(state): State<AppState>,
    Path((property_id, year, month)): Path<(Uuid, i32, u32)>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    let month_number = validate_month(month)?;
    let entries = audit_trail(&state.db, property_id, year, month_number).await?;
    Ok(Json(entries))
}
