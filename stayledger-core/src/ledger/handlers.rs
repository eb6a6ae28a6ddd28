use axum::extract::{Path, State};
use axum::response::Json;
use axum::Extension;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::ledger::expenses::DbExpenses;
use crate::ledger::sync::{LedgerSyncService, SyncOutcome};
use crate::AppState;

/// Sync request body; an explicit expenses total overrides the configured
/// expenses source for this run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncRequest {
    pub expenses_total: Option<Decimal>,
}

/// Runs a ledger sync for one property/year/month.
///
/// Callers are expected to serialize sync runs per property/month; the
/// service does not lock.
pub async fn sync_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((property_id, year, month)): Path<(Uuid, i32, u32)>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncOutcome>, AppError> {
    let service = LedgerSyncService::new(
        state.db.clone(),
        state.ledger.clone(),
        DbExpenses::new(state.db.clone()),
    );

    let outcome = service
        .sync_month(
            property_id,
            year,
            month,
            &user_id.to_string(),
            request.expenses_total,
        )
        .await?;

    Ok(Json(outcome))
}
