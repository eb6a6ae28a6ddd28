use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::allocation::MonthKey;
use crate::error::AppError;

/// Consumed expenses source for a property/month.
///
/// Best-effort by contract: the sync treats a missing total or a failed
/// read as zero rather than aborting the run.
pub trait ExpensesSource {
    fn month_total(
        &self,
        property_id: Uuid,
        month: &MonthKey,
    ) -> impl std::future::Future<Output = Result<Option<Decimal>, AppError>> + Send;
}

/// Expenses source backed by the `expenses` table, which an external
/// bookkeeping process keeps filled.
#[derive(Debug, Clone)]
pub struct DbExpenses {
    pool: PgPool,
}

impl DbExpenses {
    pub fn new(pool: PgPool) -> Self {
        DbExpenses { pool }
    }
}

impl ExpensesSource for DbExpenses {
    async fn month_total(
        &self,
        property_id: Uuid,
        month: &MonthKey,
    ) -> Result<Option<Decimal>, AppError> {
        let total = sqlx::query_scalar::<_, Option<Decimal>>(
            "SELECT SUM(amount) FROM expenses WHERE property_id = $1 AND month_key = $2",
        )
        .bind(property_id)
        .bind(month.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
