use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::allocation::MonthKey;
use crate::close::state_machine::CloseStatus;
use crate::error::AppError;
use crate::ledger::client::LedgerApi;
use crate::ledger::expenses::ExpensesSource;
use crate::ledger::layout::LedgerLayout;
use crate::models::month_end::SyncSnapshot;
use crate::store::bookings::{
    bookings_for_month, get_property, month_aggregates, MonthAllocationRow,
};
use crate::store::month_end::{get_status, save_sync_snapshot};

// Detail-block columns: month | guest | platform | check-in | check-out |
// nights | revenue | booking code.
const DETAIL_MONTH_CELL: usize = 0;
const DETAIL_GUEST_CELL: usize = 1;
const DETAIL_CODE_CELL: usize = 7;

/// Result summary of one ledger sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub property_id: Uuid,
    pub month: MonthKey,
    pub revenue_total: Decimal,
    pub cleaning_total: Decimal,
    pub expenses_total: Decimal,
    pub net_amount: Decimal,
    pub bookings_count: i64,

    /// Detail rows appended this run
    pub appended_rows: usize,

    /// Bookings already present in the detail block
    pub skipped_existing: usize,

    /// Detail rows whose append failed and was skipped
    pub failed_rows: usize,

    /// Close status after the run (`complete` after a ready month syncs)
    pub status: CloseStatus,
}

/// Synchronizes allocated monthly totals into a property's external ledger.
///
/// Callers must serialize runs per property/month: the service takes no
/// lock of its own, and two interleaved runs can duplicate detail rows.
pub struct LedgerSyncService<L, E> {
    pool: PgPool,
    ledger: L,
    expenses: E,
}

impl<L: LedgerApi, E: ExpensesSource> LedgerSyncService<L, E> {
    pub fn new(pool: PgPool, ledger: L, expenses: E) -> Self {
        LedgerSyncService {
            pool,
            ledger,
            expenses,
        }
    }

    /// Runs the sync for one property/year/month.
    ///
    /// Procedure: locate the target ledger row, compute aggregates from the
    /// allocated bookings, write the aggregate cells, append the detail
    /// rows that are not already present, then persist the snapshot and
    /// advance a ready month to complete. Repeating the run with an
    /// unchanged booking set appends nothing and rewrites the same totals.
    ///
    /// # Errors
    ///
    /// - Precondition unless the month's status is ready or complete
    /// - NotFound when the property is unknown or the ledger has no row for
    ///   the year/month - in which case nothing has been written
    /// - Upstream when a ledger read or aggregate-cell write fails
    ///
    /// Individual detail-row append failures are logged and skipped; the
    /// rest of the run continues.
    pub async fn sync_month(
        &self,
        property_id: Uuid,
        year: i32,
        month: u32,
        changed_by: &str,
        expenses_override: Option<Decimal>,
    ) -> Result<SyncOutcome, AppError> {
        let month_key = MonthKey::new(year, month)?;
        let month_number = month as i32;

        let property = get_property(&self.pool, property_id).await?;

        let current = get_status(&self.pool, property_id, year, month_number).await?;
        if !current.status.allows_revenue_write() {
            return Err(AppError::precondition(
                "ledger sync requires the month to be ready or complete",
                current.status,
            ));
        }

        info!(
            "Ledger sync for {} ({}) {}: locating {} {} row",
            property.name,
            property_id,
            month_key,
            year,
            month_key.month_name()
        );

        let layout = LedgerLayout::for_property(&property.name);
        let labels = self
            .ledger
            .read_range(
                &property.ledger_document_id,
                &property.ledger_sheet,
                &layout.label_range(),
            )
            .await?;
        let target_row = locate_month_row(&labels, year, month_key.month_name()).ok_or_else(|| {
            AppError::NotFound(format!(
                "ledger of {} has no row for {} {}",
                property.name,
                month_key.month_name(),
                year
            ))
        })?;

        let aggregates = month_aggregates(&self.pool, property_id, &month_key).await?;
        let expenses_total = match expenses_override {
            Some(total) => total,
            None => self.fetch_expenses(property_id, &month_key).await,
        };
        let net_amount = aggregates.revenue_total - aggregates.cleaning_total - expenses_total;

        for (column, amount) in [
            (layout.revenue_column, aggregates.revenue_total),
            (layout.cleaning_column, aggregates.cleaning_total),
            (layout.expenses_column, expenses_total),
        ] {
            self.ledger
                .write_cell(
                    &property.ledger_document_id,
                    &property.ledger_sheet,
                    &layout.cell(column, target_row),
                    &format_currency(amount),
                )
                .await?;
        }

        let existing = self
            .ledger
            .read_range(
                &property.ledger_document_id,
                &property.ledger_sheet,
                &layout.detail_range(),
            )
            .await?;
        let month_bookings = bookings_for_month(&self.pool, property_id, &month_key).await?;
        let to_append = plan_detail_appends(&existing, &month_bookings, month_key.month_name());
        let skipped_existing = month_bookings.len() - to_append.len();

        let mut appended_rows = 0;
        let mut failed_rows = 0;
        for row in &to_append {
            match self
                .ledger
                .append_row(
                    &property.ledger_document_id,
                    &property.ledger_sheet,
                    &layout.detail_range(),
                    row,
                )
                .await
            {
                Ok(()) => appended_rows += 1,
                Err(err) => {
                    error!(
                        "Failed to append detail row for booking {}: {}",
                        row.get(DETAIL_CODE_CELL).map(String::as_str).unwrap_or("?"),
                        err
                    );
                    failed_rows += 1;
                }
            }
        }

        let owner_profit = (net_amount * property.owner_percentage / Decimal::from(100)).round_dp(2);
        let snapshot = SyncSnapshot {
            revenue_amount: aggregates.revenue_total,
            cleaning_fees_amount: aggregates.cleaning_total,
            expenses_amount: expenses_total,
            net_amount,
            bookings_count: aggregates.bookings_count as i32,
            owner_profit,
            owner_percentage: property.owner_percentage,
        };
        let (record, _audit) = save_sync_snapshot(
            &self.pool,
            property_id,
            year,
            month_number,
            &snapshot,
            changed_by,
        )
        .await?;

        info!(
            "Ledger sync for {} {} done: revenue {}, net {}, {} appended, {} already present, {} failed",
            property.name,
            month_key,
            aggregates.revenue_total,
            net_amount,
            appended_rows,
            skipped_existing,
            failed_rows
        );

        Ok(SyncOutcome {
            property_id,
            month: month_key,
            revenue_total: aggregates.revenue_total,
            cleaning_total: aggregates.cleaning_total,
            expenses_total,
            net_amount,
            bookings_count: aggregates.bookings_count,
            appended_rows,
            skipped_existing,
            failed_rows,
            status: record.status,
        })
    }

    /// Best-effort expenses lookup: absence and failure both degrade to
    /// zero, the only local recovery besides skipped detail rows.
    async fn fetch_expenses(&self, property_id: Uuid, month: &MonthKey) -> Decimal {
        match self.expenses.month_total(property_id, month).await {
            Ok(Some(total)) => total,
            Ok(None) => Decimal::ZERO,
            Err(err) => {
                warn!(
                    "Expenses lookup failed for property {} {}: {}; using zero",
                    property_id, month, err
                );
                Decimal::ZERO
            }
        }
    }
}

/// Finds the 1-based ledger row for a year/month.
///
/// Scans the label column for the year, then forward from there for the
/// month name (case-insensitive). Returns `None` when either label is
/// missing, which aborts the sync before any write.
pub(crate) fn locate_month_row(labels: &[Vec<String>], year: i32, month_name: &str) -> Option<u32> {
    let year_label = year.to_string();
    let year_index = labels
        .iter()
        .position(|row| cell_matches(row, 0, &year_label))?;

    labels
        .iter()
        .enumerate()
        .skip(year_index + 1)
        .find(|(_, row)| {
            row.first()
                .map(|cell| cell.trim().eq_ignore_ascii_case(month_name))
                .unwrap_or(false)
        })
        .map(|(index, _)| (index + 1) as u32)
}

fn cell_matches(row: &[String], index: usize, expected: &str) -> bool {
    row.get(index)
        .map(|cell| cell.trim() == expected)
        .unwrap_or(false)
}

/// Plans which bookings still need a detail row.
///
/// A booking is already present - and must not be appended again - iff an
/// existing row matches it by (month, guest name) case-insensitively or by
/// exact booking code. This is the dedup that makes repeated syncs append
/// nothing.
pub(crate) fn plan_detail_appends(
    existing: &[Vec<String>],
    bookings: &[MonthAllocationRow],
    month_label: &str,
) -> Vec<Vec<String>> {
    bookings
        .iter()
        .filter(|booking| {
            !existing
                .iter()
                .any(|row| row_matches_booking(row, booking, month_label))
        })
        .map(|booking| detail_row_values(month_label, booking))
        .collect()
}

fn row_matches_booking(row: &[String], booking: &MonthAllocationRow, month_label: &str) -> bool {
    let month_and_guest = row
        .get(DETAIL_MONTH_CELL)
        .map(|cell| cell.trim().eq_ignore_ascii_case(month_label))
        .unwrap_or(false)
        && row
            .get(DETAIL_GUEST_CELL)
            .map(|cell| cell.trim().eq_ignore_ascii_case(&booking.guest_name))
            .unwrap_or(false);

    let code = row
        .get(DETAIL_CODE_CELL)
        .map(|cell| cell.trim() == booking.booking_code)
        .unwrap_or(false);

    month_and_guest || code
}

fn detail_row_values(month_label: &str, booking: &MonthAllocationRow) -> Vec<String> {
    vec![
        month_label.to_string(),
        booking.guest_name.clone(),
        booking.platform.clone(),
        booking.check_in.to_string(),
        booking.check_out.to_string(),
        booking.nights.to_string(),
        booking.revenue.round_dp(2).to_string(),
        booking.booking_code.clone(),
    ]
}

/// Formats an amount the way the ledgers expect: `$1,234.56`, with zero
/// rendered as an empty cell.
pub(crate) fn format_currency(amount: Decimal) -> String {
    if amount.is_zero() {
        return String::new();
    }

    let rounded = amount.round_dp(2);
    let negative = rounded.is_sign_negative();
    let unscaled = rounded.abs().to_string();

    let (integer_part, fraction_part) = match unscaled.split_once('.') {
        Some((integer, fraction)) => (integer.to_string(), format!("{:0<2}", fraction)),
        None => (unscaled, "00".to_string()),
    };

    let mut grouped = String::with_capacity(integer_part.len() + integer_part.len() / 3);
    for (i, digit) in integer_part.chars().enumerate() {
        if i > 0 && (integer_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if negative { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, fraction_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn labels(rows: &[&str]) -> Vec<Vec<String>> {
        rows.iter().map(|r| vec![r.to_string()]).collect()
    }

    fn booking(code: &str, guest: &str, nights: i32, revenue: i64) -> MonthAllocationRow {
        MonthAllocationRow {
            booking_code: code.to_string(),
            guest_name: guest.to_string(),
            platform: "airbnb".to_string(),
            check_in: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            nights,
            revenue: Decimal::from(revenue),
        }
    }

    #[test]
    fn locates_the_month_row_below_its_year() {
        let rows = labels(&["2024", "March", "", "2025", "January", "February", "March"]);
        // The March under 2025 is wanted, not the one under 2024.
        assert_eq!(locate_month_row(&rows, 2025, "March"), Some(7));
    }

    #[test]
    fn month_lookup_is_case_insensitive() {
        let rows = labels(&["2025", "JANUARY", "february"]);
        assert_eq!(locate_month_row(&rows, 2025, "February"), Some(3));
    }

    #[test]
    fn missing_year_or_month_aborts_the_lookup() {
        let rows = labels(&["2024", "March"]);
        assert_eq!(locate_month_row(&rows, 2025, "March"), None);

        let rows = labels(&["2025", "January"]);
        assert_eq!(locate_month_row(&rows, 2025, "March"), None);
    }

    #[test]
    fn first_run_appends_every_booking() {
        let bookings = vec![booking("HM-1", "Alice", 5, 500), booking("HM-2", "Bob", 3, 300)];
        let plan = plan_detail_appends(&[], &bookings, "March");

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0][DETAIL_MONTH_CELL], "March");
        assert_eq!(plan[0][DETAIL_GUEST_CELL], "Alice");
        assert_eq!(plan[0][DETAIL_CODE_CELL], "HM-1");
    }

    #[test]
    fn second_run_with_unchanged_bookings_appends_nothing() {
        let bookings = vec![booking("HM-1", "Alice", 5, 500), booking("HM-2", "Bob", 3, 300)];
        let first_run = plan_detail_appends(&[], &bookings, "March");

        let second_run = plan_detail_appends(&first_run, &bookings, "March");
        assert!(second_run.is_empty());
    }

    #[test]
    fn guest_match_is_case_insensitive_and_month_scoped() {
        let existing = vec![vec![
            "march".to_string(),
            "ALICE".to_string(),
            "airbnb".to_string(),
        ]];
        let bookings = vec![booking("HM-1", "Alice", 5, 500)];

        // Same month + same guest, different spelling: already present.
        assert!(plan_detail_appends(&existing, &bookings, "March").is_empty());

        // Same guest in a different month's rows does not block the append.
        assert_eq!(plan_detail_appends(&existing, &bookings, "April").len(), 1);
    }

    #[test]
    fn booking_code_match_blocks_append_even_if_guest_changed() {
        let existing = vec![vec![
            "March".to_string(),
            "A. Smith".to_string(),
            "airbnb".to_string(),
            "2025-03-10".to_string(),
            "2025-03-15".to_string(),
            "5".to_string(),
            "500".to_string(),
            "HM-1".to_string(),
        ]];
        let bookings = vec![booking("HM-1", "Alice Smith", 5, 500)];

        assert!(plan_detail_appends(&existing, &bookings, "March").is_empty());
    }

    #[test]
    fn currency_formatting_matches_the_ledger_convention() {
        assert_eq!(format_currency(Decimal::ZERO), "");
        assert_eq!(format_currency(Decimal::from(5)), "$5.00");
        assert_eq!(format_currency(Decimal::from_str_exact("1234.5").unwrap()), "$1,234.50");
        assert_eq!(
            format_currency(Decimal::from_str_exact("1234567.891").unwrap()),
            "$1,234,567.89"
        );
        assert_eq!(format_currency(Decimal::from(-950)), "-$950.00");
    }
}
