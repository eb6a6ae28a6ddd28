use std::collections::BTreeMap;

use serde::Serialize;

use crate::feed::client::FeedBooking;
use crate::models::booking::Booking;

/// A matched booking whose upstream and internal records disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedBooking {
    pub booking_code: String,

    /// Names of the fields that differ
    pub fields: Vec<&'static str>,
}

/// Result of diffing the upstream feed against the internal store.
///
/// Produced for operator review before trusting a sync; the comparison
/// itself mutates nothing on either side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonReport {
    /// Booking codes present on both sides
    pub matched: Vec<String>,

    /// Codes only the upstream feed knows - usually sync lag
    pub external_only: Vec<String>,

    /// Codes only the internal store knows - typically manual entries
    pub internal_only: Vec<String>,

    /// Matched codes whose records disagree
    pub changed: Vec<ChangedBooking>,
}

/// Compares two booking collections keyed by booking code.
///
/// `changed` flags pairs differing in guest name, stay dates, total
/// amount, or platform. Output vectors are sorted by code so reports are
/// stable across runs.
pub fn compare(external: &[FeedBooking], internal: &[Booking]) -> ComparisonReport {
    let external_by_code: BTreeMap<&str, &FeedBooking> = external
        .iter()
        .map(|b| (b.booking_code.as_str(), b))
        .collect();
    let internal_by_code: BTreeMap<&str, &Booking> = internal
        .iter()
        .map(|b| (b.booking_code.as_str(), b))
        .collect();

    let mut report = ComparisonReport::default();

    for (code, feed_booking) in &external_by_code {
        match internal_by_code.get(code) {
            Some(stored) => {
                report.matched.push((*code).to_string());
                let fields = changed_fields(feed_booking, stored);
                if !fields.is_empty() {
                    report.changed.push(ChangedBooking {
                        booking_code: (*code).to_string(),
                        fields,
                    });
                }
            }
            None => report.external_only.push((*code).to_string()),
        }
    }

    for code in internal_by_code.keys() {
        if !external_by_code.contains_key(code) {
            report.internal_only.push((*code).to_string());
        }
    }

    report
}

fn changed_fields(external: &FeedBooking, internal: &Booking) -> Vec<&'static str> {
    let mut fields = Vec::new();

    if external.guest_name != internal.guest_name {
        fields.push("guest_name");
    }
    if external.check_in != Some(internal.check_in) {
        fields.push("check_in");
    }
    if external.check_out != Some(internal.check_out) {
        fields.push("check_out");
    }
    if external.total_amount() != internal.total_amount {
        fields.push("total_amount");
    }
    if external.platform != internal.platform {
        fields.push("platform");
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn feed_booking(code: &str, guest: &str, amount: i64) -> FeedBooking {
        FeedBooking {
            booking_code: code.to_string(),
            guest_name: guest.to_string(),
            platform: "airbnb".to_string(),
            check_in: Some(date(2025, 3, 10)),
            check_out: Some(date(2025, 3, 15)),
            base_amount: Decimal::from(amount),
            extras_amount: Decimal::ZERO,
            cleaning_fee: Decimal::ZERO,
        }
    }

    fn stored_booking(code: &str, guest: &str, amount: i64) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            booking_code: code.to_string(),
            property_id: Uuid::new_v4(),
            guest_name: guest.to_string(),
            platform: "airbnb".to_string(),
            check_in: date(2025, 3, 10),
            check_out: date(2025, 3, 15),
            total_amount: Decimal::from(amount),
            cleaning_fee: Decimal::ZERO,
            total_nights: 5,
            nightly_rate: Decimal::from(amount) / Decimal::from(5),
            cleaning_fee_month: "2025-03".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn identical_sets_produce_no_discrepancies() {
        let external = vec![feed_booking("HM-1", "Alice", 500), feed_booking("HM-2", "Bob", 300)];
        let internal = vec![stored_booking("HM-1", "Alice", 500), stored_booking("HM-2", "Bob", 300)];

        let report = compare(&external, &internal);

        assert_eq!(report.matched, vec!["HM-1", "HM-2"]);
        assert!(report.external_only.is_empty());
        assert!(report.internal_only.is_empty());
        assert!(report.changed.is_empty());
    }

    #[test]
    fn one_sided_codes_are_classified() {
        let external = vec![feed_booking("HM-1", "Alice", 500), feed_booking("HM-9", "Carol", 200)];
        let internal = vec![stored_booking("HM-1", "Alice", 500), stored_booking("MAN-1", "Dave", 150)];

        let report = compare(&external, &internal);

        assert_eq!(report.matched, vec!["HM-1"]);
        assert_eq!(report.external_only, vec!["HM-9"]);
        assert_eq!(report.internal_only, vec!["MAN-1"]);
    }

    #[test]
    fn differing_fields_are_named() {
        let mut external = vec![feed_booking("HM-1", "Alice", 500)];
        external[0].check_out = Some(date(2025, 3, 16));
        let internal = vec![stored_booking("HM-1", "Alicia", 480)];

        let report = compare(&external, &internal);

        assert_eq!(report.changed.len(), 1);
        let change = &report.changed[0];
        assert_eq!(change.booking_code, "HM-1");
        assert!(change.fields.contains(&"guest_name"));
        assert!(change.fields.contains(&"check_out"));
        assert!(change.fields.contains(&"total_amount"));
        assert!(!change.fields.contains(&"platform"));
    }

    #[test]
    fn missing_upstream_dates_count_as_changed() {
        let mut external = vec![feed_booking("HM-1", "Alice", 500)];
        external[0].check_in = None;
        let internal = vec![stored_booking("HM-1", "Alice", 500)];

        let report = compare(&external, &internal);

        assert_eq!(report.changed.len(), 1);
        assert!(report.changed[0].fields.contains(&"check_in"));
    }
}
