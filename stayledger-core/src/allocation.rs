use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// English month names, indexed by `month - 1`. Used for ledger row lookups.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Canonical year-month identifier used to bucket nights and revenue.
///
/// Every month-key in the system goes through this type: persistence,
/// allocation maps, and ledger lookups all format as zero-padded `YYYY-MM`.
/// Parsing accepts the legacy unpadded form (`2025-3`) and normalizes it,
/// so older stored keys still resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Builds a month-key, rejecting month numbers outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self, AppError> {
        if !(1..=12).contains(&month) {
            return Err(AppError::Validation(format!(
                "month number must be between 1 and 12, got {}",
                month
            )));
        }
        Ok(MonthKey { year, month })
    }

    /// The month-key of the calendar month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// English month name, as written in the ledger label column.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Validation(format!("malformed month key: {:?}", s));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.trim().parse().map_err(|_| invalid())?;
        let month: u32 = month.trim().parse().map_err(|_| invalid())?;
        MonthKey::new(year, month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-month breakdown of a booking's nights and revenue.
///
/// The maps partition the stay exactly: no night or unit of currency is
/// double-counted or dropped, and a stay confined to one calendar month
/// produces single-key maps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    /// Whole-night length of the stay (checkout exclusive).
    pub total_nights: i32,

    /// `(total_amount - cleaning_fee) / total_nights`, rounded to cents.
    pub nightly_rate: Decimal,

    /// Occupied nights per calendar month.
    pub nights_by_month: BTreeMap<MonthKey, i32>,

    /// Revenue per calendar month; sums to `total_amount` to the cent.
    pub revenue_by_month: BTreeMap<MonthKey, Decimal>,

    /// Month of the last occupied night; carries the full cleaning fee.
    pub cleaning_fee_month: MonthKey,
}

/// Splits a booking's stay and price across the calendar months it spans.
///
/// `total_amount` is the all-in price including the cleaning fee; the fee is
/// subtracted before the nightly rate is derived and re-added, whole, to the
/// month of the last occupied night. Monthly revenue is rounded to cents
/// with the final month taking the exact remainder, so the map always sums
/// back to `total_amount`.
///
/// # Errors
///
/// Returns a validation error when the stay does not cover at least one
/// whole night (`check_out <= check_in`). Nothing is persisted by this
/// function; callers reject the booking before any write.
pub fn allocate(
    check_in: NaiveDate,
    check_out: NaiveDate,
    total_amount: Decimal,
    cleaning_fee: Decimal,
) -> Result<Allocation, AppError> {
    let span = (check_out - check_in).num_days();
    let total_nights = i32::try_from(span)
        .map_err(|_| AppError::Validation("stay length out of range".to_string()))?;
    if total_nights < 1 {
        return Err(AppError::Validation(format!(
            "stay must cover at least one night (check-in {}, check-out {})",
            check_in, check_out
        )));
    }

    let base_total = total_amount - cleaning_fee;
    let nightly_rate = base_total / Decimal::from(total_nights);

    // Walk each occupied night; checkout day itself is not occupied.
    let mut nights_by_month: BTreeMap<MonthKey, i32> = BTreeMap::new();
    let mut night = check_in;
    while night < check_out {
        *nights_by_month.entry(MonthKey::from_date(night)).or_insert(0) += 1;
        night = night
            .succ_opt()
            .ok_or_else(|| AppError::Validation("check-out beyond calendar range".to_string()))?;
    }

    let last_night = check_out
        .pred_opt()
        .ok_or_else(|| AppError::Validation("check-out beyond calendar range".to_string()))?;
    let cleaning_fee_month = MonthKey::from_date(last_night);

    // Cent-rounded per month; the final month takes the exact remainder so
    // the base total reconciles without drift.
    let mut revenue_by_month: BTreeMap<MonthKey, Decimal> = BTreeMap::new();
    let keys: Vec<MonthKey> = nights_by_month.keys().copied().collect();
    let mut allocated = Decimal::ZERO;
    for (i, key) in keys.iter().enumerate() {
        let revenue = if i + 1 == keys.len() {
            base_total - allocated
        } else {
            (nightly_rate * Decimal::from(nights_by_month[key])).round_dp(2)
        };
        allocated += revenue;
        revenue_by_month.insert(*key, revenue);
    }

    // The cleaning fee is never split across months.
    if cleaning_fee != Decimal::ZERO {
        let entry = revenue_by_month
            .entry(cleaning_fee_month)
            .or_insert(Decimal::ZERO);
        *entry += cleaning_fee;
    }

    Ok(Allocation {
        total_nights,
        nightly_rate: nightly_rate.round_dp(2),
        nights_by_month,
        revenue_by_month,
        cleaning_fee_month,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    #[test]
    fn single_month_stay_allocates_to_one_key() {
        let alloc = allocate(date(2025, 3, 10), date(2025, 3, 15), dec("500"), dec("100"))
            .expect("allocation should succeed");

        let march: MonthKey = "2025-03".parse().unwrap();
        assert_eq!(alloc.total_nights, 5);
        assert_eq!(alloc.nightly_rate, dec("80"));
        assert_eq!(alloc.nights_by_month.len(), 1);
        assert_eq!(alloc.nights_by_month[&march], 5);
        assert_eq!(alloc.revenue_by_month.len(), 1);
        assert_eq!(alloc.revenue_by_month[&march], dec("500"));
        assert_eq!(alloc.cleaning_fee_month, march);
    }

    #[test]
    fn cross_month_stay_splits_nights_and_revenue() {
        let alloc = allocate(date(2025, 3, 29), date(2025, 4, 2), dec("400"), Decimal::ZERO)
            .expect("allocation should succeed");

        let march: MonthKey = "2025-03".parse().unwrap();
        let april: MonthKey = "2025-04".parse().unwrap();
        assert_eq!(alloc.total_nights, 4);
        assert_eq!(alloc.nights_by_month[&march], 3);
        assert_eq!(alloc.nights_by_month[&april], 1);
        assert_eq!(alloc.revenue_by_month[&march], dec("300"));
        assert_eq!(alloc.revenue_by_month[&april], dec("100"));
        assert_eq!(alloc.cleaning_fee_month, april);
    }

    #[test]
    fn cleaning_fee_lands_whole_in_the_checkout_month() {
        let alloc = allocate(date(2025, 1, 30), date(2025, 2, 2), dec("360"), dec("60"))
            .expect("allocation should succeed");

        let january: MonthKey = "2025-01".parse().unwrap();
        let february: MonthKey = "2025-02".parse().unwrap();
        // 3 nights at 100/night, fee rides on February (last night Feb 1).
        assert_eq!(alloc.cleaning_fee_month, february);
        assert_eq!(alloc.revenue_by_month[&january], dec("200"));
        assert_eq!(alloc.revenue_by_month[&february], dec("160"));
    }

    #[test]
    fn revenue_sums_to_total_amount_despite_rounding() {
        // 100 / 3 nights does not divide evenly.
        let alloc = allocate(date(2025, 5, 30), date(2025, 6, 2), dec("100"), Decimal::ZERO)
            .expect("allocation should succeed");

        let total: Decimal = alloc.revenue_by_month.values().copied().sum();
        assert_eq!(total, dec("100"));
        let nights: i32 = alloc.nights_by_month.values().copied().sum();
        assert_eq!(nights, alloc.total_nights);
    }

    #[test]
    fn year_boundary_stay_buckets_both_years() {
        let alloc = allocate(date(2024, 12, 30), date(2025, 1, 3), dec("400"), Decimal::ZERO)
            .expect("allocation should succeed");

        let december: MonthKey = "2024-12".parse().unwrap();
        let january: MonthKey = "2025-01".parse().unwrap();
        assert_eq!(alloc.nights_by_month[&december], 2);
        assert_eq!(alloc.nights_by_month[&january], 2);
    }

    #[test]
    fn zero_night_stay_is_rejected() {
        let err = allocate(date(2025, 3, 10), date(2025, 3, 10), dec("500"), Decimal::ZERO)
            .expect_err("zero nights must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn reversed_dates_are_rejected() {
        let err = allocate(date(2025, 3, 15), date(2025, 3, 10), dec("500"), Decimal::ZERO)
            .expect_err("negative span must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn month_key_formats_zero_padded() {
        let key = MonthKey::new(2025, 3).unwrap();
        assert_eq!(key.to_string(), "2025-03");
        assert_eq!(key.month_name(), "March");
    }

    #[test]
    fn month_key_parses_legacy_unpadded_form() {
        let padded: MonthKey = "2025-03".parse().unwrap();
        let unpadded: MonthKey = "2025-3".parse().unwrap();
        assert_eq!(padded, unpadded);
        assert_eq!(unpadded.to_string(), "2025-03");
    }

    #[test]
    fn month_key_rejects_garbage() {
        assert!("2025".parse::<MonthKey>().is_err());
        assert!("2025-13".parse::<MonthKey>().is_err());
        assert!("03-2025x".parse::<MonthKey>().is_err());
    }

    #[test]
    fn month_keys_order_chronologically() {
        let a: MonthKey = "2024-12".parse().unwrap();
        let b: MonthKey = "2025-01".parse().unwrap();
        let c: MonthKey = "2025-02".parse().unwrap();
        assert!(a < b && b < c);
    }
}
