use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::allocation::{Allocation, MonthKey};

/// Booking model representing a stay ingested from the reservation
/// platform or entered manually.
///
/// This struct maps to the `bookings` table. The per-month breakdown lives
/// in separate `booking_months` rows (see [`BookingMonth`]) so the
/// allocation can be aggregated in SQL during ledger syncs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    /// Unique identifier for the booking row
    pub id: Uuid,

    /// Reservation platform confirmation code; globally unique and
    /// immutable. Re-ingesting a seen code is a no-op, never an overwrite.
    pub booking_code: String,

    /// Property this booking belongs to
    pub property_id: Uuid,

    /// Guest display name as supplied by the platform
    pub guest_name: String,

    /// Source platform (e.g. "airbnb", "booking", "direct")
    pub platform: String,

    /// First occupied night
    pub check_in: NaiveDate,

    /// Checkout day (exclusive; not an occupied night)
    pub check_out: NaiveDate,

    /// All-in price, cleaning fee included
    pub total_amount: Decimal,

    /// Cleaning fee portion of `total_amount`
    pub cleaning_fee: Decimal,

    /// Derived: whole-night length of the stay
    pub total_nights: i32,

    /// Derived: `(total_amount - cleaning_fee) / total_nights`
    pub nightly_rate: Decimal,

    /// Derived: month-key of the last occupied night; carries the fee
    pub cleaning_fee_month: String,

    /// Timestamp when the booking was first persisted
    pub created_at: DateTime<Utc>,

    /// Timestamp when the booking was last updated
    pub updated_at: DateTime<Utc>,
}

/// One month's slice of a booking's allocation.
///
/// Maps to the `booking_months` table; rows are deleted and rewritten as a
/// whole whenever an edit recomputes the allocation, and cascade away with
/// their booking.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookingMonth {
    /// Unique identifier for the breakdown row
    pub id: Uuid,

    /// Owning booking
    pub booking_id: Uuid,

    /// Canonical `YYYY-MM` month key
    pub month_key: String,

    /// Occupied nights falling in this month
    pub nights: i32,

    /// Revenue attributed to this month (fee included for the fee month)
    pub revenue: Decimal,
}

/// Manual booking entry request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBooking {
    pub booking_code: String,
    pub property_id: Uuid,
    pub guest_name: String,
    pub platform: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_amount: Decimal,
    pub cleaning_fee: Decimal,
}

/// Booking edit request. Any field left unset keeps its current value;
/// the allocation is recomputed from scratch either way.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBooking {
    pub guest_name: Option<String>,
    pub platform: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub total_amount: Option<Decimal>,
    pub cleaning_fee: Option<Decimal>,
}

/// Booking response including the derived per-month maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub booking_code: String,
    pub property_id: Uuid,
    pub guest_name: String,
    pub platform: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_amount: Decimal,
    pub cleaning_fee: Decimal,
    pub total_nights: i32,
    pub nightly_rate: Decimal,
    pub cleaning_fee_month: String,
    pub nights_by_month: BTreeMap<MonthKey, i32>,
    pub revenue_by_month: BTreeMap<MonthKey, Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingResponse {
    /// Assembles the public representation from a booking row and its
    /// breakdown rows. Breakdown keys that fail to parse are skipped; they
    /// cannot occur for rows written through [`crate::allocation`].
    pub fn from_parts(booking: Booking, months: Vec<BookingMonth>) -> Self {
        let mut nights_by_month = BTreeMap::new();
        let mut revenue_by_month = BTreeMap::new();
        for row in months {
            if let Ok(key) = row.month_key.parse::<MonthKey>() {
                nights_by_month.insert(key, row.nights);
                revenue_by_month.insert(key, row.revenue);
            }
        }

        BookingResponse {
            id: booking.id,
            booking_code: booking.booking_code,
            property_id: booking.property_id,
            guest_name: booking.guest_name,
            platform: booking.platform,
            check_in: booking.check_in,
            check_out: booking.check_out,
            total_amount: booking.total_amount,
            cleaning_fee: booking.cleaning_fee,
            total_nights: booking.total_nights,
            nightly_rate: booking.nightly_rate,
            cleaning_fee_month: booking.cleaning_fee_month,
            nights_by_month,
            revenue_by_month,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }

    /// Same assembly, starting from a freshly computed allocation.
    pub fn from_allocation(booking: Booking, allocation: &Allocation) -> Self {
        let nights_by_month = allocation.nights_by_month.clone();
        let revenue_by_month = allocation.revenue_by_month.clone();

        BookingResponse {
            id: booking.id,
            booking_code: booking.booking_code,
            property_id: booking.property_id,
            guest_name: booking.guest_name,
            platform: booking.platform,
            check_in: booking.check_in,
            check_out: booking.check_out,
            total_amount: booking.total_amount,
            cleaning_fee: booking.cleaning_fee,
            total_nights: booking.total_nights,
            nightly_rate: booking.nightly_rate,
            cleaning_fee_month: booking.cleaning_fee_month,
            nights_by_month,
            revenue_by_month,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}
