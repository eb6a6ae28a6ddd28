pub mod audit;
pub mod booking;
pub mod month_end;
pub mod property;

pub use audit::AuditLogEntry;
pub use booking::{Booking, BookingMonth, BookingResponse, CreateBooking, UpdateBooking};
pub use month_end::{MonthEndStatus, SyncSnapshot};
pub use property::Property;
