pub mod client;
pub mod handlers;
pub mod ingest;

pub use client::{FeedBooking, FeedPage, PlatformFeedClient, ReservationFeed};
pub use ingest::{ingest_bookings, IngestReport};
