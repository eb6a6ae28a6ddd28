//! StayLedger core: the month-end close pipeline for a short-term-rental
//! portfolio. Ingests bookings from the reservation platform, allocates
//! their value across calendar months, and synchronizes the totals into
//! per-property external ledgers, gated by a status workflow.

use std::sync::Arc;

use sqlx::PgPool;

pub mod allocation;
pub mod auth;
pub mod close;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod models;
pub mod reconcile;
pub mod store;

use crate::config::AppConfig;
use crate::feed::client::PlatformFeedClient;
use crate::ledger::client::SheetsLedgerClient;

/// Application state containing shared resources.
///
/// Everything here is constructed exactly once in `main` and handed to the
/// router; handlers and services receive their collaborators through it
/// rather than reaching for module-level state.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub db: PgPool,

    /// Reservation-platform feed client
    pub feed: PlatformFeedClient,

    /// Ledger (spreadsheet) API client
    pub ledger: SheetsLedgerClient,

    /// Environment-derived configuration
    pub config: Arc<AppConfig>,
}
