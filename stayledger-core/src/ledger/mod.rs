pub mod client;
pub mod expenses;
pub mod handlers;
pub mod layout;
pub mod sync;

pub use client::{LedgerApi, SheetsLedgerClient};
pub use expenses::{DbExpenses, ExpensesSource};
pub use layout::LedgerLayout;
pub use sync::{LedgerSyncService, SyncOutcome};
