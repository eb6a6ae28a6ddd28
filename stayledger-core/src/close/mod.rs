pub mod handlers;
pub mod state_machine;
pub mod types;

#[cfg(test)]
mod tests;

pub use state_machine::{can_transition, check_transition, CloseStatus};
pub use types::*;
