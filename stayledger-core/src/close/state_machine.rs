use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

/// Month-end close status for a property/month.
///
/// The workflow advances draft -> ready -> complete, with single-step
/// reverts permitted in the other direction:
/// - Draft: month is still open; bookings may be edited freely
/// - Ready: operator declared the month closed for sync purposes
/// - Complete: a ledger sync run finished successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "lowercase")]
pub enum CloseStatus {
    #[sqlx(rename = "draft")]
    Draft,

    #[sqlx(rename = "ready")]
    Ready,

    #[sqlx(rename = "complete")]
    Complete,
}

impl fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseStatus::Draft => write!(f, "draft"),
            CloseStatus::Ready => write!(f, "ready"),
            CloseStatus::Complete => write!(f, "complete"),
        }
    }
}

impl CloseStatus {
    /// Revenue and ledger writes are only legal once the month has been
    /// declared ready (or has already completed a sync).
    pub fn allows_revenue_write(&self) -> bool {
        matches!(self, CloseStatus::Ready | CloseStatus::Complete)
    }
}

/// Whether `from -> to` is a legal edge of the close workflow.
///
/// Legal edges: draft->ready, ready->complete, and the single-step reverts
/// ready->draft and complete->ready. Skipping a step (draft->complete or
/// complete->draft) is never allowed, nor is re-asserting the current
/// status.
pub fn can_transition(from: CloseStatus, to: CloseStatus) -> bool {
    use CloseStatus::*;
    matches!(
        (from, to),
        (Draft, Ready) | (Ready, Complete) | (Ready, Draft) | (Complete, Ready)
    )
}

/// Validates a transition, returning a precondition error that echoes the
/// current status when the edge is illegal.
pub fn check_transition(from: CloseStatus, to: CloseStatus) -> Result<(), AppError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(AppError::precondition(
            format!("illegal status transition {} -> {}", from, to),
            from,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_legal() {
        assert!(can_transition(CloseStatus::Draft, CloseStatus::Ready));
        assert!(can_transition(CloseStatus::Ready, CloseStatus::Complete));
    }

    #[test]
    fn single_step_reverts_are_legal() {
        assert!(can_transition(CloseStatus::Ready, CloseStatus::Draft));
        assert!(can_transition(CloseStatus::Complete, CloseStatus::Ready));
    }

    #[test]
    fn skipping_a_step_is_rejected() {
        assert!(!can_transition(CloseStatus::Draft, CloseStatus::Complete));

        let err = check_transition(CloseStatus::Complete, CloseStatus::Draft)
            .expect_err("complete -> draft must be rejected");
        match err {
            AppError::Precondition { current, .. } => {
                assert_eq!(current, CloseStatus::Complete);
            }
            other => panic!("expected precondition error, got {:?}", other),
        }
    }

    #[test]
    fn reasserting_the_current_status_is_rejected() {
        assert!(!can_transition(CloseStatus::Ready, CloseStatus::Ready));
        assert!(check_transition(CloseStatus::Draft, CloseStatus::Draft).is_err());
    }

    #[test]
    fn revenue_writes_require_ready_or_complete() {
        assert!(!CloseStatus::Draft.allows_revenue_write());
        assert!(CloseStatus::Ready.allows_revenue_write());
        assert!(CloseStatus::Complete.allows_revenue_write());
    }
}
