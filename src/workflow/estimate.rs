use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::required_reason;
use crate::errors::{AppError, AppResult};

/// `Pending -> {Approved, Rejected}`; a decided estimate never returns to
/// pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EstimateStatus {
    Pending,
    Approved,
    Rejected,
}

/// Outcome of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    /// Approve now; when `activate` is set every sibling is deactivated in
    /// the same transaction.
    Apply { activate: bool },
    /// The same approval was already recorded; nothing to write.
    AlreadyApplied,
}

impl EstimateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateStatus::Pending => "pending",
            EstimateStatus::Approved => "approved",
            EstimateStatus::Rejected => "rejected",
        }
    }

    /// Approval is idempotent under retry: repeating the call that produced
    /// the current state is a no-op, anything else after a decision is
    /// refused.
    pub fn approve(self, is_active: bool, set_as_active: bool) -> AppResult<Approval> {
        match self {
            EstimateStatus::Pending => Ok(Approval::Apply {
                activate: set_as_active,
            }),
            EstimateStatus::Approved if is_active == set_as_active => Ok(Approval::AlreadyApplied),
            other => Err(AppError::invalid_state("estimate", other, "approve")),
        }
    }

    /// Returns the trimmed rejection reason.
    pub fn reject(self, reason: &str) -> AppResult<String> {
        let reason = required_reason(reason, "rejection reason")?;
        match self {
            EstimateStatus::Pending => Ok(reason),
            other => Err(AppError::invalid_state("estimate", other, "reject")),
        }
    }
}

impl fmt::Display for EstimateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::EstimateStatus::*;
    use super::*;

    #[test]
    fn pending_estimate_can_be_approved_with_or_without_activation() {
        assert_eq!(Pending.approve(false, true).unwrap(), Approval::Apply { activate: true });
        assert_eq!(Pending.approve(false, false).unwrap(), Approval::Apply { activate: false });
    }

    #[test]
    fn repeating_the_same_approval_is_a_no_op() {
        assert_eq!(Approved.approve(true, true).unwrap(), Approval::AlreadyApplied);
        assert_eq!(Approved.approve(false, false).unwrap(), Approval::AlreadyApplied);
    }

    #[test]
    fn decided_estimates_refuse_other_transitions() {
        assert!(matches!(Approved.approve(false, true), Err(AppError::InvalidState { .. })));
        assert!(matches!(Rejected.approve(false, false), Err(AppError::InvalidState { .. })));
        assert!(matches!(Approved.reject("late"), Err(AppError::InvalidState { .. })));
        assert!(matches!(Rejected.reject("again"), Err(AppError::InvalidState { .. })));
    }

    #[test]
    fn rejection_needs_a_reason() {
        assert!(matches!(Pending.reject("   "), Err(AppError::Validation(_))));
        assert_eq!(Pending.reject("  too expensive ").unwrap(), "too expensive");
    }
}
