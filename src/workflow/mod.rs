//! Finite-state machines for contracts, estimates, payment summaries and
//! work logs. Transitions are pure: they validate against the current state
//! and return the next one (or `InvalidState`), leaving persistence to the
//! caller.

mod contract;
mod estimate;
mod payment;
mod worklog;

pub use contract::ContractStatus;
pub use estimate::{Approval, EstimateStatus};
pub use payment::PaymentStatus;
pub use worklog::{ensure_can_check_in, hours_worked, round_hours, week_start, WorkLogState};

use crate::errors::{AppError, AppResult};

/// Trims a free-text reason and rejects it when empty.
pub(crate) fn required_reason(reason: &str, field: &str) -> AppResult<String> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}
