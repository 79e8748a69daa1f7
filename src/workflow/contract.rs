use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

/// `Pending -> Active -> {Completed, Terminated}`; both end states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ContractStatus {
    Pending,
    Active,
    Completed,
    Terminated,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Pending => "pending",
            ContractStatus::Active => "active",
            ContractStatus::Completed => "completed",
            ContractStatus::Terminated => "terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Completed | ContractStatus::Terminated)
    }

    /// Estimates may only be submitted against a live contract.
    pub fn accepts_estimates(&self) -> bool {
        matches!(self, ContractStatus::Pending | ContractStatus::Active)
    }

    pub fn activate(self) -> AppResult<Self> {
        match self {
            ContractStatus::Pending => Ok(ContractStatus::Active),
            other => Err(AppError::invalid_state("contract", other, "activate")),
        }
    }

    pub fn complete(self) -> AppResult<Self> {
        match self {
            ContractStatus::Active => Ok(ContractStatus::Completed),
            other => Err(AppError::invalid_state("contract", other, "complete")),
        }
    }

    /// Removing the contractor from the project ends the contract. A contract
    /// that never became active is terminated as well.
    pub fn terminate(self) -> AppResult<Self> {
        match self {
            ContractStatus::Pending | ContractStatus::Active => Ok(ContractStatus::Terminated),
            other => Err(AppError::invalid_state("contract", other, "terminate")),
        }
    }

    /// Explicit status change requested by one of the parties. Termination
    /// only happens through contractor removal.
    pub fn request(self, target: ContractStatus) -> AppResult<Self> {
        match target {
            ContractStatus::Active => self.activate(),
            ContractStatus::Completed => self.complete(),
            ContractStatus::Pending => Err(AppError::invalid_state("contract", self, "reopen")),
            ContractStatus::Terminated => Err(AppError::invalid_state("contract", self, "terminate")),
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ContractStatus::*;
    use super::*;

    #[test]
    fn lifecycle_moves_forward_only() {
        assert_eq!(Pending.activate().unwrap(), Active);
        assert_eq!(Active.complete().unwrap(), Completed);
        assert_eq!(Active.terminate().unwrap(), Terminated);
        assert!(Pending.complete().is_err());
        assert!(Active.activate().is_err());
    }

    #[test]
    fn terminal_states_refuse_every_transition() {
        for state in [Completed, Terminated] {
            assert!(state.is_terminal());
            assert!(!state.accepts_estimates());
            for attempt in [state.activate(), state.complete(), state.terminate()] {
                assert!(matches!(attempt, Err(AppError::InvalidState { entity: "contract", .. })));
            }
        }
    }

    #[test]
    fn explicit_requests_cannot_terminate_or_reopen() {
        assert_eq!(Active.request(Completed).unwrap(), Completed);
        assert_eq!(Pending.request(Active).unwrap(), Active);
        match Active.request(Terminated) {
            Err(AppError::InvalidState { current, attempted, .. }) => {
                assert_eq!(current, "active");
                assert_eq!(attempted, "terminate");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(Active.request(Pending).is_err());
    }
}
