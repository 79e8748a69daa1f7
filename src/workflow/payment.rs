use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::required_reason;
use crate::errors::{AppError, AppResult};

/// `Pending -> {Confirmed, Disputed}`. A confirmed payment is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Disputed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Disputed => "disputed",
        }
    }

    pub fn confirm(self) -> AppResult<Self> {
        match self {
            PaymentStatus::Pending => Ok(PaymentStatus::Confirmed),
            other => Err(AppError::invalid_state("payment", other, "confirm")),
        }
    }

    /// Returns the new state and the trimmed reason.
    pub fn dispute(self, reason: &str) -> AppResult<(Self, String)> {
        let reason = required_reason(reason, "dispute reason")?;
        match self {
            PaymentStatus::Pending => Ok((PaymentStatus::Disputed, reason)),
            other => Err(AppError::invalid_state("payment", other, "dispute")),
        }
    }

    pub fn ensure_editable(self) -> AppResult<()> {
        match self {
            PaymentStatus::Pending => Ok(()),
            other => Err(AppError::invalid_state("payment", other, "update")),
        }
    }

    /// Disputed payments may still be withdrawn.
    pub fn ensure_deletable(self) -> AppResult<()> {
        match self {
            PaymentStatus::Confirmed => Err(AppError::invalid_state("payment", self, "delete")),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
