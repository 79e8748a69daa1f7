use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::workflow::{ContractStatus, EstimateStatus};

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Contract {
    pub id: Uuid,
    pub project_id: Uuid,
    pub contractor_id: Uuid,
    pub owner_id: Uuid,
    pub status: ContractStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub terms: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const CONTRACT_COLUMNS: &str =
    "id, project_id, contractor_id, owner_id, status, start_date, end_date, terms, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContractStatusRequest {
    pub status: ContractStatus,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Estimate {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub amount: f64,
    pub description: String,
    pub submitted_by: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub status: EstimateStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ESTIMATE_COLUMNS: &str = "id, contract_id, amount, description, submitted_by, submitted_at, status, approved_by, approved_at, rejected_at, rejection_reason, is_active, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct EstimateCreateRequest {
    #[schema(example = 18500.0)]
    pub amount: f64,
    #[schema(example = "Materials and labour for phase one")]
    pub description: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ApproveEstimateRequest {
    #[serde(default)]
    pub set_as_active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectEstimateRequest {
    #[schema(example = "Over budget")]
    pub reason: String,
}
