use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::ContractorSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub estimated_cost: f64,
    pub address: Option<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const PROJECT_COLUMNS: &str =
    "id, owner_id, title, description, estimated_cost, address, status, created_at, updated_at";

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub contractors: Vec<ContractorSummary>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "Kitchen remodel")]
    pub title: String,
    #[schema(example = "Replace cabinets and countertops")]
    pub description: Option<String>,
    #[schema(example = 25000.0)]
    pub estimated_cost: Option<f64>,
    #[schema(example = "12 Elm Street")]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub estimated_cost: Option<f64>,
    pub address: Option<String>,
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignContractorRequest {
    pub contractor_id: Uuid,
}
