use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A contractor's employee. `user_id` is the login account and the identity
/// used for project assignments and work logs.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Employee {
    pub id: Uuid,
    pub user_id: Uuid,
    pub contractor_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub hourly_rate: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const EMPLOYEE_COLUMNS: &str =
    "id, user_id, contractor_id, name, email, phone, hourly_rate, is_active, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmployeeCreateRequest {
    #[schema(example = "Sam Carter")]
    pub name: String,
    #[schema(example = "sam@example.com")]
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = 28.5)]
    pub hourly_rate: f64,
    /// Generated and mailed when omitted.
    pub initial_password: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmployeeUpdateRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub hourly_rate: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignProjectRequest {
    pub project_id: Uuid,
}
