use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Materials,
    Labor,
    Equipment,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 4] = [
        ExpenseCategory::Materials,
        ExpenseCategory::Labor,
        ExpenseCategory::Equipment,
        ExpenseCategory::Other,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaidBy {
    Owner,
    Contractor,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Expense {
    pub id: Uuid,
    pub project_id: Uuid,
    pub amount: f64,
    pub vendor: Option<String>,
    pub date: NaiveDate,
    pub category: ExpenseCategory,
    pub description: Option<String>,
    pub paid_by: PaidBy,
    pub receipt_photo_url: Option<String>,
    pub added_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const EXPENSE_COLUMNS: &str = "id, project_id, amount, vendor, date, category, description, paid_by, receipt_photo_url, added_by, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExpenseCreateRequest {
    pub project_id: Uuid,
    #[schema(example = 420.75)]
    pub amount: f64,
    #[schema(example = "Home Depot")]
    pub vendor: Option<String>,
    #[schema(example = "2025-03-14", value_type = String, format = Date)]
    pub date: NaiveDate,
    pub category: ExpenseCategory,
    pub description: Option<String>,
    pub paid_by: PaidBy,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExpenseUpdateRequest {
    pub amount: Option<f64>,
    pub vendor: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub date: Option<NaiveDate>,
    pub category: Option<ExpenseCategory>,
    pub description: Option<String>,
    pub paid_by: Option<PaidBy>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpenseFilter {
    pub paid_by: Option<PaidBy>,
    pub category: Option<ExpenseCategory>,
    /// Restrict to expenses added by this contractor or its employees.
    pub contractor_id: Option<Uuid>,
}
