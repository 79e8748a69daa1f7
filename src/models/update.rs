use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum UpdateType {
    DailySummary,
    WeeklyPlan,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ProjectUpdate {
    pub id: Uuid,
    pub project_id: Uuid,
    pub update_type: UpdateType,
    pub content: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectUpdateCreateRequest {
    pub update_type: UpdateType,
    #[schema(example = "Framing finished on the north wall")]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ProjectPhoto {
    pub id: Uuid,
    pub project_id: Uuid,
    pub photo_url: String,
    pub caption: Option<String>,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}
