use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct WorkLog {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub project_id: Uuid,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub check_in_photo_url: Option<String>,
    pub check_out_photo_url: Option<String>,
    pub check_in_latitude: Option<f64>,
    pub check_in_longitude: Option<f64>,
    pub check_out_latitude: Option<f64>,
    pub check_out_longitude: Option<f64>,
    pub hours_worked: Option<f64>,
    pub created_at: DateTime<Utc>,
}

pub const WORK_LOG_COLUMNS: &str = "id, employee_id, project_id, check_in_time, check_out_time, check_in_photo_url, check_out_photo_url, check_in_latitude, check_in_longitude, check_out_latitude, check_out_longitude, hours_worked, created_at";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkLogQuery {
    pub project_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeeklySummary {
    pub week_start: DateTime<Utc>,
    pub total_hours: f64,
}

/// Hours per active crew member, all time.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct EmployeeHours {
    pub employee_id: Uuid,
    pub employee_name: String,
    pub total_hours: f64,
}

/// Hours the caller's crew logged per assigned project, all time.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct ProjectHours {
    pub project_id: Uuid,
    pub project_title: String,
    pub total_hours: f64,
}
