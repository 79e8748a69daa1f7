use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::workflow::PaymentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Zelle,
    Paypal,
    CashApp,
    Venmo,
    Other,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PaymentSummary {
    pub id: Uuid,
    pub project_id: Uuid,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub screenshot_url: Option<String>,
    pub notes: Option<String>,
    pub added_by: Uuid,
    pub status: PaymentStatus,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub disputed_at: Option<DateTime<Utc>>,
    pub dispute_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const PAYMENT_COLUMNS: &str = "id, project_id, amount, payment_method, payment_date, screenshot_url, notes, added_by, status, confirmed_by, confirmed_at, disputed_at, dispute_reason, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentCreateRequest {
    #[schema(example = 500.0)]
    pub amount: f64,
    pub payment_method: PaymentMethod,
    #[schema(example = "2025-03-14", value_type = String, format = Date)]
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentUpdateRequest {
    pub amount: Option<f64>,
    pub payment_method: Option<PaymentMethod>,
    #[schema(value_type = Option<String>, format = Date)]
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DisputePaymentRequest {
    #[schema(example = "amount mismatch")]
    pub reason: String,
}
