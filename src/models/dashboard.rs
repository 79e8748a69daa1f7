use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Project totals as seen by the caller. Contractors and employees only see
/// their contractor's share of expenses and hours.
#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    pub project_id: Uuid,
    pub expenses: ExpenseTotals,
    pub payments: Option<PaymentTotals>,
    pub work: WorkTotals,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ExpenseTotals {
    pub total: f64,
    pub paid_by_owner: f64,
    pub paid_by_contractor: f64,
    pub materials: f64,
    pub labor: f64,
    pub equipment: f64,
    pub other: f64,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct PaymentTotals {
    pub pending: f64,
    pub confirmed: f64,
    pub disputed: f64,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct WorkTotals {
    pub hours_worked: f64,
    pub checked_in_now: i64,
}
