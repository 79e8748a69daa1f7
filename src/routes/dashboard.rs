use axum::extract::{Path, State};
use axum::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Operation, Relation, Resource};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::dashboard::{Dashboard, ExpenseTotals, PaymentTotals, WorkTotals};
use crate::models::expense::{ExpenseCategory, PaidBy};
use crate::workflow::{round_hours, PaymentStatus};

#[utoipa::path(
    get,
    path = "/projects/{id}/dashboard",
    tag = "Dashboard",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Totals visible to the caller", body = Dashboard),
        (status = 403, description = "Caller is not related to the project")
    )
)]
pub async fn project_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Dashboard>> {
    let project = state.resolver().project(&auth.actor, project_id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::Project(project))?;

    // owners see everything; everyone else sees their contractor's slice
    let slice = match project.relation {
        Relation::Owner => None,
        _ => project.contractor_slice,
    };

    let expenses = expense_totals(&state.pool, project_id, slice).await?;
    // payment totals only for callers allowed to read payments
    let payments = if state.permits(&auth.actor, Operation::Read, Resource::Payments(project)) {
        Some(payment_totals(&state.pool, project_id).await?)
    } else {
        None
    };
    let work = work_totals(&state.pool, project_id, slice).await?;

    Ok(Json(Dashboard {
        project_id,
        expenses,
        payments,
        work,
    }))
}

async fn expense_totals(pool: &SqlitePool, project_id: Uuid, slice: Option<Uuid>) -> AppResult<ExpenseTotals> {
    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT paid_by, category, COALESCE(SUM(amount), 0.0) FROM expenses WHERE project_id = ");
    query.push_bind(project_id);
    if let Some(contractor_id) = slice {
        query
            .push(" AND (added_by = ")
            .push_bind(contractor_id)
            .push(" OR added_by IN (SELECT user_id FROM employees WHERE contractor_id = ")
            .push_bind(contractor_id)
            .push("))");
    }
    query.push(" GROUP BY paid_by, category");

    let rows = query
        .build_query_as::<(PaidBy, ExpenseCategory, f64)>()
        .fetch_all(pool)
        .await?;

    let mut totals = ExpenseTotals::default();
    for (paid_by, category, amount) in rows {
        totals.total += amount;
        match paid_by {
            PaidBy::Owner => totals.paid_by_owner += amount,
            PaidBy::Contractor => totals.paid_by_contractor += amount,
        }
        match category {
            ExpenseCategory::Materials => totals.materials += amount,
            ExpenseCategory::Labor => totals.labor += amount,
            ExpenseCategory::Equipment => totals.equipment += amount,
            ExpenseCategory::Other => totals.other += amount,
        }
    }
    Ok(totals)
}

async fn payment_totals(pool: &SqlitePool, project_id: Uuid) -> AppResult<PaymentTotals> {
    let rows = sqlx::query_as::<_, (PaymentStatus, f64)>(
        "SELECT status, COALESCE(SUM(amount), 0.0) FROM payment_summaries WHERE project_id = ? GROUP BY status",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    let mut totals = PaymentTotals::default();
    for (status, amount) in rows {
        match status {
            PaymentStatus::Pending => totals.pending += amount,
            PaymentStatus::Confirmed => totals.confirmed += amount,
            PaymentStatus::Disputed => totals.disputed += amount,
        }
    }
    Ok(totals)
}

async fn work_totals(pool: &SqlitePool, project_id: Uuid, slice: Option<Uuid>) -> AppResult<WorkTotals> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT COALESCE(SUM(hours_worked), 0.0), COALESCE(SUM(CASE WHEN check_out_time IS NULL THEN 1 ELSE 0 END), 0) FROM work_logs WHERE project_id = ",
    );
    query.push_bind(project_id);
    if let Some(contractor_id) = slice {
        query
            .push(" AND employee_id IN (SELECT user_id FROM employees WHERE contractor_id = ")
            .push_bind(contractor_id)
            .push(")");
    }

    let (hours_worked, checked_in_now) = query.build_query_as::<(f64, i64)>().fetch_one(pool).await?;
    Ok(WorkTotals {
        hours_worked: round_hours(hours_worked),
        checked_in_now,
    })
}
