use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{contractor_emails, owner_email};
use crate::app::AppState;
use crate::authz::{Operation, Relation, Resource};
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, FormData};
use crate::jwt::AuthUser;
use crate::models::expense::{
    Expense, ExpenseCreateRequest, ExpenseFilter, ExpenseUpdateRequest, EXPENSE_COLUMNS,
};
use crate::storage::{BlobCategory, Upload};
use crate::utils::{require_positive, utc_now};

#[utoipa::path(
    post,
    path = "/expenses",
    tag = "Expenses",
    request_body = ExpenseCreateRequest,
    responses(
        (status = 201, description = "Expense recorded", body = Expense),
        (status = 403, description = "Caller is not on the project")
    )
)]
pub async fn create_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<ExpenseCreateRequest>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    let project = state.resolver().project(&auth.actor, payload.project_id).await?;
    state.authorize(&auth.actor, Operation::Create, Resource::Expenses(project))?;

    let amount = require_positive(payload.amount, "amount")?;
    let now = utc_now();
    let expense_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO expenses (id, project_id, amount, vendor, date, category, description, paid_by, added_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(expense_id)
    .bind(payload.project_id)
    .bind(amount)
    .bind(&payload.vendor)
    .bind(payload.date)
    .bind(payload.category)
    .bind(&payload.description)
    .bind(payload.paid_by)
    .bind(auth.user_id())
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let expense = fetch_expense(&state.pool, expense_id).await?;

    let recipients = if project.relation == Relation::Owner {
        contractor_emails(&state.pool, payload.project_id).await
    } else {
        owner_email(&state.pool, payload.project_id).await.into_iter().collect()
    };
    state.notifier.send_all(
        recipients,
        "New expense recorded",
        &format!("An expense of ${:.2} was added to your project.", expense.amount),
    );

    Ok((StatusCode::CREATED, Json(expense)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}/expenses",
    tag = "Expenses",
    params(("id" = Uuid, Path, description = "Project id"), ExpenseFilter),
    responses((status = 200, description = "Expenses visible to the caller", body = [Expense]))
)]
pub async fn list_project_expenses(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Query(filter): Query<ExpenseFilter>,
) -> AppResult<Json<Vec<Expense>>> {
    let project = state.resolver().project(&auth.actor, project_id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::Expenses(project))?;

    // employees are pinned to their contractor's slice
    let slice = match project.relation {
        Relation::AssignedEmployee => project.contractor_slice,
        _ => filter.contractor_id,
    };

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE project_id = "));
    query.push_bind(project_id);
    if let Some(paid_by) = filter.paid_by {
        query.push(" AND paid_by = ").push_bind(paid_by);
    }
    if let Some(category) = filter.category {
        query.push(" AND category = ").push_bind(category);
    }
    if let Some(contractor_id) = slice {
        query
            .push(" AND (added_by = ")
            .push_bind(contractor_id)
            .push(" OR added_by IN (SELECT user_id FROM employees WHERE contractor_id = ")
            .push_bind(contractor_id)
            .push("))");
    }
    query.push(" ORDER BY date DESC, created_at DESC");

    let expenses = query.build_query_as::<Expense>().fetch_all(&state.pool).await?;
    Ok(Json(expenses))
}

#[utoipa::path(
    get,
    path = "/expenses/{id}",
    tag = "Expenses",
    params(("id" = Uuid, Path, description = "Expense id")),
    responses((status = 200, description = "Expense", body = Expense))
)]
pub async fn get_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Expense>> {
    let facts = state.resolver().expense(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::Expense(facts))?;

    Ok(Json(fetch_expense(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/expenses/{id}",
    tag = "Expenses",
    params(("id" = Uuid, Path, description = "Expense id")),
    request_body = ExpenseUpdateRequest,
    responses((status = 200, description = "Expense updated", body = Expense))
)]
pub async fn update_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<ExpenseUpdateRequest>,
) -> AppResult<Json<Expense>> {
    let facts = state.resolver().expense(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Update, Resource::Expense(facts))?;

    let mut expense = fetch_expense(&state.pool, id).await?;
    if let Some(amount) = payload.amount {
        expense.amount = require_positive(amount, "amount")?;
    }
    if payload.vendor.is_some() {
        expense.vendor = payload.vendor;
    }
    if let Some(date) = payload.date {
        expense.date = date;
    }
    if let Some(category) = payload.category {
        expense.category = category;
    }
    if payload.description.is_some() {
        expense.description = payload.description;
    }
    if let Some(paid_by) = payload.paid_by {
        expense.paid_by = paid_by;
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE expenses SET amount = ?, vendor = ?, date = ?, category = ?, description = ?, paid_by = ?, updated_at = ? WHERE id = ?",
    )
    .bind(expense.amount)
    .bind(&expense.vendor)
    .bind(expense.date)
    .bind(expense.category)
    .bind(&expense.description)
    .bind(expense.paid_by)
    .bind(now)
    .bind(id)
    .execute(&state.pool)
    .await?;

    expense.updated_at = now;
    Ok(Json(expense))
}

#[utoipa::path(
    delete,
    path = "/expenses/{id}",
    tag = "Expenses",
    params(("id" = Uuid, Path, description = "Expense id")),
    responses((status = 204, description = "Expense deleted"))
)]
pub async fn delete_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let facts = state.resolver().expense(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Delete, Resource::Expense(facts))?;

    sqlx::query("DELETE FROM expenses WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/expenses/{id}/receipt",
    tag = "Expenses",
    params(("id" = Uuid, Path, description = "Expense id")),
    request_body(content_type = "multipart/form-data", description = "`receipt` image file"),
    responses(
        (status = 200, description = "Receipt attached", body = Expense),
        (status = 502, description = "Storage unavailable")
    )
)]
pub async fn upload_receipt(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<Expense>> {
    let facts = state.resolver().expense(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Update, Resource::Expense(facts))?;

    let mut form = FormData::read(multipart, "receipt").await?;
    let file = form.take_file("receipt")?;
    let upload = Upload::new(BlobCategory::Receipts, &file.file_name, file.bytes)?;
    let url = state.blobs.put(BlobCategory::Receipts, upload).await?;

    sqlx::query("UPDATE expenses SET receipt_photo_url = ?, updated_at = ? WHERE id = ?")
        .bind(&url)
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    Ok(Json(fetch_expense(&state.pool, id).await?))
}

async fn fetch_expense(pool: &SqlitePool, expense_id: Uuid) -> AppResult<Expense> {
    let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?");
    sqlx::query_as::<_, Expense>(&sql)
        .bind(expense_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("expense not found"))
}
