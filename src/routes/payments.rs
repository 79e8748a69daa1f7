use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{contractor_emails, owner_email};
use crate::app::AppState;
use crate::authz::{Operation, Resource};
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, FormData};
use crate::jwt::AuthUser;
use crate::models::payment::{
    DisputePaymentRequest, PaymentCreateRequest, PaymentSummary, PaymentUpdateRequest, PAYMENT_COLUMNS,
};
use crate::storage::{BlobCategory, Upload};
use crate::utils::{require_positive, utc_now};
use crate::workflow::PaymentStatus;

#[utoipa::path(
    post,
    path = "/projects/{id}/payments",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = PaymentCreateRequest,
    responses(
        (status = 201, description = "Payment recorded as pending", body = PaymentSummary),
        (status = 403, description = "Only the project owner records payments")
    )
)]
pub async fn create_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    ApiJson(payload): ApiJson<PaymentCreateRequest>,
) -> AppResult<(StatusCode, Json<PaymentSummary>)> {
    let project = state.resolver().project(&auth.actor, project_id).await?;
    state.authorize(&auth.actor, Operation::Create, Resource::Payments(project))?;

    let amount = require_positive(payload.amount, "amount")?;
    let now = utc_now();
    let payment_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO payment_summaries (id, project_id, amount, payment_method, payment_date, notes, added_by, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payment_id)
    .bind(project_id)
    .bind(amount)
    .bind(payload.payment_method)
    .bind(payload.payment_date)
    .bind(&payload.notes)
    .bind(auth.user_id())
    .bind(PaymentStatus::Pending)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let payment = fetch_payment(&state.pool, payment_id).await?;

    state.notifier.send_all(
        contractor_emails(&state.pool, project_id).await,
        "Payment recorded",
        &format!(
            "A payment of ${:.2} dated {} was recorded. Please confirm or dispute it.",
            payment.amount, payment.payment_date
        ),
    );

    tracing::info!(payment_id = %payment_id, project_id = %project_id, "payment recorded");
    Ok((StatusCode::CREATED, Json(payment)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}/payments",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Payments on the project", body = [PaymentSummary]))
)]
pub async fn list_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<PaymentSummary>>> {
    let project = state.resolver().project(&auth.actor, project_id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::Payments(project))?;

    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payment_summaries WHERE project_id = ? ORDER BY payment_date DESC, created_at DESC");
    let payments = sqlx::query_as::<_, PaymentSummary>(&sql)
        .bind(project_id)
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(payments))
}

#[utoipa::path(
    put,
    path = "/payments/{id}",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Payment id")),
    request_body = PaymentUpdateRequest,
    responses(
        (status = 200, description = "Payment updated", body = PaymentSummary),
        (status = 409, description = "Only pending payments can be edited")
    )
)]
pub async fn update_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<PaymentUpdateRequest>,
) -> AppResult<Json<PaymentSummary>> {
    let facts = state.resolver().payment(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Update, Resource::Payment(facts))?;
    facts.status.ensure_editable()?;

    let mut payment = fetch_payment(&state.pool, id).await?;
    if let Some(amount) = payload.amount {
        payment.amount = require_positive(amount, "amount")?;
    }
    if let Some(method) = payload.payment_method {
        payment.payment_method = method;
    }
    if let Some(date) = payload.payment_date {
        payment.payment_date = date;
    }
    if payload.notes.is_some() {
        payment.notes = payload.notes;
    }

    let now = utc_now();
    let updated = sqlx::query(
        "UPDATE payment_summaries SET amount = ?, payment_method = ?, payment_date = ?, notes = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(payment.amount)
    .bind(payment.payment_method)
    .bind(payment.payment_date)
    .bind(&payment.notes)
    .bind(now)
    .bind(id)
    .bind(PaymentStatus::Pending)
    .execute(&state.pool)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(lost_race(&state.pool, id, "edit").await);
    }

    payment.updated_at = now;
    Ok(Json(payment))
}

#[utoipa::path(
    delete,
    path = "/payments/{id}",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Payment id")),
    responses(
        (status = 204, description = "Payment deleted"),
        (status = 409, description = "Confirmed payments are permanent")
    )
)]
pub async fn delete_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let facts = state.resolver().payment(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Delete, Resource::Payment(facts))?;
    facts.status.ensure_deletable()?;

    let deleted = sqlx::query("DELETE FROM payment_summaries WHERE id = ? AND status != ?")
        .bind(id)
        .bind(PaymentStatus::Confirmed)
        .execute(&state.pool)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(lost_race(&state.pool, id, "delete").await);
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/payments/{id}/screenshot",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Payment id")),
    request_body(content_type = "multipart/form-data", description = "`screenshot` image file"),
    responses(
        (status = 200, description = "Screenshot attached", body = PaymentSummary),
        (status = 409, description = "Payment is no longer pending")
    )
)]
pub async fn upload_screenshot(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<PaymentSummary>> {
    let facts = state.resolver().payment(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Update, Resource::Payment(facts))?;
    facts.status.ensure_editable()?;

    let mut form = FormData::read(multipart, "screenshot").await?;
    let file = form.take_file("screenshot")?;
    let upload = Upload::new(BlobCategory::PaymentScreenshots, &file.file_name, file.bytes)?;
    let url = state.blobs.put(BlobCategory::PaymentScreenshots, upload).await?;

    sqlx::query("UPDATE payment_summaries SET screenshot_url = ?, updated_at = ? WHERE id = ?")
        .bind(&url)
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    Ok(Json(fetch_payment(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/payments/{id}/confirm",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment confirmed", body = PaymentSummary),
        (status = 409, description = "Payment already confirmed")
    )
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PaymentSummary>> {
    let facts = state.resolver().payment(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Transition, Resource::Payment(facts))?;
    let next = facts.status.confirm()?;

    let now = utc_now();
    let updated = sqlx::query(
        "UPDATE payment_summaries SET status = ?, confirmed_by = ?, confirmed_at = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(next)
    .bind(auth.user_id())
    .bind(now)
    .bind(now)
    .bind(id)
    .bind(facts.status)
    .execute(&state.pool)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(lost_race(&state.pool, id, "confirm").await);
    }

    let payment = fetch_payment(&state.pool, id).await?;
    if let Some(owner) = owner_email(&state.pool, payment.project_id).await {
        state.notifier.send_all(
            [owner],
            "Payment confirmed",
            &format!("Your payment of ${:.2} was confirmed by the contractor.", payment.amount),
        );
    }

    tracing::info!(payment_id = %id, "payment confirmed");
    Ok(Json(payment))
}

#[utoipa::path(
    post,
    path = "/payments/{id}/dispute",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Payment id")),
    request_body = DisputePaymentRequest,
    responses(
        (status = 200, description = "Payment disputed", body = PaymentSummary),
        (status = 400, description = "A reason is required"),
        (status = 409, description = "Payment is not pending")
    )
)]
pub async fn dispute_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<DisputePaymentRequest>,
) -> AppResult<Json<PaymentSummary>> {
    let facts = state.resolver().payment(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Transition, Resource::Payment(facts))?;
    let (next, reason) = facts.status.dispute(&payload.reason)?;

    let now = utc_now();
    let updated = sqlx::query(
        "UPDATE payment_summaries SET status = ?, disputed_at = ?, dispute_reason = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(next)
    .bind(now)
    .bind(&reason)
    .bind(now)
    .bind(id)
    .bind(facts.status)
    .execute(&state.pool)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(lost_race(&state.pool, id, "dispute").await);
    }

    let payment = fetch_payment(&state.pool, id).await?;
    if let Some(owner) = owner_email(&state.pool, payment.project_id).await {
        state.notifier.send_all(
            [owner],
            "Payment disputed",
            &format!("Your payment of ${:.2} was disputed: {reason}", payment.amount),
        );
    }

    tracing::info!(payment_id = %id, "payment disputed");
    Ok(Json(payment))
}

/// A guarded write matched nothing: the status moved underneath us, or the
/// row is gone.
async fn lost_race(pool: &SqlitePool, payment_id: Uuid, attempted: &'static str) -> AppError {
    let current = sqlx::query_scalar::<_, PaymentStatus>("SELECT status FROM payment_summaries WHERE id = ?")
        .bind(payment_id)
        .fetch_optional(pool)
        .await;

    match current {
        Ok(Some(status)) => AppError::invalid_state("payment", status, attempted),
        Ok(None) => AppError::not_found("payment not found"),
        Err(err) => err.into(),
    }
}

async fn fetch_payment(pool: &SqlitePool, payment_id: Uuid) -> AppResult<PaymentSummary> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payment_summaries WHERE id = ?");
    sqlx::query_as::<_, PaymentSummary>(&sql)
        .bind(payment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("payment not found"))
}
