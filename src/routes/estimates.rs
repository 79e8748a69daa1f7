use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::aggregate;
use crate::app::AppState;
use crate::authz::{Operation, Resource};
use crate::errors::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::jwt::AuthUser;
use crate::models::contract::{
    ApproveEstimateRequest, Estimate, EstimateCreateRequest, RejectEstimateRequest, ESTIMATE_COLUMNS,
};
use crate::utils::{require_positive, require_text, utc_now};
use crate::workflow::EstimateStatus;

#[utoipa::path(
    post,
    path = "/contracts/{id}/estimates",
    tag = "Estimates",
    params(("id" = Uuid, Path, description = "Contract id")),
    request_body = EstimateCreateRequest,
    responses(
        (status = 201, description = "Estimate submitted", body = Estimate),
        (status = 409, description = "Contract no longer accepts estimates")
    )
)]
pub async fn create_estimate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(contract_id): Path<Uuid>,
    ApiJson(payload): ApiJson<EstimateCreateRequest>,
) -> AppResult<(StatusCode, Json<Estimate>)> {
    let contract = state.resolver().contract(&auth.actor, contract_id).await?;
    state.authorize(&auth.actor, Operation::Create, Resource::Estimate(contract))?;

    if !contract.status.accepts_estimates() {
        return Err(AppError::invalid_state("contract", contract.status, "submit estimate"));
    }
    let amount = require_positive(payload.amount, "amount")?;
    let description = require_text(&payload.description, "description")?;

    let now = utc_now();
    let estimate_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO estimates (id, contract_id, amount, description, submitted_by, submitted_at, status, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(estimate_id)
    .bind(contract_id)
    .bind(amount)
    .bind(&description)
    .bind(auth.user_id())
    .bind(now)
    .bind(EstimateStatus::Pending)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let estimate = fetch_estimate(&state.pool, estimate_id).await?;
    Ok((StatusCode::CREATED, Json(estimate)))
}

#[utoipa::path(
    get,
    path = "/contracts/{id}/estimates",
    tag = "Estimates",
    params(("id" = Uuid, Path, description = "Contract id")),
    responses((status = 200, description = "Estimates on the contract", body = [Estimate]))
)]
pub async fn list_estimates(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(contract_id): Path<Uuid>,
) -> AppResult<Json<Vec<Estimate>>> {
    let contract = state.resolver().contract(&auth.actor, contract_id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::Estimate(contract))?;

    let sql = format!("SELECT {ESTIMATE_COLUMNS} FROM estimates WHERE contract_id = ? ORDER BY submitted_at DESC");
    let estimates = sqlx::query_as::<_, Estimate>(&sql)
        .bind(contract_id)
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(estimates))
}

#[utoipa::path(
    post,
    path = "/estimates/{id}/approve",
    tag = "Estimates",
    params(("id" = Uuid, Path, description = "Estimate id")),
    request_body = ApproveEstimateRequest,
    responses(
        (status = 200, description = "Estimate approved", body = Estimate),
        (status = 409, description = "Estimate already decided")
    )
)]
pub async fn approve_estimate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<ApproveEstimateRequest>,
) -> AppResult<Json<Estimate>> {
    let facts = state.resolver().estimate(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Transition, Resource::Estimate(facts.contract))?;

    let estimate = aggregate::approve_estimate(&state.pool, id, auth.user_id(), payload.set_as_active).await?;
    Ok(Json(estimate))
}

#[utoipa::path(
    post,
    path = "/estimates/{id}/reject",
    tag = "Estimates",
    params(("id" = Uuid, Path, description = "Estimate id")),
    request_body = RejectEstimateRequest,
    responses(
        (status = 200, description = "Estimate rejected", body = Estimate),
        (status = 400, description = "Reason missing"),
        (status = 409, description = "Estimate already decided")
    )
)]
pub async fn reject_estimate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<RejectEstimateRequest>,
) -> AppResult<Json<Estimate>> {
    let facts = state.resolver().estimate(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Transition, Resource::Estimate(facts.contract))?;

    let reason = facts.status.reject(&payload.reason)?;
    let now = utc_now();

    let updated = sqlx::query(
        "UPDATE estimates SET status = 'rejected', rejected_at = ?, rejection_reason = ?, is_active = 0, updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(&reason)
    .bind(now)
    .bind(id)
    .execute(&state.pool)
    .await?
    .rows_affected();

    let estimate = fetch_estimate(&state.pool, id).await?;
    if updated == 0 {
        return Err(AppError::invalid_state("estimate", estimate.status, "reject"));
    }

    tracing::info!(estimate_id = %id, "estimate rejected");
    Ok(Json(estimate))
}

async fn fetch_estimate(pool: &SqlitePool, estimate_id: Uuid) -> AppResult<Estimate> {
    let sql = format!("SELECT {ESTIMATE_COLUMNS} FROM estimates WHERE id = ?");
    sqlx::query_as::<_, Estimate>(&sql)
        .bind(estimate_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("estimate not found"))
}
