use axum::extract::{Path, State};
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Operation, Relation, Resource};
use crate::errors::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::jwt::AuthUser;
use crate::models::contract::{Contract, ContractStatusRequest, CONTRACT_COLUMNS};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/projects/{id}/contracts",
    tag = "Contracts",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Contracts on the project visible to the caller", body = [Contract]))
)]
pub async fn list_project_contracts(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<Contract>>> {
    let facts = state.resolver().project(&auth.actor, project_id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::ProjectContracts(facts))?;

    let contracts = match facts.relation {
        Relation::Owner => {
            let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE project_id = ? ORDER BY created_at DESC");
            sqlx::query_as::<_, Contract>(&sql)
                .bind(project_id)
                .fetch_all(&state.pool)
                .await?
        }
        // contractors see only their own contracts
        _ => {
            let sql = format!(
                "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE project_id = ? AND contractor_id = ? ORDER BY created_at DESC"
            );
            sqlx::query_as::<_, Contract>(&sql)
                .bind(project_id)
                .bind(auth.user_id())
                .fetch_all(&state.pool)
                .await?
        }
    };

    Ok(Json(contracts))
}

#[utoipa::path(
    get,
    path = "/contracts/{id}",
    tag = "Contracts",
    params(("id" = Uuid, Path, description = "Contract id")),
    responses(
        (status = 200, description = "Contract", body = Contract),
        (status = 404, description = "Contract not found")
    )
)]
pub async fn get_contract(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Contract>> {
    let facts = state.resolver().contract(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::Contract(facts))?;

    Ok(Json(fetch_contract(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/contracts/{id}/status",
    tag = "Contracts",
    params(("id" = Uuid, Path, description = "Contract id")),
    request_body = ContractStatusRequest,
    responses(
        (status = 200, description = "Contract moved to the requested status", body = Contract),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
pub async fn update_contract_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<ContractStatusRequest>,
) -> AppResult<Json<Contract>> {
    let facts = state.resolver().contract(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Transition, Resource::Contract(facts))?;

    let next = facts.status.request(payload.status)?;
    let now = utc_now();

    sqlx::query(
        "UPDATE contracts SET status = ?, end_date = CASE WHEN ? = 'completed' THEN ? ELSE end_date END, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(next)
    .bind(next)
    .bind(now.date_naive())
    .bind(now)
    .bind(id)
    .bind(facts.status)
    .execute(&state.pool)
    .await?;

    let contract = fetch_contract(&state.pool, id).await?;
    if contract.status != next {
        return Err(AppError::invalid_state("contract", contract.status, "update"));
    }

    tracing::info!(contract_id = %id, from = %facts.status, to = %next, "contract status changed");
    Ok(Json(contract))
}

pub(crate) async fn fetch_contract(pool: &SqlitePool, contract_id: Uuid) -> AppResult<Contract> {
    let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = ?");
    sqlx::query_as::<_, Contract>(&sql)
        .bind(contract_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("contract not found"))
}
