use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::aggregate;
use crate::app::AppState;
use crate::authz::{Operation, Resource, Role};
use crate::errors::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::jwt::AuthUser;
use crate::models::contract::Contract;
use crate::models::project::{
    AssignContractorRequest, Project, ProjectCreateRequest, ProjectDetail, ProjectStatus, ProjectUpdateRequest,
    PROJECT_COLUMNS,
};
use crate::models::user::ContractorSummary;
use crate::models::MessageResponse;
use crate::utils::{require_text, utc_now};

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    responses((status = 200, description = "Projects visible to the caller", body = [Project]))
)]
pub async fn list_projects(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Project>>> {
    let sql = match auth.role() {
        Role::Owner => format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE owner_id = ? ORDER BY created_at DESC"),
        Role::Contractor => format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id IN (SELECT project_id FROM project_contractors WHERE contractor_id = ?) ORDER BY created_at DESC"
        ),
        Role::Employee => format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id IN (SELECT ep.project_id FROM employee_projects ep JOIN employees e ON e.user_id = ep.employee_id WHERE ep.employee_id = ? AND e.is_active = 1) ORDER BY created_at DESC"
        ),
    };

    let projects = sqlx::query_as::<_, Project>(&sql)
        .bind(auth.user_id())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = ProjectCreateRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 403, description = "Only owners create projects")
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    state.authorize(&auth.actor, Operation::Create, Resource::NewProject)?;

    let title = require_text(&payload.title, "title")?;
    let estimated_cost = payload.estimated_cost.unwrap_or(0.0);
    if estimated_cost < 0.0 {
        return Err(AppError::validation("estimated_cost cannot be negative"));
    }

    let now = utc_now();
    let project_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO projects (id, owner_id, title, description, estimated_cost, address, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(auth.user_id())
    .bind(&title)
    .bind(payload.description.as_deref().unwrap_or_default())
    .bind(estimated_cost)
    .bind(&payload.address)
    .bind(ProjectStatus::Draft)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let project = fetch_project(&state.pool, project_id).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail", body = ProjectDetail),
        (status = 403, description = "Caller is not related to the project"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProjectDetail>> {
    let facts = state.resolver().project(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::Project(facts))?;

    let project = fetch_project(&state.pool, id).await?;
    let contractors = fetch_contractors(&state.pool, id).await?;

    Ok(Json(ProjectDetail { project, contractors }))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses((status = 200, description = "Project updated", body = Project))
)]
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<ProjectUpdateRequest>,
) -> AppResult<Json<Project>> {
    let facts = state.resolver().project(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Update, Resource::Project(facts))?;

    let mut project = fetch_project(&state.pool, id).await?;

    if let Some(title) = payload.title.as_deref() {
        project.title = require_text(title, "title")?;
    }
    if let Some(description) = payload.description {
        project.description = description;
    }
    if let Some(cost) = payload.estimated_cost {
        if cost < 0.0 {
            return Err(AppError::validation("estimated_cost cannot be negative"));
        }
        project.estimated_cost = cost;
    }
    if payload.address.is_some() {
        project.address = payload.address;
    }
    if let Some(status) = payload.status {
        project.status = status;
    }

    let now = utc_now();

    sqlx::query(
        "UPDATE projects SET title = ?, description = ?, estimated_cost = ?, address = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&project.title)
    .bind(&project.description)
    .bind(project.estimated_cost)
    .bind(&project.address)
    .bind(project.status)
    .bind(now)
    .bind(project.id)
    .execute(&state.pool)
    .await?;

    project.updated_at = now;
    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 204, description = "Project and everything it owns deleted"))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let facts = state.resolver().project(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Delete, Resource::Project(facts))?;

    // contracts, expenses, payments, logs, photos and updates cascade
    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    tracing::info!(project_id = %id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/projects/{id}/contractors",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = AssignContractorRequest,
    responses(
        (status = 201, description = "Contractor assigned; pending contract activated or a new active one created", body = Contract),
        (status = 200, description = "Contractor was already assigned; current contract returned", body = Contract),
        (status = 409, description = "Contractor already completed a contract on this project")
    )
)]
pub async fn assign_contractor(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<AssignContractorRequest>,
) -> AppResult<(StatusCode, Json<Contract>)> {
    let facts = state.resolver().project(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Create, Resource::ProjectContractors(facts))?;

    let assignment = aggregate::assign_contractor(&state.pool, id, facts.owner_id, payload.contractor_id).await?;
    let status = if assignment.created { StatusCode::CREATED } else { StatusCode::OK };

    Ok((status, Json(assignment.contract)))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}/contractors/{contractor_id}",
    tag = "Projects",
    params(
        ("id" = Uuid, Path, description = "Project id"),
        ("contractor_id" = Uuid, Path, description = "Contractor user id")
    ),
    responses(
        (status = 200, description = "Contractor removed; contract terminated", body = MessageResponse),
        (status = 404, description = "Contractor not assigned")
    )
)]
pub async fn remove_contractor(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, contractor_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MessageResponse>> {
    let facts = state.resolver().project(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Delete, Resource::ProjectContractors(facts))?;

    aggregate::remove_contractor(&state.pool, id, contractor_id).await?;

    Ok(Json(MessageResponse::new("Contractor removed from project")))
}

#[utoipa::path(
    get,
    path = "/projects/{id}/contractors",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Assigned contractors", body = [ContractorSummary]))
)]
pub async fn list_project_contractors(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<ContractorSummary>>> {
    let facts = state.resolver().project(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::ProjectContractors(facts))?;

    Ok(Json(fetch_contractors(&state.pool, id).await?))
}

pub(crate) async fn fetch_project(pool: &SqlitePool, project_id: Uuid) -> AppResult<Project> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?");
    sqlx::query_as::<_, Project>(&sql)
        .bind(project_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("project not found"))
}

async fn fetch_contractors(pool: &SqlitePool, project_id: Uuid) -> AppResult<Vec<ContractorSummary>> {
    let contractors = sqlx::query_as::<_, ContractorSummary>(
        "SELECT u.id, u.name, u.email, u.phone FROM project_contractors pc JOIN users u ON u.id = pc.contractor_id WHERE pc.project_id = ? ORDER BY pc.assigned_at",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(contractors)
}
