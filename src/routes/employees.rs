use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::auth::normalize_email;
use crate::aggregate::{self, NewEmployee};
use crate::app::AppState;
use crate::authz::{Operation, Resource};
use crate::errors::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::jwt::AuthUser;
use crate::models::employee::{
    AssignProjectRequest, Employee, EmployeeCreateRequest, EmployeeUpdateRequest, EMPLOYEE_COLUMNS,
};
use crate::models::MessageResponse;
use crate::notify::Mail;
use crate::utils::{hash_password, random_token, require_text, utc_now};

const TEMP_PASSWORD_BYTES: usize = 6;

#[utoipa::path(
    post,
    path = "/employees",
    tag = "Employees",
    request_body = EmployeeCreateRequest,
    responses(
        (status = 201, description = "Employee account created", body = Employee),
        (status = 403, description = "Only contractors add employees"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<EmployeeCreateRequest>,
) -> AppResult<(StatusCode, Json<Employee>)> {
    state.authorize(&auth.actor, Operation::Create, Resource::Crew)?;

    let name = require_text(&payload.name, "name")?;
    let email = normalize_email(&payload.email)?;
    if payload.hourly_rate < 0.0 {
        return Err(AppError::validation("hourly_rate cannot be negative"));
    }

    let (password, generated) = match payload.initial_password {
        Some(password) => (password, false),
        None => (random_token(TEMP_PASSWORD_BYTES), true),
    };
    let password_hash = hash_password(&password)?;

    let employee = aggregate::onboard_employee(
        &state.pool,
        NewEmployee {
            contractor_id: auth.user_id(),
            name: &name,
            email: &email,
            phone: payload.phone.as_deref(),
            hourly_rate: payload.hourly_rate,
            password_hash: &password_hash,
        },
    )
    .await?;

    let mut body = format!(
        "Hi {name},\n\nYour contractor has added you to their crew. Sign in at {} with {email}.",
        state.config.app_url
    );
    if generated {
        body.push_str(&format!("\n\nTemporary password: {password}\nPlease change it after your first sign-in."));
    }
    state.notifier.send(Mail::new(email, "Welcome aboard", body));

    Ok((StatusCode::CREATED, Json(employee)))
}

#[utoipa::path(
    get,
    path = "/employees",
    tag = "Employees",
    responses((status = 200, description = "The caller's active employees", body = [Employee]))
)]
pub async fn list_employees(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Employee>>> {
    state.authorize(&auth.actor, Operation::Read, Resource::Crew)?;

    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE contractor_id = ? AND is_active = 1 ORDER BY name");
    let employees = sqlx::query_as::<_, Employee>(&sql)
        .bind(auth.user_id())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(employees))
}

#[utoipa::path(
    get,
    path = "/employees/{id}",
    tag = "Employees",
    params(("id" = Uuid, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Employee", body = Employee),
        (status = 404, description = "Employee not found")
    )
)]
pub async fn get_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Employee>> {
    let facts = state.resolver().employee(id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::Employee(facts))?;

    Ok(Json(fetch_employee(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/employees/{id}",
    tag = "Employees",
    params(("id" = Uuid, Path, description = "Employee id")),
    request_body = EmployeeUpdateRequest,
    responses((status = 200, description = "Employee updated", body = Employee))
)]
pub async fn update_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<EmployeeUpdateRequest>,
) -> AppResult<Json<Employee>> {
    let facts = state.resolver().employee(id).await?;
    state.authorize(&auth.actor, Operation::Update, Resource::Employee(facts))?;

    let mut employee = fetch_employee(&state.pool, id).await?;
    if let Some(name) = payload.name.as_deref() {
        employee.name = require_text(name, "name")?;
    }
    if payload.phone.is_some() {
        employee.phone = payload.phone;
    }
    if let Some(rate) = payload.hourly_rate {
        if rate < 0.0 {
            return Err(AppError::validation("hourly_rate cannot be negative"));
        }
        employee.hourly_rate = rate;
    }

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE employees SET name = ?, phone = ?, hourly_rate = ?, updated_at = ? WHERE id = ?")
        .bind(&employee.name)
        .bind(&employee.phone)
        .bind(employee.hourly_rate)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    // the login account carries the same contact details
    sqlx::query("UPDATE users SET name = ?, phone = ?, updated_at = ? WHERE id = ?")
        .bind(&employee.name)
        .bind(&employee.phone)
        .bind(now)
        .bind(employee.user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    employee.updated_at = now;
    Ok(Json(employee))
}

#[utoipa::path(
    delete,
    path = "/employees/{id}",
    tag = "Employees",
    params(("id" = Uuid, Path, description = "Employee id")),
    responses((status = 204, description = "Employee deactivated"))
)]
pub async fn delete_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let facts = state.resolver().employee(id).await?;
    state.authorize(&auth.actor, Operation::Delete, Resource::Employee(facts))?;

    // soft delete; an inactive employee resolves as unrelated everywhere
    sqlx::query("UPDATE employees SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    tracing::info!(employee_id = %id, "employee deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/employees/{id}/assign-project",
    tag = "Employees",
    params(("id" = Uuid, Path, description = "Employee id")),
    request_body = AssignProjectRequest,
    responses(
        (status = 200, description = "Employee assigned", body = MessageResponse),
        (status = 403, description = "Contractor is not on the project"),
        (status = 409, description = "Employee is deactivated")
    )
)]
pub async fn assign_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<AssignProjectRequest>,
) -> AppResult<Json<MessageResponse>> {
    let resolver = state.resolver();
    let facts = resolver.employee(id).await?;
    let project = resolver.project(&auth.actor, payload.project_id).await?;
    state.authorize(
        &auth.actor,
        Operation::Create,
        Resource::CrewAssignment {
            employee: facts,
            project,
        },
    )?;

    if !facts.is_active {
        return Err(AppError::invalid_state("employee", "inactive", "assign"));
    }

    sqlx::query("INSERT OR IGNORE INTO employee_projects (employee_id, project_id, assigned_at) VALUES (?, ?, ?)")
        .bind(facts.user_id)
        .bind(payload.project_id)
        .bind(utc_now())
        .execute(&state.pool)
        .await?;

    tracing::info!(employee_id = %id, project_id = %payload.project_id, "employee assigned to project");
    Ok(Json(MessageResponse::new("Employee assigned to project")))
}

async fn fetch_employee(pool: &SqlitePool, employee_id: Uuid) -> AppResult<Employee> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
    sqlx::query_as::<_, Employee>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("employee not found"))
}
