use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Actor, Operation, Resource, Role};
use crate::errors::{AppError, AppResult};
use crate::extract::FormData;
use crate::jwt::AuthUser;
use crate::models::work_log::{EmployeeHours, ProjectHours, WeeklySummary, WorkLog, WorkLogQuery, WORK_LOG_COLUMNS};
use crate::storage::{BlobCategory, Upload};
use crate::utils::utc_now;
use crate::workflow::{ensure_can_check_in, round_hours, week_start, WorkLogState};

#[utoipa::path(
    post,
    path = "/work-logs/check-in",
    tag = "Work Logs",
    request_body(
        content_type = "multipart/form-data",
        description = "`project_id`, optional `latitude`, `longitude` and `photo`"
    ),
    responses(
        (status = 201, description = "Checked in", body = WorkLog),
        (status = 403, description = "Employee is not assigned to the project"),
        (status = 409, description = "Already checked in to this project")
    )
)]
pub async fn check_in(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<WorkLog>)> {
    let mut form = FormData::read(multipart, "photo").await?;
    let project_id = form.uuid("project_id")?;
    let latitude = form.coordinate("latitude")?;
    let longitude = form.coordinate("longitude")?;

    let project = state.resolver().project(&auth.actor, project_id).await?;
    state.authorize(&auth.actor, Operation::Create, Resource::WorkLogs(project))?;

    let open = open_session(&state.pool, auth.user_id(), project_id).await?;
    ensure_can_check_in(open.is_some())?;

    let photo = form
        .file
        .take()
        .map(|file| Upload::new(BlobCategory::CheckIns, &file.file_name, file.bytes))
        .transpose()?;

    let now = utc_now();
    let work_log_id = Uuid::new_v4();

    let inserted = sqlx::query(
        "INSERT INTO work_logs (id, employee_id, project_id, check_in_time, check_in_latitude, check_in_longitude, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(work_log_id)
    .bind(auth.user_id())
    .bind(project_id)
    .bind(now)
    .bind(latitude)
    .bind(longitude)
    .bind(now)
    .execute(&state.pool)
    .await;

    match inserted {
        Ok(_) => {}
        // a concurrent check-in won the partial unique index
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            return Err(AppError::invalid_state("work log", WorkLogState::Open, "check in"));
        }
        Err(err) => return Err(err.into()),
    }

    // stored only once the session row exists, so a lost race leaves no blob
    if let Some(upload) = photo {
        let url = match state.blobs.put(BlobCategory::CheckIns, upload).await {
            Ok(url) => url,
            Err(err) => {
                // reopen the slot so the employee can retry
                sqlx::query("DELETE FROM work_logs WHERE id = ?")
                    .bind(work_log_id)
                    .execute(&state.pool)
                    .await?;
                return Err(err);
            }
        };
        sqlx::query("UPDATE work_logs SET check_in_photo_url = ? WHERE id = ?")
            .bind(&url)
            .bind(work_log_id)
            .execute(&state.pool)
            .await?;
    }

    tracing::info!(work_log_id = %work_log_id, employee_id = %auth.user_id(), project_id = %project_id, "checked in");
    Ok((StatusCode::CREATED, Json(fetch_work_log(&state.pool, work_log_id).await?)))
}

#[utoipa::path(
    post,
    path = "/work-logs/check-out",
    tag = "Work Logs",
    request_body(
        content_type = "multipart/form-data",
        description = "`work_log_id`, optional `latitude`, `longitude` and `photo`"
    ),
    responses(
        (status = 200, description = "Checked out; hours computed", body = WorkLog),
        (status = 409, description = "Already checked out")
    )
)]
pub async fn check_out(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<WorkLog>> {
    let mut form = FormData::read(multipart, "photo").await?;
    let work_log_id = form.uuid("work_log_id")?;
    let latitude = form.coordinate("latitude")?;
    let longitude = form.coordinate("longitude")?;

    let facts = state.resolver().work_log(&auth.actor, work_log_id).await?;
    state.authorize(&auth.actor, Operation::Transition, Resource::WorkLog(facts))?;

    let log = fetch_work_log(&state.pool, work_log_id).await?;
    let now = utc_now();
    let hours = WorkLogState::from_open(facts.open).check_out(log.check_in_time, now)?;

    let photo_url = match form.file.take() {
        Some(file) => {
            let upload = Upload::new(BlobCategory::CheckOuts, &file.file_name, file.bytes)?;
            Some(state.blobs.put(BlobCategory::CheckOuts, upload).await?)
        }
        None => None,
    };

    let updated = sqlx::query(
        "UPDATE work_logs SET check_out_time = ?, check_out_photo_url = ?, check_out_latitude = ?, check_out_longitude = ?, hours_worked = ? WHERE id = ? AND check_out_time IS NULL",
    )
    .bind(now)
    .bind(&photo_url)
    .bind(latitude)
    .bind(longitude)
    .bind(hours)
    .bind(work_log_id)
    .execute(&state.pool)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(AppError::invalid_state("work log", WorkLogState::Closed, "check out"));
    }

    tracing::info!(work_log_id = %work_log_id, hours_worked = hours, "checked out");
    Ok(Json(fetch_work_log(&state.pool, work_log_id).await?))
}

#[utoipa::path(
    get,
    path = "/work-logs",
    tag = "Work Logs",
    params(WorkLogQuery),
    responses((status = 200, description = "Work logs visible to the caller", body = [WorkLog]))
)]
pub async fn list_work_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<WorkLogQuery>,
) -> AppResult<Json<Vec<WorkLog>>> {
    let mut query = visible_logs(&auth.actor);
    if let Some(project_id) = filter.project_id {
        query.push(" AND project_id = ").push_bind(project_id);
    }
    if let Some(employee_id) = filter.employee_id {
        query.push(" AND employee_id = ").push_bind(employee_id);
    }
    query.push(" ORDER BY check_in_time DESC");

    let logs = query.build_query_as::<WorkLog>().fetch_all(&state.pool).await?;
    Ok(Json(logs))
}

#[utoipa::path(
    get,
    path = "/projects/{id}/work-logs",
    tag = "Work Logs",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Work logs on the project visible to the caller", body = [WorkLog]))
)]
pub async fn list_project_work_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<WorkLog>>> {
    let project = state.resolver().project(&auth.actor, project_id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::WorkLogs(project))?;

    let mut query = visible_logs(&auth.actor);
    query.push(" AND project_id = ").push_bind(project_id);
    query.push(" ORDER BY check_in_time DESC");

    let logs = query.build_query_as::<WorkLog>().fetch_all(&state.pool).await?;
    Ok(Json(logs))
}

#[utoipa::path(
    get,
    path = "/work-logs/{id}",
    tag = "Work Logs",
    params(("id" = Uuid, Path, description = "Work log id")),
    responses((status = 200, description = "Work log", body = WorkLog))
)]
pub async fn get_work_log(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<WorkLog>> {
    let facts = state.resolver().work_log(&auth.actor, id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::WorkLog(facts))?;

    Ok(Json(fetch_work_log(&state.pool, id).await?))
}

#[utoipa::path(
    get,
    path = "/work-logs/summary/weekly",
    tag = "Work Logs",
    responses(
        (status = 200, description = "Crew hours since the start of the week", body = WeeklySummary),
        (status = 403, description = "Caller is not a contractor")
    )
)]
pub async fn weekly_summary(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<WeeklySummary>> {
    state.authorize(&auth.actor, Operation::Read, Resource::Crew)?;

    let week_start = week_start(utc_now());
    let total = sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(SUM(wl.hours_worked), 0.0) FROM work_logs wl JOIN employees e ON e.user_id = wl.employee_id WHERE e.contractor_id = ? AND wl.check_in_time >= ?",
    )
    .bind(auth.user_id())
    .bind(week_start)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(WeeklySummary {
        week_start,
        total_hours: round_hours(total),
    }))
}

#[utoipa::path(
    get,
    path = "/work-logs/summary/by-employee",
    tag = "Work Logs",
    responses(
        (status = 200, description = "Hours per active crew member, highest first", body = [EmployeeHours]),
        (status = 403, description = "Caller is not a contractor")
    )
)]
pub async fn summary_by_employee(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<EmployeeHours>>> {
    state.authorize(&auth.actor, Operation::Read, Resource::Crew)?;

    let mut rows = sqlx::query_as::<_, EmployeeHours>(
        "SELECT e.user_id AS employee_id, u.name AS employee_name, COALESCE(SUM(wl.hours_worked), 0.0) AS total_hours \
         FROM employees e \
         JOIN users u ON u.id = e.user_id \
         LEFT JOIN work_logs wl ON wl.employee_id = e.user_id \
         WHERE e.contractor_id = ? AND e.is_active = 1 \
         GROUP BY e.user_id, u.name \
         ORDER BY total_hours DESC, u.name",
    )
    .bind(auth.user_id())
    .fetch_all(&state.pool)
    .await?;
    for row in &mut rows {
        row.total_hours = round_hours(row.total_hours);
    }

    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/work-logs/summary/by-project",
    tag = "Work Logs",
    responses(
        (status = 200, description = "Crew hours per assigned project, highest first", body = [ProjectHours]),
        (status = 403, description = "Caller is not a contractor")
    )
)]
pub async fn summary_by_project(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<ProjectHours>>> {
    state.authorize(&auth.actor, Operation::Read, Resource::Crew)?;

    // other contractors' crews on a shared project are not counted
    let mut rows = sqlx::query_as::<_, ProjectHours>(
        "SELECT p.id AS project_id, p.title AS project_title, COALESCE(SUM(wl.hours_worked), 0.0) AS total_hours \
         FROM project_contractors pc \
         JOIN projects p ON p.id = pc.project_id \
         LEFT JOIN work_logs wl ON wl.project_id = p.id \
             AND wl.employee_id IN (SELECT user_id FROM employees WHERE contractor_id = pc.contractor_id) \
         WHERE pc.contractor_id = ? \
         GROUP BY p.id, p.title \
         ORDER BY total_hours DESC, p.title",
    )
    .bind(auth.user_id())
    .fetch_all(&state.pool)
    .await?;
    for row in &mut rows {
        row.total_hours = round_hours(row.total_hours);
    }

    Ok(Json(rows))
}

/// Owners see logs on their projects, contractors their crew's logs and
/// employees their own.
fn visible_logs(actor: &Actor) -> QueryBuilder<'static, Sqlite> {
    let mut query = QueryBuilder::new(format!("SELECT {WORK_LOG_COLUMNS} FROM work_logs WHERE "));
    match actor.role {
        Role::Owner => {
            query.push("project_id IN (SELECT id FROM projects WHERE owner_id = ").push_bind(actor.id).push(")");
        }
        Role::Contractor => {
            query
                .push("employee_id IN (SELECT user_id FROM employees WHERE contractor_id = ")
                .push_bind(actor.id)
                .push(")");
        }
        Role::Employee => {
            query.push("employee_id = ").push_bind(actor.id);
        }
    }
    query
}

async fn open_session(pool: &SqlitePool, employee_id: Uuid, project_id: Uuid) -> AppResult<Option<Uuid>> {
    let open = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM work_logs WHERE employee_id = ? AND project_id = ? AND check_out_time IS NULL",
    )
    .bind(employee_id)
    .bind(project_id)
    .fetch_optional(pool)
    .await?;
    Ok(open)
}

async fn fetch_work_log(pool: &SqlitePool, work_log_id: Uuid) -> AppResult<WorkLog> {
    let sql = format!("SELECT {WORK_LOG_COLUMNS} FROM work_logs WHERE id = ?");
    sqlx::query_as::<_, WorkLog>(&sql)
        .bind(work_log_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("work log not found"))
}
