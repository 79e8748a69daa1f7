use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::owner_email;
use crate::app::AppState;
use crate::authz::{Operation, Resource};
use crate::errors::AppResult;
use crate::extract::{ApiJson, FormData};
use crate::jwt::AuthUser;
use crate::models::update::{ProjectPhoto, ProjectUpdate, ProjectUpdateCreateRequest};
use crate::storage::{BlobCategory, Upload};
use crate::utils::{require_text, utc_now};

#[utoipa::path(
    post,
    path = "/projects/{id}/updates",
    tag = "Project Docs",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateCreateRequest,
    responses(
        (status = 201, description = "Update posted", body = ProjectUpdate),
        (status = 403, description = "Caller may not post updates")
    )
)]
pub async fn create_update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    ApiJson(payload): ApiJson<ProjectUpdateCreateRequest>,
) -> AppResult<(StatusCode, Json<ProjectUpdate>)> {
    let project = state.resolver().project(&auth.actor, project_id).await?;
    state.authorize(&auth.actor, Operation::Create, Resource::ProjectDocs(project))?;

    let content = require_text(&payload.content, "content")?;
    let update = ProjectUpdate {
        id: Uuid::new_v4(),
        project_id,
        update_type: payload.update_type,
        content,
        created_by: auth.user_id(),
        created_at: utc_now(),
    };

    sqlx::query(
        "INSERT INTO project_updates (id, project_id, update_type, content, created_by, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(update.id)
    .bind(update.project_id)
    .bind(update.update_type)
    .bind(&update.content)
    .bind(update.created_by)
    .bind(update.created_at)
    .execute(&state.pool)
    .await?;

    if auth.user_id() != project.owner_id {
        if let Some(owner) = owner_email(&state.pool, project_id).await {
            state.notifier.send_all([owner], "New project update", &update.content);
        }
    }

    Ok((StatusCode::CREATED, Json(update)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}/updates",
    tag = "Project Docs",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Updates, newest first", body = [ProjectUpdate]))
)]
pub async fn list_updates(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<ProjectUpdate>>> {
    let project = state.resolver().project(&auth.actor, project_id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::ProjectDocs(project))?;

    let updates = sqlx::query_as::<_, ProjectUpdate>(
        "SELECT id, project_id, update_type, content, created_by, created_at FROM project_updates WHERE project_id = ? ORDER BY created_at DESC",
    )
    .bind(project_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(updates))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/photos",
    tag = "Project Docs",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body(content_type = "multipart/form-data", description = "`photo` image file and optional `caption`"),
    responses(
        (status = 201, description = "Photo stored", body = ProjectPhoto),
        (status = 400, description = "Missing or unsupported file"),
        (status = 502, description = "Storage unavailable")
    )
)]
pub async fn upload_photo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ProjectPhoto>)> {
    let project = state.resolver().project(&auth.actor, project_id).await?;
    state.authorize(&auth.actor, Operation::Create, Resource::ProjectDocs(project))?;

    let mut form = FormData::read(multipart, "photo").await?;
    let caption = form.text("caption").map(str::to_string);
    let file = form.take_file("photo")?;
    let upload = Upload::new(BlobCategory::ProjectPhotos, &file.file_name, file.bytes)?;
    let photo_url = state.blobs.put(BlobCategory::ProjectPhotos, upload).await?;

    let photo = ProjectPhoto {
        id: Uuid::new_v4(),
        project_id,
        photo_url,
        caption,
        uploaded_by: auth.user_id(),
        created_at: utc_now(),
    };

    sqlx::query(
        "INSERT INTO project_photos (id, project_id, photo_url, caption, uploaded_by, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(photo.id)
    .bind(photo.project_id)
    .bind(&photo.photo_url)
    .bind(&photo.caption)
    .bind(photo.uploaded_by)
    .bind(photo.created_at)
    .execute(&state.pool)
    .await?;

    if auth.user_id() != project.owner_id {
        if let Some(owner) = owner_email(&state.pool, project_id).await {
            state.notifier.send_all(
                [owner],
                "New project photo",
                &format!("A new photo was added to your project: {}", photo.photo_url),
            );
        }
    }

    Ok((StatusCode::CREATED, Json(photo)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}/photos",
    tag = "Project Docs",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Photos, newest first", body = [ProjectPhoto]))
)]
pub async fn list_photos(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<ProjectPhoto>>> {
    let project = state.resolver().project(&auth.actor, project_id).await?;
    state.authorize(&auth.actor, Operation::Read, Resource::ProjectDocs(project))?;

    let photos = sqlx::query_as::<_, ProjectPhoto>(
        "SELECT id, project_id, photo_url, caption, uploaded_by, created_at FROM project_photos WHERE project_id = ? ORDER BY created_at DESC",
    )
    .bind(project_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(photos))
}
