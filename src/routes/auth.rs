use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Duration;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Operation, Resource, Role};
use crate::errors::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::jwt::AuthUser;
use crate::models::user::{
    AuthResponse, ContractorSummary, DbUser, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetPasswordRequest, User, USER_COLUMNS,
};
use crate::models::MessageResponse;
use crate::notify::Mail;
use crate::utils::{hash_password, random_token, require_text, sha256_hex, utc_now, verify_password};

const RESET_TOKEN_BYTES: usize = 32;

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid input or employee self-registration"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    if payload.role == Role::Employee {
        return Err(AppError::validation("employees are added by their contractor"));
    }
    let name = require_text(&payload.name, "name")?;
    let email = normalize_email(&payload.email)?;
    ensure_email_available(&state.pool, &email).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, email, name, phone, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&email)
    .bind(&name)
    .bind(&payload.phone)
    .bind(password_hash)
    .bind(payload.role)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let db_user = fetch_user_by_id(&state.pool, user_id).await?;
    let user: User = db_user.try_into()?;
    let token = state.jwt.encode(user.id, user.role)?;

    tracing::info!(user_id = %user.id, role = %user.role, "user registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = payload.email.trim().to_lowercase();
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    let db_user = sqlx::query_as::<_, DbUser>(&sql)
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    // deactivated employees keep their account but may not sign in
    if db_user.role == Role::Employee && !employee_is_active(&state.pool, db_user.id).await? {
        return Err(AppError::unauthorized("account is deactivated"));
    }

    let token = state.jwt.encode(db_user.id, db_user.role)?;
    let user: User = db_user.try_into()?;

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = User))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    let db_user = fetch_user_by_id(&state.pool, auth.user_id()).await?;
    let user: User = db_user.try_into()?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged", body = MessageResponse))
)]
pub async fn logout(_auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    Ok(Json(MessageResponse::new("Logged out")))
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "Auth",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Reset link sent when the account exists", body = MessageResponse))
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = payload.email.trim().to_lowercase();
    let reply = MessageResponse::new("If the email exists, a reset link has been sent");

    let user_id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?;
    let Some(user_id) = user_id else {
        return Ok(Json(reply));
    };

    let token = random_token(RESET_TOKEN_BYTES);
    let now = utc_now();
    let expires_at = now + Duration::minutes(state.config.reset_token_ttl_minutes);

    sqlx::query(
        "INSERT INTO password_resets (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(sha256_hex(&token))
    .bind(expires_at)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let link = format!("{}/reset-password?token={token}", state.config.app_url.trim_end_matches('/'));
    state.notifier.send(Mail::new(
        email,
        "Reset your password",
        format!(
            "A password reset was requested for your account.\n\nOpen {link} within {} minutes to choose a new password.",
            state.config.reset_token_ttl_minutes
        ),
    ));

    Ok(Json(reply))
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Token invalid, expired or used")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let password_hash = hash_password(&payload.new_password)?;
    let token_hash = sha256_hex(payload.token.trim());
    let now = utc_now();

    let mut tx = state.pool.begin().await?;

    let reset = sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT id, user_id FROM password_resets WHERE token_hash = ? AND used_at IS NULL AND expires_at > ?",
    )
    .bind(&token_hash)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await?;
    let (reset_id, user_id) = reset.ok_or_else(|| AppError::validation("invalid or expired reset token"))?;

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE password_resets SET used_at = ? WHERE id = ?")
        .bind(now)
        .bind(reset_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, "password reset");
    Ok(Json(MessageResponse::new("Password has been reset")))
}

#[utoipa::path(
    get,
    path = "/users/contractors",
    tag = "Auth",
    responses((status = 200, description = "Contractor accounts", body = [ContractorSummary]))
)]
pub async fn list_contractors(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<ContractorSummary>>> {
    state.authorize(&auth.actor, Operation::Read, Resource::ContractorDirectory)?;

    let contractors = sqlx::query_as::<_, ContractorSummary>(
        "SELECT id, name, email, phone FROM users WHERE role = ? ORDER BY name",
    )
    .bind(Role::Contractor)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(contractors))
}

pub(crate) fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("a valid email is required"));
    }
    Ok(email)
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

async fn employee_is_active(pool: &SqlitePool, user_id: Uuid) -> AppResult<bool> {
    let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM employees WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(active.unwrap_or(false))
}

pub(crate) async fn fetch_user_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    sqlx::query_as::<_, DbUser>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}
