use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::query_scalar;
use utoipa::ToSchema;

use crate::app::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub db_ok: bool,
    pub db_error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Service and database status", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_check = query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await;
    if let Err(err) = &db_check {
        tracing::warn!(error = %err, "health check could not reach the database");
    }

    Json(HealthResponse {
        status: if db_check.is_ok() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_ok: db_check.is_ok(),
        db_error: db_check.err().map(|err| err.to_string()),
    })
}
