pub mod auth;
pub mod contracts;
pub mod dashboard;
pub mod employees;
pub mod estimates;
pub mod expenses;
pub mod health;
pub mod payments;
pub mod project_docs;
pub mod projects;
pub mod work_logs;

use sqlx::SqlitePool;
use uuid::Uuid;

// Recipient lookups run after the write has committed, so a failure here
// only costs the notification.

/// Email of the project's owner, used for notifications.
pub(crate) async fn owner_email(pool: &SqlitePool, project_id: Uuid) -> Option<String> {
    sqlx::query_scalar::<_, String>("SELECT u.email FROM projects p JOIN users u ON u.id = p.owner_id WHERE p.id = ?")
        .bind(project_id)
        .fetch_optional(pool)
        .await
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, project_id = %project_id, "owner lookup failed; notification skipped");
            None
        })
}

pub(crate) async fn contractor_emails(pool: &SqlitePool, project_id: Uuid) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT u.email FROM project_contractors pc JOIN users u ON u.id = pc.contractor_id WHERE pc.project_id = ?",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .unwrap_or_else(|err| {
        tracing::warn!(error = %err, project_id = %project_id, "contractor lookup failed; notification skipped");
        Vec::new()
    })
}
