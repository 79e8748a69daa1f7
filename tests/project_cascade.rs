mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::TestApp;

const OWNED_TABLES: [&str; 8] = [
    "project_contractors",
    "employee_projects",
    "contracts",
    "expenses",
    "payment_summaries",
    "work_logs",
    "project_photos",
    "project_updates",
];

async fn rows_for(t: &TestApp, table: &str, project_id: Uuid) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table} WHERE project_id = ?"))
        .bind(project_id)
        .fetch_one(&t.pool)
        .await?;
    Ok(count)
}

#[tokio::test]
async fn deleting_a_project_removes_everything_it_owns() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.register("Olive", "olive@example.com", "owner").await?;
    let contractor = t.register("Carl", "carl@example.com", "contractor").await?;
    let project_id = t.create_project(&owner, "Kitchen").await?;
    let contract_id = t.assign(&owner, &project_id, &contractor).await?;
    let crew = t.add_employee(&contractor, "Sam", "sam@example.com").await?;

    let (status, _) = t
        .request(
            "POST",
            &format!("/employees/{}/assign-project", crew.employee_id),
            Some(&contractor.token),
            Some(json!({ "project_id": project_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .request(
            "POST",
            &format!("/contracts/{contract_id}/estimates"),
            Some(&contractor.token),
            Some(json!({ "amount": 18500.0, "description": "Phase one" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = t
        .request(
            "POST",
            "/expenses",
            Some(&contractor.token),
            Some(json!({
                "project_id": project_id,
                "amount": 120.0,
                "vendor": "Lumber Yard",
                "date": "2025-03-14",
                "category": "materials",
                "paid_by": "contractor",
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = t
        .request(
            "POST",
            &format!("/projects/{project_id}/payments"),
            Some(&owner.token),
            Some(json!({ "amount": 500.0, "payment_method": "zelle", "payment_date": "2025-03-14" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, log) = t
        .multipart(
            "POST",
            "/work-logs/check-in",
            &crew.account.token,
            &[("project_id", project_id.as_str())],
            Some(("photo", "arrival.jpg", &b"jpeg-bytes"[..])),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{log}");

    let (status, _) = t
        .multipart(
            "POST",
            &format!("/projects/{project_id}/photos"),
            &contractor.token,
            &[("caption", "Before")],
            Some(("photo", "before.jpg", &b"jpeg-bytes"[..])),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = t
        .request(
            "POST",
            &format!("/projects/{project_id}/updates"),
            Some(&contractor.token),
            Some(json!({ "update_type": "daily_summary", "content": "Demo done" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let id = Uuid::parse_str(&project_id)?;
    for table in OWNED_TABLES {
        assert!(rows_for(&t, table, id).await? > 0, "{table} was not seeded");
    }

    // only the owner may delete
    let (status, _) = t.request("DELETE", &format!("/projects/{project_id}"), Some(&contractor.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.request("DELETE", &format!("/projects/{project_id}"), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for table in OWNED_TABLES {
        assert_eq!(rows_for(&t, table, id).await?, 0, "{table} outlived its project");
    }
    let estimates = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM estimates WHERE contract_id = ?")
        .bind(Uuid::parse_str(&contract_id)?)
        .fetch_one(&t.pool)
        .await?;
    assert_eq!(estimates, 0);

    let (status, _) = t.request("GET", &format!("/projects/{project_id}"), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = t.request("GET", &format!("/contracts/{contract_id}"), Some(&contractor.token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the crew member's account survives the project
    let (status, _) = t.login("sam@example.com", "crewpass123").await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}
