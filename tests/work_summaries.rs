mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use common::{str_field, Account, Crew, TestApp};
use managrr::workflow::week_start;

async fn join(t: &TestApp, contractor: &Account, crew: &Crew, project_id: &str) -> Result<()> {
    let (status, body) = t
        .request(
            "POST",
            &format!("/employees/{}/assign-project", crew.employee_id),
            Some(&contractor.token),
            Some(json!({ "project_id": project_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    Ok(())
}

/// Runs a full session, then rewrites its start and hours as if it had
/// been logged at `started`.
async fn log_hours(t: &TestApp, crew: &Crew, project_id: &str, started: DateTime<Utc>, hours: f64) -> Result<()> {
    let token = crew.account.token.as_str();
    let (status, log) = t
        .multipart("POST", "/work-logs/check-in", token, &[("project_id", project_id)], None)
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{log}");
    let log_id = str_field(&log, "id")?;
    let (status, _) = t
        .multipart("POST", "/work-logs/check-out", token, &[("work_log_id", log_id.as_str())], None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    sqlx::query("UPDATE work_logs SET check_in_time = ?, hours_worked = ? WHERE id = ?")
        .bind(started)
        .bind(hours)
        .bind(Uuid::parse_str(&log_id)?)
        .execute(&t.pool)
        .await?;
    Ok(())
}

#[tokio::test]
async fn summaries_cover_only_the_callers_crew() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.register("Olive", "olive@example.com", "owner").await?;
    let carl = t.register("Carl", "carl@example.com", "contractor").await?;
    let rita = t.register("Rita", "rita@example.com", "contractor").await?;

    let kitchen = t.create_project(&owner, "Kitchen").await?;
    let porch = t.create_project(&owner, "Porch").await?;
    t.assign(&owner, &kitchen, &carl).await?;
    t.assign(&owner, &porch, &carl).await?;
    t.assign(&owner, &kitchen, &rita).await?;

    let sam = t.add_employee(&carl, "Sam", "sam@example.com").await?;
    let idle = t.add_employee(&carl, "Ida", "ida@example.com").await?;
    let rex = t.add_employee(&rita, "Rex", "rex@example.com").await?;
    join(&t, &carl, &sam, &kitchen).await?;
    join(&t, &rita, &rex, &kitchen).await?;

    let this_week = week_start(Utc::now());
    log_hours(&t, &sam, &kitchen, this_week, 1.5).await?;
    log_hours(&t, &sam, &kitchen, this_week - Duration::days(2), 3.0).await?;
    log_hours(&t, &rex, &kitchen, this_week, 2.0).await?;

    let (status, weekly) = t.request("GET", "/work-logs/summary/weekly", Some(&carl.token), None).await?;
    assert_eq!(status, StatusCode::OK, "{weekly}");
    assert_eq!(weekly["total_hours"], 1.5);
    assert!(weekly["week_start"].is_string());

    let (status, by_employee) = t.request("GET", "/work-logs/summary/by-employee", Some(&carl.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let rows = by_employee.as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 2, "{by_employee}");
    assert_eq!(rows[0]["employee_id"], sam.account.id.as_str());
    assert_eq!(rows[0]["employee_name"], "Sam");
    assert_eq!(rows[0]["total_hours"], 4.5);
    assert_eq!(rows[1]["employee_id"], idle.account.id.as_str());
    assert_eq!(rows[1]["total_hours"], 0.0);

    let (status, by_project) = t.request("GET", "/work-logs/summary/by-project", Some(&carl.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let rows = by_project.as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 2, "{by_project}");
    assert_eq!(rows[0]["project_id"], kitchen.as_str());
    assert_eq!(rows[0]["project_title"], "Kitchen");
    // Rex's hours belong to Rita's crew
    assert_eq!(rows[0]["total_hours"], 4.5);
    assert_eq!(rows[1]["project_title"], "Porch");
    assert_eq!(rows[1]["total_hours"], 0.0);

    let (_, rival) = t.request("GET", "/work-logs/summary/weekly", Some(&rita.token), None).await?;
    assert_eq!(rival["total_hours"], 2.0);

    Ok(())
}

#[tokio::test]
async fn summaries_are_for_contractors() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.register("Olive", "olive@example.com", "owner").await?;
    let carl = t.register("Carl", "carl@example.com", "contractor").await?;
    let sam = t.add_employee(&carl, "Sam", "sam@example.com").await?;

    for uri in ["/work-logs/summary/weekly", "/work-logs/summary/by-employee", "/work-logs/summary/by-project"] {
        for token in [&owner.token, &sam.account.token] {
            let (status, body) = t.request("GET", uri, Some(token.as_str()), None).await?;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}: {body}");
            assert_eq!(body["message"], "forbidden: wrong role");
        }
        let (status, _) = t.request("GET", uri, None, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // a contractor without crew or projects gets zeros, not errors
    let (status, weekly) = t.request("GET", "/work-logs/summary/weekly", Some(&carl.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(weekly["total_hours"], 0.0);
    let (_, by_project) = t.request("GET", "/work-logs/summary/by-project", Some(&carl.token), None).await?;
    assert_eq!(by_project, json!([]));

    Ok(())
}
