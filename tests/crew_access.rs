mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use common::{str_field, Account, Crew, TestApp};

struct Site {
    owner: Account,
    contractor: Account,
    crew: Crew,
    project_id: String,
}

/// Owner, assigned contractor and one employee on a single project.
async fn site(t: &TestApp) -> Result<Site> {
    let owner = t.register("Olive", "olive@example.com", "owner").await?;
    let contractor = t.register("Carl", "carl@example.com", "contractor").await?;
    let project_id = t.create_project(&owner, "Kitchen").await?;
    t.assign(&owner, &project_id, &contractor).await?;
    let crew = t.add_employee(&contractor, "Sam", "sam@example.com").await?;

    let (status, body) = t
        .request(
            "POST",
            &format!("/employees/{}/assign-project", crew.employee_id),
            Some(&contractor.token),
            Some(json!({ "project_id": project_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    Ok(Site {
        owner,
        contractor,
        crew,
        project_id,
    })
}

#[tokio::test]
async fn unassigned_employee_gets_forbidden_and_missing_project_not_found() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.register("Olive", "olive@example.com", "owner").await?;
    let contractor = t.register("Carl", "carl@example.com", "contractor").await?;
    let project_id = t.create_project(&owner, "Kitchen").await?;
    let crew = t.add_employee(&contractor, "Sam", "sam@example.com").await?;

    let (status, body) = t.request("GET", &format!("/projects/{project_id}"), Some(&crew.account.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, _) = t
        .request("GET", &format!("/projects/{}", Uuid::new_v4()), Some(&crew.account.token), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the contractor is not on the project, so neither can the crew be
    let (status, body) = t
        .request(
            "POST",
            &format!("/employees/{}/assign-project", crew.employee_id),
            Some(&contractor.token),
            Some(json!({ "project_id": project_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "forbidden: not assigned");

    Ok(())
}

#[tokio::test]
async fn employee_sees_project_but_not_contracts() -> Result<()> {
    let t = TestApp::new().await?;
    let s = site(&t).await?;

    let (status, projects) = t.request("GET", "/projects", Some(&s.crew.account.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(projects.as_array().map(Vec::len), Some(1));

    let (status, _) = t.request("GET", &format!("/projects/{}", s.project_id), Some(&s.crew.account.token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .request("PUT", &format!("/projects/{}", s.project_id), Some(&s.crew.account.token), Some(json!({ "title": "Mine" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .request("GET", &format!("/projects/{}/contracts", s.project_id), Some(&s.crew.account.token), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn one_open_work_log_per_project() -> Result<()> {
    let t = TestApp::new().await?;
    let s = site(&t).await?;
    let token = s.crew.account.token.as_str();

    let (status, log) = t
        .multipart(
            "POST",
            "/work-logs/check-in",
            token,
            &[("project_id", s.project_id.as_str()), ("latitude", "40.7128"), ("longitude", "-74.0060")],
            Some(("photo", "arrival.jpg", &b"fake-jpeg-bytes"[..])),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{log}");
    assert!(log["check_out_time"].is_null());
    assert_eq!(log["check_in_latitude"], 40.7128);
    assert!(log["check_in_photo_url"].as_str().is_some_and(|url| url.contains("/check-ins/")));
    let log_id = str_field(&log, "id")?;

    let (status, body) = t
        .multipart("POST", "/work-logs/check-in", token, &[("project_id", s.project_id.as_str())], None)
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");

    // the contractor cannot close a crew member's session
    let (status, _) = t
        .multipart("POST", "/work-logs/check-out", &s.contractor.token, &[("work_log_id", log_id.as_str())], None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, closed) = t
        .multipart("POST", "/work-logs/check-out", token, &[("work_log_id", log_id.as_str())], None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{closed}");
    assert!(closed["check_out_time"].is_string());
    assert!(closed["hours_worked"].as_f64().is_some_and(|hours| hours >= 0.0));

    let (status, _) = t
        .multipart("POST", "/work-logs/check-out", token, &[("work_log_id", log_id.as_str())], None)
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // a new session may start once the old one is closed
    let (status, _) = t
        .multipart("POST", "/work-logs/check-in", token, &[("project_id", s.project_id.as_str())], None)
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (_, contractor_view) = t.request("GET", "/work-logs", Some(&s.contractor.token), None).await?;
    assert_eq!(contractor_view.as_array().map(Vec::len), Some(2));
    let (_, owner_view) = t
        .request("GET", &format!("/projects/{}/work-logs", s.project_id), Some(&s.owner.token), None)
        .await?;
    assert_eq!(owner_view.as_array().map(Vec::len), Some(2));

    let (_, dashboard) = t
        .request("GET", &format!("/projects/{}/dashboard", s.project_id), Some(&s.crew.account.token), None)
        .await?;
    assert_eq!(dashboard["work"]["checked_in_now"], 1);
    assert!(dashboard["payments"].is_null());

    Ok(())
}

#[tokio::test]
async fn check_out_records_elapsed_hours() -> Result<()> {
    let t = TestApp::new().await?;
    let s = site(&t).await?;
    let token = s.crew.account.token.as_str();

    let (status, log) = t
        .multipart("POST", "/work-logs/check-in", token, &[("project_id", s.project_id.as_str())], None)
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{log}");
    let log_id = str_field(&log, "id")?;

    // started an hour and a half ago
    sqlx::query("UPDATE work_logs SET check_in_time = ? WHERE id = ?")
        .bind(Utc::now() - Duration::minutes(90))
        .bind(Uuid::parse_str(&log_id)?)
        .execute(&t.pool)
        .await?;

    let (status, closed) = t
        .multipart("POST", "/work-logs/check-out", token, &[("work_log_id", log_id.as_str())], None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{closed}");
    assert_eq!(closed["hours_worked"], 1.5);

    let (_, dashboard) = t
        .request("GET", &format!("/projects/{}/dashboard", s.project_id), Some(&s.owner.token), None)
        .await?;
    assert_eq!(dashboard["work"]["hours_worked"], 1.5);
    assert_eq!(dashboard["work"]["checked_in_now"], 0);

    Ok(())
}

#[tokio::test]
async fn crew_cannot_manage_the_roster() -> Result<()> {
    let t = TestApp::new().await?;
    let s = site(&t).await?;

    let (status, body) = t.request("GET", "/employees", Some(&s.crew.account.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "forbidden: wrong role");

    let (status, body) = t
        .request("GET", &format!("/projects/{}/contractors", s.project_id), Some(&s.crew.account.token), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "forbidden: wrong role");

    // another contractor cannot place someone else's crew
    let rival = t.register("Rita", "rita@example.com", "contractor").await?;
    let (status, body) = t
        .request(
            "POST",
            &format!("/employees/{}/assign-project", s.crew.employee_id),
            Some(&rival.token),
            Some(json!({ "project_id": s.project_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "forbidden: not owner");

    Ok(())
}

#[tokio::test]
async fn check_in_that_loses_the_race_stores_no_photo() -> Result<()> {
    let t = TestApp::new().await?;
    let s = site(&t).await?;

    // another device opens a session between the pre-check and the insert
    sqlx::query(
        "CREATE TRIGGER concurrent_check_in BEFORE INSERT ON work_logs \
         BEGIN \
             INSERT INTO work_logs (id, employee_id, project_id, check_in_time, created_at) \
             VALUES (randomblob(16), NEW.employee_id, NEW.project_id, NEW.check_in_time, NEW.created_at); \
         END",
    )
    .execute(&t.pool)
    .await?;

    let (status, body) = t
        .multipart(
            "POST",
            "/work-logs/check-in",
            &s.crew.account.token,
            &[("project_id", s.project_id.as_str())],
            Some(("photo", "arrival.jpg", &b"fake-jpeg-bytes"[..])),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"], "invalid_state");
    assert_eq!(t.stored_uploads("check-ins"), 0);

    sqlx::query("DROP TRIGGER concurrent_check_in").execute(&t.pool).await?;
    let (status, log) = t
        .multipart(
            "POST",
            "/work-logs/check-in",
            &s.crew.account.token,
            &[("project_id", s.project_id.as_str())],
            Some(("photo", "arrival.jpg", &b"fake-jpeg-bytes"[..])),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{log}");
    assert!(log["check_in_photo_url"].as_str().is_some_and(|url| url.contains("/check-ins/")));
    assert_eq!(t.stored_uploads("check-ins"), 1);

    Ok(())
}

#[tokio::test]
async fn only_employees_check_in() -> Result<()> {
    let t = TestApp::new().await?;
    let s = site(&t).await?;

    let (status, _) = t
        .multipart("POST", "/work-logs/check-in", &s.contractor.token, &[("project_id", s.project_id.as_str())], None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .multipart("POST", "/work-logs/check-in", &s.crew.account.token, &[("latitude", "40.7")], None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn deactivated_employee_loses_access() -> Result<()> {
    let t = TestApp::new().await?;
    let s = site(&t).await?;
    let employee_uri = format!("/employees/{}", s.crew.employee_id);

    let (status, me) = t.request("GET", &employee_uri, Some(&s.crew.account.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user_id"], s.crew.account.id.as_str());

    // only the employing contractor manages the record
    let (status, _) = t.request("DELETE", &employee_uri, Some(&s.crew.account.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.request("DELETE", &employee_uri, Some(&s.owner.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = t
        .request("PUT", &employee_uri, Some(&s.contractor.token), Some(json!({ "hourly_rate": 35.0 })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["hourly_rate"], 35.0);

    let (status, _) = t.request("DELETE", &employee_uri, Some(&s.contractor.token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t.request("GET", &format!("/projects/{}", s.project_id), Some(&s.crew.account.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.login("sam@example.com", "crewpass123").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, crew) = t.request("GET", "/employees", Some(&s.contractor.token), None).await?;
    assert_eq!(crew.as_array().map(Vec::len), Some(0));

    let (status, _) = t
        .request("GET", &format!("/employees/{}", Uuid::new_v4()), Some(&s.contractor.token), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn duplicate_employee_email_conflicts() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.register("Olive", "olive@example.com", "owner").await?;
    let contractor = t.register("Carl", "carl@example.com", "contractor").await?;

    let (status, _) = t
        .request(
            "POST",
            "/employees",
            Some(&contractor.token),
            Some(json!({ "name": "Dup", "email": "olive@example.com", "hourly_rate": 20.0 })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .request(
            "POST",
            "/employees",
            Some(&owner.token),
            Some(json!({ "name": "Nope", "email": "nope@example.com", "hourly_rate": 20.0 })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // a generated password still yields a working account record
    let (status, created) = t
        .request(
            "POST",
            "/employees",
            Some(&contractor.token),
            Some(json!({ "name": "Gen", "email": "gen@example.com", "hourly_rate": 20.0 })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["is_active"], true);

    Ok(())
}
