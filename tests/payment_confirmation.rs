mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{str_field, Account, TestApp};

async fn record_payment(t: &TestApp, owner: &Account, project_id: &str, amount: f64) -> Result<Value> {
    let (status, body) = t
        .request(
            "POST",
            &format!("/projects/{project_id}/payments"),
            Some(&owner.token),
            Some(json!({ "amount": amount, "payment_method": "zelle", "payment_date": "2025-03-14", "notes": "deposit" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    Ok(body)
}

#[tokio::test]
async fn disputed_payment_cannot_be_confirmed() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.register("Olive", "olive@example.com", "owner").await?;
    let contractor = t.register("Carl", "carl@example.com", "contractor").await?;
    let project_id = t.create_project(&owner, "Kitchen").await?;
    t.assign(&owner, &project_id, &contractor).await?;

    let payment = record_payment(&t, &owner, &project_id, 500.0).await?;
    assert_eq!(payment["status"], "pending");
    let id = str_field(&payment, "id")?;

    // the payer cannot confirm their own payment
    let (status, _) = t.request("POST", &format!("/payments/{id}/confirm"), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .request("POST", &format!("/payments/{id}/dispute"), Some(&contractor.token), Some(json!({ "reason": "" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, disputed) = t
        .request(
            "POST",
            &format!("/payments/{id}/dispute"),
            Some(&contractor.token),
            Some(json!({ "reason": "amount mismatch" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{disputed}");
    assert_eq!(disputed["status"], "disputed");
    assert_eq!(disputed["dispute_reason"], "amount mismatch");

    let (status, body) = t.request("POST", &format!("/payments/{id}/confirm"), Some(&contractor.token), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");

    // a disputed payment is no longer editable but can be withdrawn
    let (status, _) = t
        .request("PUT", &format!("/payments/{id}"), Some(&owner.token), Some(json!({ "amount": 450.0 })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t.request("DELETE", &format!("/payments/{id}"), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn confirmed_payment_is_permanent() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.register("Olive", "olive@example.com", "owner").await?;
    let contractor = t.register("Carl", "carl@example.com", "contractor").await?;
    let project_id = t.create_project(&owner, "Kitchen").await?;
    t.assign(&owner, &project_id, &contractor).await?;

    let payment = record_payment(&t, &owner, &project_id, 1200.0).await?;
    let id = str_field(&payment, "id")?;

    let (status, edited) = t
        .request("PUT", &format!("/payments/{id}"), Some(&owner.token), Some(json!({ "amount": 1250.0 })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["amount"], 1250.0);

    let (status, confirmed) = t.request("POST", &format!("/payments/{id}/confirm"), Some(&contractor.token), None).await?;
    assert_eq!(status, StatusCode::OK, "{confirmed}");
    assert_eq!(confirmed["status"], "confirmed");
    assert_eq!(confirmed["confirmed_by"], contractor.id.as_str());

    let (status, _) = t.request("POST", &format!("/payments/{id}/confirm"), Some(&contractor.token), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = t
        .request("POST", &format!("/payments/{id}/dispute"), Some(&contractor.token), Some(json!({ "reason": "late" })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, body) = t
        .request("PUT", &format!("/payments/{id}"), Some(&owner.token), Some(json!({ "amount": 1.0 })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");
    let (status, _) = t.request("DELETE", &format!("/payments/{id}"), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, dashboard) = t
        .request("GET", &format!("/projects/{project_id}/dashboard"), Some(&owner.token), None)
        .await?;
    assert_eq!(dashboard["payments"]["confirmed"], 1250.0);
    assert_eq!(dashboard["payments"]["pending"], 0.0);

    Ok(())
}

#[tokio::test]
async fn payments_are_hidden_from_outsiders_and_crews() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.register("Olive", "olive@example.com", "owner").await?;
    let contractor = t.register("Carl", "carl@example.com", "contractor").await?;
    let stranger = t.register("Stan", "stan@example.com", "contractor").await?;
    let project_id = t.create_project(&owner, "Kitchen").await?;
    t.assign(&owner, &project_id, &contractor).await?;

    let crew = t.add_employee(&contractor, "Sam", "sam@example.com").await?;
    t.request(
        "POST",
        &format!("/employees/{}/assign-project", crew.employee_id),
        Some(&contractor.token),
        Some(json!({ "project_id": project_id })),
    )
    .await?;

    record_payment(&t, &owner, &project_id, 75.0).await?;
    let uri = format!("/projects/{project_id}/payments");

    let (status, list) = t.request("GET", &uri, Some(&contractor.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let (status, body) = t.request("GET", &uri, Some(&stranger.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "forbidden: not assigned");

    let (status, _) = t.request("GET", &uri, Some(&crew.account.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // contractors do not record payments
    let (status, _) = t
        .request(
            "POST",
            &uri,
            Some(&contractor.token),
            Some(json!({ "amount": 1.0, "payment_method": "cash", "payment_date": "2025-03-14" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}
