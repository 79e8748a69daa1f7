#![allow(dead_code)]

use std::path::Path;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use managrr::config::{AppConfig, StorageConfig};
use managrr::create_app_with;
use managrr::jwt::JwtConfig;

const BOUNDARY: &str = "managrr-test-boundary";

/// A router over a fresh migrated SQLite file, with uploads kept in the
/// same temp dir.
pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    dir: TempDir,
}

pub struct Account {
    pub id: String,
    pub token: String,
}

pub struct Crew {
    pub employee_id: String,
    pub account: Account,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create tempdir")?;
        let opts = SqliteConnectOptions::new()
            .filename(dir.path().join("test.db"))
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;

        let migrator = sqlx::migrate::Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
        migrator.run(&pool).await?;

        let config = AppConfig {
            port: 8000,
            app_url: "http://localhost:3000".to_string(),
            reset_token_ttl_minutes: 60,
            storage: StorageConfig::Local {
                dir: dir.path().join("uploads"),
                public_url: "http://localhost:8000/uploads".to_string(),
            },
            mail: None,
            tls: None,
        };
        let app = create_app_with(pool.clone(), JwtConfig::new("test-secret", 24), config)?;

        Ok(Self { app, pool, dir })
    }

    /// Files stored under one upload folder, e.g. `check-ins`.
    pub fn stored_uploads(&self, folder: &str) -> usize {
        std::fs::read_dir(self.dir.path().join("uploads").join(folder))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub async fn request(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        self.send(req).await
    }

    /// Sends a multipart form; `file` is `(field, file_name, bytes)`.
    pub async fn multipart(
        &self,
        method: &str,
        uri: &str,
        token: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> Result<(StatusCode, Value)> {
        let mut payload = Vec::new();
        for (name, value) in fields {
            payload.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
            );
        }
        if let Some((name, file_name, bytes)) = file {
            payload.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            payload.extend_from_slice(bytes);
            payload.extend_from_slice(b"\r\n");
        }
        payload.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(payload))?;

        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> Result<(StatusCode, Value)> {
        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };
        Ok((status, value))
    }

    pub async fn register(&self, name: &str, email: &str, role: &str) -> Result<Account> {
        let (status, body) = self
            .request(
                "POST",
                "/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": "password123", "role": role })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "register {email}: {body}");
        Ok(Account {
            id: str_field(&body["user"], "id")?,
            token: str_field(&body, "token")?,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(StatusCode, Value)> {
        self.request("POST", "/auth/login", None, Some(json!({ "email": email, "password": password })))
            .await
    }

    pub async fn create_project(&self, owner: &Account, title: &str) -> Result<String> {
        let (status, body) = self
            .request(
                "POST",
                "/projects",
                Some(&owner.token),
                Some(json!({ "title": title, "description": "Kitchen remodel", "estimated_cost": 25000.0 })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create project: {body}");
        str_field(&body, "id")
    }

    /// Assigns the contractor and returns the contract id.
    pub async fn assign(&self, owner: &Account, project_id: &str, contractor: &Account) -> Result<String> {
        let (status, body) = self
            .request(
                "POST",
                &format!("/projects/{project_id}/contractors"),
                Some(&owner.token),
                Some(json!({ "contractor_id": contractor.id })),
            )
            .await?;
        assert!(status.is_success(), "assign contractor: {status} {body}");
        str_field(&body, "id")
    }

    pub async fn add_employee(&self, contractor: &Account, name: &str, email: &str) -> Result<Crew> {
        let (status, body) = self
            .request(
                "POST",
                "/employees",
                Some(&contractor.token),
                Some(json!({ "name": name, "email": email, "hourly_rate": 30.0, "initial_password": "crewpass123" })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "add employee: {body}");
        let employee_id = str_field(&body, "id")?;

        let (status, body) = self.login(email, "crewpass123").await?;
        assert_eq!(status, StatusCode::OK, "employee login: {body}");

        Ok(Crew {
            employee_id,
            account: Account {
                id: str_field(&body["user"], "id")?,
                token: str_field(&body, "token")?,
            },
        })
    }
}

pub fn str_field(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("missing `{key}` in {value}"))
}
