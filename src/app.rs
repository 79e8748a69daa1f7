use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::authz::{Actor, DefaultPolicy, OwnershipResolver, Operation, PolicyEvaluator, Resource};
use crate::config::{AppConfig, StorageConfig};
use crate::db::SqliteStore;
use crate::errors::{AppError, AppResult};
use crate::jwt::JwtConfig;
use crate::notify::Notifier;
use crate::routes::{
    auth, contracts, dashboard, employees, estimates, expenses, health, payments, project_docs, projects, work_logs,
};
use crate::storage::{self, BlobStore, MAX_UPLOAD_BYTES};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub config: Arc<AppConfig>,
    pub blobs: Arc<dyn BlobStore>,
    pub notifier: Notifier,
    pub policy: Arc<dyn PolicyEvaluator>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, config: AppConfig) -> Result<Self, AppError> {
        let blobs = storage::from_config(&config.storage)?;
        let notifier = Notifier::from_config(config.mail.as_ref())?;

        Ok(Self {
            pool,
            jwt: Arc::new(jwt),
            config: Arc::new(config),
            blobs,
            notifier,
            policy: Arc::new(DefaultPolicy::new()),
        })
    }

    pub fn resolver(&self) -> OwnershipResolver<SqliteStore> {
        OwnershipResolver::new(SqliteStore::new(self.pool.clone()))
    }

    pub fn authorize(&self, actor: &Actor, operation: Operation, resource: Resource) -> AppResult<()> {
        self.policy.authorize(actor, operation, &resource).into_result()
    }

    /// Same decision as [`AppState::authorize`], for optional sections of a
    /// response.
    pub fn permits(&self, actor: &Actor, operation: Operation, resource: Resource) -> bool {
        self.policy.authorize(actor, operation, &resource).is_allowed()
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let config = AppConfig::from_env()?;
    let jwt_config = JwtConfig::from_env()?;
    create_app_with(pool, jwt_config, config)
}

pub fn create_app_with(pool: SqlitePool, jwt: JwtConfig, config: AppConfig) -> Result<Router, AppError> {
    let local_uploads = match &config.storage {
        StorageConfig::Local { dir, .. } => Some(dir.clone()),
        StorageConfig::Supabase { .. } => None,
    };
    let state = AppState::new(pool, jwt, config)?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route(
            "/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route(
            "/:id/contractors",
            get(projects::list_project_contractors).post(projects::assign_contractor),
        )
        .route("/:id/contractors/:contractor_id", delete(projects::remove_contractor))
        .route("/:id/contracts", get(contracts::list_project_contracts))
        .route("/:id/expenses", get(expenses::list_project_expenses))
        .route("/:id/payments", get(payments::list_payments).post(payments::create_payment))
        .route("/:id/work-logs", get(work_logs::list_project_work_logs))
        .route("/:id/updates", get(project_docs::list_updates).post(project_docs::create_update))
        .route("/:id/photos", get(project_docs::list_photos).post(project_docs::upload_photo))
        .route("/:id/dashboard", get(dashboard::project_dashboard));

    let contract_routes = Router::new()
        .route("/:id", get(contracts::get_contract))
        .route("/:id/status", put(contracts::update_contract_status))
        .route(
            "/:id/estimates",
            get(estimates::list_estimates).post(estimates::create_estimate),
        );

    let estimate_routes = Router::new()
        .route("/:id/approve", post(estimates::approve_estimate))
        .route("/:id/reject", post(estimates::reject_estimate));

    let expense_routes = Router::new()
        .route("/", post(expenses::create_expense))
        .route(
            "/:id",
            get(expenses::get_expense)
                .put(expenses::update_expense)
                .delete(expenses::delete_expense),
        )
        .route("/:id/receipt", put(expenses::upload_receipt));

    let payment_routes = Router::new()
        .route("/:id", put(payments::update_payment).delete(payments::delete_payment))
        .route("/:id/screenshot", put(payments::upload_screenshot))
        .route("/:id/confirm", post(payments::confirm_payment))
        .route("/:id/dispute", post(payments::dispute_payment));

    let employee_routes = Router::new()
        .route("/", get(employees::list_employees).post(employees::create_employee))
        .route(
            "/:id",
            get(employees::get_employee)
                .put(employees::update_employee)
                .delete(employees::delete_employee),
        )
        .route("/:id/assign-project", post(employees::assign_project));

    let work_log_routes = Router::new()
        .route("/", get(work_logs::list_work_logs))
        .route("/check-in", post(work_logs::check_in))
        .route("/check-out", post(work_logs::check_out))
        .route("/summary/weekly", get(work_logs::weekly_summary))
        .route("/summary/by-employee", get(work_logs::summary_by_employee))
        .route("/summary/by-project", get(work_logs::summary_by_project))
        .route("/:id", get(work_logs::get_work_log));

    let mut router = Router::new()
        .route("/api/health", get(health::health))
        .route("/users/contractors", get(auth::list_contractors))
        .nest("/auth", auth_routes)
        .nest("/projects", project_routes)
        .nest("/contracts", contract_routes)
        .nest("/estimates", estimate_routes)
        .nest("/expenses", expense_routes)
        .nest("/payments", payment_routes)
        .nest("/employees", employee_routes)
        .nest("/work-logs", work_log_routes)
        .with_state(state);

    if let Some(dir) = local_uploads {
        router = router.nest_service("/uploads", ServeDir::new(dir));
    }

    let router = router
        // multipart overhead on top of the largest accepted file
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
