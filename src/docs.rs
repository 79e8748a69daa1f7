use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::Role;
use crate::models;
use crate::routes::{
	auth, contracts, dashboard, employees, estimates, expenses, health, payments, project_docs, projects, work_logs,
};
use crate::workflow::{ContractStatus, EstimateStatus, PaymentStatus};

#[derive(OpenApi)]
#[openapi(
	paths(
		health::health,
		auth::register,
		auth::login,
		auth::me,
		auth::logout,
		auth::forgot_password,
		auth::reset_password,
		auth::list_contractors,
		projects::list_projects,
		projects::create_project,
		projects::get_project,
		projects::update_project,
		projects::delete_project,
		projects::assign_contractor,
		projects::remove_contractor,
		projects::list_project_contractors,
		contracts::list_project_contracts,
		contracts::get_contract,
		contracts::update_contract_status,
		estimates::create_estimate,
		estimates::list_estimates,
		estimates::approve_estimate,
		estimates::reject_estimate,
		expenses::create_expense,
		expenses::list_project_expenses,
		expenses::get_expense,
		expenses::update_expense,
		expenses::delete_expense,
		expenses::upload_receipt,
		payments::create_payment,
		payments::list_payments,
		payments::update_payment,
		payments::delete_payment,
		payments::upload_screenshot,
		payments::confirm_payment,
		payments::dispute_payment,
		employees::create_employee,
		employees::list_employees,
		employees::get_employee,
		employees::update_employee,
		employees::delete_employee,
		employees::assign_project,
		work_logs::check_in,
		work_logs::check_out,
		work_logs::list_work_logs,
		work_logs::list_project_work_logs,
		work_logs::get_work_log,
		work_logs::weekly_summary,
		work_logs::summary_by_employee,
		work_logs::summary_by_project,
		project_docs::create_update,
		project_docs::list_updates,
		project_docs::upload_photo,
		project_docs::list_photos,
		dashboard::project_dashboard
	),
	components(
		schemas(
			Role,
			ContractStatus,
			EstimateStatus,
			PaymentStatus,
			health::HealthResponse,
			models::MessageResponse,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::user::ForgotPasswordRequest,
			models::user::ResetPasswordRequest,
			models::user::ContractorSummary,
			models::project::ProjectStatus,
			models::project::Project,
			models::project::ProjectDetail,
			models::project::ProjectCreateRequest,
			models::project::ProjectUpdateRequest,
			models::project::AssignContractorRequest,
			models::contract::Contract,
			models::contract::ContractStatusRequest,
			models::contract::Estimate,
			models::contract::EstimateCreateRequest,
			models::contract::ApproveEstimateRequest,
			models::contract::RejectEstimateRequest,
			models::expense::ExpenseCategory,
			models::expense::PaidBy,
			models::expense::Expense,
			models::expense::ExpenseCreateRequest,
			models::expense::ExpenseUpdateRequest,
			models::payment::PaymentMethod,
			models::payment::PaymentSummary,
			models::payment::PaymentCreateRequest,
			models::payment::PaymentUpdateRequest,
			models::payment::DisputePaymentRequest,
			models::employee::Employee,
			models::employee::EmployeeCreateRequest,
			models::employee::EmployeeUpdateRequest,
			models::employee::AssignProjectRequest,
			models::work_log::WorkLog,
			models::work_log::WeeklySummary,
			models::work_log::EmployeeHours,
			models::work_log::ProjectHours,
			models::update::UpdateType,
			models::update::ProjectUpdate,
			models::update::ProjectUpdateCreateRequest,
			models::update::ProjectPhoto,
			models::dashboard::Dashboard,
			models::dashboard::ExpenseTotals,
			models::dashboard::PaymentTotals,
			models::dashboard::WorkTotals
		)
	),
	tags(
		(name = "Health", description = "Liveness"),
		(name = "Auth", description = "Accounts and sessions"),
		(name = "Projects", description = "Projects and contractor assignment"),
		(name = "Contracts", description = "Contract lifecycle"),
		(name = "Estimates", description = "Estimate submission and approval"),
		(name = "Expenses", description = "Project expenses and receipts"),
		(name = "Payments", description = "Payment summaries and confirmation"),
		(name = "Employees", description = "Contractor crews"),
		(name = "Work Logs", description = "Check-in and check-out"),
		(name = "Project Docs", description = "Progress updates and photos"),
		(name = "Dashboard", description = "Project totals")
	)
)]
pub struct ApiDoc;

/// The generated document plus bearer auth and a `servers` entry for the
/// local listener.
pub fn build_openapi(port: u16, tls: bool) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	let root = doc
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI root must be an object"))?;
	ensure_security_components(root)?;
	root.entry("security").or_insert_with(|| json!([{ "bearerAuth": [] }]));
	for public in ["/api/health", "/auth/register", "/auth/login", "/auth/forgot-password", "/auth/reset-password"] {
		mark_public(root, public);
	}

	let scheme = if tls { "https" } else { "http" };
	root.insert("servers".to_string(), json!([{ "url": format!("{scheme}://localhost:{port}") }]));

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(root: &mut Map<String, Value>) -> anyhow::Result<()> {
	let schemes = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("components must be an object"))?
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("securitySchemes must be an object"))?;

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
	Ok(())
}

/// Clears the global security requirement on every operation of `path`.
fn mark_public(root: &mut Map<String, Value>, path: &str) {
	let Some(item) = root
		.get_mut("paths")
		.and_then(|paths| paths.get_mut(path))
		.and_then(Value::as_object_mut)
	else {
		return;
	};

	for operation in item.values_mut() {
		if let Some(operation) = operation.as_object_mut() {
			operation.insert("security".to_string(), json!([]));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn document_lists_every_route_group() {
		let doc = serde_json::to_value(build_openapi(8000, false).unwrap()).unwrap();
		let paths = doc["paths"].as_object().unwrap();

		for path in [
			"/auth/login",
			"/projects/{id}/contractors/{contractor_id}",
			"/estimates/{id}/approve",
			"/payments/{id}/dispute",
			"/work-logs/check-in",
			"/projects/{id}/dashboard",
		] {
			assert!(paths.contains_key(path), "missing {path}");
		}
		assert_eq!(doc["servers"][0]["url"], "http://localhost:8000");
		assert_eq!(doc["components"]["securitySchemes"]["bearerAuth"]["scheme"], "bearer");
	}

	#[test]
	fn login_is_public() {
		let doc = serde_json::to_value(build_openapi(8000, true).unwrap()).unwrap();
		assert_eq!(doc["paths"]["/auth/login"]["post"]["security"], json!([]));
		assert_eq!(doc["servers"][0]["url"], "https://localhost:8000");
	}
}
