use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::{
	ContractLink, EmployeeLink, EstimateLink, ExpenseLink, OwnershipStore, PaymentLink, Role, WorkLogLink,
};
use crate::errors::AppResult;
use crate::workflow::{ContractStatus, EstimateStatus, PaymentStatus};

pub async fn init() -> anyhow::Result<SqlitePool> {
	let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;

	let pool = SqlitePoolOptions::new()
		.max_connections(10)
		.min_connections(1)
		.acquire_timeout(Duration::from_secs(10))
		.connect(&database_url)
		.await
		.context("failed to connect to database")?;

	sqlx::migrate!()
		.run(&pool)
		.await
		.context("failed to run migrations")?;

	Ok(pool)
}

/// Ownership lookups over the SQLite schema.
#[derive(Debug, Clone)]
pub struct SqliteStore {
	pool: SqlitePool,
}

impl SqliteStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl OwnershipStore for SqliteStore {
	async fn project_owner(&self, project_id: Uuid) -> AppResult<Option<Uuid>> {
		let owner = sqlx::query_scalar::<_, Uuid>("SELECT owner_id FROM projects WHERE id = ?")
			.bind(project_id)
			.fetch_optional(&self.pool)
			.await?;
		Ok(owner)
	}

	async fn contractor_assigned(&self, project_id: Uuid, contractor_id: Uuid) -> AppResult<bool> {
		let found = sqlx::query_scalar::<_, i64>(
			"SELECT 1 FROM project_contractors WHERE project_id = ? AND contractor_id = ?",
		)
		.bind(project_id)
		.bind(contractor_id)
		.fetch_optional(&self.pool)
		.await?;
		Ok(found.is_some())
	}

	async fn employee_assigned(&self, project_id: Uuid, employee_id: Uuid) -> AppResult<bool> {
		let found = sqlx::query_scalar::<_, i64>(
			"SELECT 1 FROM employee_projects ep JOIN employees e ON e.user_id = ep.employee_id WHERE ep.project_id = ? AND ep.employee_id = ? AND e.is_active = 1",
		)
		.bind(project_id)
		.bind(employee_id)
		.fetch_optional(&self.pool)
		.await?;
		Ok(found.is_some())
	}

	async fn employer_of(&self, employee_id: Uuid) -> AppResult<Option<Uuid>> {
		let contractor = sqlx::query_scalar::<_, Uuid>(
			"SELECT contractor_id FROM employees WHERE user_id = ? AND is_active = 1",
		)
		.bind(employee_id)
		.fetch_optional(&self.pool)
		.await?;
		Ok(contractor)
	}

	async fn contractor_slice_of(&self, user_id: Uuid) -> AppResult<Option<Uuid>> {
		let role = sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE id = ?")
			.bind(user_id)
			.fetch_optional(&self.pool)
			.await?;

		match role {
			Some(Role::Contractor) => Ok(Some(user_id)),
			Some(Role::Employee) => {
				let contractor = sqlx::query_scalar::<_, Uuid>("SELECT contractor_id FROM employees WHERE user_id = ?")
					.bind(user_id)
					.fetch_optional(&self.pool)
					.await?;
				Ok(contractor)
			}
			Some(Role::Owner) | None => Ok(None),
		}
	}

	async fn contract_link(&self, contract_id: Uuid) -> AppResult<Option<ContractLink>> {
		let row = sqlx::query_as::<_, (Uuid, Uuid, Uuid, ContractStatus)>(
			"SELECT project_id, owner_id, contractor_id, status FROM contracts WHERE id = ?",
		)
		.bind(contract_id)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(|(project_id, owner_id, contractor_id, status)| ContractLink {
			project_id,
			owner_id,
			contractor_id,
			status,
		}))
	}

	async fn estimate_link(&self, estimate_id: Uuid) -> AppResult<Option<EstimateLink>> {
		let row = sqlx::query_as::<_, (Uuid, EstimateStatus)>(
			"SELECT contract_id, status FROM estimates WHERE id = ?",
		)
		.bind(estimate_id)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(|(contract_id, status)| EstimateLink { contract_id, status }))
	}

	async fn expense_link(&self, expense_id: Uuid) -> AppResult<Option<ExpenseLink>> {
		let row = sqlx::query_as::<_, (Uuid, Uuid)>("SELECT project_id, added_by FROM expenses WHERE id = ?")
			.bind(expense_id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.map(|(project_id, added_by)| ExpenseLink { project_id, added_by }))
	}

	async fn payment_link(&self, payment_id: Uuid) -> AppResult<Option<PaymentLink>> {
		let row = sqlx::query_as::<_, (Uuid, Uuid, PaymentStatus)>(
			"SELECT project_id, added_by, status FROM payment_summaries WHERE id = ?",
		)
		.bind(payment_id)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(|(project_id, added_by, status)| PaymentLink {
			project_id,
			added_by,
			status,
		}))
	}

	async fn work_log_link(&self, work_log_id: Uuid) -> AppResult<Option<WorkLogLink>> {
		let row = sqlx::query_as::<_, (Uuid, Uuid, bool)>(
			"SELECT project_id, employee_id, check_out_time IS NULL FROM work_logs WHERE id = ?",
		)
		.bind(work_log_id)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(|(project_id, employee_id, open)| WorkLogLink {
			project_id,
			employee_id,
			open,
		}))
	}

	async fn employee_link(&self, employee_id: Uuid) -> AppResult<Option<EmployeeLink>> {
		let row = sqlx::query_as::<_, (Uuid, Uuid, bool)>(
			"SELECT user_id, contractor_id, is_active FROM employees WHERE id = ?",
		)
		.bind(employee_id)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(|(user_id, contractor_id, is_active)| EmployeeLink {
			user_id,
			contractor_id,
			is_active,
		}))
	}
}
