//! Multi-statement writes that keep the project aggregate consistent. Each
//! runs in one transaction; returning early drops the transaction, which
//! rolls it back.

use chrono::NaiveDate;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::models::contract::{Contract, Estimate, CONTRACT_COLUMNS, ESTIMATE_COLUMNS};
use crate::models::employee::{Employee, EMPLOYEE_COLUMNS};
use crate::workflow::{Approval, ContractStatus};
use crate::utils::utc_now;

/// Result of assigning a contractor to a project.
#[derive(Debug)]
pub struct Assignment {
    pub contract: Contract,
    /// `false` when the contractor was already assigned.
    pub created: bool,
}

fn today() -> NaiveDate {
    utc_now().date_naive()
}

async fn live_contract(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: Uuid,
    contractor_id: Uuid,
) -> AppResult<Option<Contract>> {
    let sql = format!(
        "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE project_id = ? AND contractor_id = ? AND status != 'terminated'"
    );
    let contract = sqlx::query_as::<_, Contract>(&sql)
        .bind(project_id)
        .bind(contractor_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(contract)
}

async fn contract_by_id(tx: &mut Transaction<'_, Sqlite>, contract_id: Uuid) -> AppResult<Contract> {
    let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = ?");
    let contract = sqlx::query_as::<_, Contract>(&sql)
        .bind(contract_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(contract)
}

/// Assigns a contractor and guarantees one Active contract for the pair.
/// Repeating the call changes nothing.
pub async fn assign_contractor(
    pool: &SqlitePool,
    project_id: Uuid,
    owner_id: Uuid,
    contractor_id: Uuid,
) -> AppResult<Assignment> {
    let mut tx = pool.begin().await?;
    let now = utc_now();

    let role = sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE id = ?")
        .bind(contractor_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("contractor not found"))?;
    if role != Role::Contractor {
        return Err(AppError::validation("user is not a contractor"));
    }

    let inserted = sqlx::query(
        "INSERT INTO project_contractors (id, project_id, contractor_id, assigned_at) VALUES (?, ?, ?, ?) ON CONFLICT (project_id, contractor_id) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(contractor_id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    let contract_id = match live_contract(&mut tx, project_id, contractor_id).await? {
        Some(existing) if existing.status == ContractStatus::Pending => {
            let next = existing.status.activate()?;
            sqlx::query("UPDATE contracts SET status = ?, start_date = COALESCE(start_date, ?), updated_at = ? WHERE id = ?")
                .bind(next)
                .bind(today())
                .bind(now)
                .bind(existing.id)
                .execute(&mut *tx)
                .await?;
            existing.id
        }
        // the pair's contract is finished; a new one would break the
        // one-live-contract rule, so the assignment is rolled back
        Some(existing) if inserted && existing.status == ContractStatus::Completed => {
            return Err(AppError::conflict("contractor already completed a contract on this project"));
        }
        Some(existing) => existing.id,
        None => {
            let contract_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO contracts (id, project_id, contractor_id, owner_id, status, start_date, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(contract_id)
            .bind(project_id)
            .bind(contractor_id)
            .bind(owner_id)
            .bind(ContractStatus::Active)
            .bind(today())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            contract_id
        }
    };

    let contract = contract_by_id(&mut tx, contract_id).await?;
    tx.commit().await?;

    if inserted {
        tracing::info!(project_id = %project_id, contractor_id = %contractor_id, contract_id = %contract.id, "contractor assigned");
    }

    Ok(Assignment {
        contract,
        created: inserted,
    })
}

/// Removes a contractor: drops the assignment, terminates the live contract
/// and withdraws the contractor's employees from the project.
pub async fn remove_contractor(pool: &SqlitePool, project_id: Uuid, contractor_id: Uuid) -> AppResult<Option<Contract>> {
    let mut tx = pool.begin().await?;
    let now = utc_now();

    let removed = sqlx::query("DELETE FROM project_contractors WHERE project_id = ? AND contractor_id = ?")
        .bind(project_id)
        .bind(contractor_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::not_found("contractor is not assigned to this project"));
    }

    let terminated = match live_contract(&mut tx, project_id, contractor_id).await? {
        // a completed contract stays completed
        Some(contract) if contract.status.is_terminal() => None,
        Some(contract) => {
            let next = contract.status.terminate()?;
            sqlx::query("UPDATE contracts SET status = ?, end_date = ?, updated_at = ? WHERE id = ?")
                .bind(next)
                .bind(today())
                .bind(now)
                .bind(contract.id)
                .execute(&mut *tx)
                .await?;
            Some(contract_by_id(&mut tx, contract.id).await?)
        }
        None => None,
    };

    sqlx::query(
        "DELETE FROM employee_projects WHERE project_id = ? AND employee_id IN (SELECT user_id FROM employees WHERE contractor_id = ?)",
    )
    .bind(project_id)
    .bind(contractor_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        project_id = %project_id,
        contractor_id = %contractor_id,
        terminated = terminated.is_some(),
        "contractor removed"
    );
    Ok(terminated)
}

/// Approves an estimate. With `set_as_active` every sibling under the same
/// contract is deactivated in the same transaction.
pub async fn approve_estimate(
    pool: &SqlitePool,
    estimate_id: Uuid,
    approver_id: Uuid,
    set_as_active: bool,
) -> AppResult<Estimate> {
    let mut tx = pool.begin().await?;
    let sql = format!("SELECT {ESTIMATE_COLUMNS} FROM estimates WHERE id = ?");

    let current = sqlx::query_as::<_, Estimate>(&sql)
        .bind(estimate_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("estimate not found"))?;

    let activate = match current.status.approve(current.is_active, set_as_active)? {
        Approval::AlreadyApplied => return Ok(current),
        Approval::Apply { activate } => activate,
    };

    let now = utc_now();
    if activate {
        sqlx::query("UPDATE estimates SET is_active = 0, updated_at = ? WHERE contract_id = ? AND id != ? AND is_active = 1")
            .bind(now)
            .bind(current.contract_id)
            .bind(estimate_id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        "UPDATE estimates SET status = 'approved', approved_by = ?, approved_at = ?, is_active = ?, updated_at = ? WHERE id = ?",
    )
    .bind(approver_id)
    .bind(now)
    .bind(activate)
    .bind(now)
    .bind(estimate_id)
    .execute(&mut *tx)
    .await?;

    let approved = sqlx::query_as::<_, Estimate>(&sql)
        .bind(estimate_id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(estimate_id = %estimate_id, contract_id = %approved.contract_id, active = activate, "estimate approved");
    Ok(approved)
}

/// New employee account plus its employee record.
pub struct NewEmployee<'a> {
    pub contractor_id: Uuid,
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub hourly_rate: f64,
    pub password_hash: &'a str,
}

pub async fn onboard_employee(pool: &SqlitePool, new: NewEmployee<'_>) -> AppResult<Employee> {
    let mut tx = pool.begin().await?;
    let now = utc_now();

    let taken = sqlx::query_scalar::<_, i64>("SELECT 1 FROM users WHERE email = ?")
        .bind(new.email)
        .fetch_optional(&mut *tx)
        .await?;
    if taken.is_some() {
        return Err(AppError::conflict("email already registered"));
    }

    let user_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, email, name, phone, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(new.email)
    .bind(new.name)
    .bind(new.phone)
    .bind(new.password_hash)
    .bind(Role::Employee)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let employee_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO employees (id, user_id, contractor_id, name, email, phone, hourly_rate, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(employee_id)
    .bind(user_id)
    .bind(new.contractor_id)
    .bind(new.name)
    .bind(new.email)
    .bind(new.phone)
    .bind(new.hourly_rate)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
    let employee = sqlx::query_as::<_, Employee>(&sql)
        .bind(employee_id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(employee_id = %employee.id, contractor_id = %new.contractor_id, "employee onboarded");
    Ok(employee)
}
