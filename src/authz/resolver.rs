use async_trait::async_trait;
use uuid::Uuid;

use super::principal::{Actor, Role};
use super::relation::Relation;
use crate::errors::{AppError, AppResult};
use crate::workflow::{ContractStatus, EstimateStatus, PaymentStatus};

/// Row lookups the resolver needs. Implemented over SQLite by
/// [`crate::db::SqliteStore`]; tests use an in-memory double.
#[async_trait]
pub trait OwnershipStore: Send + Sync {
    async fn project_owner(&self, project_id: Uuid) -> AppResult<Option<Uuid>>;
    async fn contractor_assigned(&self, project_id: Uuid, contractor_id: Uuid) -> AppResult<bool>;
    /// Direct `employee_projects` row for an employee whose record is active.
    async fn employee_assigned(&self, project_id: Uuid, employee_id: Uuid) -> AppResult<bool>;
    /// Contractor of an active employee account.
    async fn employer_of(&self, employee_id: Uuid) -> AppResult<Option<Uuid>>;
    /// Contractor whose slice a user's records fall into: the contractor
    /// itself, or an employee's contractor (active or not). `None` for owners.
    async fn contractor_slice_of(&self, user_id: Uuid) -> AppResult<Option<Uuid>>;
    async fn contract_link(&self, contract_id: Uuid) -> AppResult<Option<ContractLink>>;
    async fn estimate_link(&self, estimate_id: Uuid) -> AppResult<Option<EstimateLink>>;
    async fn expense_link(&self, expense_id: Uuid) -> AppResult<Option<ExpenseLink>>;
    async fn payment_link(&self, payment_id: Uuid) -> AppResult<Option<PaymentLink>>;
    async fn work_log_link(&self, work_log_id: Uuid) -> AppResult<Option<WorkLogLink>>;
    async fn employee_link(&self, employee_id: Uuid) -> AppResult<Option<EmployeeLink>>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContractLink {
    pub project_id: Uuid,
    pub owner_id: Uuid,
    pub contractor_id: Uuid,
    pub status: ContractStatus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateLink {
    pub contract_id: Uuid,
    pub status: EstimateStatus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpenseLink {
    pub project_id: Uuid,
    pub added_by: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentLink {
    pub project_id: Uuid,
    pub added_by: Uuid,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkLogLink {
    pub project_id: Uuid,
    pub employee_id: Uuid,
    pub open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmployeeLink {
    pub user_id: Uuid,
    pub contractor_id: Uuid,
    pub is_active: bool,
}

/// The actor's standing on a project. `contractor_slice` is the contractor
/// whose financial records the actor may see: the actor for contractors,
/// the employer for employees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectFacts {
    pub project_id: Uuid,
    pub owner_id: Uuid,
    pub relation: Relation,
    pub contractor_slice: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContractFacts {
    pub contract_id: Uuid,
    pub project_id: Uuid,
    pub owner_id: Uuid,
    pub contractor_id: Uuid,
    pub status: ContractStatus,
    pub relation: Relation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateFacts {
    pub estimate_id: Uuid,
    pub status: EstimateStatus,
    pub contract: ContractFacts,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpenseFacts {
    pub expense_id: Uuid,
    pub added_by: Uuid,
    /// Contractor slice of the creator; `None` when the owner added it.
    pub slice: Option<Uuid>,
    pub project: ProjectFacts,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentFacts {
    pub payment_id: Uuid,
    pub added_by: Uuid,
    pub status: PaymentStatus,
    pub project: ProjectFacts,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkLogFacts {
    pub work_log_id: Uuid,
    pub employee_id: Uuid,
    pub employer_id: Option<Uuid>,
    pub open: bool,
    pub project: ProjectFacts,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmployeeFacts {
    pub employee_id: Uuid,
    pub user_id: Uuid,
    pub contractor_id: Uuid,
    pub is_active: bool,
}

/// Relates an actor to a resource by id.
///
/// Employee access is two-hop but has a single rule: an employee reaches a
/// project only through a direct assignment row while their employee record
/// is active, and reaches financial records only inside their contractor's
/// slice.
#[derive(Debug, Clone)]
pub struct OwnershipResolver<S> {
    store: S,
}

impl<S: OwnershipStore> OwnershipResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn project(&self, actor: &Actor, project_id: Uuid) -> AppResult<ProjectFacts> {
        let owner_id = self
            .store
            .project_owner(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("project not found"))?;

        let (relation, contractor_slice) = match actor.role {
            Role::Owner => {
                let relation = if actor.id == owner_id { Relation::Owner } else { Relation::Unrelated };
                (relation, None)
            }
            Role::Contractor => {
                let relation = if self.store.contractor_assigned(project_id, actor.id).await? {
                    Relation::AssignedContractor
                } else {
                    Relation::Unrelated
                };
                (relation, Some(actor.id))
            }
            Role::Employee => {
                let employer = self.store.employer_of(actor.id).await?;
                let assigned = employer.is_some() && self.store.employee_assigned(project_id, actor.id).await?;
                let relation = if assigned { Relation::AssignedEmployee } else { Relation::Unrelated };
                (relation, employer)
            }
        };

        tracing::trace!(actor_id = %actor.id, project_id = %project_id, relation = %relation, "resolved project relation");

        Ok(ProjectFacts {
            project_id,
            owner_id,
            relation,
            contractor_slice,
        })
    }

    pub async fn contract(&self, actor: &Actor, contract_id: Uuid) -> AppResult<ContractFacts> {
        let link = self
            .store
            .contract_link(contract_id)
            .await?
            .ok_or_else(|| AppError::not_found("contract not found"))?;

        let relation = if actor.id == link.owner_id {
            Relation::Owner
        } else if actor.id == link.contractor_id {
            Relation::AssignedContractor
        } else if actor.is(Role::Employee)
            && self.store.employer_of(actor.id).await? == Some(link.contractor_id)
            && self.store.employee_assigned(link.project_id, actor.id).await?
        {
            Relation::AssignedEmployee
        } else {
            Relation::Unrelated
        };

        Ok(ContractFacts {
            contract_id,
            project_id: link.project_id,
            owner_id: link.owner_id,
            contractor_id: link.contractor_id,
            status: link.status,
            relation,
        })
    }

    pub async fn estimate(&self, actor: &Actor, estimate_id: Uuid) -> AppResult<EstimateFacts> {
        let link = self
            .store
            .estimate_link(estimate_id)
            .await?
            .ok_or_else(|| AppError::not_found("estimate not found"))?;
        let contract = self.contract(actor, link.contract_id).await?;

        Ok(EstimateFacts {
            estimate_id,
            status: link.status,
            contract,
        })
    }

    pub async fn expense(&self, actor: &Actor, expense_id: Uuid) -> AppResult<ExpenseFacts> {
        let link = self
            .store
            .expense_link(expense_id)
            .await?
            .ok_or_else(|| AppError::not_found("expense not found"))?;
        let project = self.project(actor, link.project_id).await?;
        let slice = self.store.contractor_slice_of(link.added_by).await?;

        Ok(ExpenseFacts {
            expense_id,
            added_by: link.added_by,
            slice,
            project,
        })
    }

    pub async fn payment(&self, actor: &Actor, payment_id: Uuid) -> AppResult<PaymentFacts> {
        let link = self
            .store
            .payment_link(payment_id)
            .await?
            .ok_or_else(|| AppError::not_found("payment not found"))?;
        let project = self.project(actor, link.project_id).await?;

        Ok(PaymentFacts {
            payment_id,
            added_by: link.added_by,
            status: link.status,
            project,
        })
    }

    pub async fn work_log(&self, actor: &Actor, work_log_id: Uuid) -> AppResult<WorkLogFacts> {
        let link = self
            .store
            .work_log_link(work_log_id)
            .await?
            .ok_or_else(|| AppError::not_found("work log not found"))?;
        let project = self.project(actor, link.project_id).await?;
        let employer_id = self.store.contractor_slice_of(link.employee_id).await?;

        Ok(WorkLogFacts {
            work_log_id,
            employee_id: link.employee_id,
            employer_id,
            open: link.open,
            project,
        })
    }

    pub async fn employee(&self, employee_id: Uuid) -> AppResult<EmployeeFacts> {
        let link = self
            .store
            .employee_link(employee_id)
            .await?
            .ok_or_else(|| AppError::not_found("employee not found"))?;

        Ok(EmployeeFacts {
            employee_id,
            user_id: link.user_id,
            contractor_id: link.contractor_id,
            is_active: link.is_active,
        })
    }
}
