use std::fmt;

use super::principal::{Actor, Role};
use super::relation::Relation;
use super::resolver::{ContractFacts, EmployeeFacts, ExpenseFacts, PaymentFacts, ProjectFacts, WorkLogFacts};
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
    Transition,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Read,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
        Operation::Transition,
    ];
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Transition => "transition",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotOwner,
    WrongRole,
    NotAssigned,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DenyReason::NotOwner => "not owner",
            DenyReason::WrongRole => "wrong role",
            DenyReason::NotAssigned => "not assigned",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> AppResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AppError::forbidden(reason)),
        }
    }
}

/// What is being acted upon, with its relationships already resolved.
///
/// Plural variants stand for a project's collection of records (listing and
/// creating); singular variants for one existing record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resource {
    NewProject,
    Project(ProjectFacts),
    /// Contracts on a project, listed per caller.
    ProjectContracts(ProjectFacts),
    /// The contractors assigned to a project; creating and deleting are
    /// assignment and removal.
    ProjectContractors(ProjectFacts),
    /// Contractor accounts available for assignment.
    ContractorDirectory,
    /// Progress updates and photos posted against a project.
    ProjectDocs(ProjectFacts),
    Contract(ContractFacts),
    /// Estimates are authorized against their parent contract.
    Estimate(ContractFacts),
    Expenses(ProjectFacts),
    Expense(ExpenseFacts),
    Payments(ProjectFacts),
    Payment(PaymentFacts),
    WorkLogs(ProjectFacts),
    WorkLog(WorkLogFacts),
    /// A contractor's own crew as a whole: listing, onboarding and hour
    /// summaries.
    Crew,
    Employee(EmployeeFacts),
    /// Putting an employee on a project.
    CrewAssignment {
        employee: EmployeeFacts,
        project: ProjectFacts,
    },
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::NewProject | Resource::Project(_) => "project",
            Resource::ProjectContracts(_) => "contract",
            Resource::ProjectContractors(_) | Resource::ContractorDirectory => "contractor",
            Resource::ProjectDocs(_) => "project_docs",
            Resource::Contract(_) => "contract",
            Resource::Estimate(_) => "estimate",
            Resource::Expenses(_) | Resource::Expense(_) => "expense",
            Resource::Payments(_) | Resource::Payment(_) => "payment",
            Resource::WorkLogs(_) | Resource::WorkLog(_) => "work_log",
            Resource::Crew | Resource::Employee(_) | Resource::CrewAssignment { .. } => "employee",
        }
    }
}

/// Pluggable decision core. Implementations must be pure and total: every
/// triple gets exactly one decision.
pub trait PolicyEvaluator: Send + Sync {
    fn authorize(&self, actor: &Actor, operation: Operation, resource: &Resource) -> Decision;
}

/// The decision table for owners, contractors and employees.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl DefaultPolicy {
    pub fn new() -> Self {
        Self
    }

    fn decide(actor: &Actor, operation: Operation, resource: &Resource) -> Decision {
        use Operation::*;

        match resource {
            Resource::NewProject => require(operation == Create && actor.is(Role::Owner), DenyReason::WrongRole),

            Resource::Project(p) => match (p.relation, operation) {
                (Relation::Owner, _) => Decision::Allow,
                (Relation::AssignedContractor | Relation::AssignedEmployee, Read) => Decision::Allow,
                (Relation::AssignedContractor | Relation::AssignedEmployee, _) => deny(DenyReason::NotOwner),
                (Relation::Unrelated, _) => deny(unrelated(actor)),
            },

            Resource::ProjectContracts(p) => match (p.relation, operation) {
                (Relation::Unrelated, _) => deny(unrelated(actor)),
                (Relation::AssignedEmployee, _) => deny(DenyReason::WrongRole),
                (_, Read) => Decision::Allow,
                // contracts are created and terminated through project assignment
                _ => deny(DenyReason::WrongRole),
            },

            Resource::ProjectContractors(p) => match (p.relation, operation) {
                (Relation::Unrelated, _) => deny(unrelated(actor)),
                (Relation::AssignedEmployee, _) => deny(DenyReason::WrongRole),
                (_, Read) => Decision::Allow,
                (Relation::Owner, Create | Delete) => Decision::Allow,
                (Relation::AssignedContractor, Create | Delete) => deny(DenyReason::NotOwner),
                _ => deny(DenyReason::WrongRole),
            },

            Resource::ContractorDirectory => {
                require(operation == Read && actor.is(Role::Owner), DenyReason::WrongRole)
            }

            Resource::ProjectDocs(p) => match (p.relation, operation) {
                (Relation::Unrelated, _) => deny(unrelated(actor)),
                (_, Read) => Decision::Allow,
                (Relation::Owner, _) => Decision::Allow,
                (Relation::AssignedContractor, Create) => Decision::Allow,
                (Relation::AssignedContractor, _) => deny(DenyReason::NotOwner),
                (Relation::AssignedEmployee, _) => deny(DenyReason::WrongRole),
            },

            Resource::Contract(c) => match (c.relation, operation) {
                (Relation::Unrelated, _) => deny(unrelated(actor)),
                (Relation::AssignedEmployee, _) => deny(DenyReason::WrongRole),
                (_, Read | Transition) => Decision::Allow,
                // contracts are created and terminated through project assignment
                (_, Create | Update | Delete) => deny(DenyReason::WrongRole),
            },

            Resource::Estimate(c) => match (c.relation, operation) {
                (Relation::Unrelated, _) => deny(unrelated(actor)),
                (Relation::AssignedEmployee, _) => deny(DenyReason::WrongRole),
                (Relation::Owner | Relation::AssignedContractor, Read) => Decision::Allow,
                (Relation::AssignedContractor, Create) => Decision::Allow,
                (Relation::Owner, Transition) => Decision::Allow,
                _ => deny(DenyReason::WrongRole),
            },

            Resource::Expenses(p) => match (p.relation, operation) {
                (Relation::Unrelated, _) => deny(unrelated(actor)),
                (_, Read | Create) => Decision::Allow,
                _ => deny(DenyReason::WrongRole),
            },

            Resource::Expense(e) => Self::expense(actor, operation, e),

            Resource::Payments(p) => match (p.relation, operation) {
                (Relation::Unrelated, _) => deny(unrelated(actor)),
                (Relation::AssignedEmployee, _) => deny(DenyReason::WrongRole),
                (_, Read) => Decision::Allow,
                (Relation::Owner, Create) => Decision::Allow,
                _ => deny(DenyReason::WrongRole),
            },

            Resource::Payment(p) => Self::payment(actor, operation, p),

            Resource::WorkLogs(p) => match (p.relation, operation) {
                (Relation::Unrelated, _) => deny(unrelated(actor)),
                (_, Read) => Decision::Allow,
                (Relation::AssignedEmployee, Create) => Decision::Allow,
                _ => deny(DenyReason::WrongRole),
            },

            Resource::WorkLog(w) => Self::work_log(actor, operation, w),

            Resource::Crew => require(
                matches!(operation, Read | Create) && actor.is(Role::Contractor),
                DenyReason::WrongRole,
            ),

            Resource::Employee(e) => {
                if actor.id == e.contractor_id {
                    require(operation != Create, DenyReason::WrongRole)
                } else if actor.id == e.user_id {
                    require(operation == Read, DenyReason::NotOwner)
                } else if actor.is(Role::Contractor) {
                    deny(DenyReason::NotOwner)
                } else {
                    deny(DenyReason::WrongRole)
                }
            }

            Resource::CrewAssignment { employee, project } => {
                if actor.id != employee.contractor_id {
                    let reason = if actor.is(Role::Contractor) { DenyReason::NotOwner } else { DenyReason::WrongRole };
                    deny(reason)
                } else if operation != Create {
                    deny(DenyReason::WrongRole)
                } else {
                    // the crew can only join projects its contractor is on
                    require(project.relation == Relation::AssignedContractor, DenyReason::NotAssigned)
                }
            }
        }
    }

    fn expense(actor: &Actor, operation: Operation, e: &ExpenseFacts) -> Decision {
        let relation = e.project.relation;
        if relation == Relation::Unrelated {
            return deny(unrelated(actor));
        }

        match operation {
            Operation::Read => match relation {
                Relation::AssignedEmployee => {
                    require(e.slice.is_some() && e.slice == e.project.contractor_slice, DenyReason::NotAssigned)
                }
                _ => Decision::Allow,
            },
            Operation::Update => require(actor.id == e.added_by, DenyReason::NotOwner),
            Operation::Delete => require(actor.id == e.added_by || relation == Relation::Owner, DenyReason::NotOwner),
            Operation::Create | Operation::Transition => deny(DenyReason::WrongRole),
        }
    }

    fn payment(actor: &Actor, operation: Operation, p: &PaymentFacts) -> Decision {
        let relation = p.project.relation;
        match relation {
            Relation::Unrelated => return deny(unrelated(actor)),
            Relation::AssignedEmployee => return deny(DenyReason::WrongRole),
            _ => {}
        }

        match operation {
            Operation::Read => Decision::Allow,
            Operation::Update => require(actor.id == p.added_by, DenyReason::NotOwner),
            Operation::Delete => require(actor.id == p.added_by || relation == Relation::Owner, DenyReason::NotOwner),
            Operation::Transition => require(relation == Relation::AssignedContractor, DenyReason::WrongRole),
            Operation::Create => deny(DenyReason::WrongRole),
        }
    }

    fn work_log(actor: &Actor, operation: Operation, w: &WorkLogFacts) -> Decision {
        let is_worker = actor.id == w.employee_id;
        let is_employer = actor.is(Role::Contractor) && w.employer_id == Some(actor.id);

        match operation {
            Operation::Read if is_worker || is_employer || w.project.relation == Relation::Owner => Decision::Allow,
            // checking out stays possible after the assignment is withdrawn
            Operation::Transition if is_worker => Decision::Allow,
            Operation::Read | Operation::Transition if w.project.relation == Relation::Unrelated => {
                deny(unrelated(actor))
            }
            Operation::Read => deny(DenyReason::NotOwner),
            Operation::Transition if actor.is(Role::Employee) => deny(DenyReason::NotOwner),
            _ => deny(DenyReason::WrongRole),
        }
    }
}

impl PolicyEvaluator for DefaultPolicy {
    fn authorize(&self, actor: &Actor, operation: Operation, resource: &Resource) -> Decision {
        let decision = Self::decide(actor, operation, resource);

        match decision {
            Decision::Allow => tracing::debug!(
                actor_id = %actor.id,
                role = %actor.role,
                operation = %operation,
                resource = resource.kind(),
                "access allowed"
            ),
            Decision::Deny(reason) => tracing::debug!(
                actor_id = %actor.id,
                role = %actor.role,
                operation = %operation,
                resource = resource.kind(),
                reason = %reason,
                "access denied"
            ),
        }

        decision
    }
}

fn deny(reason: DenyReason) -> Decision {
    Decision::Deny(reason)
}

fn require(condition: bool, otherwise: DenyReason) -> Decision {
    if condition {
        Decision::Allow
    } else {
        Decision::Deny(otherwise)
    }
}

/// Owners who do not own the project are told so; everyone else is simply
/// not on it.
fn unrelated(actor: &Actor) -> DenyReason {
    match actor.role {
        Role::Owner => DenyReason::NotOwner,
        Role::Contractor | Role::Employee => DenyReason::NotAssigned,
    }
}
