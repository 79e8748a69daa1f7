//! Authorization: actor identity, relationship resolution and the access
//! policy.
//!
//! Every request follows the same path:
//! - the bearer token yields an [`Actor`]
//! - the [`OwnershipResolver`] relates the actor to the target resource
//!   (a missing id is `NotFound`, never `Unrelated`)
//! - the [`PolicyEvaluator`] turns role + relation into `Allow` or
//!   `Deny(reason)`

mod policy;
mod principal;
mod relation;
mod resolver;

pub use policy::{Decision, DefaultPolicy, DenyReason, Operation, PolicyEvaluator, Resource};
pub use principal::{Actor, Role};
pub use relation::Relation;
pub use resolver::{
    ContractFacts, ContractLink, EmployeeFacts, EmployeeLink, EstimateFacts, EstimateLink, ExpenseFacts, ExpenseLink,
    OwnershipResolver, OwnershipStore, PaymentFacts, PaymentLink, ProjectFacts, WorkLogFacts, WorkLogLink,
};
