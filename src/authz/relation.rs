use std::fmt;

/// How an actor relates to a project (and, transitively, to the records the
/// project owns).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Owner,
    AssignedContractor,
    AssignedEmployee,
    Unrelated,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Relation::Owner => "owner",
            Relation::AssignedContractor => "assigned_contractor",
            Relation::AssignedEmployee => "assigned_employee",
            Relation::Unrelated => "unrelated",
        };
        f.write_str(label)
    }
}
