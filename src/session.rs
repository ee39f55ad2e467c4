//! Executor identity, roles, and unit scope.

use serde::{Deserialize, Serialize};

/// Role assigned to a backend user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    FieldOperator,
    Supervisor,
    Manager,
    Admin,
}

/// Actions a role may perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    ExecuteChecklists,
    ViewExecutions,
    ManageIncidents,
    ManageUnits,
    ManageUsers,
}

/// Permissions granted to a role.
pub fn permissions_for(role: Role) -> &'static [Permission] {
    use Permission::*;
    match role {
        Role::FieldOperator => &[ExecuteChecklists, ViewExecutions, ManageIncidents],
        Role::Supervisor => &[
            ExecuteChecklists,
            ViewExecutions,
            ManageIncidents,
            ManageUnits,
        ],
        Role::Manager => &[ViewExecutions, ManageIncidents, ManageUnits],
        Role::Admin => &[
            ExecuteChecklists,
            ViewExecutions,
            ManageIncidents,
            ManageUnits,
            ManageUsers,
        ],
    }
}

/// Pure set-membership permission check.
pub fn has_permission(role: Role, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}

/// One unit a user may operate in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitAssignment {
    pub unit_id: String,
    pub name: String,
    /// Marks a unit beyond the user's primary/home unit.
    pub is_coverage: bool,
}

/// How a user's unit assignments position them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitScope {
    Home,
    Coverage,
}

/// Classify a user's scope from their unit assignments.
///
/// Any coverage-flagged assignment means coverage scope, and so does
/// holding multiple units with none flagged: ambiguous multi-unit users
/// default to coverage. A single unflagged unit (or none) is home scope.
pub fn classify_unit_scope(units: &[UnitAssignment]) -> UnitScope {
    if units.iter().any(|u| u.is_coverage) || units.len() > 1 {
        UnitScope::Coverage
    } else {
        UnitScope::Home
    }
}

/// Identity and assignments of the signed-in executor.
///
/// Passed explicitly to the engine; never read from ambient state.
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub executor_id: String,
    pub full_name: String,
    pub role: Role,
    pub units: Vec<UnitAssignment>,
}

/// Supplies the current executor to the engine.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in session, or `None` when nobody is signed in.
    fn current(&self) -> Option<SessionContext>;
}

/// Fixed identity for hosts that resolve the session up front.
pub struct StaticIdentity {
    session: Option<SessionContext>,
}

impl StaticIdentity {
    pub fn new(session: Option<SessionContext>) -> Self {
        Self { session }
    }

    pub fn signed_in(session: SessionContext) -> Self {
        Self::new(Some(session))
    }
}

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Option<SessionContext> {
        self.session.clone()
    }
}
