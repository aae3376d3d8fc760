use crate::middleware::auth::ActorContext;
use crate::workflow::error::{WorkflowError, WorkflowResult};

/// ✅ **Organizational roles recognized by the approval pipeline**
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    OperationsManager,
    DepartmentHead,
    Personnel,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::OperationsManager => "operations_manager",
            Role::DepartmentHead => "department_head",
            Role::Personnel => "personnel",
            Role::Staff => "staff",
        }
    }

    /// Parse a stored role string; unknown roles are ignored by callers.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "operations_manager" => Some(Role::OperationsManager),
            "department_head" => Some(Role::DepartmentHead),
            "personnel" => Some(Role::Personnel),
            "staff" => Some(Role::Staff),
            _ => None,
        }
    }
}

/// Department scoping applied on top of a role requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartmentScope {
    /// The role alone is enough, wherever the actor sits.
    Any,
    /// The actor must belong to (or, for department heads, lead) the
    /// given department.
    Exactly(i32),
}

/// Pure role/department gate evaluated before every mutation.
///
/// Admins pass every gate. For everyone else the actor must hold at least
/// one of `required_roles`, and when the scope names a department, a
/// `DepartmentHead` must actually head that department while any other role
/// must be a member of it.
pub fn require_any_role(
    actor: &ActorContext,
    required_roles: &[Role],
    scope: DepartmentScope,
) -> WorkflowResult<()> {
    if actor.is_admin() {
        return Ok(());
    }

    let satisfied = required_roles.iter().any(|role| {
        if !actor.has_role(*role) {
            return false;
        }
        match scope {
            DepartmentScope::Any => true,
            DepartmentScope::Exactly(dept) => match role {
                Role::DepartmentHead => actor.heads_department(dept),
                _ => actor.department_id == Some(dept),
            },
        }
    });

    if satisfied {
        Ok(())
    } else {
        let wanted: Vec<&str> = required_roles.iter().map(Role::as_str).collect();
        Err(WorkflowError::forbidden(format!(
            "This action requires one of the following roles: {}",
            wanted.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(roles: &[Role], department_id: Option<i32>, headed: &[i32]) -> ActorContext {
        ActorContext {
            user_id: 7,
            username: "tester".to_string(),
            roles: roles.to_vec(),
            department_id,
            headed_departments: headed.to_vec(),
        }
    }

    #[test]
    fn admin_passes_every_gate() {
        let admin = actor(&[Role::Admin], None, &[]);
        assert!(require_any_role(&admin, &[Role::OperationsManager], DepartmentScope::Any).is_ok());
        assert!(
            require_any_role(&admin, &[Role::DepartmentHead], DepartmentScope::Exactly(3)).is_ok()
        );
    }

    #[test]
    fn role_without_department_scope() {
        let reviewer = actor(&[Role::OperationsManager], Some(1), &[]);
        assert!(
            require_any_role(&reviewer, &[Role::OperationsManager], DepartmentScope::Any).is_ok()
        );
        assert!(matches!(
            require_any_role(&reviewer, &[Role::DepartmentHead], DepartmentScope::Any),
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn department_head_must_head_the_scoped_department() {
        let head = actor(&[Role::DepartmentHead], Some(2), &[2]);
        assert!(
            require_any_role(&head, &[Role::DepartmentHead], DepartmentScope::Exactly(2)).is_ok()
        );
        assert!(matches!(
            require_any_role(&head, &[Role::DepartmentHead], DepartmentScope::Exactly(9)),
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn membership_scoping_for_other_roles() {
        let staff = actor(&[Role::Staff], Some(4), &[]);
        assert!(require_any_role(&staff, &[Role::Staff], DepartmentScope::Exactly(4)).is_ok());
        assert!(require_any_role(&staff, &[Role::Staff], DepartmentScope::Exactly(5)).is_err());
    }

    #[test]
    fn unknown_role_strings_are_ignored() {
        assert_eq!(Role::parse("operations_manager"), Some(Role::OperationsManager));
        assert_eq!(Role::parse("janitor"), None);
    }
}
