use crate::db::models::request::RequestType;
use crate::workflow::authorize::Role;

/// Per-type policy plugged into the shared state machine. The engine never
/// branches on the request type; everything type-specific enters through
/// one of these.
#[derive(Debug)]
pub struct TypePolicy {
    /// Who advances `pending -> reviewed` (and handles holds/cancels).
    pub reviewer_roles: &'static [Role],
    /// Who advances `reviewed -> approved` (department-scoped).
    pub approver_roles: &'static [Role],
    /// Who confirms completion once the type's predicate holds.
    pub completion_roles: &'static [Role],
    /// JOB: personnel must be assigned before review.
    pub needs_personnel_before_review: bool,
    /// VENUE: the owning department head must approve before review.
    pub needs_head_pre_approval: bool,
}

static JOB: TypePolicy = TypePolicy {
    reviewer_roles: &[Role::OperationsManager],
    approver_roles: &[Role::DepartmentHead],
    completion_roles: &[Role::OperationsManager],
    needs_personnel_before_review: true,
    needs_head_pre_approval: false,
};

static VENUE: TypePolicy = TypePolicy {
    reviewer_roles: &[Role::OperationsManager],
    approver_roles: &[Role::DepartmentHead],
    completion_roles: &[Role::OperationsManager],
    needs_personnel_before_review: false,
    needs_head_pre_approval: true,
};

static TRANSPORT: TypePolicy = TypePolicy {
    reviewer_roles: &[Role::OperationsManager],
    approver_roles: &[Role::DepartmentHead],
    completion_roles: &[Role::OperationsManager],
    needs_personnel_before_review: false,
    needs_head_pre_approval: false,
};

static BORROW: TypePolicy = TypePolicy {
    reviewer_roles: &[Role::OperationsManager],
    approver_roles: &[Role::DepartmentHead],
    completion_roles: &[Role::OperationsManager],
    needs_personnel_before_review: false,
    needs_head_pre_approval: false,
};

static SUPPLY: TypePolicy = TypePolicy {
    reviewer_roles: &[Role::OperationsManager],
    approver_roles: &[Role::DepartmentHead],
    completion_roles: &[Role::OperationsManager],
    needs_personnel_before_review: false,
    needs_head_pre_approval: false,
};

pub fn policy_for(request_type: RequestType) -> &'static TypePolicy {
    match request_type {
        RequestType::Job => &JOB,
        RequestType::Venue => &VENUE,
        RequestType::Transport => &TRANSPORT,
        RequestType::Borrow => &BORROW,
        RequestType::Supply => &SUPPLY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_jobs_gate_on_personnel() {
        assert!(policy_for(RequestType::Job).needs_personnel_before_review);
        assert!(!policy_for(RequestType::Venue).needs_personnel_before_review);
        assert!(!policy_for(RequestType::Supply).needs_personnel_before_review);
    }

    #[test]
    fn only_venues_gate_on_head_pre_approval() {
        assert!(policy_for(RequestType::Venue).needs_head_pre_approval);
        assert!(!policy_for(RequestType::Job).needs_head_pre_approval);
        assert!(!policy_for(RequestType::Transport).needs_head_pre_approval);
    }

    #[test]
    fn every_type_shares_the_reviewer_and_approver_roles() {
        for t in [
            RequestType::Job,
            RequestType::Venue,
            RequestType::Transport,
            RequestType::Borrow,
            RequestType::Supply,
        ] {
            let policy = policy_for(t);
            assert_eq!(policy.reviewer_roles, &[Role::OperationsManager]);
            assert_eq!(policy.approver_roles, &[Role::DepartmentHead]);
        }
    }
}
