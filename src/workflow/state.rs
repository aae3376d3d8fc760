use crate::db::models::job::JobStatus;
use crate::db::models::request::{Request, RequestStatus};
use crate::middleware::auth::ActorContext;
use crate::workflow::authorize::{require_any_role, DepartmentScope};
use crate::workflow::error::{WorkflowError, WorkflowResult};
use crate::workflow::policy::TypePolicy;

/// The slice of the specialization record the engine needs: whether
/// execution has started, the job sub-status, and the per-type pre-gates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressSnapshot {
    pub in_progress: bool,
    pub job_status: Option<JobStatus>,
    pub personnel_assigned: bool,
    pub head_approval: Option<bool>,
}

impl ProgressSnapshot {
    /// Execution has started once the resource is in use or the job
    /// sub-status moved off `Pending`; holds and cancellations are blocked
    /// from then on.
    pub fn execution_started(&self) -> bool {
        self.in_progress || self.job_status.is_some_and(|s| s != JobStatus::Pending)
    }
}

/// Which reason column the transition writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonField {
    Rejection,
    Cancellation,
    OnHold,
}

/// The effect of a legal transition, ready to be persisted with a
/// compare-and-set on the `from` status.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub reason: Option<(ReasonField, String)>,
    pub set_reviewer: bool,
    pub clear_on_hold_reason: bool,
    pub stamp_completed_at: bool,
}

fn require_reason(reason: Option<&str>, what: &str) -> WorkflowResult<String> {
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => Ok(r.to_string()),
        _ => Err(WorkflowError::validation(format!(
            "A non-empty {what} is required"
        ))),
    }
}

/// Evaluate a requested status change against the shared lifecycle, the
/// per-type policy and the actor's authority.
///
/// `COMPLETED` is never reachable here: completion goes through the
/// per-type actions and [`plan_completion`] once the type's predicate
/// holds.
pub fn plan_transition(
    request: &Request,
    snapshot: &ProgressSnapshot,
    actor: &ActorContext,
    policy: &TypePolicy,
    target: RequestStatus,
    reason: Option<&str>,
) -> WorkflowResult<TransitionPlan> {
    use RequestStatus::*;

    let from = request.status;
    let invalid = || WorkflowError::InvalidTransition {
        from: from.as_str(),
        to: target.as_str(),
    };

    let mut plan = TransitionPlan {
        from,
        to: target,
        reason: None,
        set_reviewer: false,
        clear_on_hold_reason: from == OnHold,
        stamp_completed_at: false,
    };

    match (from, target) {
        (Pending, Reviewed) => {
            require_any_role(actor, policy.reviewer_roles, DepartmentScope::Any)?;
            if policy.needs_personnel_before_review && !snapshot.personnel_assigned {
                return Err(WorkflowError::validation(
                    "Personnel must be assigned before the request can be reviewed",
                ));
            }
            if policy.needs_head_pre_approval && snapshot.head_approval != Some(true) {
                return Err(WorkflowError::validation(
                    "The venue's department head must approve the booking before review",
                ));
            }
            plan.set_reviewer = true;
        }
        (Pending, Rejected) => {
            require_any_role(actor, policy.reviewer_roles, DepartmentScope::Any)?;
            plan.reason = Some((
                ReasonField::Rejection,
                require_reason(reason, "rejection reason")?,
            ));
            plan.set_reviewer = true;
        }
        (Reviewed, Approved) => {
            require_any_role(
                actor,
                policy.approver_roles,
                DepartmentScope::Exactly(request.department_id),
            )?;
        }
        (Reviewed, Rejected) => {
            require_any_role(
                actor,
                policy.approver_roles,
                DepartmentScope::Exactly(request.department_id),
            )?;
            plan.reason = Some((
                ReasonField::Rejection,
                require_reason(reason, "rejection reason")?,
            ));
        }
        (Approved, OnHold) => {
            require_any_role(actor, policy.reviewer_roles, DepartmentScope::Any)?;
            if snapshot.execution_started() {
                return Err(WorkflowError::validation(
                    "The request is already in progress and can no longer be put on hold",
                ));
            }
            plan.reason = Some((
                ReasonField::OnHold,
                require_reason(reason, "on-hold reason")?,
            ));
        }
        // resume
        (OnHold, Approved) => {
            require_any_role(actor, policy.reviewer_roles, DepartmentScope::Any)?;
        }
        (Pending, Cancelled) => {
            if actor.user_id != request.requested_by && !actor.is_admin() {
                return Err(WorkflowError::forbidden(
                    "Only the original requester may cancel a pending request",
                ));
            }
            // the requester needs no reason; record a default for the audit trail
            let text = reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or("Cancelled by requester")
                .to_string();
            plan.reason = Some((ReasonField::Cancellation, text));
        }
        (Reviewed | Approved | OnHold, Cancelled) => {
            require_any_role(actor, policy.reviewer_roles, DepartmentScope::Any)?;
            if snapshot.execution_started() {
                return Err(WorkflowError::validation(
                    "The request is already in progress and can no longer be cancelled",
                ));
            }
            plan.reason = Some((
                ReasonField::Cancellation,
                require_reason(reason, "cancellation reason")?,
            ));
        }
        _ => return Err(invalid()),
    }

    Ok(plan)
}

/// Close an approved request once its type's completion predicate holds.
/// Callers check the predicate; this enforces status and authority.
pub fn plan_completion(
    request: &Request,
    actor: &ActorContext,
    policy: &TypePolicy,
) -> WorkflowResult<TransitionPlan> {
    if request.status != RequestStatus::Approved {
        return Err(WorkflowError::InvalidTransition {
            from: request.status.as_str(),
            to: RequestStatus::Completed.as_str(),
        });
    }
    require_any_role(actor, policy.completion_roles, DepartmentScope::Any)?;
    Ok(TransitionPlan {
        from: RequestStatus::Approved,
        to: RequestStatus::Completed,
        reason: None,
        set_reviewer: false,
        clear_on_hold_reason: false,
        stamp_completed_at: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::request::RequestType;
    use crate::workflow::authorize::Role;
    use crate::workflow::policy::policy_for;
    use chrono::NaiveDate;

    const REQUESTER: i32 = 10;
    const DEPT: i32 = 2;

    fn request(request_type: RequestType, status: RequestStatus) -> Request {
        Request {
            id: 1,
            request_type,
            status,
            requested_by: REQUESTER,
            department_id: DEPT,
            reviewed_by: None,
            rejection_reason: None,
            cancellation_reason: None,
            on_hold_reason: None,
            created_at: NaiveDate::from_ymd_opt(2026, 2, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            completed_at: None,
        }
    }

    fn actor(user_id: i32, roles: &[Role], headed: &[i32]) -> ActorContext {
        ActorContext {
            user_id,
            username: format!("user{user_id}"),
            roles: roles.to_vec(),
            department_id: Some(DEPT),
            headed_departments: headed.to_vec(),
        }
    }

    fn reviewer() -> ActorContext {
        actor(20, &[Role::OperationsManager], &[])
    }

    fn approver() -> ActorContext {
        actor(30, &[Role::DepartmentHead], &[DEPT])
    }

    fn requester() -> ActorContext {
        actor(REQUESTER, &[Role::Staff], &[])
    }

    fn snapshot() -> ProgressSnapshot {
        ProgressSnapshot::default()
    }

    #[test]
    fn review_then_approve_happy_path() {
        let policy = policy_for(RequestType::Transport);
        let req = request(RequestType::Transport, RequestStatus::Pending);

        let plan =
            plan_transition(&req, &snapshot(), &reviewer(), policy, RequestStatus::Reviewed, None)
                .unwrap();
        assert_eq!(plan.to, RequestStatus::Reviewed);
        assert!(plan.set_reviewer);

        let req = request(RequestType::Transport, RequestStatus::Reviewed);
        let plan =
            plan_transition(&req, &snapshot(), &approver(), policy, RequestStatus::Approved, None)
                .unwrap();
        assert_eq!(plan.to, RequestStatus::Approved);
    }

    #[test]
    fn unlisted_edges_are_invalid_transitions() {
        let policy = policy_for(RequestType::Supply);
        let cases = [
            (RequestStatus::Pending, RequestStatus::Approved),
            (RequestStatus::Pending, RequestStatus::Completed),
            (RequestStatus::Approved, RequestStatus::Reviewed),
            (RequestStatus::Rejected, RequestStatus::Reviewed),
            (RequestStatus::Completed, RequestStatus::Cancelled),
            (RequestStatus::Cancelled, RequestStatus::Pending),
            // a second "approve" must not double-transition
            (RequestStatus::Approved, RequestStatus::Approved),
        ];
        for (from, to) in cases {
            let req = request(RequestType::Supply, from);
            let result = plan_transition(
                &req,
                &snapshot(),
                &actor(99, &[Role::Admin], &[]),
                policy,
                to,
                Some("reason"),
            );
            assert!(
                matches!(result, Err(WorkflowError::InvalidTransition { .. })),
                "{from:?} -> {to:?} should be invalid"
            );
        }
    }

    #[test]
    fn review_requires_the_reviewer_role() {
        let policy = policy_for(RequestType::Venue);
        let req = request(RequestType::Venue, RequestStatus::Pending);
        let result = plan_transition(
            &req,
            &ProgressSnapshot {
                head_approval: Some(true),
                ..snapshot()
            },
            &requester(),
            policy,
            RequestStatus::Reviewed,
            None,
        );
        assert!(matches!(result, Err(WorkflowError::Forbidden(_))));
    }

    #[test]
    fn approval_is_department_scoped() {
        let policy = policy_for(RequestType::Transport);
        let req = request(RequestType::Transport, RequestStatus::Reviewed);
        let foreign_head = actor(31, &[Role::DepartmentHead], &[DEPT + 1]);
        let result = plan_transition(
            &req,
            &snapshot(),
            &foreign_head,
            policy,
            RequestStatus::Approved,
            None,
        );
        assert!(matches!(result, Err(WorkflowError::Forbidden(_))));
    }

    #[test]
    fn rejection_requires_a_reason() {
        let policy = policy_for(RequestType::Borrow);
        let req = request(RequestType::Borrow, RequestStatus::Pending);
        for bad in [None, Some(""), Some("   ")] {
            let result = plan_transition(
                &req,
                &snapshot(),
                &reviewer(),
                policy,
                RequestStatus::Rejected,
                bad,
            );
            assert!(matches!(result, Err(WorkflowError::Validation(_))));
        }
        let plan = plan_transition(
            &req,
            &snapshot(),
            &reviewer(),
            policy,
            RequestStatus::Rejected,
            Some("No vehicles free that day"),
        )
        .unwrap();
        assert_eq!(
            plan.reason,
            Some((ReasonField::Rejection, "No vehicles free that day".to_string()))
        );
    }

    #[test]
    fn job_review_is_gated_on_assigned_personnel() {
        let policy = policy_for(RequestType::Job);
        let req = request(RequestType::Job, RequestStatus::Pending);
        let result = plan_transition(
            &req,
            &snapshot(),
            &reviewer(),
            policy,
            RequestStatus::Reviewed,
            None,
        );
        assert!(matches!(result, Err(WorkflowError::Validation(_))));

        let with_personnel = ProgressSnapshot {
            personnel_assigned: true,
            job_status: Some(JobStatus::Pending),
            ..snapshot()
        };
        assert!(plan_transition(
            &req,
            &with_personnel,
            &reviewer(),
            policy,
            RequestStatus::Reviewed,
            None
        )
        .is_ok());
    }

    #[test]
    fn venue_review_is_gated_on_the_head_pre_approval() {
        let policy = policy_for(RequestType::Venue);
        let req = request(RequestType::Venue, RequestStatus::Pending);
        for gate in [None, Some(false)] {
            let snap = ProgressSnapshot {
                head_approval: gate,
                ..snapshot()
            };
            let result =
                plan_transition(&req, &snap, &reviewer(), policy, RequestStatus::Reviewed, None);
            assert!(matches!(result, Err(WorkflowError::Validation(_))));
        }
    }

    #[test]
    fn hold_requires_reason_and_stops_once_execution_started() {
        let policy = policy_for(RequestType::Venue);
        let req = request(RequestType::Venue, RequestStatus::Approved);

        let result =
            plan_transition(&req, &snapshot(), &reviewer(), policy, RequestStatus::OnHold, None);
        assert!(matches!(result, Err(WorkflowError::Validation(_))));

        let started = ProgressSnapshot {
            in_progress: true,
            ..snapshot()
        };
        let result = plan_transition(
            &req,
            &started,
            &reviewer(),
            policy,
            RequestStatus::OnHold,
            Some("venue flooded"),
        );
        assert!(matches!(result, Err(WorkflowError::Validation(_))));

        let plan = plan_transition(
            &req,
            &snapshot(),
            &reviewer(),
            policy,
            RequestStatus::OnHold,
            Some("venue flooded"),
        )
        .unwrap();
        assert_eq!(plan.reason.as_ref().unwrap().0, ReasonField::OnHold);
    }

    #[test]
    fn resume_clears_the_on_hold_reason() {
        let policy = policy_for(RequestType::Venue);
        let mut req = request(RequestType::Venue, RequestStatus::OnHold);
        req.on_hold_reason = Some("venue flooded".to_string());
        let plan =
            plan_transition(&req, &snapshot(), &reviewer(), policy, RequestStatus::Approved, None)
                .unwrap();
        assert!(plan.clear_on_hold_reason);
        assert!(plan.reason.is_none());
    }

    #[test]
    fn requester_may_cancel_their_own_pending_request_without_reason() {
        let policy = policy_for(RequestType::Supply);
        let req = request(RequestType::Supply, RequestStatus::Pending);
        let plan = plan_transition(
            &req,
            &snapshot(),
            &requester(),
            policy,
            RequestStatus::Cancelled,
            None,
        )
        .unwrap();
        // a default reason still lands in the audit trail
        assert_eq!(
            plan.reason,
            Some((ReasonField::Cancellation, "Cancelled by requester".to_string()))
        );
    }

    #[test]
    fn strangers_cannot_cancel_a_pending_request() {
        let policy = policy_for(RequestType::Supply);
        let req = request(RequestType::Supply, RequestStatus::Pending);
        let stranger = actor(55, &[Role::Staff], &[]);
        let result = plan_transition(
            &req,
            &snapshot(),
            &stranger,
            policy,
            RequestStatus::Cancelled,
            None,
        );
        assert!(matches!(result, Err(WorkflowError::Forbidden(_))));
    }

    #[test]
    fn reviewer_cancel_needs_reason_and_is_blocked_mid_execution() {
        let policy = policy_for(RequestType::Transport);
        let req = request(RequestType::Transport, RequestStatus::Approved);

        let result = plan_transition(
            &req,
            &snapshot(),
            &reviewer(),
            policy,
            RequestStatus::Cancelled,
            None,
        );
        assert!(matches!(result, Err(WorkflowError::Validation(_))));

        let started = ProgressSnapshot {
            in_progress: true,
            ..snapshot()
        };
        let result = plan_transition(
            &req,
            &started,
            &reviewer(),
            policy,
            RequestStatus::Cancelled,
            Some("trip no longer needed"),
        );
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
    }

    #[test]
    fn job_sub_status_past_pending_blocks_cancellation() {
        let policy = policy_for(RequestType::Job);
        let req = request(RequestType::Job, RequestStatus::Approved);
        let working = ProgressSnapshot {
            personnel_assigned: true,
            job_status: Some(JobStatus::InProgress),
            ..snapshot()
        };
        let result = plan_transition(
            &req,
            &working,
            &reviewer(),
            policy,
            RequestStatus::Cancelled,
            Some("duplicate ticket"),
        );
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
    }

    #[test]
    fn completion_only_from_approved_and_only_by_completion_roles() {
        let policy = policy_for(RequestType::Transport);

        let req = request(RequestType::Transport, RequestStatus::Reviewed);
        assert!(matches!(
            plan_completion(&req, &reviewer(), policy),
            Err(WorkflowError::InvalidTransition { .. })
        ));

        let req = request(RequestType::Transport, RequestStatus::Approved);
        assert!(matches!(
            plan_completion(&req, &requester(), policy),
            Err(WorkflowError::Forbidden(_))
        ));

        let plan = plan_completion(&req, &reviewer(), policy).unwrap();
        assert_eq!(plan.to, RequestStatus::Completed);
        assert!(plan.stamp_completed_at);

        // a second completion finds the request already closed
        let req = request(RequestType::Transport, RequestStatus::Completed);
        assert!(matches!(
            plan_completion(&req, &reviewer(), policy),
            Err(WorkflowError::InvalidTransition { .. })
        ));
    }
}
