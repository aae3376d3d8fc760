// src/db/models/job.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::workflow::error::{WorkflowError, WorkflowResult};

/// Sub-status of the work itself, independent of the envelope status once
/// the request is approved.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    ReworkInProgress,
    Rejected,
    Completed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::ReworkInProgress => "rework_in_progress",
            JobStatus::Rejected => "rejected",
            JobStatus::Completed => "completed",
        }
    }

    /// Legal edges of the rework sub-machine. `Completed -> Rejected` and
    /// `Rejected -> ReworkInProgress` only happen through the dedicated
    /// rework actions, but they are still edges of this machine.
    pub fn can_advance_to(self, target: JobStatus) -> bool {
        matches!(
            (self, target),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::Completed, JobStatus::Rejected)
                | (JobStatus::Rejected, JobStatus::ReworkInProgress)
                | (JobStatus::ReworkInProgress, JobStatus::Completed)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct JobRequest {
    pub request_id: i32,
    pub job_type: String,
    pub location: String,
    pub description: String,
    pub assigned_to: Option<i32>,
    pub status: JobStatus,
    pub verified_by_requester: bool,
    pub verified_by_reviewer: bool,
}

impl JobRequest {
    /// Work has started once the sub-status moved off `Pending`; holds and
    /// cancellations are blocked from that point on.
    pub fn work_started(&self) -> bool {
        self.status != JobStatus::Pending
    }

    /// The envelope may close only after the work is done and both parties
    /// signed off.
    pub fn ready_to_complete(&self) -> bool {
        self.status == JobStatus::Completed && self.verified_by_requester && self.verified_by_reviewer
    }

    /// Record a completion sign-off. Each flag is settable exactly once and
    /// only while the work sits in `Completed`.
    pub fn record_verification(&mut self, by_requester: bool) -> WorkflowResult<()> {
        if self.status != JobStatus::Completed {
            return Err(WorkflowError::validation(
                "The job must be completed before it can be verified",
            ));
        }
        let flag = if by_requester {
            &mut self.verified_by_requester
        } else {
            &mut self.verified_by_reviewer
        };
        if *flag {
            return Err(WorkflowError::validation(
                "This completion has already been verified",
            ));
        }
        *flag = true;
        Ok(())
    }
}

/// One logged cycle of rejection → restart → redo.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct ReworkAttempt {
    pub id: i32,
    pub job_request_id: i32,
    pub rejection_reason: String,
    pub rework_start_date: Option<NaiveDateTime>,
    pub rework_end_date: Option<NaiveDateTime>,
    pub resolved: bool,
    pub created_at: NaiveDateTime,
}

/// The active attempt is the most recently created unresolved one;
/// selection is by `created_at` (then id) so it is deterministic even when
/// attempts accumulate.
pub fn active_rework(attempts: &[ReworkAttempt]) -> Option<&ReworkAttempt> {
    attempts
        .iter()
        .filter(|a| !a.resolved)
        .max_by_key(|a| (a.created_at, a.id))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewJobRequest {
    pub job_type: String,
    pub location: String,
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPersonnel {
    pub personnel_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct JobStatusUpdate {
    pub target: JobStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct JobRejection {
    pub reason: String,
}

/// Sign-off payload; the side (requester vs reviewer) is derived from the
/// authenticated actor, never from the body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JobVerification {
    pub verify: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReworkAction {
    Start,
    Finish,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReworkUpdate {
    pub action: ReworkAction,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct JobRequestView {
    #[serde(flatten)]
    pub job: JobRequest,
    pub rework_attempts: Vec<ReworkAttempt>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn job(status: JobStatus) -> JobRequest {
        JobRequest {
            request_id: 1,
            job_type: "electrical".to_string(),
            location: "Bldg A, Rm 104".to_string(),
            description: "Replace flickering light fixtures".to_string(),
            assigned_to: Some(9),
            status,
            verified_by_requester: false,
            verified_by_reviewer: false,
        }
    }

    fn attempt(id: i32, day: u32, resolved: bool) -> ReworkAttempt {
        ReworkAttempt {
            id,
            job_request_id: 1,
            rejection_reason: "Paint finish uneven".to_string(),
            rework_start_date: None,
            rework_end_date: None,
            resolved,
            created_at: NaiveDate::from_ymd_opt(2026, 3, day)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn sub_machine_edges() {
        assert!(JobStatus::Pending.can_advance_to(JobStatus::InProgress));
        assert!(JobStatus::InProgress.can_advance_to(JobStatus::Completed));
        assert!(JobStatus::Completed.can_advance_to(JobStatus::Rejected));
        assert!(JobStatus::Rejected.can_advance_to(JobStatus::ReworkInProgress));
        assert!(JobStatus::ReworkInProgress.can_advance_to(JobStatus::Completed));

        assert!(!JobStatus::Pending.can_advance_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_advance_to(JobStatus::InProgress));
        assert!(!JobStatus::Rejected.can_advance_to(JobStatus::Completed));
    }

    #[test]
    fn verification_requires_completed_work() {
        let mut j = job(JobStatus::InProgress);
        assert!(j.record_verification(true).is_err());

        j.status = JobStatus::Completed;
        assert!(j.record_verification(true).is_ok());
        assert!(j.verified_by_requester);
        assert!(!j.ready_to_complete());

        assert!(j.record_verification(false).is_ok());
        assert!(j.ready_to_complete());
    }

    #[test]
    fn verification_is_settable_only_once() {
        let mut j = job(JobStatus::Completed);
        j.record_verification(true).unwrap();
        assert!(matches!(
            j.record_verification(true),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn active_rework_is_newest_unresolved() {
        let attempts = vec![attempt(1, 1, true), attempt(2, 2, false), attempt(3, 3, false)];
        assert_eq!(active_rework(&attempts).unwrap().id, 3);
    }

    #[test]
    fn resolved_attempts_are_never_active() {
        let attempts = vec![attempt(1, 1, true), attempt(2, 2, true)];
        assert!(active_rework(&attempts).is_none());
    }

    #[test]
    fn ties_on_creation_time_fall_back_to_id() {
        let attempts = vec![attempt(5, 2, false), attempt(4, 2, false)];
        assert_eq!(active_rework(&attempts).unwrap().id, 5);
    }

    #[test]
    fn rework_cycle_end_to_end() {
        // completed work is verified by the requester, then rejected by the
        // reviewer before their own sign-off
        let mut j = job(JobStatus::Completed);
        j.record_verification(true).unwrap();

        assert!(j.status.can_advance_to(JobStatus::Rejected));
        j.status = JobStatus::Rejected;
        j.verified_by_requester = false; // sign-offs start over
        let mut attempts = vec![attempt(1, 5, false)];
        assert_eq!(active_rework(&attempts).unwrap().id, 1);

        assert!(j.status.can_advance_to(JobStatus::ReworkInProgress));
        j.status = JobStatus::ReworkInProgress;
        attempts[0].rework_start_date = Some(attempts[0].created_at);

        assert!(j.status.can_advance_to(JobStatus::Completed));
        j.status = JobStatus::Completed;
        attempts[0].rework_end_date = Some(attempts[0].created_at);
        attempts[0].resolved = true;
        assert!(active_rework(&attempts).is_none());

        j.record_verification(true).unwrap();
        j.record_verification(false).unwrap();
        assert!(j.ready_to_complete());
    }
}
