// src/db/models/venue.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::workflow::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct VenueRequest {
    pub request_id: i32,
    pub venue_id: i32,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// Pre-gate set by the head of the venue's owning department; `None`
    /// until they act, `Some(false)` is equivalent to a rejection.
    pub approved_by_head: Option<bool>,
    pub in_progress: bool,
    pub actual_start: Option<NaiveDateTime>,
    pub actual_end_time: Option<NaiveDateTime>,
    pub setup_requirements: Vec<String>,
}

impl VenueRequest {
    /// Record the owning department head's decision. The gate is settable
    /// exactly once.
    pub fn record_head_decision(&mut self, approved: bool) -> WorkflowResult<()> {
        if self.approved_by_head.is_some() {
            return Err(WorkflowError::validation(
                "The venue's department head has already decided on this request",
            ));
        }
        self.approved_by_head = Some(approved);
        Ok(())
    }

    /// Operations manager opens the venue for use once the booked start
    /// time has arrived.
    pub fn start_use(&mut self, now: NaiveDateTime) -> WorkflowResult<()> {
        if self.in_progress || self.actual_start.is_some() {
            return Err(WorkflowError::validation("Venue use has already started"));
        }
        if now < self.start_time {
            return Err(WorkflowError::validation(
                "Venue use cannot start before the booked start time",
            ));
        }
        self.in_progress = true;
        self.actual_start = Some(now);
        Ok(())
    }

    /// Completion is an explicit action, never automatic at `end_time`.
    pub fn finish_use(&mut self, now: NaiveDateTime) -> WorkflowResult<()> {
        if !self.in_progress {
            return Err(WorkflowError::validation(
                "Venue use has not started or was already completed",
            ));
        }
        self.in_progress = false;
        self.actual_end_time = Some(now);
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewVenueRequest {
    pub venue_id: i32,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub setup_requirements: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HeadApproval {
    pub approved: bool,
    /// Required context when declining; folded into the rejection reason.
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, 10)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn booking() -> VenueRequest {
        VenueRequest {
            request_id: 1,
            venue_id: 3,
            start_time: at(10),
            end_time: at(12),
            approved_by_head: None,
            in_progress: false,
            actual_start: None,
            actual_end_time: None,
            setup_requirements: vec!["projector".to_string()],
        }
    }

    #[test]
    fn head_gate_is_settable_once() {
        let mut v = booking();
        v.record_head_decision(true).unwrap();
        assert_eq!(v.approved_by_head, Some(true));
        assert!(v.record_head_decision(false).is_err());
    }

    #[test]
    fn use_cannot_start_before_booked_time() {
        let mut v = booking();
        assert!(v.start_use(at(9)).is_err());
        v.start_use(at(10)).unwrap();
        assert!(v.in_progress);
        assert_eq!(v.actual_start, Some(at(10)));
    }

    #[test]
    fn double_start_and_double_finish_are_rejected() {
        let mut v = booking();
        v.start_use(at(10)).unwrap();
        assert!(v.start_use(at(11)).is_err());

        v.finish_use(at(13)).unwrap();
        assert!(!v.in_progress);
        assert_eq!(v.actual_end_time, Some(at(13)));
        assert!(v.finish_use(at(13)).is_err());
    }
}
