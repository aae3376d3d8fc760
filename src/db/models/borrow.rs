// src/db/models/borrow.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::workflow::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct ReturnableRequest {
    pub request_id: i32,
    pub item_id: i32,
    pub date_and_time_needed: NaiveDateTime,
    pub return_date_and_time: NaiveDateTime,
    pub in_progress: bool,
    pub is_returned: bool,
    pub actual_return_date: Option<NaiveDateTime>,
    pub return_condition: Option<String>,
    pub is_lost: bool,
    pub lost_reason: Option<String>,
}

impl ReturnableRequest {
    /// Hand the item over to the requester.
    pub fn pick_up(&mut self) -> WorkflowResult<()> {
        if self.in_progress {
            return Err(WorkflowError::validation(
                "The item has already been picked up",
            ));
        }
        if self.is_returned || self.is_lost {
            return Err(WorkflowError::validation("The loan is already closed"));
        }
        self.in_progress = true;
        Ok(())
    }

    /// Overdue is computed against the agreed return time, never stored.
    pub fn is_overdue_at(&self, now: NaiveDateTime) -> bool {
        !self.is_returned && !self.is_lost && now > self.return_date_and_time
    }

    /// Close the loan with a mandatory condition note; returns whether the
    /// return happened past the agreed time.
    pub fn finalize_return(
        &mut self,
        condition: &str,
        now: NaiveDateTime,
    ) -> WorkflowResult<bool> {
        if !self.in_progress {
            return Err(WorkflowError::validation(
                "The item was never picked up or the loan is already closed",
            ));
        }
        if self.is_returned {
            return Err(WorkflowError::validation("The item was already returned"));
        }
        if condition.trim().is_empty() {
            return Err(WorkflowError::validation(
                "A return condition description is required",
            ));
        }
        let overdue = now > self.return_date_and_time;
        self.in_progress = false;
        self.is_returned = true;
        self.actual_return_date = Some(now);
        self.return_condition = Some(condition.trim().to_string());
        Ok(overdue)
    }

    /// Close the loan as lost instead of returned.
    pub fn mark_lost(&mut self, reason: &str) -> WorkflowResult<()> {
        if !self.in_progress {
            return Err(WorkflowError::validation(
                "The item was never picked up or the loan is already closed",
            ));
        }
        if reason.trim().is_empty() {
            return Err(WorkflowError::validation(
                "A reason is required when reporting an item lost",
            ));
        }
        self.in_progress = false;
        self.is_lost = true;
        self.lost_reason = Some(reason.trim().to_string());
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewReturnableRequest {
    pub item_id: i32,
    pub date_and_time_needed: NaiveDateTime,
    pub return_date_and_time: NaiveDateTime,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReturnAction {
    Return,
    Lost,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnableAction {
    pub action: ReturnAction,
    pub return_condition: Option<String>,
    pub lost_reason: Option<String>,
}

/// Read view with the computed overdue flag attached.
#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct ReturnableRequestView {
    #[serde(flatten)]
    pub loan: ReturnableRequest,
    pub is_overdue: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, d)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn loan() -> ReturnableRequest {
        ReturnableRequest {
            request_id: 1,
            item_id: 11,
            date_and_time_needed: day(1, 8),
            return_date_and_time: day(3, 17),
            in_progress: false,
            is_returned: false,
            actual_return_date: None,
            return_condition: None,
            is_lost: false,
            lost_reason: None,
        }
    }

    #[test]
    fn return_requires_a_condition_note() {
        let mut l = loan();
        l.pick_up().unwrap();
        assert!(matches!(
            l.finalize_return("", day(3, 12)),
            Err(WorkflowError::Validation(_))
        ));
        assert!(matches!(
            l.finalize_return("   ", day(3, 12)),
            Err(WorkflowError::Validation(_))
        ));
        assert!(!l.is_returned);
    }

    #[test]
    fn late_return_is_flagged_overdue() {
        let mut l = loan();
        l.pick_up().unwrap();
        let overdue = l.finalize_return("scuffed casing", day(4, 9)).unwrap();
        assert!(overdue);
        assert!(l.is_returned);
        assert!(!l.in_progress);
        assert_eq!(l.return_condition.as_deref(), Some("scuffed casing"));
    }

    #[test]
    fn on_time_return_is_not_overdue() {
        let mut l = loan();
        l.pick_up().unwrap();
        let overdue = l.finalize_return("good", day(3, 12)).unwrap();
        assert!(!overdue);
    }

    #[test]
    fn double_pickup_and_double_return_are_rejected() {
        let mut l = loan();
        l.pick_up().unwrap();
        assert!(l.pick_up().is_err());
        l.finalize_return("good", day(3, 12)).unwrap();
        assert!(l.finalize_return("good", day(3, 13)).is_err());
    }

    #[test]
    fn overdue_is_computed_on_read() {
        let mut l = loan();
        l.pick_up().unwrap();
        assert!(!l.is_overdue_at(day(3, 16)));
        assert!(l.is_overdue_at(day(3, 18)));
        l.finalize_return("good", day(4, 9)).unwrap();
        // a closed loan is no longer counted as overdue
        assert!(!l.is_overdue_at(day(5, 9)));
    }

    #[test]
    fn lost_items_need_a_reason() {
        let mut l = loan();
        l.pick_up().unwrap();
        assert!(l.mark_lost(" ").is_err());
        l.mark_lost("left in the field office").unwrap();
        assert!(l.is_lost);
        assert!(!l.in_progress);
    }
}
