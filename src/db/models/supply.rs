// src/db/models/supply.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::workflow::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct SupplyRequest {
    pub request_id: i32,
    pub date_and_time_needed: NaiveDateTime,
    pub picked_up_at: Option<NaiveDateTime>,
}

impl SupplyRequest {
    /// Completion is a single "mark picked up" action with no extra data.
    pub fn mark_picked_up(&mut self, now: NaiveDateTime) -> WorkflowResult<()> {
        if self.picked_up_at.is_some() {
            return Err(WorkflowError::validation(
                "The supplies have already been picked up",
            ));
        }
        self.picked_up_at = Some(now);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct SupplyLine {
    pub id: i32,
    pub request_id: i32,
    pub supply_item_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewSupplyLine {
    pub supply_item_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewSupplyRequest {
    pub date_and_time_needed: NaiveDateTime,
    pub items: Vec<NewSupplyLine>,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct SupplyRequestView {
    #[serde(flatten)]
    pub supply: SupplyRequest,
    pub items: Vec<SupplyLine>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn pickup_is_recorded_once() {
        let now = NaiveDate::from_ymd_opt(2026, 7, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut s = SupplyRequest {
            request_id: 1,
            date_and_time_needed: now,
            picked_up_at: None,
        };
        s.mark_picked_up(now).unwrap();
        assert_eq!(s.picked_up_at, Some(now));
        assert!(s.mark_picked_up(now).is_err());
    }
}
