// src/db/models/transport.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::workflow::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct TransportRequest {
    pub request_id: i32,
    pub vehicle_id: i32,
    pub date_and_time_needed: NaiveDateTime,
    pub estimated_end_time: NaiveDateTime,
    pub destination: String,
    pub in_progress: bool,
    pub actual_start: Option<NaiveDateTime>,
    pub odometer_start: Option<i64>,
    pub odometer_end: Option<i64>,
    pub total_distance_travelled: Option<i64>,
}

impl TransportRequest {
    /// Start the trip with the vehicle's current odometer reading.
    pub fn start_trip(&mut self, odometer: i64, now: NaiveDateTime) -> WorkflowResult<()> {
        if self.in_progress || self.actual_start.is_some() {
            return Err(WorkflowError::validation("The trip has already started"));
        }
        if odometer < 0 {
            return Err(WorkflowError::validation(
                "Odometer reading must not be negative",
            ));
        }
        self.in_progress = true;
        self.actual_start = Some(now);
        self.odometer_start = Some(odometer);
        Ok(())
    }

    /// Complete the trip with a second, strictly greater odometer reading
    /// and return the distance travelled. The delta is computed exactly
    /// once; completing twice is an error.
    pub fn complete_trip(&mut self, odometer: i64) -> WorkflowResult<i64> {
        if !self.in_progress {
            return Err(WorkflowError::validation(
                "The trip has not started or was already completed",
            ));
        }
        let start = self.odometer_start.ok_or_else(|| {
            WorkflowError::validation("The trip has no recorded starting odometer")
        })?;
        if odometer <= start {
            return Err(WorkflowError::validation(
                "Final odometer reading must be greater than the starting reading",
            ));
        }
        let distance = odometer - start;
        self.in_progress = false;
        self.odometer_end = Some(odometer);
        self.total_distance_travelled = Some(distance);
        Ok(distance)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewTransportRequest {
    pub vehicle_id: i32,
    pub date_and_time_needed: NaiveDateTime,
    pub estimated_end_time: NaiveDateTime,
    pub destination: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OdometerReading {
    pub odometer: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trip() -> TransportRequest {
        TransportRequest {
            request_id: 1,
            vehicle_id: 5,
            date_and_time_needed: NaiveDate::from_ymd_opt(2026, 5, 4)
                .unwrap()
                .and_hms_opt(7, 30, 0)
                .unwrap(),
            estimated_end_time: NaiveDate::from_ymd_opt(2026, 5, 4)
                .unwrap()
                .and_hms_opt(17, 0, 0)
                .unwrap(),
            destination: "Regional office".to_string(),
            in_progress: false,
            actual_start: None,
            odometer_start: None,
            odometer_end: None,
            total_distance_travelled: None,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 4)
            .unwrap()
            .and_hms_opt(7, 35, 0)
            .unwrap()
    }

    #[test]
    fn start_then_complete_computes_distance() {
        let mut t = trip();
        t.start_trip(1000, now()).unwrap();
        assert!(t.in_progress);
        assert_eq!(t.actual_start, Some(now()));

        let distance = t.complete_trip(1050).unwrap();
        assert_eq!(distance, 50);
        assert_eq!(t.total_distance_travelled, Some(50));
        assert!(!t.in_progress);
    }

    #[test]
    fn completing_twice_never_recomputes_the_delta() {
        let mut t = trip();
        t.start_trip(1000, now()).unwrap();
        t.complete_trip(1050).unwrap();
        assert!(t.complete_trip(1100).is_err());
        assert_eq!(t.total_distance_travelled, Some(50));
    }

    #[test]
    fn final_reading_must_exceed_the_start() {
        let mut t = trip();
        t.start_trip(1000, now()).unwrap();
        assert!(t.complete_trip(1000).is_err());
        assert!(t.complete_trip(950).is_err());
    }

    #[test]
    fn cannot_complete_before_starting() {
        let mut t = trip();
        assert!(t.complete_trip(1050).is_err());
    }

    #[test]
    fn negative_odometer_is_rejected() {
        let mut t = trip();
        assert!(t.start_trip(-1, now()).is_err());
    }
}
